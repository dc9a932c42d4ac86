use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GalError;
use crate::ident::is_identifier;

/// Tolerance used for numeric equality and num-to-enum conversion.
pub const NUM_EPSILON: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Result<Self, GalError> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(GalError::new(
                "ENUM_NAME",
                format!("Name of enum {} is invalid.", name),
            ));
        }
        for value in &values {
            if !is_identifier(value) {
                return Err(GalError::new(
                    "ENUM_VALUE_NAME",
                    format!("Name of enum value {}.{} is invalid.", name, value),
                ));
            }
        }
        for (index, value) in values.iter().enumerate() {
            if values[..index].contains(value) {
                return Err(GalError::new(
                    "ENUM_DUPLICATE",
                    format!("Found duplicate enum value: {}.{}", name, value),
                ));
            }
        }
        Ok(Self { name, values })
    }

    /// The builtin two-value enum backing boolean results.
    pub fn bool_type() -> Self {
        Self {
            name: "bool".to_string(),
            values: vec!["false".to_string(), "true".to_string()],
        }
    }

    pub fn of_bool(value: bool) -> GalValue {
        GalValue::Enum(EnumValue {
            enum_type: Self::bool_type(),
            index: usize::from(value),
        })
    }

    pub fn of_index(&self, index: usize) -> Result<EnumValue, GalError> {
        if index >= self.values.len() {
            return Err(GalError::new(
                "ENUM_INDEX",
                format!("Enum index out of bound: {}", index),
            ));
        }
        Ok(EnumValue {
            enum_type: self.clone(),
            index,
        })
    }

    pub fn value_of(&self, value: &str) -> Result<EnumValue, GalError> {
        let Some(index) = self.values.iter().position(|entry| entry == value) else {
            return Err(GalError::new(
                "ENUM_VALUE",
                format!(
                    "Value {} is not a legal value for enum {}: must be one of {}.",
                    value,
                    self.name,
                    self.values.join(", ")
                ),
            ));
        };
        self.of_index(index)
    }

    /// Converts a near-integer number into this enum, `EnumName(expr)` style.
    pub fn apply(&self, value: &GalValue) -> Result<GalValue, GalError> {
        let GalValue::Num(num) = value else {
            return Err(GalError::new(
                "ENUM_CONVERT",
                format!("Cannot convert from {} to {}.", value.type_name(), self.name),
            ));
        };
        let index = num.round();
        if (num - index).abs() >= NUM_EPSILON || index < 0.0 {
            return Err(GalError::new(
                "ENUM_CONVERT",
                format!("Cannot convert non-integer into enum {}.", self.name),
            ));
        }
        Ok(GalValue::Enum(self.of_index(index as usize)?))
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.name, self.values.join("|"))
    }

    pub fn decode(text: &str) -> Result<Self, GalError> {
        let Some((name, values)) = text.split_once(':') else {
            return Err(GalError::new(
                "ENUM_DECODE",
                format!("Malformed enum type encoding: {}", text),
            ));
        };
        Self::new(
            name.trim(),
            values.split('|').map(|value| value.trim().to_string()).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub enum_type: EnumType,
    pub index: usize,
}

impl EnumValue {
    pub fn name(&self) -> &str {
        &self.enum_type.values[self.index]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GalValue {
    Num(f64),
    Enum(EnumValue),
    Str(String),
    Array(Vec<GalValue>),
}

impl GalValue {
    pub fn num(value: f64) -> Result<Self, GalError> {
        if value.is_nan() {
            return Err(GalError::new("VALUE_NAN", "Num cannot be NaN."));
        }
        Ok(Self::Num(value))
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Num(_) => "num".to_string(),
            Self::Enum(value) => value.enum_type.name.clone(),
            Self::Str(_) => "string".to_string(),
            Self::Array(_) => "array".to_string(),
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Enum(value) if value.enum_type.name == "bool")
    }

    pub fn to_bool(&self) -> Result<bool, GalError> {
        match self {
            Self::Enum(value) if value.enum_type.name == "bool" => Ok(value.index != 0),
            _ => Err(GalError::new(
                "VALUE_CONVERT",
                format!("Cannot convert {} into bool.", self.type_name()),
            )),
        }
    }

    pub fn to_num(&self) -> Result<f64, GalError> {
        match self {
            Self::Num(value) => Ok(*value),
            _ => Err(GalError::new(
                "VALUE_CONVERT",
                format!("Cannot convert {} into num.", self.type_name()),
            )),
        }
    }

    pub fn len(&self) -> Result<usize, GalError> {
        match self {
            Self::Str(value) => Ok(value.chars().count()),
            Self::Array(values) => Ok(values.len()),
            Self::Enum(value) => Ok(value.enum_type.values.len()),
            Self::Num(_) => Err(GalError::new(
                "VALUE_LEN",
                "Cannot get length of num.".to_string(),
            )),
        }
    }

    /// Zero-based sequence indexing; `None` when out of range.
    pub fn index(&self, index: usize) -> Option<GalValue> {
        match self {
            Self::Str(value) => value.chars().nth(index).map(|ch| Self::Str(ch.to_string())),
            Self::Array(values) => values.get(index).cloned(),
            _ => None,
        }
    }

    /// A string that `evaluate` can turn back into an equal value.
    pub fn repr_string(&self) -> String {
        match self {
            Self::Str(value) => format!("'{}'", value),
            Self::Array(values) => format!(
                "{{{}}}",
                values
                    .iter()
                    .map(|value| value.repr_string())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for GalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(value) => write!(f, "{}", format_num(*value)),
            Self::Enum(value) => write!(f, "{}.{}", value.enum_type.name, value.name()),
            Self::Str(value) => write!(f, "{}", value),
            Self::Array(values) => write!(
                f,
                "{{{}}}",
                values
                    .iter()
                    .map(|value| value.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

/// Shortest decimal rendering that stays within a shrinking tolerance of the
/// exact value, so `0.1 + 0.2` prints as `0.3`.
pub fn format_num(value: f64) -> String {
    let plain = format!("{}", value);
    if !plain.contains('.') {
        return plain;
    }
    let mut pow = 1.0f64;
    for _ in 0..15 {
        let rounded = (value * pow).round() / pow;
        if (value - rounded).abs() < 1.0 / (1000.0 * pow) {
            return format!("{}", rounded);
        }
        pow *= 10.0;
    }
    plain
}

/// Equality with the 1e-5 numeric tolerance. `None` means the two values are
/// of incomparable types; callers surface that as a warning, not an error.
pub fn tolerant_equal(x: &GalValue, y: &GalValue) -> Option<bool> {
    match (x, y) {
        (GalValue::Num(x), GalValue::Num(y)) => Some((x - y).abs() <= NUM_EPSILON),
        (GalValue::Enum(x), GalValue::Enum(y)) if x.enum_type.name == y.enum_type.name => {
            Some(x.index == y.index)
        }
        (GalValue::Str(x), GalValue::Str(y)) => Some(x == y),
        (GalValue::Array(x), GalValue::Array(y)) => {
            if x.len() != y.len() {
                return Some(false);
            }
            let mut all = true;
            for (x, y) in x.iter().zip(y) {
                all &= tolerant_equal(x, y)?;
            }
            Some(all)
        }
        _ => None,
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn enum_type_rejects_duplicates_and_bad_names() {
        let error = EnumType::new("state", vec!["a".to_string(), "a".to_string()])
            .expect_err("duplicate values should fail");
        assert_eq!(error.code, "ENUM_DUPLICATE");

        let error = EnumType::new("2state", vec!["a".to_string()])
            .expect_err("bad enum name should fail");
        assert_eq!(error.code, "ENUM_NAME");

        let error = EnumType::new("state", vec!["a b".to_string()])
            .expect_err("bad value name should fail");
        assert_eq!(error.code, "ENUM_VALUE_NAME");
    }

    #[test]
    fn enum_of_index_and_value_lookup() {
        let state = EnumType::new("state", vec!["a".to_string(), "b".to_string()])
            .expect("enum type should construct");
        assert_eq!(state.of_index(1).expect("index 1 exists").name(), "b");
        assert_eq!(state.value_of("a").expect("value a exists").index, 0);
        assert_eq!(
            state.of_index(2).expect_err("index 2 out of bound").code,
            "ENUM_INDEX"
        );
    }

    #[test]
    fn enum_type_encoding_round_trips() {
        let state = EnumType::new("state", vec!["on".to_string(), "off".to_string()])
            .expect("enum type should construct");
        let decoded = EnumType::decode(&state.encode()).expect("decode should pass");
        assert_eq!(decoded, state);
    }

    #[test]
    fn apply_converts_near_integers_only() {
        let state = EnumType::new("state", vec!["a".to_string(), "b".to_string()])
            .expect("enum type should construct");
        let value = state
            .apply(&GalValue::Num(1.0000001))
            .expect("near-integer should convert");
        assert_eq!(value.to_string(), "state.b");
        assert!(state.apply(&GalValue::Num(0.5)).is_err());
        assert!(state.apply(&GalValue::Str("b".to_string())).is_err());
    }

    #[test]
    fn num_formatting_rounds_float_noise() {
        assert_eq!(format_num(7.0), "7");
        assert_eq!(format_num(0.1 + 0.2), "0.3");
        assert_eq!(format_num(-2.5), "-2.5");
    }

    #[test]
    fn tolerant_equality_and_warnings() {
        assert_eq!(
            tolerant_equal(&GalValue::Num(1.0), &GalValue::Num(1.0000001)),
            Some(true)
        );
        assert_eq!(
            tolerant_equal(&GalValue::Num(1.0), &GalValue::Str("1".to_string())),
            None
        );
        assert_eq!(
            tolerant_equal(
                &GalValue::Array(vec![GalValue::Num(1.0)]),
                &GalValue::Array(vec![GalValue::Num(1.0)])
            ),
            Some(true)
        );
        assert_eq!(
            tolerant_equal(&EnumType::of_bool(true), &EnumType::of_bool(false)),
            Some(false)
        );
    }

    #[test]
    fn bool_enum_round_trips_through_to_bool() {
        assert!(EnumType::of_bool(true).to_bool().expect("bool converts"));
        assert!(!EnumType::of_bool(false).to_bool().expect("bool converts"));
        assert!(GalValue::Num(1.0).to_bool().is_err());
    }

    #[test]
    fn repr_string_quotes_strings_inside_arrays() {
        let value = GalValue::Array(vec![
            GalValue::Str("hi".to_string()),
            GalValue::Num(2.0),
        ]);
        assert_eq!(value.repr_string(), "{'hi',2}");
        assert_eq!(value.to_string(), "{hi,2}");
    }
}
