use gal_core::{tolerant_equal, EnumType, GalError, GalValue};

use crate::ast::{BinaryOp, CompareOp, UnaryOp};

fn unary_error(op: UnaryOp, value: &GalValue) -> GalError {
    GalError::new(
        "EXPR_OP",
        format!(
            "Operator {} cannot be applied on {}",
            op.symbol(),
            value.type_name()
        ),
    )
}

fn binary_error(op: &str, x: &GalValue, y: &GalValue) -> GalError {
    GalError::new(
        "EXPR_OP",
        format!(
            "Operator {} cannot be applied on {} and {}",
            op,
            x.type_name(),
            y.type_name()
        ),
    )
}

pub fn apply_unary(op: UnaryOp, value: &GalValue) -> Result<GalValue, GalError> {
    match (op, value) {
        (UnaryOp::Plus, GalValue::Num(num)) => Ok(GalValue::Num(*num)),
        (UnaryOp::Minus, GalValue::Num(num)) => Ok(GalValue::Num(-num)),
        (UnaryOp::Not, _) if value.is_bool() => Ok(EnumType::of_bool(!value.to_bool()?)),
        _ => Err(unary_error(op, value)),
    }
}

fn repeat(value: &GalValue, count: f64) -> Option<GalValue> {
    if count < 0.0 || !count.is_finite() {
        return None;
    }
    let count = count as usize;
    match value {
        GalValue::Str(text) => Some(GalValue::Str(text.repeat(count))),
        GalValue::Array(values) => {
            let mut repeated = Vec::with_capacity(values.len() * count);
            for _ in 0..count {
                repeated.extend(values.iter().cloned());
            }
            Some(GalValue::Array(repeated))
        }
        _ => None,
    }
}

fn index(x: &GalValue, y: &GalValue) -> Result<GalValue, GalError> {
    let GalValue::Num(num) = y else {
        return Err(binary_error("[]", x, y));
    };
    if !matches!(x, GalValue::Str(_) | GalValue::Array(_)) {
        return Err(binary_error("[]", x, y));
    }
    let in_range = *num >= 0.0 && num.fract() == 0.0;
    in_range
        .then(|| x.index(*num as usize))
        .flatten()
        .ok_or_else(|| {
            GalError::new(
                "EXPR_INDEX",
                format!(
                    "{} access out of range: {}[{}]",
                    x.type_name(),
                    x.repr_string(),
                    y
                ),
            )
        })
}

/// The typed operator table. Unsupported operand pairs fail with an
/// operator-cannot-be-applied error.
pub fn apply_binary(op: BinaryOp, x: &GalValue, y: &GalValue) -> Result<GalValue, GalError> {
    match (op, x, y) {
        (BinaryOp::Index, _, _) => index(x, y),
        (BinaryOp::Add, GalValue::Num(x), GalValue::Num(y)) => GalValue::num(x + y),
        (BinaryOp::Add, GalValue::Str(x), GalValue::Str(y)) => {
            Ok(GalValue::Str(format!("{}{}", x, y)))
        }
        (BinaryOp::Add, GalValue::Array(x), GalValue::Array(y)) => {
            let mut combined = x.clone();
            combined.extend(y.iter().cloned());
            Ok(GalValue::Array(combined))
        }
        (BinaryOp::Sub, GalValue::Num(x), GalValue::Num(y)) => GalValue::num(x - y),
        (BinaryOp::Mul, GalValue::Num(x), GalValue::Num(y)) => GalValue::num(x * y),
        (BinaryOp::Mul, _, GalValue::Num(count)) => {
            repeat(x, *count).ok_or_else(|| binary_error("*", x, y))
        }
        (BinaryOp::Mul, GalValue::Num(count), _) => {
            repeat(y, *count).ok_or_else(|| binary_error("*", x, y))
        }
        (BinaryOp::Div, GalValue::Num(x), GalValue::Num(y)) => GalValue::num(x / y),
        (BinaryOp::FloorDiv, GalValue::Num(x), GalValue::Num(y)) => GalValue::num((x / y).floor()),
        (BinaryOp::Mod, GalValue::Num(x), GalValue::Num(y)) => GalValue::num(x % y),
        (BinaryOp::Pow, GalValue::Num(x), GalValue::Num(y)) => GalValue::num(x.powf(*y)),
        (BinaryOp::And, _, _) if x.is_bool() && y.is_bool() => {
            Ok(EnumType::of_bool(x.to_bool()? && y.to_bool()?))
        }
        (BinaryOp::Or, _, _) if x.is_bool() && y.is_bool() => {
            Ok(EnumType::of_bool(x.to_bool()? || y.to_bool()?))
        }
        _ => Err(binary_error(op.symbol(), x, y)),
    }
}

pub fn apply_compare(
    op: CompareOp,
    x: &GalValue,
    y: &GalValue,
    warn: &mut Option<String>,
) -> Result<GalValue, GalError> {
    match (op, x, y) {
        (CompareOp::Eq, _, _) | (CompareOp::Ne, _, _) => {
            let equal = tolerant_equal(x, y).unwrap_or_else(|| {
                *warn = Some(format!(
                    "Trying to compare {} and {}",
                    x.type_name(),
                    y.type_name()
                ));
                false
            });
            Ok(EnumType::of_bool(if op == CompareOp::Eq {
                equal
            } else {
                !equal
            }))
        }
        (CompareOp::Le, GalValue::Num(x), GalValue::Num(y)) => Ok(EnumType::of_bool(x <= y)),
        (CompareOp::Ge, GalValue::Num(x), GalValue::Num(y)) => Ok(EnumType::of_bool(x >= y)),
        (CompareOp::Lt, GalValue::Num(x), GalValue::Num(y)) => Ok(EnumType::of_bool(x < y)),
        (CompareOp::Gt, GalValue::Num(x), GalValue::Num(y)) => Ok(EnumType::of_bool(x > y)),
        _ => Err(binary_error(op.symbol(), x, y)),
    }
}
