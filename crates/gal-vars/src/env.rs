use std::collections::BTreeMap;
use std::rc::Rc;

use gal_core::{is_discard_name, is_identifier, EnumType, GalError, GalValue};

use crate::ast::Expr;
use crate::builtins::Builtins;
use crate::ops::{apply_binary, apply_compare, apply_unary};
use crate::parser::parse_expr;

/// One variable environment: named values, the enum types currently in
/// scope (always including `bool`), and the shared builtin registry.
///
/// Enum types are barely persistent state: the engine re-seeds them from
/// the `[Enum]` statements above the current line on every step.
pub struct VarsFrame {
    pub enum_types: Vec<EnumType>,
    pub vars: BTreeMap<String, GalValue>,
    builtins: Rc<Builtins>,
    warn: Option<String>,
}

impl VarsFrame {
    pub fn new(builtins: Rc<Builtins>) -> Self {
        Self {
            enum_types: vec![EnumType::bool_type()],
            vars: BTreeMap::new(),
            builtins,
            warn: None,
        }
    }

    /// Deep-clones the variables; shares the builtin registry. Enum types
    /// start fresh because the next step re-seeds them anyway.
    pub fn copy(&self) -> Self {
        Self {
            enum_types: vec![EnumType::bool_type()],
            vars: self.vars.clone(),
            builtins: Rc::clone(&self.builtins),
            warn: None,
        }
    }

    pub fn builtins(&self) -> &Rc<Builtins> {
        &self.builtins
    }

    /// The pending non-fatal warning, if any, clearing it.
    pub fn take_warn(&mut self) -> Option<String> {
        self.warn.take()
    }

    pub fn set_var(&mut self, name: &str, value: GalValue) -> Result<(), GalError> {
        if is_discard_name(name) {
            return Ok(());
        }
        if let Some(report) = self.builtins.set_var(name, &value) {
            self.warn = Some(report);
            return Ok(());
        }
        if !is_identifier(name) {
            return Err(GalError::new(
                "VAR_NAME",
                format!("Invalid variable name: {}", name),
            ));
        }
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    pub fn clear_enum_types(&mut self) {
        self.enum_types = vec![EnumType::bool_type()];
    }

    pub fn def_enum_type(&mut self, enum_type: EnumType) -> Result<(), GalError> {
        if self.is_defined_enum(&enum_type.name) {
            return Err(GalError::new(
                "ENUM_REDEFINE",
                format!("Multiple definition of enum type named {}", enum_type.name),
            ));
        }
        self.enum_types.push(enum_type);
        Ok(())
    }

    pub fn def_enum_type_if_unexist(&mut self, enum_type: EnumType) {
        if !self.is_defined_enum(&enum_type.name) {
            self.enum_types.push(enum_type);
        }
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enum_types.iter().find(|entry| entry.name == name)
    }

    /// The enum value carrying `name`, across every defined type. Two types
    /// sharing a value name make the bare name unusable.
    pub fn enum_value(&self, name: &str) -> Result<Option<GalValue>, GalError> {
        let mut found = None;
        for enum_type in &self.enum_types {
            let Some(index) = enum_type.values.iter().position(|value| value == name) else {
                continue;
            };
            if found.is_some() {
                return Err(GalError::new(
                    "ENUM_AMBIGUOUS",
                    format!("Found multiple enum value named {}", name),
                ));
            }
            found = Some(GalValue::Enum(enum_type.of_index(index)?));
        }
        Ok(found)
    }

    pub fn is_defined_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn is_defined_enum(&self, name: &str) -> bool {
        self.enum_type(name).is_some()
    }

    pub fn is_defined_symbol(&self, name: &str) -> bool {
        self.is_defined_var(name) || self.is_defined_enum(name)
    }

    /// Evaluates one expression. Failures wrap the sub-cause together with
    /// the original expression text.
    pub fn evaluate(&mut self, expr: &str) -> Result<GalValue, GalError> {
        let evaluated = parse_expr(expr).and_then(|parsed| self.eval_node(&parsed));
        evaluated.map_err(|error| {
            GalError::new(
                "EVAL_FAILED",
                format!("Cannot evaluate '{}': {}", expr, error.message),
            )
        })
    }

    fn eval_node(&mut self, node: &Expr) -> Result<GalValue, GalError> {
        match node {
            Expr::Num(value) => GalValue::num(*value),
            Expr::Str(value) => Ok(GalValue::Str(value.clone())),
            Expr::Array(values) => {
                let evaluated = values
                    .iter()
                    .map(|value| self.eval_node(value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(GalValue::Array(evaluated))
            }
            Expr::EnumValue { enum_type, value } => {
                let Some(found) = self.enum_type(enum_type) else {
                    return Err(GalError::new(
                        "ENUM_UNKNOWN",
                        format!("No such enum: {}", enum_type),
                    ));
                };
                Ok(GalValue::Enum(found.value_of(value)?))
            }
            Expr::Identifier(name) => self.eval_identifier(name),
            Expr::Call { func, arg } => self.eval_call(func, arg),
            Expr::Unary { op, value } => {
                let value = self.eval_node(value)?;
                apply_unary(*op, &value)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval_node(left)?;
                let right = self.eval_node(right)?;
                apply_binary(*op, &left, &right)
            }
            Expr::Comparing { first, rest } => {
                let mut previous = self.eval_node(first)?;
                for (op, next) in rest {
                    let current = self.eval_node(next)?;
                    let holds = apply_compare(*op, &previous, &current, &mut self.warn)?;
                    if !holds.to_bool()? {
                        return Ok(EnumType::of_bool(false));
                    }
                    previous = current;
                }
                Ok(EnumType::of_bool(true))
            }
            Expr::Matching { value, type_name } => {
                let value = self.eval_node(value)?;
                let matched = if type_name == "num" {
                    matches!(value, GalValue::Num(_))
                } else {
                    matches!(&value, GalValue::Enum(inner) if inner.enum_type.name == *type_name)
                };
                Ok(EnumType::of_bool(matched))
            }
        }
    }

    fn eval_identifier(&mut self, name: &str) -> Result<GalValue, GalError> {
        if is_discard_name(name) {
            return Err(GalError::new(
                "IDENT_DISCARDED",
                format!("{} is discarded", name),
            ));
        }
        if let Some(value) = self.builtins.var(name) {
            return value;
        }
        if let Some(value) = self.vars.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.enum_value(name)? {
            return Ok(value);
        }
        Err(GalError::new(
            "IDENT_UNKNOWN",
            format!("No such identifier or enum value: {}", name),
        ))
    }

    fn eval_call(&mut self, func: &str, arg: &Expr) -> Result<GalValue, GalError> {
        // hasVar asks whether its argument resolves, so the argument must
        // stay unevaluated.
        if func == "hasVar" {
            let Expr::Identifier(name) = arg else {
                return Err(GalError::new(
                    "EVAL_HASVAR",
                    "Function 'hasVar' can only be applied on identifier",
                ));
            };
            let defined = self.eval_identifier(name).is_ok();
            return Ok(EnumType::of_bool(defined));
        }
        let value = self.eval_node(arg)?;
        if let Some(result) = self.builtins.func(func, &value) {
            return result;
        }
        if let Some(enum_type) = self.enum_type(func) {
            return enum_type.apply(&value);
        }
        Err(GalError::new(
            "FUNC_UNKNOWN",
            format!("No such function: {}", func),
        ))
    }

    /// `enumPart;varsPart` — enum types as `name:v1|v2` joined by commas,
    /// variables as `name=repr` joined by commas.
    pub fn encode(&self) -> String {
        let enum_part = self
            .enum_types
            .iter()
            .map(|enum_type| enum_type.encode())
            .collect::<Vec<_>>()
            .join(",");
        let vars_part = self
            .vars
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.repr_string()))
            .collect::<Vec<_>>()
            .join(",");
        format!("{};{}", enum_part, vars_part)
    }

    /// Inverse of [`encode`](Self::encode). Enum types are installed before
    /// the variable expressions are evaluated, so enum-valued variables
    /// resolve.
    pub fn decode(text: &str, builtins: Rc<Builtins>) -> Result<Self, GalError> {
        let Some((enum_part, vars_part)) = text.split_once(';') else {
            return Err(GalError::new(
                "FRAME_DECODE",
                format!("Malformed environment encoding: {}", text),
            ));
        };
        let mut frame = Self::new(builtins);
        frame.enum_types = enum_part
            .split(',')
            .filter(|entry| !entry.is_empty())
            .map(EnumType::decode)
            .collect::<Result<Vec<_>, _>>()?;
        for entry in split_top_level(vars_part).filter(|entry| !entry.is_empty()) {
            let Some((name, expr)) = entry.split_once('=') else {
                return Err(GalError::new(
                    "FRAME_DECODE",
                    format!("Malformed variable encoding: {}", entry),
                ));
            };
            let value = frame.evaluate(expr)?;
            frame.set_var(name, value)?;
        }
        Ok(frame)
    }
}

/// Splits variable entries on commas that sit outside array braces and
/// string quotes, so `xs={1,'a,b'}` stays one entry.
fn split_top_level(text: &str) -> impl Iterator<Item = &str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in text.char_indices() {
        match quote {
            Some(open) => {
                if ch == open {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    entries.push(&text[start..index]);
                    start = index + 1;
                }
                _ => {}
            },
        }
    }
    entries.push(&text[start..]);
    entries.into_iter()
}

#[cfg(test)]
mod env_tests {
    use super::*;

    fn frame() -> VarsFrame {
        VarsFrame::new(Builtins::standard_seeded(1))
    }

    fn eval(frame: &mut VarsFrame, expr: &str) -> GalValue {
        frame
            .evaluate(expr)
            .unwrap_or_else(|error| panic!("{} should evaluate: {}", expr, error))
    }

    #[test]
    fn precedence_follows_the_grammar() {
        let mut frame = frame();
        assert_eq!(eval(&mut frame, "1+2*3"), GalValue::Num(7.0));
        assert_eq!(eval(&mut frame, "2^3^2"), GalValue::Num(512.0));
        assert_eq!(eval(&mut frame, "-2^2"), GalValue::Num(4.0));
        assert_eq!(eval(&mut frame, "7//2%2"), GalValue::Num(1.0));
        assert_eq!(
            eval(&mut frame, "1<2 & 2<3 | 1==2"),
            EnumType::of_bool(true)
        );
    }

    #[test]
    fn chained_comparison_is_a_conjunction() {
        let mut frame = frame();
        frame
            .set_var("x", GalValue::Num(5.0))
            .expect("set_var works");
        assert_eq!(eval(&mut frame, "1<x<10"), EnumType::of_bool(true));
        assert_eq!(eval(&mut frame, "1<x<4"), EnumType::of_bool(false));
    }

    #[test]
    fn identifier_resolution_prefers_builtins() {
        let mut frame = frame();
        frame
            .set_var("PI", GalValue::Num(3.0))
            .expect("set_var works");
        let resolved = eval(&mut frame, "PI");
        assert_eq!(resolved, GalValue::Num(std::f64::consts::PI));
    }

    #[test]
    fn enum_values_resolve_by_bare_name_unless_ambiguous() {
        let mut frame = frame();
        frame
            .def_enum_type(
                EnumType::new("state", vec!["idle".to_string(), "busy".to_string()])
                    .expect("enum type constructs"),
            )
            .expect("first definition passes");
        assert_eq!(eval(&mut frame, "idle").to_string(), "state.idle");
        assert_eq!(eval(&mut frame, "state.busy").to_string(), "state.busy");

        frame
            .def_enum_type(
                EnumType::new("mood", vec!["idle".to_string()]).expect("enum type constructs"),
            )
            .expect("second definition passes");
        let error = frame.evaluate("idle").expect_err("ambiguous name fails");
        assert!(error.message.contains("Found multiple enum value named idle"));
    }

    #[test]
    fn enum_conversion_call_and_matching() {
        let mut frame = frame();
        frame
            .def_enum_type(
                EnumType::new("state", vec!["idle".to_string(), "busy".to_string()])
                    .expect("enum type constructs"),
            )
            .expect("definition passes");
        assert_eq!(eval(&mut frame, "state(1)").to_string(), "state.busy");
        assert_eq!(eval(&mut frame, "state(1) is state"), EnumType::of_bool(true));
        assert_eq!(eval(&mut frame, "1 is num"), EnumType::of_bool(true));
        assert_eq!(eval(&mut frame, "1 is state"), EnumType::of_bool(false));
    }

    #[test]
    fn has_var_never_fails() {
        let mut frame = frame();
        assert_eq!(eval(&mut frame, "hasVar(missing)"), EnumType::of_bool(false));
        frame
            .set_var("x", GalValue::Num(1.0))
            .expect("set_var works");
        assert_eq!(eval(&mut frame, "hasVar(x)"), EnumType::of_bool(true));
        let error = frame
            .evaluate("hasVar(1+1)")
            .expect_err("non-identifier argument fails");
        assert!(error.message.contains("hasVar"));
    }

    #[test]
    fn heterogeneous_equality_warns_once() {
        let mut frame = frame();
        assert_eq!(eval(&mut frame, "1 == 'a'"), EnumType::of_bool(false));
        assert_eq!(
            frame.take_warn().as_deref(),
            Some("Trying to compare num and string")
        );
        assert!(frame.take_warn().is_none());
    }

    #[test]
    fn failures_wrap_the_expression_text() {
        let mut frame = frame();
        let error = frame.evaluate("1 + 'a'").expect_err("num plus string fails");
        assert_eq!(error.code, "EVAL_FAILED");
        assert!(error.message.starts_with("Cannot evaluate '1 + 'a'':"));
    }

    #[test]
    fn assigning_to_logger_reports_instead_of_storing() {
        let mut frame = frame();
        assert_eq!(eval(&mut frame, "LOGGER"), GalValue::Num(0.0));
        frame
            .set_var("LOGGER", GalValue::Num(42.0))
            .expect("sink assignment is silent");
        assert!(!frame.is_defined_var("LOGGER"));
        assert_eq!(frame.take_warn().as_deref(), Some("LOGGER: 42"));
    }

    #[test]
    fn set_var_discards_underscore_names() {
        let mut frame = frame();
        frame
            .set_var("_", GalValue::Num(1.0))
            .expect("discard is silent");
        assert!(!frame.is_defined_var("_"));
        let error = frame
            .set_var("2x", GalValue::Num(1.0))
            .expect_err("invalid name fails");
        assert_eq!(error.code, "VAR_NAME");
    }

    #[test]
    fn encode_decode_round_trips_enum_valued_vars() {
        let mut frame = frame();
        frame
            .def_enum_type(
                EnumType::new("state", vec!["idle".to_string(), "busy".to_string()])
                    .expect("enum type constructs"),
            )
            .expect("definition passes");
        let busy = eval(&mut frame, "state.busy");
        frame.set_var("s", busy).expect("set_var works");
        frame
            .set_var("xs", GalValue::Array(vec![GalValue::Num(1.5), GalValue::Str("a".to_string())]))
            .expect("set_var works");

        let encoded = frame.encode();
        let mut decoded =
            VarsFrame::decode(&encoded, Builtins::standard_seeded(1)).expect("decode passes");
        assert_eq!(decoded.vars, frame.vars);
        assert_eq!(eval(&mut decoded, "s == state.busy"), EnumType::of_bool(true));
    }

    #[test]
    fn copy_shares_builtins_and_clones_vars() {
        let mut frame = frame();
        frame
            .set_var("x", GalValue::Num(1.0))
            .expect("set_var works");
        let mut copied = frame.copy();
        copied
            .set_var("x", GalValue::Num(2.0))
            .expect("set_var works");
        assert_eq!(frame.vars["x"], GalValue::Num(1.0));
        assert_eq!(copied.vars["x"], GalValue::Num(2.0));
        assert!(Rc::ptr_eq(frame.builtins(), copied.builtins()));
    }
}
