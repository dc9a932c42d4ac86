use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, Local, Timelike};
use gal_core::{EnumType, GalError, GalValue};

use crate::rng::next_random_unit;

type VarGetter = Box<dyn Fn() -> Result<GalValue, GalError>>;
type VarSetter = Box<dyn Fn(&GalValue) -> String>;
type FuncBody = Box<dyn Fn(&GalValue) -> Result<GalValue, GalError>>;

/// The builtin variable and function registry. Shared by reference across
/// environment copies and never mutated after construction. A builtin may
/// also carry a setter: assigning to it yields a report line for the
/// warning channel instead of storing a value.
pub struct Builtins {
    vars: BTreeMap<String, VarGetter>,
    setters: BTreeMap<String, VarSetter>,
    funcs: BTreeMap<String, FuncBody>,
}

fn num_func(
    name: &'static str,
    func: impl Fn(f64) -> f64 + 'static,
) -> FuncBody {
    Box::new(move |value| match value {
        GalValue::Num(num) => GalValue::num(func(*num)),
        _ => Err(GalError::new(
            "BUILTIN_APPLY",
            format!("Function {} cannot be applied on {}", name, value.type_name()),
        )),
    })
}

impl Builtins {
    pub fn empty() -> Self {
        Self {
            vars: BTreeMap::new(),
            setters: BTreeMap::new(),
            funcs: BTreeMap::new(),
        }
    }

    /// The standard registry: random sources, calendar readouts, math
    /// constants and functions, and the sequence/enum inspectors.
    pub fn standard() -> Rc<Self> {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_nanos())
            .unwrap_or(0);
        Self::standard_seeded(seed)
    }

    pub fn standard_seeded(seed: u32) -> Rc<Self> {
        let mut builtins = Self::empty();
        let state = Rc::new(Cell::new(seed));

        let random_state = Rc::clone(&state);
        builtins.register_var("random", move || {
            let mut current = random_state.get();
            let value = next_random_unit(&mut current);
            random_state.set(current);
            GalValue::num(value)
        });
        let bool_state = Rc::clone(&state);
        builtins.register_var("randBool", move || {
            let mut current = bool_state.get();
            let value = next_random_unit(&mut current);
            bool_state.set(current);
            Ok(EnumType::of_bool(value < 0.5))
        });

        builtins.register_var("yearNow", || GalValue::num(f64::from(Local::now().year())));
        builtins.register_var("monthNow", || GalValue::num(f64::from(Local::now().month())));
        builtins.register_var("dateNow", || GalValue::num(f64::from(Local::now().day())));
        builtins.register_var("hourNow", || GalValue::num(f64::from(Local::now().hour())));
        builtins.register_var("minuteNow", || GalValue::num(f64::from(Local::now().minute())));
        builtins.register_var("secondNow", || GalValue::num(f64::from(Local::now().second())));
        builtins.register_var("timeStamp", || {
            GalValue::num(Local::now().timestamp_millis() as f64)
        });

        builtins.register_var("E", || GalValue::num(std::f64::consts::E));
        builtins.register_var("PI", || GalValue::num(std::f64::consts::PI));

        // Script-side debug output: reads as 0, assignments surface the
        // assigned value on the warning channel.
        builtins.register_var("LOGGER", || GalValue::num(0.0));
        builtins.register_setter("LOGGER", |value| format!("LOGGER: {}", value));

        builtins.funcs.insert("sin".to_string(), num_func("sin", f64::sin));
        builtins.funcs.insert("cos".to_string(), num_func("cos", f64::cos));
        builtins.funcs.insert("tan".to_string(), num_func("tan", f64::tan));
        builtins.funcs.insert("ln".to_string(), num_func("ln", f64::ln));

        builtins.register_func("indexOf", |value| match value {
            GalValue::Enum(value) => GalValue::num(value.index as f64),
            _ => Err(GalError::new(
                "BUILTIN_APPLY",
                format!("Cannot get index of {}", value.type_name()),
            )),
        });
        builtins.register_func("lengthOf", |value| GalValue::num(value.len()? as f64));

        Rc::new(builtins)
    }

    pub fn register_var(
        &mut self,
        name: impl Into<String>,
        getter: impl Fn() -> Result<GalValue, GalError> + 'static,
    ) {
        self.vars.insert(name.into(), Box::new(getter));
    }

    pub fn register_setter(
        &mut self,
        name: impl Into<String>,
        setter: impl Fn(&GalValue) -> String + 'static,
    ) {
        self.setters.insert(name.into(), Box::new(setter));
    }

    pub fn register_func(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&GalValue) -> Result<GalValue, GalError> + 'static,
    ) {
        self.funcs.insert(name.into(), Box::new(func));
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn var(&self, name: &str) -> Option<Result<GalValue, GalError>> {
        self.vars.get(name).map(|getter| getter())
    }

    /// Routes an assignment to a builtin sink, yielding its report line.
    pub fn set_var(&self, name: &str, value: &GalValue) -> Option<String> {
        self.setters.get(name).map(|setter| setter(value))
    }

    pub fn func(&self, name: &str, arg: &GalValue) -> Option<Result<GalValue, GalError>> {
        self.funcs.get(name).map(|func| func(arg))
    }
}

#[cfg(test)]
mod builtins_tests {
    use super::*;

    #[test]
    fn random_advances_its_state() {
        let builtins = Builtins::standard_seeded(7);
        let first = builtins.var("random").expect("random exists").expect("random works");
        let second = builtins.var("random").expect("random exists").expect("random works");
        assert_ne!(first, second);
        for value in [first, second] {
            let num = value.to_num().expect("random yields a num");
            assert!((0.0..1.0).contains(&num));
        }
    }

    #[test]
    fn math_functions_apply_to_nums_only() {
        let builtins = Builtins::standard_seeded(0);
        let result = builtins
            .func("sin", &GalValue::Num(0.0))
            .expect("sin exists")
            .expect("sin works");
        assert_eq!(result, GalValue::Num(0.0));
        let error = builtins
            .func("sin", &GalValue::Str("x".to_string()))
            .expect("sin exists")
            .expect_err("sin on a string fails");
        assert_eq!(error.code, "BUILTIN_APPLY");
    }

    #[test]
    fn length_of_covers_sequences_and_enums() {
        let builtins = Builtins::standard_seeded(0);
        let result = builtins
            .func("lengthOf", &GalValue::Str("abc".to_string()))
            .expect("lengthOf exists")
            .expect("lengthOf works");
        assert_eq!(result, GalValue::Num(3.0));
        let result = builtins
            .func("lengthOf", &EnumType::of_bool(true))
            .expect("lengthOf exists")
            .expect("lengthOf works on enums");
        assert_eq!(result, GalValue::Num(2.0));
        assert!(builtins
            .func("lengthOf", &GalValue::Num(1.0))
            .expect("lengthOf exists")
            .is_err());
    }

    #[test]
    fn index_of_reads_the_enum_index() {
        let builtins = Builtins::standard_seeded(0);
        let result = builtins
            .func("indexOf", &EnumType::of_bool(true))
            .expect("indexOf exists")
            .expect("indexOf works");
        assert_eq!(result, GalValue::Num(1.0));
    }
}
