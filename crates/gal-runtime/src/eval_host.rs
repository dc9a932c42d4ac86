use gal_core::GalError;
use rhai::{Array, Dynamic, Engine, ImmutableString, Map, Scope, FLOAT, INT};

use crate::frame::CustomData;

fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    match value {
        serde_json::Value::Null => Dynamic::UNIT,
        serde_json::Value::Bool(value) => Dynamic::from_bool(*value),
        serde_json::Value::Number(value) => match value.as_i64() {
            Some(int) => Dynamic::from_int(int as INT),
            None => Dynamic::from_float(value.as_f64().unwrap_or(0.0) as FLOAT),
        },
        serde_json::Value::String(value) => Dynamic::from(value.clone()),
        serde_json::Value::Array(values) => {
            Dynamic::from_array(values.iter().map(json_to_dynamic).collect::<Array>())
        }
        serde_json::Value::Object(values) => {
            let mut map = Map::new();
            for (key, value) in values {
                map.insert(key.clone().into(), json_to_dynamic(value));
            }
            Dynamic::from_map(map)
        }
    }
}

fn dynamic_to_json(value: Dynamic) -> Result<serde_json::Value, GalError> {
    if value.is_unit() {
        return Ok(serde_json::Value::Null);
    }
    if value.is::<bool>() {
        return Ok(serde_json::Value::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(serde_json::json!(value.cast::<INT>()));
    }
    if value.is::<FLOAT>() {
        return Ok(serde_json::json!(value.cast::<FLOAT>()));
    }
    if value.is::<ImmutableString>() {
        return Ok(serde_json::Value::String(
            value.cast::<ImmutableString>().to_string(),
        ));
    }
    if value.is::<Array>() {
        let array = value.cast::<Array>();
        let mut out = Vec::with_capacity(array.len());
        for item in array {
            out.push(dynamic_to_json(item)?);
        }
        return Ok(serde_json::Value::Array(out));
    }
    if value.is::<Map>() {
        let map = value.cast::<Map>();
        let mut out = serde_json::Map::new();
        for (key, item) in map {
            out.insert(key.to_string(), dynamic_to_json(item)?);
        }
        return Ok(serde_json::Value::Object(out));
    }
    Err(GalError::new(
        "EVAL_HOST_VALUE",
        "Unsupported script value type.",
    ))
}

/// Runs one `[Eval]` script with the custom data bound as `data`, writing
/// any mutation back.
pub fn run_eval(expr: &str, custom_data: &mut CustomData) -> Result<(), GalError> {
    let engine = Engine::new();
    let mut scope = Scope::new();
    let mut data = Map::new();
    for (key, value) in &custom_data.0 {
        data.insert(key.clone().into(), json_to_dynamic(value));
    }
    scope.push("data", data);

    engine
        .run_with_scope(&mut scope, expr)
        .map_err(|error| GalError::new("EVAL_HOST", format!("Eval failed: {}", error)))?;

    let data = scope
        .get_value::<Map>("data")
        .ok_or_else(|| GalError::new("EVAL_HOST", "Eval script replaced 'data' with a non-map."))?;
    let mut out = serde_json::Map::new();
    for (key, value) in data {
        out.insert(key.to_string(), dynamic_to_json(value)?);
    }
    custom_data.0 = out;
    Ok(())
}

#[cfg(test)]
mod eval_host_tests {
    use super::*;

    #[test]
    fn scripts_mutate_custom_data() {
        let mut custom_data = CustomData::default();
        custom_data
            .0
            .insert("count".to_string(), serde_json::json!(2));
        run_eval("data.count = data.count + 3", &mut custom_data).expect("eval passes");
        assert_eq!(custom_data.0["count"], serde_json::json!(5));
    }

    #[test]
    fn scripts_can_add_nested_values() {
        let mut custom_data = CustomData::default();
        run_eval("data.flags = [true, false]; data.label = \"x\"", &mut custom_data)
            .expect("eval passes");
        assert_eq!(custom_data.0["flags"], serde_json::json!([true, false]));
        assert_eq!(custom_data.0["label"], serde_json::json!("x"));
    }

    #[test]
    fn syntax_errors_surface_as_errors() {
        let mut custom_data = CustomData::default();
        let error = run_eval("data.count +=", &mut custom_data).expect_err("bad script fails");
        assert_eq!(error.code, "EVAL_HOST");
    }
}
