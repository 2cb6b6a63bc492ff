//! Host type bindings and generic value conversion.

use rhai::{Array, Dynamic, Engine, FLOAT, INT, Map};
use transbench_core::{DecodeError, DerivedRecord, SourceRecord};

/// Register `SourceRecord` and `DerivedRecord` with the engine.
///
/// `DerivedRecord(map1, map2, max)` accepts an integer or a float `max`.
pub(crate) fn register_host_types(engine: &mut Engine) {
    engine
        .register_type_with_name::<SourceRecord>("SourceRecord")
        .register_get("el1", |r: &mut SourceRecord| r.el1().to_string())
        .register_get("el2", |r: &mut SourceRecord| r.el2().to_string())
        .register_get("i", |r: &mut SourceRecord| INT::from(r.i()));

    engine
        .register_type_with_name::<DerivedRecord>("DerivedRecord")
        .register_fn("DerivedRecord", |map1: &str, map2: &str, max: INT| {
            DerivedRecord::new(map1, map2, max as FLOAT)
        })
        .register_fn("DerivedRecord", |map1: &str, map2: &str, max: FLOAT| {
            DerivedRecord::new(map1, map2, max)
        })
        .register_get("map1", |r: &mut DerivedRecord| r.map1().to_string())
        .register_get("map2", |r: &mut DerivedRecord| r.map2().to_string())
        .register_get("max", |r: &mut DerivedRecord| r.max());
}

/// Generic representation of a source record: `#{el1, el2, i}`.
pub(crate) fn source_to_map(record: &SourceRecord) -> Map {
    let mut map = Map::new();
    map.insert("el1".into(), record.el1().into());
    map.insert("el2".into(), record.el2().into());
    map.insert("i".into(), INT::from(record.i()).into());
    map
}

/// Convert a script value into a JSON tree.
pub(crate) fn dynamic_to_json(value: Dynamic) -> Result<serde_json::Value, DecodeError> {
    use serde_json::Value;

    if value.is_unit() {
        return Ok(Value::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(Value::from(i));
    }
    if let Ok(f) = value.as_float() {
        return serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| DecodeError::Unrepresentable {
                type_name: format!("non-finite float {f}"),
            });
    }
    if let Ok(c) = value.as_char() {
        return Ok(Value::String(c.to_string()));
    }

    let type_name = value.type_name();
    if value.is_string() {
        return value
            .into_string()
            .map(Value::String)
            .map_err(|_| unrepresentable(type_name));
    }
    if value.is_array() {
        let items = value
            .try_cast::<Array>()
            .ok_or_else(|| unrepresentable(type_name))?;
        return items
            .into_iter()
            .map(dynamic_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }
    if value.is_map() {
        let map = value
            .try_cast::<Map>()
            .ok_or_else(|| unrepresentable(type_name))?;
        let mut object = serde_json::Map::with_capacity(map.len());
        for (key, item) in map {
            object.insert(key.to_string(), dynamic_to_json(item)?);
        }
        return Ok(Value::Object(object));
    }

    Err(unrepresentable(type_name))
}

fn unrepresentable(type_name: &str) -> DecodeError {
    DecodeError::Unrepresentable {
        type_name: type_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_to_map_fields() {
        let map = source_to_map(&SourceRecord::new("a", "b", -3));
        assert_eq!(map.len(), 3);
        assert_eq!(map["el1"].clone().into_string().unwrap(), "a");
        assert_eq!(map["i"].as_int().unwrap(), -3);
    }

    #[test]
    fn test_dynamic_to_json_nested() {
        let mut inner = Map::new();
        inner.insert("max".into(), Dynamic::from(7 as INT));
        inner.insert("ratio".into(), Dynamic::from(0.5 as FLOAT));
        inner.insert("name".into(), Dynamic::from("x".to_string()));
        inner.insert("flag".into(), Dynamic::from(true));
        inner.insert("none".into(), Dynamic::UNIT);
        let array: Array = vec![Dynamic::from(inner)];

        let json = dynamic_to_json(Dynamic::from(array)).unwrap();
        assert_eq!(
            json,
            json!([{"max": 7, "ratio": 0.5, "name": "x", "flag": true, "none": null}])
        );
    }

    #[test]
    fn test_dynamic_to_json_rejects_host_types() {
        let err = dynamic_to_json(Dynamic::from(DerivedRecord::new("a", "b", 1.0))).unwrap_err();
        assert!(matches!(err, DecodeError::Unrepresentable { .. }));
    }

    #[test]
    fn test_host_types_are_scriptable() {
        let mut engine = Engine::new();
        register_host_types(&mut engine);

        let record = engine
            .eval::<DerivedRecord>(r#"DerivedRecord("a", "b", 3)"#)
            .unwrap();
        assert_eq!(record, DerivedRecord::new("a", "b", 3.0));

        let record = engine
            .eval::<DerivedRecord>(r#"DerivedRecord("a", "b", 2.5)"#)
            .unwrap();
        assert_eq!(record.max(), 2.5);
    }
}
