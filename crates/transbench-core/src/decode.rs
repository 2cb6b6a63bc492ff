//! Typed decoding of generic results.
//!
//! Engines that hand back dynamically typed values (the declarative
//! interpreter and the generic scripting variant) are first converted into a
//! `serde_json::Value` tree, then decoded here into [`DerivedRecord`]s.
//!
//! The policy for fields the target shape does not know about is explicit:
//! [`UnknownFields::Ignore`] (the default) drops them, [`UnknownFields::Reject`]
//! turns them into a [`DecodeError`]. Missing fields and mistyped fields are
//! always errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::DerivedRecord;

const FIELDS: [&str; 3] = ["map1", "map2", "max"];

/// What to do with object keys that are not part of the target shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFields {
    #[default]
    Ignore,
    Reject,
}

/// Errors raised while decoding a generic tree into derived records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("expected an array of records, found {found}")]
    NotAnArray { found: &'static str },

    #[error("record {index}: expected an object, found {found}")]
    NotAnObject { index: usize, found: &'static str },

    #[error("record {index}: missing field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("record {index}: field `{field}` must be {expected}, found {found}")]
    WrongType {
        index: usize,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("record {index}: unknown field `{field}`")]
    UnknownField { index: usize, field: String },

    /// The engine returned a value with no JSON equivalent.
    #[error("value of type `{type_name}` has no generic representation")]
    Unrepresentable { type_name: String },
}

/// Decodes generic trees into [`DerivedRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    unknown_fields: UnknownFields,
}

impl Decoder {
    pub fn new(unknown_fields: UnknownFields) -> Self {
        Self { unknown_fields }
    }

    /// Decoder that ignores unknown fields.
    pub fn tolerant() -> Self {
        Self::new(UnknownFields::Ignore)
    }

    /// Decoder that rejects unknown fields.
    pub fn strict() -> Self {
        Self::new(UnknownFields::Reject)
    }

    pub fn unknown_fields(&self) -> UnknownFields {
        self.unknown_fields
    }

    /// Decode an array of `{map1, map2, max}` objects, preserving order.
    pub fn decode_records(&self, value: Value) -> Result<Vec<DerivedRecord>, DecodeError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(DecodeError::NotAnArray {
                    found: kind(&other),
                });
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.decode_record(index, item))
            .collect()
    }

    fn decode_record(&self, index: usize, value: Value) -> Result<DerivedRecord, DecodeError> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(DecodeError::NotAnObject {
                    index,
                    found: kind(&other),
                });
            }
        };

        if self.unknown_fields == UnknownFields::Reject
            && let Some(field) = object.keys().find(|k| !FIELDS.contains(&k.as_str()))
        {
            return Err(DecodeError::UnknownField {
                index,
                field: field.clone(),
            });
        }

        let map1 = take_string(&mut object, index, "map1")?;
        let map2 = take_string(&mut object, index, "map2")?;
        let max = match object.remove("max") {
            Some(Value::Number(n)) => n.as_f64().ok_or(DecodeError::WrongType {
                index,
                field: "max",
                expected: "a finite number",
                found: "number",
            })?,
            Some(other) => {
                return Err(DecodeError::WrongType {
                    index,
                    field: "max",
                    expected: "a number",
                    found: kind(&other),
                });
            }
            None => return Err(DecodeError::MissingField { index, field: "max" }),
        };

        Ok(DerivedRecord::new(map1, map2, max))
    }
}

fn take_string(
    object: &mut Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, DecodeError> {
    match object.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(DecodeError::WrongType {
            index,
            field,
            expected: "a string",
            found: kind(&other),
        }),
        None => Err(DecodeError::MissingField { index, field }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_in_order() {
        let records = Decoder::tolerant()
            .decode_records(json!([
                {"map1": "a", "map2": "b", "max": 0},
                {"map1": "c", "map2": "d", "max": 7.5}
            ]))
            .unwrap();

        assert_eq!(
            records,
            vec![
                DerivedRecord::new("a", "b", 0.0),
                DerivedRecord::new("c", "d", 7.5)
            ]
        );
    }

    #[test]
    fn test_tolerant_ignores_unknown_fields() {
        let records = Decoder::tolerant()
            .decode_records(json!([{"map1": "a", "map2": "b", "max": 1, "extra": [1, 2]}]))
            .unwrap();
        assert_eq!(records, vec![DerivedRecord::new("a", "b", 1.0)]);
    }

    #[test]
    fn test_strict_rejects_unknown_fields() {
        let err = Decoder::strict()
            .decode_records(json!([{"map1": "a", "map2": "b", "max": 1, "extra": null}]))
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownField {
                index: 0,
                field: "extra".to_string()
            }
        );
    }

    #[test]
    fn test_strict_accepts_exact_shape() {
        let records = Decoder::strict()
            .decode_records(json!([{"map1": "a", "map2": "b", "max": 3}]))
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_missing_field() {
        let err = Decoder::tolerant()
            .decode_records(json!([{"map1": "a", "max": 1}]))
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                index: 0,
                field: "map2"
            }
        );
    }

    #[test]
    fn test_wrong_types() {
        let err = Decoder::tolerant()
            .decode_records(json!([
                {"map1": "a", "map2": "b", "max": 1},
                {"map1": "a", "map2": "b", "max": "1"}
            ]))
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::WrongType {
                index: 1,
                field: "max",
                found: "string",
                ..
            }
        ));

        let err = Decoder::tolerant()
            .decode_records(json!([{"map1": null, "map2": "b", "max": 1}]))
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::WrongType {
                field: "map1",
                found: "null",
                ..
            }
        ));
    }

    #[test]
    fn test_not_an_array_or_object() {
        assert_eq!(
            Decoder::tolerant().decode_records(json!({"map1": "a"})).unwrap_err(),
            DecodeError::NotAnArray { found: "object" }
        );
        assert_eq!(
            Decoder::tolerant().decode_records(json!([1])).unwrap_err(),
            DecodeError::NotAnObject {
                index: 0,
                found: "number"
            }
        );
    }

    #[test]
    fn test_unknown_fields_deserialize() {
        let policy: UnknownFields = serde_json::from_value(json!("reject")).unwrap();
        assert_eq!(policy, UnknownFields::Reject);
        assert_eq!(UnknownFields::default(), UnknownFields::Ignore);
    }
}
