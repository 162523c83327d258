use serde_json::{Map, Value as Json};

use crate::error::{StoreError, StoreResult};
use crate::schema::{FieldType, ModelDescriptor};
use crate::value::{EncodedRow, SqlValue};

/// Application-side record shape: field name to rich JSON value.
pub type Record = Map<String, Json>;

/// Convert an application record into the flat representation the engine
/// stores. Structured (`array`/`object`) fields are JSON-serialized to
/// text; everything else passes through unchanged.
///
/// Conversion is keyed off the model's declared field types, not the
/// runtime shape of the value: a field declared `array` holding anything is
/// still JSON round-tripped.
pub fn encode(record: &Record, model: &ModelDescriptor) -> EncodedRow {
    let mut row = EncodedRow::new();
    for (name, value) in record {
        let ftype = model.field(name).map(|f| f.ftype);
        let stored = match ftype {
            Some(FieldType::Array) | Some(FieldType::Object) => {
                SqlValue::Text(value.to_string())
            }
            _ => SqlValue::from_json(value),
        };
        row.insert(name.clone(), stored);
    }
    row
}

/// Convert one stored row back into the application shape. Absence passes
/// through: a missing row decodes to `None`, never an error.
///
/// Fields that decode to exactly null are removed from the result —
/// absence, not null, is the wire contract for unset optional fields.
pub fn decode(row: Option<EncodedRow>, model: &ModelDescriptor) -> StoreResult<Option<Record>> {
    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let mut record = Record::new();
    for (name, stored) in row {
        let decoded = decode_field(&name, stored, model)?;
        if !decoded.is_null() {
            record.insert(name, decoded);
        }
    }
    Ok(Some(record))
}

fn decode_field(name: &str, stored: SqlValue, model: &ModelDescriptor) -> StoreResult<Json> {
    let ftype = model.field(name).map(|f| f.ftype);
    match ftype {
        Some(FieldType::Array) | Some(FieldType::Object) => match stored {
            // Malformed stored text is data corruption; it propagates.
            SqlValue::Text(text) => serde_json::from_str(&text).map_err(|source| {
                StoreError::Corrupt { field: name.to_string(), source }
            }),
            other => Ok(other.to_json()),
        },
        Some(FieldType::Boolean) => Ok(match stored {
            SqlValue::Text(text) => match text.as_str() {
                "1" => Json::Bool(true),
                "0" => Json::Bool(false),
                // other textual representations are left unmodified
                _ => Json::String(text),
            },
            SqlValue::Integer(0) => Json::Bool(false),
            SqlValue::Integer(1) => Json::Bool(true),
            other => other.to_json(),
        }),
        _ => Ok(stored.to_json()),
    }
}

/// Decode a whole result set. Rows are independent; order is preserved.
pub fn decode_rows(rows: Vec<EncodedRow>, model: &ModelDescriptor) -> StoreResult<Vec<Record>> {
    rows.into_iter()
        .map(|row| {
            decode(Some(row), model).map(|decoded| decoded.unwrap_or_default())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use proptest::prelude::*;
    use serde_json::json;

    fn test_model() -> ModelDescriptor {
        ModelDescriptor::new(
            "testModels",
            vec![
                FieldSpec::new("id", FieldType::Number),
                FieldSpec::new("str", FieldType::Str),
                FieldSpec::new("num", FieldType::Number),
                FieldSpec::new("bool", FieldType::Boolean),
                FieldSpec::new("arr", FieldType::Array),
                FieldSpec::new("obj", FieldType::Object),
            ],
        )
    }

    fn to_record(value: Json) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_encode_serializes_structured_fields() {
        let record = to_record(json!({"arr": [1, 2, 3], "obj": {"a": "b"}, "str": "x"}));
        let row = encode(&record, &test_model());
        assert_eq!(row["arr"], SqlValue::Text("[1,2,3]".to_string()));
        assert_eq!(row["obj"], SqlValue::Text("{\"a\":\"b\"}".to_string()));
        assert_eq!(row["str"], SqlValue::Text("x".to_string()));
    }

    #[test]
    fn test_decode_none_is_none() {
        assert_eq!(decode(None, &test_model()).unwrap(), None);
    }

    #[test]
    fn test_decode_parses_structured_and_normalizes_bool() {
        let mut row = EncodedRow::new();
        row.insert("arr".to_string(), SqlValue::Text("[1,2,3]".to_string()));
        row.insert("obj".to_string(), SqlValue::Text("{\"a\":\"b\"}".to_string()));
        row.insert("bool".to_string(), SqlValue::Text("0".to_string()));

        let record = decode(Some(row), &test_model()).unwrap().unwrap();
        assert_eq!(record["arr"], json!([1, 2, 3]));
        assert_eq!(record["obj"], json!({"a": "b"}));
        assert_eq!(record["bool"], json!(false));
    }

    #[test]
    fn test_decode_bool_integer_and_odd_text() {
        let mut row = EncodedRow::new();
        row.insert("bool".to_string(), SqlValue::Integer(1));
        let record = decode(Some(row), &test_model()).unwrap().unwrap();
        assert_eq!(record["bool"], json!(true));

        let mut row = EncodedRow::new();
        row.insert("bool".to_string(), SqlValue::Text("yes".to_string()));
        let record = decode(Some(row), &test_model()).unwrap().unwrap();
        // no silent coercion of unrecognized representations
        assert_eq!(record["bool"], json!("yes"));
    }

    #[test]
    fn test_decode_drops_null_fields() {
        let mut row = EncodedRow::new();
        row.insert("str".to_string(), SqlValue::Null);
        row.insert("num".to_string(), SqlValue::Integer(3));
        let record = decode(Some(row), &test_model()).unwrap().unwrap();
        assert!(!record.contains_key("str"));
        assert_eq!(record["num"], json!(3));
    }

    #[test]
    fn test_decode_corrupt_text_propagates() {
        let mut row = EncodedRow::new();
        row.insert("arr".to_string(), SqlValue::Text("[1,2,".to_string()));
        let err = decode(Some(row), &test_model()).unwrap_err();
        assert!(err.to_string().contains("Corrupt stored value in field \"arr\""));
    }

    #[test]
    fn test_round_trip_structured_fields() {
        let record = to_record(json!({
            "arr": [1, "two", {"three": 3}],
            "obj": {"nested": {"deep": [true, null]}},
            "num": 7,
        }));
        let row = encode(&record, &test_model());
        let back = decode(Some(row), &test_model()).unwrap().unwrap();
        assert_eq!(back, record);
    }

    proptest! {
        #[test]
        fn prop_round_trip_arrays(values in proptest::collection::vec(-1000i64..1000, 0..8)) {
            let record = to_record(json!({"arr": values}));
            let row = encode(&record, &test_model());
            let back = decode(Some(row), &test_model()).unwrap().unwrap();
            prop_assert_eq!(back, record);
        }

        #[test]
        fn prop_round_trip_objects(key in "[a-z]{1,8}", value in "[ -~]{0,16}") {
            let record = to_record(json!({"obj": {key: value}}));
            let row = encode(&record, &test_model());
            let back = decode(Some(row), &test_model()).unwrap().unwrap();
            prop_assert_eq!(back, record);
        }
    }
}
