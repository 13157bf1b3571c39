//! Lossless-enough mapping between JSON field values and BSON.

use mongodb::bson::{Bson, Document};
use serde_json::{Map, Number, Value};

use crate::dao::document_store::{Fields, RawDocument};

pub const ID_FIELD: &str = "_id";
pub const YEAR_FIELD: &str = "year";

pub fn value_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(flag) => Bson::Boolean(flag),
        Value::Number(number) => number_to_bson(&number),
        Value::String(text) => Bson::String(text),
        Value::Array(items) => Bson::Array(items.into_iter().map(value_to_bson).collect()),
        Value::Object(map) => Bson::Document(fields_to_document(map)),
    }
}

fn number_to_bson(number: &Number) -> Bson {
    if let Some(int) = number.as_i64() {
        Bson::Int64(int)
    } else {
        Bson::Double(number.as_f64().unwrap_or_default())
    }
}

pub fn fields_to_document(fields: Fields) -> Document {
    let mut document = Document::new();
    for (key, value) in fields {
        document.insert(key, value_to_bson(value));
    }
    document
}

pub fn bson_to_value(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(flag) => Value::Bool(flag),
        Bson::Int32(int) => Value::from(int),
        Bson::Int64(int) => Value::from(int),
        Bson::Double(float) => Number::from_f64(float).map_or(Value::Null, Value::Number),
        Bson::String(text) => Value::String(text),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_value).collect()),
        Bson::Document(document) => Value::Object(document_to_fields(document)),
        Bson::DateTime(date) => Value::from(date.timestamp_millis()),
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        other => Value::String(other.to_string()),
    }
}

fn document_to_fields(document: Document) -> Fields {
    let mut fields = Map::new();
    for (key, value) in document {
        fields.insert(key, bson_to_value(value));
    }
    fields
}

/// Split a stored document into its id and domain fields, dropping partition bookkeeping.
pub fn document_to_raw(mut document: Document) -> Option<RawDocument> {
    let id = match document.remove(ID_FIELD)? {
        Bson::String(id) => id,
        Bson::ObjectId(id) => id.to_hex(),
        _ => return None,
    };
    document.remove(YEAR_FIELD);
    Some(RawDocument {
        id,
        fields: document_to_fields(document),
    })
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_json_maps_to_bson_documents() {
        let value = json!({"lineup": {"singles": [null, "p1"]}, "rank": 3});
        let Bson::Document(document) = value_to_bson(value) else {
            panic!("expected document");
        };
        assert_eq!(
            document,
            doc! {"lineup": {"singles": [Bson::Null, "p1"]}, "rank": 3_i64}
        );
    }

    #[test]
    fn stored_document_strips_partition_fields() {
        let stored = doc! {"_id": "abc", "year": 2024, "name": "Alice", "rank": 1_i32};
        let raw = document_to_raw(stored).unwrap();
        assert_eq!(raw.id, "abc");
        assert_eq!(Value::Object(raw.fields), json!({"name": "Alice", "rank": 1}));
    }
}
