use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::{
    document_store::{Fields, RawDocument},
    storage::{StorageError, StorageResult},
};

pub const FIELD_NAME: &str = "name";
pub const FIELD_RANK: &str = "rank";
pub const FIELD_OPPONENT: &str = "opponent";
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_DATE: &str = "date";
pub const FIELD_SEASON: &str = "season";
pub const FIELD_AVAILABILITY: &str = "availability";
pub const FIELD_LINEUP: &str = "lineup";
pub const FIELD_RESULT: &str = "result";
pub const FIELD_MVP_VOTES: &str = "mvpVotes";

/// Stored layout of a roster entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerDocument {
    pub name: String,
    pub rank: i64,
}

/// Stored layout of a scheduled match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchDocument {
    pub opponent: String,
    pub location: String,
    /// Unix epoch milliseconds; the collection is ordered on this field.
    pub date: i64,
    pub season: String,
    #[serde(default)]
    pub availability: IndexMap<String, String>,
    #[serde(default)]
    pub lineup: LineupDocument,
    #[serde(default)]
    pub result: ResultDocument,
    #[serde(default)]
    pub mvp_votes: IndexMap<String, i64>,
}

/// Stored lineup: singles slots followed by doubles pairs, `null` for an empty slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineupDocument {
    #[serde(default)]
    pub singles: Vec<Option<String>>,
    #[serde(default)]
    pub doubles: Vec<PairDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairDocument {
    pub player1: Option<String>,
    pub player2: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultDocument {
    pub our_score: Option<i64>,
    pub opponent_score: Option<i64>,
}

/// Serialize a stored layout into top-level fields.
pub fn to_fields<T: Serialize>(document: &T) -> StorageResult<Fields> {
    match serde_json::to_value(document) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Ok(Fields::new()),
        Err(source) => Err(StorageError::Decode {
            path: std::any::type_name::<T>().to_owned(),
            source,
        }),
    }
}

/// Serialize a nested value (lineup, result) for a whole-field replacement.
pub fn to_value<T: Serialize>(value: &T) -> StorageResult<Value> {
    serde_json::to_value(value).map_err(|source| StorageError::Decode {
        path: std::any::type_name::<T>().to_owned(),
        source,
    })
}

/// Decode a snapshot document into a stored layout.
pub fn from_raw<T: for<'de> Deserialize<'de>>(document: RawDocument) -> StorageResult<(String, T)> {
    let RawDocument { id, fields } = document;
    serde_json::from_value(Value::Object(fields))
        .map(|decoded| (id.clone(), decoded))
        .map_err(|source| StorageError::Decode { path: id, source })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn match_document_uses_camel_case_layout() {
        let document = MatchDocument {
            opponent: "Oak Hill".into(),
            location: "Court 3".into(),
            date: 1_714_557_600_000,
            season: "Spring".into(),
            availability: IndexMap::new(),
            lineup: LineupDocument::default(),
            result: ResultDocument::default(),
            mvp_votes: IndexMap::new(),
        };

        let fields = to_fields(&document).unwrap();
        assert_eq!(fields["result"], json!({"ourScore": null, "opponentScore": null}));
        assert_eq!(fields["mvpVotes"], json!({}));
    }

    #[test]
    fn missing_nested_fields_decode_to_defaults() {
        let raw = RawDocument {
            id: "m1".into(),
            fields: match json!({
                "opponent": "Oak Hill",
                "location": "Court 3",
                "date": 0,
                "season": "Fall",
            }) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
        };

        let (id, decoded) = from_raw::<MatchDocument>(raw).unwrap();
        assert_eq!(id, "m1");
        assert!(decoded.availability.is_empty());
        assert!(decoded.lineup.singles.is_empty());
        assert_eq!(decoded.result, ResultDocument::default());
    }

    #[test]
    fn malformed_document_reports_its_id() {
        let raw = RawDocument {
            id: "p9".into(),
            fields: Fields::new(),
        };
        match from_raw::<PlayerDocument>(raw) {
            Err(StorageError::Decode { path, .. }) => assert_eq!(path, "p9"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
