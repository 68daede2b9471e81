use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of card pools the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckName {
    Love,
    Money,
    Career,
    Daily,
}

impl DeckName {
    pub const ALL: [DeckName; 4] = [
        DeckName::Love,
        DeckName::Money,
        DeckName::Career,
        DeckName::Daily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeckName::Love => "love",
            DeckName::Money => "money",
            DeckName::Career => "career",
            DeckName::Daily => "daily",
        }
    }

    /// Exact match after trimming; case-sensitive like the stored keys.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "love" => Some(DeckName::Love),
            "money" => Some(DeckName::Money),
            "career" => Some(DeckName::Career),
            "daily" => Some(DeckName::Daily),
            _ => None,
        }
    }

    /// Query-string form: path separators become `-` before matching.
    pub fn from_query(raw: &str) -> Option<Self> {
        Self::parse(&raw.trim().replace(['/', '\\'], "-"))
    }

    /// Blob key of this deck's cached pool
    pub fn cache_key(&self) -> String {
        format!("cache/card-ids-{}.json", self.as_str())
    }
}

impl fmt::Display for DeckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDeck(pub String);

impl fmt::Display for UnknownDeck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown deck: {:?}", self.0)
    }
}

impl std::error::Error for UnknownDeck {}

impl FromStr for DeckName {
    type Err = UnknownDeck;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownDeck(s.to_string()))
    }
}

/// Loose string coercion for ids and deck names arriving as arbitrary JSON.
///
/// Strings are trimmed, non-zero numbers use their decimal form and `true`
/// becomes `"true"`. Falsy values, objects, arrays and blank strings yield `None`.
pub fn coerce_id(value: &Value) -> Option<String> {
    if is_falsy(value) {
        return None;
    }
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// `null`, `false`, zero and the empty string
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// The stored pool of one deck: `cache/card-ids-<deck>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckPoolDocument {
    pub ids: Vec<String>,
    pub total: usize,
    #[serde(rename = "updatedAt", with = "rfc3339_millis")]
    pub updated_at: DateTime<Utc>,
}

impl DeckPoolDocument {
    pub fn new(ids: Vec<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            total: ids.len(),
            ids,
            updated_at,
        }
    }
}

/// Read-side shape: tolerant of documents written by older tools.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StoredPool {
    #[serde(default)]
    pub ids: Value,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `2026-01-01T00:00:00.000Z`, the format JavaScript's `toISOString` emits
pub mod rfc3339_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(d)
    }
}

pub(crate) fn iso_millis(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deck_names_are_a_closed_set() {
        for deck in DeckName::ALL {
            assert_eq!(DeckName::parse(deck.as_str()), Some(deck));
        }
        assert_eq!(DeckName::parse(" love "), Some(DeckName::Love));
        assert_eq!(DeckName::parse("Love"), None);
        assert_eq!(DeckName::parse("health"), None);
        assert!("tarot".parse::<DeckName>().is_err());
    }

    #[test]
    fn query_form_replaces_path_separators() {
        assert_eq!(DeckName::from_query("daily"), Some(DeckName::Daily));
        assert_eq!(DeckName::from_query("../love"), None);
        assert_eq!(DeckName::Career.cache_key(), "cache/card-ids-career.json");
    }

    #[test]
    fn coerce_id_discards_falsy_and_structured_values() {
        assert_eq!(coerce_id(&json!("  c-1 ")), Some("c-1".to_string()));
        assert_eq!(coerce_id(&json!(42)), Some("42".to_string()));
        assert_eq!(coerce_id(&json!(0)), None);
        assert_eq!(coerce_id(&json!(0.0)), None);
        assert_eq!(coerce_id(&json!(true)), Some("true".to_string()));
        assert_eq!(coerce_id(&json!("   ")), None);
        assert_eq!(coerce_id(&json!(null)), None);
        assert_eq!(coerce_id(&json!(false)), None);
        assert_eq!(coerce_id(&json!({"id": 1})), None);
    }

    #[test]
    fn document_wire_format() {
        let at = DateTime::parse_from_rfc3339("2026-10-19T01:02:03.456Z")
            .unwrap()
            .with_timezone(&Utc);
        let doc = DeckPoolDocument::new(vec!["a".into(), "b".into()], at);

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({"ids": ["a", "b"], "total": 2, "updatedAt": "2026-10-19T01:02:03.456Z"})
        );

        let back: DeckPoolDocument = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }
}
