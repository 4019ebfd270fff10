//! Validation and normalization of raw upstream records.
//!
//! The validator is a total, pure function of its input: no I/O, no clock, no
//! shared state. Validating the same raw record twice yields byte-identical
//! canonical records, and validating a canonical record again is a no-op.

mod families;

use crate::models::{congress_for_date, Chamber, Family};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The normalized form every ingested item takes, regardless of family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub family: Family,
    pub congress: u32,
    pub update_date: NaiveDate,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl CanonicalRecord {
    /// Flat item representation for store adapters.
    pub fn to_item(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Why a raw record was rejected. Recorded, never propagated as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotAnObject,
    MissingFields(Vec<&'static str>),
    InvalidDate { field: &'static str, value: String },
    InvalidChamber(String),
    InvalidCongress(String),
    InvalidBillType(String),
    InvalidUrl(String),
    InvalidVersion(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotAnObject => write!(f, "record is not a JSON object"),
            Rejection::MissingFields(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            Rejection::InvalidDate { field, value } => {
                write!(f, "invalid {field}: {value}")
            }
            Rejection::InvalidChamber(v) => write!(f, "invalid chamber: {v}"),
            Rejection::InvalidCongress(v) => write!(f, "invalid congress: {v}"),
            Rejection::InvalidBillType(v) => write!(f, "invalid bill type: {v}"),
            Rejection::InvalidUrl(v) => write!(f, "invalid url: {v}"),
            Rejection::InvalidVersion(v) => write!(f, "invalid version: {v}"),
        }
    }
}

/// Converts raw upstream records into canonical records.
#[derive(Debug, Clone)]
pub struct Validator {
    min_date: NaiveDate,
}

impl Validator {
    pub fn new(min_date: NaiveDate) -> Self {
        Self { min_date }
    }

    /// Validate and normalize one raw record.
    pub fn validate(&self, family: Family, raw: &Value) -> Result<CanonicalRecord, Rejection> {
        let Some(obj) = raw.as_object() else {
            return Err(Rejection::NotAnObject);
        };
        let cleaned = clean_object(obj);
        let view = View { obj: &cleaned };

        let update_date = self.required_date(&view)?;

        // The `congress` listing carries its ordinal as `number`.
        let congress_keys: &[&str] = match family {
            Family::Congress => &["congress", "number"],
            _ => &["congress"],
        };
        let congress = match view.integer(congress_keys) {
            Some(n) => self.check_congress(n, update_date)?,
            None if family.congress_optional() => 1,
            None => return Err(Rejection::MissingFields(vec!["congress"])),
        };

        let url = match view.string(&["url"]) {
            Some(u) if u.starts_with("https://") => Some(u),
            Some(u) => return Err(Rejection::InvalidUrl(u)),
            None => None,
        };

        let version = match view.integer(&["version"]) {
            Some(v) if v >= 1 => v as u32,
            Some(v) => return Err(Rejection::InvalidVersion(v.to_string())),
            None => 1,
        };

        let parts = families::extract(family, congress, &view)?;

        Ok(CanonicalRecord {
            id: parts.id,
            family,
            congress,
            update_date,
            version,
            url,
            extras: parts.extras,
        })
    }

    fn required_date(&self, view: &View<'_>) -> Result<NaiveDate, Rejection> {
        // Record families publish a date rather than an update timestamp, so
        // the fallback keys cover those too.
        let keys: &[&str] = &[
            "updateDate",
            "update_date",
            "updateDateIncludingText",
            "publishDate",
            "issueDate",
            "date",
        ];
        let Some(raw) = view.string(keys) else {
            return Err(Rejection::MissingFields(vec!["update_date"]));
        };
        let date = normalize_date(&raw).ok_or(Rejection::InvalidDate {
            field: "update_date",
            value: raw.clone(),
        })?;
        if date < self.min_date {
            return Err(Rejection::InvalidDate {
                field: "update_date",
                value: raw,
            });
        }
        Ok(date)
    }

    fn check_congress(&self, n: i64, update_date: NaiveDate) -> Result<u32, Rejection> {
        let upper = congress_for_date(update_date) + 1;
        if n < 1 || n > upper as i64 {
            return Err(Rejection::InvalidCongress(n.to_string()));
        }
        Ok(n as u32)
    }
}

/// Read-only view over a cleaned record object.
pub(crate) struct View<'a> {
    obj: &'a Map<String, Value>,
}

impl<'a> View<'a> {
    pub(crate) fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|k| self.obj.get(*k))
    }

    /// First present key as a trimmed, non-empty string. Numbers coerce.
    pub(crate) fn string(&self, keys: &[&str]) -> Option<String> {
        match self.get(keys)? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First present key as an integer. Numeric strings coerce.
    pub(crate) fn integer(&self, keys: &[&str]) -> Option<i64> {
        match self.get(keys)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub(crate) fn object(&self, keys: &[&str]) -> Option<&'a Map<String, Value>> {
        self.get(keys)?.as_object()
    }

    pub(crate) fn array(&self, keys: &[&str]) -> Option<&'a Vec<Value>> {
        self.get(keys)?.as_array()
    }

    /// Chamber parsed from full names or single-letter codes.
    pub(crate) fn chamber(&self, keys: &[&str]) -> Result<Option<Chamber>, Rejection> {
        match self.string(keys) {
            Some(raw) => Chamber::parse(&raw)
                .map(Some)
                .ok_or(Rejection::InvalidChamber(raw)),
            None => Ok(None),
        }
    }
}

/// Normalize an ISO-8601 date or timestamp to a calendar date.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and zone-less
/// `YYYY-MM-DDTHH:MM:SS`. Rejects invalid calendars.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    None
}

/// Recursively trim strings and drop empty/null values.
///
/// Empty arrays survive (a bill legitimately has no sponsors yet); empty
/// strings, nulls and objects left empty after cleaning do not.
pub(crate) fn clean_object(obj: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (k, v) in obj {
        if let Some(cleaned) = clean_value(v) {
            out.insert(k.clone(), cleaned);
        }
    }
    out
}

fn clean_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| Value::String(t.to_string()))
        }
        Value::Object(map) => {
            let cleaned = clean_object(map);
            (!cleaned.is_empty()).then_some(Value::Object(cleaned))
        }
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(clean_value).collect(),
        )),
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::min_corpus_date;
    use serde_json::json;

    fn validator() -> Validator {
        Validator::new(min_corpus_date())
    }

    fn bill() -> Value {
        json!({
            "congress": 118,
            "type": "HR",
            "number": 100,
            "title": "  An Act to test  ",
            "originChamber": "House",
            "updateDate": "2024-01-20T14:02:11Z",
            "introducedDate": "2024-01-15",
            "latestAction": { "text": "Referred to committee", "actionDate": "2024-01-18" },
            "url": "https://api.congress.gov/v3/bill/118/hr/100",
            "cosponsorsCount": null
        })
    }

    #[test]
    fn normalizes_a_bill() {
        let rec = validator().validate(Family::Bill, &bill()).unwrap();
        assert_eq!(rec.id, "118-hr-100");
        assert_eq!(rec.family, Family::Bill);
        assert_eq!(rec.congress, 118);
        assert_eq!(rec.update_date.to_string(), "2024-01-20");
        assert_eq!(rec.version, 1);
        assert_eq!(rec.extras["bill_type"], "hr");
        assert_eq!(rec.extras["bill_number"], 100);
        assert_eq!(rec.extras["title"], "An Act to test");
        assert_eq!(rec.extras["origin_chamber"], "house");
        assert_eq!(rec.extras["latest_action"]["action_date"], "2024-01-18");
        assert!(!rec.extras.contains_key("cosponsorsCount"));
    }

    #[test]
    fn validator_is_idempotent() {
        let first = validator().validate(Family::Bill, &bill()).unwrap();
        let reserialized = serde_json::to_value(&first).unwrap();
        let second = validator().validate(Family::Bill, &reserialized).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_unknown_chamber() {
        let raw = json!({
            "congress": 118,
            "systemCode": "hsag00",
            "name": "Agriculture",
            "chamber": "Plenary",
            "updateDate": "2024-01-20"
        });
        let err = validator().validate(Family::Committee, &raw).unwrap_err();
        assert_eq!(err, Rejection::InvalidChamber("Plenary".to_string()));
    }

    #[test]
    fn rejects_missing_required_fields() {
        let raw = json!({ "congress": 118, "updateDate": "2024-01-20" });
        match validator().validate(Family::Bill, &raw) {
            Err(Rejection::MissingFields(fields)) => {
                assert!(fields.contains(&"bill_type"));
                assert!(fields.contains(&"bill_number"));
                assert!(fields.contains(&"title"));
            }
            other => panic!("expected missing fields, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_calendar_date() {
        let mut raw = bill();
        raw["updateDate"] = json!("2024-02-30");
        assert!(matches!(
            validator().validate(Family::Bill, &raw),
            Err(Rejection::InvalidDate { .. })
        ));
    }

    #[test]
    fn rejects_dates_before_first_congress() {
        let mut raw = bill();
        raw["updateDate"] = json!("1776-07-04");
        raw["congress"] = json!(1);
        assert!(matches!(
            validator().validate(Family::Bill, &raw),
            Err(Rejection::InvalidDate { .. })
        ));
    }

    #[test]
    fn rejects_http_url() {
        let mut raw = bill();
        raw["url"] = json!("http://api.congress.gov/v3/bill/118/hr/100");
        assert!(matches!(
            validator().validate(Family::Bill, &raw),
            Err(Rejection::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_implausible_congress() {
        let mut raw = bill();
        raw["congress"] = json!(180);
        assert!(matches!(
            validator().validate(Family::Bill, &raw),
            Err(Rejection::InvalidCongress(_))
        ));
        raw["congress"] = json!(0);
        assert!(matches!(
            validator().validate(Family::Bill, &raw),
            Err(Rejection::InvalidCongress(_))
        ));
    }

    #[test]
    fn member_defaults_congress() {
        let raw = json!({
            "bioguideId": "A000360",
            "name": "Alexander, Lamar",
            "updateDate": "2024-01-20"
        });
        let rec = validator().validate(Family::Member, &raw).unwrap();
        assert_eq!(rec.congress, 1);
        assert_eq!(rec.id, "A000360");
    }

    #[test]
    fn date_normalization_accepts_iso_variants() {
        assert_eq!(
            normalize_date("2024-01-20").unwrap().to_string(),
            "2024-01-20"
        );
        assert_eq!(
            normalize_date("2024-01-20T23:59:59Z").unwrap().to_string(),
            "2024-01-20"
        );
        assert_eq!(
            normalize_date("2024-01-20T23:59:59-05:00")
                .unwrap()
                .to_string(),
            "2024-01-20"
        );
        assert_eq!(
            normalize_date(" 2024-01-20T12:00:00 ").unwrap().to_string(),
            "2024-01-20"
        );
        assert!(normalize_date("01/20/2024").is_none());
        assert!(normalize_date("2024-13-01").is_none());
    }

    #[test]
    fn cleaning_trims_and_drops() {
        let obj = json!({
            "a": "  x  ",
            "b": "",
            "c": null,
            "d": { "e": "   ", "f": "kept" },
            "g": [],
            "h": { "i": null }
        });
        let cleaned = clean_object(obj.as_object().unwrap());
        assert_eq!(cleaned["a"], "x");
        assert!(!cleaned.contains_key("b"));
        assert!(!cleaned.contains_key("c"));
        assert_eq!(cleaned["d"], json!({ "f": "kept" }));
        assert_eq!(cleaned["g"], json!([]));
        assert!(!cleaned.contains_key("h"));
    }
}
