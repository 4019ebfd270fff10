//! Endpoint paths and response-envelope keys per resource family.

use capitol_core::Family;
use serde_json::Value;

/// Path segment of the family's list endpoint under the API base.
pub fn list_path(family: Family) -> &'static str {
    // Endpoint segments match the family tags except for summaries, which
    // the upstream pluralizes.
    match family {
        Family::Summary => "summaries",
        other => other.as_str(),
    }
}

/// Key of the record array inside a list response envelope.
pub fn list_key(family: Family) -> &'static str {
    match family {
        Family::Bill => "bills",
        Family::Amendment => "amendments",
        Family::Committee => "committees",
        Family::CommitteeReport => "reports",
        Family::CommitteePrint => "committeePrints",
        Family::CommitteeMeeting => "committeeMeetings",
        Family::Hearing => "hearings",
        Family::Nomination => "nominations",
        Family::Treaty => "treaties",
        Family::CongressionalRecord => "Results",
        Family::DailyCongressionalRecord => "dailyCongressionalRecord",
        Family::BoundCongressionalRecord => "boundCongressionalRecord",
        Family::HouseCommunication => "houseCommunications",
        Family::HouseRequirement => "houseRequirements",
        Family::SenateCommunication => "senateCommunications",
        Family::Member => "members",
        Family::Summary => "summaries",
        Family::Congress => "congresses",
    }
}

/// Locate the record array in a parsed response body.
///
/// Prefers the family's documented key; falls back to the first array value
/// in the envelope, since a handful of endpoints have shifted their key
/// casing across API revisions.
pub fn find_records<'a>(family: Family, body: &'a Value) -> Option<&'a Vec<Value>> {
    let obj = body.as_object()?;
    if let Some(records) = obj.get(list_key(family)).and_then(Value::as_array) {
        return Some(records);
    }
    obj.iter()
        .filter(|(k, _)| *k != "pagination" && *k != "request")
        .find_map(|(_, v)| v.as_array())
}
