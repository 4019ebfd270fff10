//! Family-specific key mappings and id synthesis.
//!
//! Upstream list payloads arrive in camelCase; canonical extras are
//! snake_case. Each mapping also accepts its own canonical spelling so the
//! validator composed with itself is the validator.

use super::{normalize_date, Rejection, View};
use crate::models::{Chamber, Family};
use serde_json::{Map, Value};

/// Upstream bill-type enumeration, lowercased.
const BILL_TYPES: [&str; 8] = [
    "hr", "s", "hjres", "sjres", "hconres", "sconres", "hres", "sres",
];

pub(crate) struct Parts {
    pub id: String,
    pub extras: Map<String, Value>,
}

struct Fields<'a, 'b> {
    view: &'b View<'a>,
    extras: Map<String, Value>,
    missing: Vec<&'static str>,
}

impl<'a, 'b> Fields<'a, 'b> {
    fn new(view: &'b View<'a>) -> Self {
        Self {
            view,
            extras: Map::new(),
            missing: Vec::new(),
        }
    }

    fn put(&mut self, name: &str, value: impl Into<Value>) {
        self.extras.insert(name.to_string(), value.into());
    }

    fn req_string(&mut self, name: &'static str, keys: &[&str]) -> Option<String> {
        match self.view.string(keys) {
            Some(s) => {
                self.put(name, s.clone());
                Some(s)
            }
            None => {
                self.missing.push(name);
                None
            }
        }
    }

    fn req_lower(&mut self, name: &'static str, keys: &[&str]) -> Option<String> {
        match self.view.string(keys).map(|s| s.to_ascii_lowercase()) {
            Some(s) => {
                self.put(name, s.clone());
                Some(s)
            }
            None => {
                self.missing.push(name);
                None
            }
        }
    }

    fn opt_string(&mut self, name: &str, keys: &[&str]) {
        if let Some(s) = self.view.string(keys) {
            self.put(name, s);
        }
    }

    fn req_int(&mut self, name: &'static str, keys: &[&str]) -> Option<i64> {
        match self.view.integer(keys) {
            Some(n) => {
                self.put(name, n);
                Some(n)
            }
            None => {
                self.missing.push(name);
                None
            }
        }
    }

    fn opt_int(&mut self, name: &str, keys: &[&str]) {
        if let Some(n) = self.view.integer(keys) {
            self.put(name, n);
        }
    }

    fn req_chamber(
        &mut self,
        name: &'static str,
        keys: &[&str],
    ) -> Result<Option<Chamber>, Rejection> {
        match self.view.chamber(keys)? {
            Some(c) => {
                self.put(name, c.as_str());
                Ok(Some(c))
            }
            None => {
                self.missing.push(name);
                Ok(None)
            }
        }
    }

    fn opt_chamber(&mut self, name: &str, keys: &[&str]) -> Result<(), Rejection> {
        if let Some(c) = self.view.chamber(keys)? {
            self.put(name, c.as_str());
        }
        Ok(())
    }

    fn req_date(&mut self, name: &'static str, keys: &[&str]) -> Result<Option<String>, Rejection> {
        match self.view.string(keys) {
            Some(raw) => {
                let date = normalize_date(&raw).ok_or(Rejection::InvalidDate {
                    field: name,
                    value: raw,
                })?;
                let date = date.to_string();
                self.put(name, date.clone());
                Ok(Some(date))
            }
            None => {
                self.missing.push(name);
                Ok(None)
            }
        }
    }

    fn opt_date(&mut self, name: &'static str, keys: &[&str]) -> Result<(), Rejection> {
        if let Some(raw) = self.view.string(keys) {
            let date = normalize_date(&raw).ok_or(Rejection::InvalidDate {
                field: name,
                value: raw,
            })?;
            self.put(name, date.to_string());
        }
        Ok(())
    }

    /// Pass a cleaned list through unchanged (defaulting to empty).
    fn list(&mut self, name: &str, keys: &[&str]) {
        let items = self.view.array(keys).cloned().unwrap_or_default();
        self.put(name, Value::Array(items));
    }

    /// Upstream sometimes returns `latestAction` as a bare string; coerce to
    /// the canonical `{text, action_date}` shape.
    fn latest_action(&mut self, keys: &[&str]) -> Result<(), Rejection> {
        let Some(value) = self.view.get(keys) else {
            return Ok(());
        };
        let mut out = Map::new();
        match value {
            Value::Object(m) => {
                if let Some(text) = m.get("text").and_then(Value::as_str) {
                    out.insert("text".to_string(), Value::String(text.to_string()));
                }
                let date = m
                    .get("actionDate")
                    .or_else(|| m.get("action_date"))
                    .and_then(Value::as_str);
                if let Some(raw) = date {
                    let d = normalize_date(raw).ok_or(Rejection::InvalidDate {
                        field: "action_date",
                        value: raw.to_string(),
                    })?;
                    out.insert("action_date".to_string(), Value::String(d.to_string()));
                }
            }
            Value::String(s) => {
                out.insert("text".to_string(), Value::String(s.clone()));
            }
            _ => return Ok(()),
        }
        if !out.is_empty() {
            self.put("latest_action", Value::Object(out));
        }
        Ok(())
    }

    fn finish(self, id: impl FnOnce(&Map<String, Value>) -> String) -> Result<Parts, Rejection> {
        if !self.missing.is_empty() {
            return Err(Rejection::MissingFields(self.missing));
        }
        let id = id(&self.extras);
        Ok(Parts {
            id,
            extras: self.extras,
        })
    }
}

/// Normalize a committee reference (`{name, systemCode, url}`) to snake_case.
fn committee_ref(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (from, to) in [
        ("name", "name"),
        ("systemCode", "system_code"),
        ("system_code", "system_code"),
        ("url", "url"),
        ("chamber", "chamber"),
    ] {
        if let Some(v) = raw.get(from).and_then(Value::as_str) {
            out.entry(to.to_string())
                .or_insert_with(|| Value::String(v.to_string()));
        }
    }
    out
}

/// Normalize an associated-bill reference to `{congress, type, number}`.
fn bill_ref(view: &View<'_>, keys: &[&str]) -> Option<Value> {
    let raw = view.object(keys)?;
    let inner = View { obj: raw };
    let mut out = Map::new();
    if let Some(c) = inner.integer(&["congress"]) {
        out.insert("congress".to_string(), c.into());
    }
    if let Some(t) = inner.string(&["type", "billType", "bill_type"]) {
        out.insert("type".to_string(), t.to_ascii_lowercase().into());
    }
    if let Some(n) = inner.integer(&["number", "billNumber", "bill_number"]) {
        out.insert("number".to_string(), n.into());
    }
    (!out.is_empty()).then_some(Value::Object(out))
}

pub(crate) fn extract(
    family: Family,
    congress: u32,
    view: &View<'_>,
) -> Result<Parts, Rejection> {
    match family {
        Family::Bill => bill(congress, view),
        Family::Amendment => amendment(congress, view),
        Family::Committee => committee(congress, view),
        Family::CommitteeReport => committee_report(congress, view),
        Family::CommitteePrint => committee_print(congress, view),
        Family::CommitteeMeeting => committee_meeting(congress, view),
        Family::Hearing => hearing(congress, view),
        Family::Nomination => nomination(congress, view),
        Family::Treaty => treaty(congress, view),
        Family::CongressionalRecord => congressional_record(view),
        Family::DailyCongressionalRecord => daily_record(view),
        Family::BoundCongressionalRecord => bound_record(view),
        Family::HouseCommunication => communication(congress, view, Chamber::House),
        Family::HouseRequirement => house_requirement(view),
        Family::SenateCommunication => communication(congress, view, Chamber::Senate),
        Family::Member => member(view),
        Family::Summary => summary(congress, view),
        Family::Congress => congress_family(congress, view),
    }
}

fn bill(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    if let Some(bt) = f.req_lower("bill_type", &["billType", "bill_type", "type"]) {
        if !BILL_TYPES.contains(&bt.as_str()) {
            return Err(Rejection::InvalidBillType(bt));
        }
    }
    f.req_int("bill_number", &["billNumber", "bill_number", "number"]);
    f.req_string("title", &["title"]);
    f.opt_chamber("origin_chamber", &["originChamber", "origin_chamber", "originChamberCode"])?;
    f.opt_date("introduced_date", &["introducedDate", "introduced_date"])?;
    f.latest_action(&["latestAction", "latest_action"])?;
    f.list("sponsors", &["sponsors"]);
    f.list("committees", &["committees"]);
    f.finish(|x| {
        format!(
            "{congress}-{}-{}",
            x["bill_type"].as_str().unwrap_or_default(),
            x["bill_number"]
        )
    })
}

fn amendment(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_lower("amendment_type", &["amendmentType", "amendment_type", "type"]);
    f.req_int(
        "amendment_number",
        &["amendmentNumber", "amendment_number", "number"],
    );
    f.opt_string("purpose", &["purpose"]);
    f.opt_date("submit_date", &["submitDate", "submit_date", "submittedDate"])?;
    f.opt_chamber("chamber", &["chamber"])?;
    f.latest_action(&["latestAction", "latest_action"])?;
    if let Some(bill) = bill_ref(view, &["amendedBill", "associated_bill"]) {
        f.put("associated_bill", bill);
    }
    f.finish(|x| {
        format!(
            "{congress}-{}-{}",
            x["amendment_type"].as_str().unwrap_or_default(),
            x["amendment_number"]
        )
    })
}

fn committee(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_string("name", &["name"]);
    f.req_chamber("chamber", &["chamber"])?;
    f.req_lower("system_code", &["systemCode", "system_code"]);
    f.opt_string(
        "committee_type",
        &["committeeTypeCode", "committee_type", "type"],
    );
    if let Some(parent) = view.object(&["parent", "parent_committee"]) {
        let normalized = committee_ref(parent);
        if !normalized.is_empty() {
            f.put("parent_committee", Value::Object(normalized));
        }
    }
    let subcommittees: Vec<Value> = view
        .array(&["subcommittees"])
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|m| Value::Object(committee_ref(m)))
                .collect()
        })
        .unwrap_or_default();
    f.put("subcommittees", Value::Array(subcommittees));
    f.finish(|x| {
        format!(
            "{congress}-{}-{}",
            x["chamber"].as_str().unwrap_or_default(),
            x["system_code"].as_str().unwrap_or_default()
        )
    })
}

fn committee_report(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_lower("report_type", &["reportType", "report_type", "type"]);
    f.req_int("report_number", &["reportNumber", "report_number", "number"]);
    f.opt_int("part", &["part"]);
    f.opt_string("citation", &["citation"]);
    f.opt_chamber("chamber", &["chamber"])?;
    f.finish(|x| {
        format!(
            "{congress}-{}-{}",
            x["report_type"].as_str().unwrap_or_default(),
            x["report_number"]
        )
    })
}

fn committee_print(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    let chamber = f.req_chamber("chamber", &["chamber"])?;
    f.req_int("jacket_number", &["jacketNumber", "jacket_number"]);
    f.opt_string("title", &["title"]);
    let chamber = chamber.map(|c| c.as_str()).unwrap_or_default();
    f.finish(|x| format!("{congress}-{chamber}-print-{}", x["jacket_number"]))
}

fn committee_meeting(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    let chamber = f.req_chamber("chamber", &["chamber"])?;
    f.req_string("event_id", &["eventId", "event_id"]);
    f.opt_string("meeting_type", &["type", "meeting_type"]);
    f.opt_date("date", &["date", "meetingDate"])?;
    let chamber = chamber.map(|c| c.as_str()).unwrap_or_default();
    f.finish(|x| {
        format!(
            "{congress}-{chamber}-meeting-{}",
            x["event_id"].as_str().unwrap_or_default()
        )
    })
}

fn hearing(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    let chamber = f.req_chamber("chamber", &["chamber"])?;
    let date = f.req_date("date", &["date", "eventDate"])?;

    // Committee reference: a `committee` object or the first of `committees`.
    let committee = view
        .object(&["committee"])
        .map(committee_ref)
        .or_else(|| {
            view.array(&["committees"])
                .and_then(|items| items.first())
                .and_then(Value::as_object)
                .map(committee_ref)
        });
    let code = committee
        .as_ref()
        .and_then(|c| c.get("system_code"))
        .and_then(Value::as_str)
        .map(|s| s.to_ascii_lowercase());
    match (&committee, &code) {
        (Some(c), Some(_)) => f.put("committee", Value::Object(c.clone())),
        _ => f.missing.push("committee"),
    }

    f.opt_string("title", &["title"]);
    f.opt_string("time", &["time"]);
    f.opt_string("location", &["location"]);
    f.list("witnesses", &["witnesses"]);

    let chamber = chamber.map(|c| c.as_str()).unwrap_or_default();
    let code = code.unwrap_or_default();
    let date = date.unwrap_or_default();
    f.finish(|_| format!("{congress}-{chamber}-{code}-{date}"))
}

fn nomination(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_int("number", &["number", "nominationNumber"]);
    f.opt_int("part", &["partNumber", "part"]);
    f.opt_string("citation", &["citation"]);
    f.opt_string("organization", &["organization"]);
    f.opt_string("description", &["description"]);
    f.opt_date("received_date", &["receivedDate", "received_date"])?;
    f.latest_action(&["latestAction", "latest_action"])?;
    f.finish(|x| match x.get("part") {
        Some(part) => format!("{congress}-nomination-{}-{part}", x["number"]),
        None => format!("{congress}-nomination-{}", x["number"]),
    })
}

fn treaty(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_int("number", &["number", "treatyNumber", "treaty_number"]);
    f.opt_string("suffix", &["suffix"]);
    f.opt_string("topic", &["topic"]);
    f.opt_date("transmitted_date", &["transmittedDate", "transmitted_date"])?;
    f.finish(|x| match x.get("suffix").and_then(Value::as_str) {
        Some(suffix) => format!("{congress}-treaty-{}-{suffix}", x["number"]),
        None => format!("{congress}-treaty-{}", x["number"]),
    })
}

fn congressional_record(view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_int("volume_number", &["volumeNumber", "volume_number", "Volume"]);
    f.req_int("issue_number", &["issueNumber", "issue_number", "Issue"]);
    f.opt_date("publish_date", &["publishDate", "publish_date", "PublishDate"])?;
    f.finish(|x| format!("record-{}-{}", x["volume_number"], x["issue_number"]))
}

fn daily_record(view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_int("volume_number", &["volumeNumber", "volume_number"]);
    f.req_int("issue_number", &["issueNumber", "issue_number"]);
    f.opt_date("issue_date", &["issueDate", "issue_date"])?;
    f.finish(|x| format!("daily-record-{}-{}", x["volume_number"], x["issue_number"]))
}

fn bound_record(view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_int("volume_number", &["volumeNumber", "volume_number"]);
    let date = f.req_date("date", &["date", "coverDate"])?;
    let date = date.unwrap_or_default();
    f.finish(|x| format!("bound-record-{}-{date}", x["volume_number"]))
}

fn communication(congress: u32, view: &View<'_>, chamber: Chamber) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_int("number", &["number", "communicationNumber"]);

    // Communication type arrives as `{code, name}` or a bare code string.
    let code = match view.get(&["communicationType", "communication_type"]) {
        Some(Value::Object(m)) => m
            .get("code")
            .and_then(Value::as_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(Value::String(s)) => Some(s.trim().to_ascii_lowercase()),
        _ => None,
    };
    match &code {
        Some(code) => f.put("communication_type", code.clone()),
        None => f.missing.push("communication_type"),
    }

    f.put("chamber", chamber.as_str());
    f.opt_string("abstract", &["abstract"]);
    let code = code.unwrap_or_default();
    f.finish(|x| format!("{congress}-{}-{code}-{}", chamber.as_str(), x["number"]))
}

fn house_requirement(view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_int("number", &["number", "requirementNumber"]);
    f.opt_string("nature", &["nature"]);
    f.put("chamber", Chamber::House.as_str());
    f.finish(|x| format!("house-requirement-{}", x["number"]))
}

fn member(view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_string("bioguide_id", &["bioguideId", "bioguide_id"]);
    f.opt_string("name", &["name", "directOrderName"]);
    f.opt_string("state", &["state", "stateName"]);
    f.opt_string("party", &["partyName", "party"]);
    f.opt_int("district", &["district"]);
    f.list("terms", &["terms"]);
    f.finish(|x| x["bioguide_id"].as_str().unwrap_or_default().to_string())
}

fn summary(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.req_lower("version_code", &["versionCode", "version_code"]);
    f.opt_date("action_date", &["actionDate", "action_date"])?;
    f.opt_string("action_desc", &["actionDesc", "action_desc"]);
    f.opt_string("text", &["text"]);

    let bill = bill_ref(view, &["bill", "associated_bill"]);
    let (bill_type, bill_number) = match &bill {
        Some(Value::Object(m)) => (
            m.get("type").and_then(Value::as_str).map(str::to_string),
            m.get("number").and_then(Value::as_i64),
        ),
        _ => (None, None),
    };
    match bill {
        Some(b) if bill_type.is_some() && bill_number.is_some() => f.put("associated_bill", b),
        _ => f.missing.push("associated_bill"),
    }

    let bill_type = bill_type.unwrap_or_default();
    let bill_number = bill_number.unwrap_or_default();
    f.finish(|x| {
        format!(
            "{congress}-{bill_type}-{bill_number}-summary-{}",
            x["version_code"].as_str().unwrap_or_default()
        )
    })
}

fn congress_family(congress: u32, view: &View<'_>) -> Result<Parts, Rejection> {
    let mut f = Fields::new(view);
    f.opt_string("name", &["name"]);
    f.opt_int("start_year", &["startYear", "start_year"]);
    f.opt_int("end_year", &["endYear", "end_year"]);
    f.list("sessions", &["sessions"]);
    f.finish(|_| format!("congress-{congress}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::min_corpus_date;
    use crate::validate::Validator;
    use serde_json::json;

    fn validator() -> Validator {
        Validator::new(min_corpus_date())
    }

    #[test]
    fn amendment_id_and_bill_ref() {
        let raw = json!({
            "congress": 117,
            "type": "SAMDT",
            "number": 2137,
            "purpose": "To improve the bill",
            "updateDate": "2021-08-08",
            "amendedBill": { "congress": 117, "type": "HR", "number": 3684 }
        });
        let rec = validator().validate(Family::Amendment, &raw).unwrap();
        assert_eq!(rec.id, "117-samdt-2137");
        assert_eq!(
            rec.extras["associated_bill"],
            json!({ "congress": 117, "type": "hr", "number": 3684 })
        );
    }

    #[test]
    fn committee_id_uses_chamber_and_system_code() {
        let raw = json!({
            "congress": 118,
            "name": "Agriculture Committee",
            "chamber": "House",
            "systemCode": "HSAG00",
            "committeeTypeCode": "standing",
            "subcommittees": [ { "name": "Livestock", "systemCode": "hsag29" } ],
            "updateDate": "2024-03-01"
        });
        let rec = validator().validate(Family::Committee, &raw).unwrap();
        assert_eq!(rec.id, "118-house-hsag00");
        assert_eq!(rec.extras["subcommittees"][0]["system_code"], "hsag29");
    }

    #[test]
    fn hearing_id_includes_event_date() {
        let raw = json!({
            "congress": 118,
            "chamber": "Senate",
            "date": "2024-02-07T10:00:00Z",
            "title": "Oversight hearing",
            "committee": { "name": "Judiciary", "systemCode": "SSJU00" },
            "updateDate": "2024-02-08"
        });
        let rec = validator().validate(Family::Hearing, &raw).unwrap();
        assert_eq!(rec.id, "118-senate-ssju00-2024-02-07");
        assert_eq!(rec.extras["committee"]["name"], "Judiciary");
    }

    #[test]
    fn hearing_without_committee_is_rejected() {
        let raw = json!({
            "congress": 118,
            "chamber": "Senate",
            "date": "2024-02-07",
            "updateDate": "2024-02-08"
        });
        match validator().validate(Family::Hearing, &raw) {
            Err(Rejection::MissingFields(fields)) => assert!(fields.contains(&"committee")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn nomination_part_suffix() {
        let raw = json!({
            "congress": 118,
            "number": 1024,
            "partNumber": 2,
            "organization": "Department of Justice",
            "updateDate": "2024-05-01"
        });
        let rec = validator().validate(Family::Nomination, &raw).unwrap();
        assert_eq!(rec.id, "118-nomination-1024-2");
    }

    #[test]
    fn communications_take_their_chamber_from_the_family() {
        let raw = json!({
            "congress": 118,
            "number": 3021,
            "communicationType": { "code": "EC", "name": "Executive Communication" },
            "updateDate": "2024-04-10"
        });
        let rec = validator()
            .validate(Family::HouseCommunication, &raw)
            .unwrap();
        assert_eq!(rec.id, "118-house-ec-3021");
        assert_eq!(rec.extras["chamber"], "house");

        let rec = validator()
            .validate(Family::SenateCommunication, &raw)
            .unwrap();
        assert_eq!(rec.id, "118-senate-ec-3021");
    }

    #[test]
    fn summary_id_combines_bill_and_version() {
        let raw = json!({
            "congress": 118,
            "versionCode": "00",
            "actionDate": "2024-01-05",
            "bill": { "congress": 118, "type": "S", "number": 870 },
            "updateDate": "2024-01-06"
        });
        let rec = validator().validate(Family::Summary, &raw).unwrap();
        assert_eq!(rec.id, "118-s-870-summary-00");
    }

    #[test]
    fn congress_family_takes_ordinal_from_number() {
        let raw = json!({
            "number": 118,
            "name": "118th Congress",
            "startYear": 2023,
            "endYear": 2025,
            "updateDate": "2023-01-03"
        });
        let rec = validator().validate(Family::Congress, &raw).unwrap();
        assert_eq!(rec.id, "congress-118");
        assert_eq!(rec.congress, 118);
    }

    #[test]
    fn record_families_fall_back_to_publish_dates() {
        let raw = json!({
            "volumeNumber": 170,
            "issueNumber": 24,
            "publishDate": "2024-02-09"
        });
        let rec = validator()
            .validate(Family::CongressionalRecord, &raw)
            .unwrap();
        assert_eq!(rec.id, "record-170-24");
        assert_eq!(rec.congress, 1);
        assert_eq!(rec.update_date.to_string(), "2024-02-09");
    }

    #[test]
    fn latest_action_string_coerces_to_object() {
        let raw = json!({
            "congress": 118,
            "type": "hr",
            "number": 1,
            "title": "T",
            "latestAction": "Became Public Law",
            "updateDate": "2024-01-01"
        });
        let rec = validator().validate(Family::Bill, &raw).unwrap();
        assert_eq!(rec.extras["latest_action"], json!({ "text": "Became Public Law" }));
    }

    #[test]
    fn invalid_bill_type_rejected() {
        let raw = json!({
            "congress": 118,
            "type": "hx",
            "number": 1,
            "title": "T",
            "updateDate": "2024-01-01"
        });
        assert!(matches!(
            validator().validate(Family::Bill, &raw),
            Err(Rejection::InvalidBillType(_))
        ));
    }
}
