use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Earliest calendar date the corpus can contain (First Congress convened).
pub const MIN_DATE: (i32, u32, u32) = (1789, 3, 4);

/// One of the eighteen Congress.gov resource categories.
///
/// Variant order is the stable dispatch order used by the scheduler when
/// several families are eligible at once.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Family {
    Bill,
    Amendment,
    Committee,
    CommitteeReport,
    CommitteePrint,
    CommitteeMeeting,
    Hearing,
    Nomination,
    Treaty,
    CongressionalRecord,
    DailyCongressionalRecord,
    BoundCongressionalRecord,
    HouseCommunication,
    HouseRequirement,
    SenateCommunication,
    Member,
    Summary,
    Congress,
}

impl Family {
    pub const ALL: [Family; 18] = [
        Family::Bill,
        Family::Amendment,
        Family::Committee,
        Family::CommitteeReport,
        Family::CommitteePrint,
        Family::CommitteeMeeting,
        Family::Hearing,
        Family::Nomination,
        Family::Treaty,
        Family::CongressionalRecord,
        Family::DailyCongressionalRecord,
        Family::BoundCongressionalRecord,
        Family::HouseCommunication,
        Family::HouseRequirement,
        Family::SenateCommunication,
        Family::Member,
        Family::Summary,
        Family::Congress,
    ];

    /// Stable kebab-case tag, identical to the upstream endpoint segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Bill => "bill",
            Family::Amendment => "amendment",
            Family::Committee => "committee",
            Family::CommitteeReport => "committee-report",
            Family::CommitteePrint => "committee-print",
            Family::CommitteeMeeting => "committee-meeting",
            Family::Hearing => "hearing",
            Family::Nomination => "nomination",
            Family::Treaty => "treaty",
            Family::CongressionalRecord => "congressional-record",
            Family::DailyCongressionalRecord => "daily-congressional-record",
            Family::BoundCongressionalRecord => "bound-congressional-record",
            Family::HouseCommunication => "house-communication",
            Family::HouseRequirement => "house-requirement",
            Family::SenateCommunication => "senate-communication",
            Family::Member => "member",
            Family::Summary => "summary",
            Family::Congress => "congress",
        }
    }

    pub fn parse(tag: &str) -> Result<Family> {
        let tag = tag.trim().to_ascii_lowercase();
        Family::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == tag)
            .ok_or_else(|| Error::InvalidInput(format!("unknown family tag: {tag}")))
    }

    /// Families whose upstream payloads may legitimately omit `congress`.
    pub fn congress_optional(&self) -> bool {
        matches!(
            self,
            Family::Member
                | Family::HouseRequirement
                | Family::CongressionalRecord
                | Family::DailyCongressionalRecord
                | Family::BoundCongressionalRecord
        )
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chamber of Congress, stored lowercase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    House,
    Senate,
    Joint,
}

impl Chamber {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::House => "house",
            Chamber::Senate => "senate",
            Chamber::Joint => "joint",
        }
    }

    /// Accepts full names in any case plus the upstream single-letter codes.
    pub fn parse(raw: &str) -> Option<Chamber> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "house" | "h" => Some(Chamber::House),
            "senate" | "s" => Some(Chamber::Senate),
            "joint" | "j" => Some(Chamber::Joint),
            _ => None,
        }
    }
}

impl std::fmt::Display for Chamber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Earliest date the corpus can contain.
pub fn min_corpus_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(MIN_DATE.0, MIN_DATE.1, MIN_DATE.2).expect("valid constant date")
}

/// Congress ordinal in session on the given date.
pub fn congress_for_date(date: NaiveDate) -> u32 {
    let years = (date.year() - MIN_DATE.0).max(0) as u32;
    years / 2 + 1
}

/// An inclusive calendar-date range.
///
/// A window whose `from` lies after `to` is empty: it yields no dates, splits
/// into no sub-windows and traverses to `completed` with zero records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    /// Number of calendar dates covered, inclusive.
    pub fn num_days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.to - self.from).num_days() + 1
        }
    }

    /// Iterate the covered dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        std::iter::successors((!self.is_empty()).then_some(self.from), move |d| {
            d.succ_opt().filter(|next| *next <= to)
        })
    }

    /// Split into contiguous sub-windows of at most `max_range_days` days.
    pub fn split(&self, max_range_days: u32) -> Vec<DateWindow> {
        let max_range_days = max_range_days.max(1) as i64;
        let mut out = Vec::new();
        let mut start = self.from;
        while start <= self.to {
            let end = (start + chrono::Duration::days(max_range_days - 1)).min(self.to);
            out.push(DateWindow::new(start, end));
            match end.succ_opt() {
                Some(next) => start = next,
                None => break,
            }
        }
        out
    }

    /// Clamp the lower bound to `floor`, leaving `to` untouched.
    pub fn clamped(&self, floor: NaiveDate) -> DateWindow {
        DateWindow::new(self.from.max(floor), self.to)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Incremental,
    Refresh,
    Bulk,
}

/// Which families a run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilySelection {
    All,
    Only(Vec<Family>),
}

impl FamilySelection {
    /// Selected families in stable dispatch order, deduplicated.
    pub fn families(&self) -> Vec<Family> {
        match self {
            FamilySelection::All => Family::ALL.to_vec(),
            FamilySelection::Only(set) => Family::ALL
                .iter()
                .copied()
                .filter(|f| set.contains(f))
                .collect(),
        }
    }
}

/// A single invocation request for the ingestion core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub mode: RunMode,
    pub window: Option<DateWindow>,
    pub lookback_days: Option<u32>,
    pub families: FamilySelection,
}

impl RunRequest {
    pub fn incremental(lookback_days: u32, families: FamilySelection) -> Self {
        Self {
            mode: RunMode::Incremental,
            window: None,
            lookback_days: Some(lookback_days),
            families,
        }
    }

    pub fn refresh(window: DateWindow, families: FamilySelection) -> Self {
        Self {
            mode: RunMode::Refresh,
            window: Some(window),
            lookback_days: None,
            families,
        }
    }

    pub fn bulk(families: FamilySelection) -> Self {
        Self {
            mode: RunMode::Bulk,
            window: None,
            lookback_days: None,
            families,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == RunMode::Refresh && self.window.is_none() {
            return Err(Error::InvalidInput(
                "refresh mode requires an explicit window".to_string(),
            ));
        }
        if self.families.families().is_empty() {
            return Err(Error::InvalidInput("no families selected".to_string()));
        }
        Ok(())
    }
}

/// Terminal state of a run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Ok,
    Partial,
    Failed,
    Cancelled,
}
