use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::calendar::{DAYS_PER_WEEK, DayIndex, WeekIndex};
use crate::model::ids::ActivityId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("malformed completion key: {raw}")]
    MalformedKey { raw: String },

    #[error("invalid completion document: {0}")]
    Json(String),
}

//
// ─── CELL KEY ──────────────────────────────────────────────────────────────────
//

/// Identifies one (activity, week, day) cell of the chart.
///
/// The textual form is `<activity>-<week>-<day>`, e.g. `12-3-4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    activity: ActivityId,
    week: WeekIndex,
    day: DayIndex,
}

impl CellKey {
    #[must_use]
    pub fn new(activity: ActivityId, week: WeekIndex, day: DayIndex) -> Self {
        Self {
            activity,
            week,
            day,
        }
    }

    #[must_use]
    pub fn activity(&self) -> ActivityId {
        self.activity
    }

    #[must_use]
    pub fn week(&self) -> WeekIndex {
        self.week
    }

    #[must_use]
    pub fn day(&self) -> DayIndex {
        self.day
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.activity, self.week, self.day)
    }
}

impl FromStr for CellKey {
    type Err = CompletionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CompletionError::MalformedKey { raw: s.to_owned() };
        let mut parts = s.split('-');
        let (Some(activity), Some(week), Some(day), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let activity: ActivityId = activity.parse().map_err(|_| malformed())?;
        let week: WeekIndex = week.parse().map_err(|_| malformed())?;
        let day: DayIndex = day.parse().map_err(|_| malformed())?;
        if day >= DAYS_PER_WEEK {
            return Err(malformed());
        }
        Ok(Self::new(activity, week, day))
    }
}

//
// ─── COMPLETION SET ────────────────────────────────────────────────────────────
//

/// The cells a user has marked done.
///
/// This is the only mutable state the progress queries read; it is owned by a
/// single state holder and passed to the queries by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSet {
    cells: BTreeSet<CellKey>,
}

impl CompletionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &CellKey) -> bool {
        self.cells.contains(key)
    }

    /// Flip a cell and return its new state.
    pub fn toggle(&mut self, key: CellKey) -> bool {
        if self.cells.remove(&key) {
            false
        } else {
            self.cells.insert(key);
            true
        }
    }

    /// Force a cell to the given state. Returns true if anything changed.
    pub fn set(&mut self, key: CellKey, done: bool) -> bool {
        if done {
            self.cells.insert(key)
        } else {
            self.cells.remove(&key)
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellKey> {
        self.cells.iter()
    }

    /// Completed cells belonging to one activity, in (week, day) order.
    pub fn cells_of(&self, activity: ActivityId) -> impl Iterator<Item = &CellKey> {
        self.cells
            .range(CellKey::new(activity, 0, 0)..=CellKey::new(activity, WeekIndex::MAX, DayIndex::MAX))
    }

    /// Keep only the cells for which `keep` returns true. Returns how many
    /// cells were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&CellKey) -> bool) -> usize {
        let before = self.cells.len();
        self.cells.retain(|key| keep(key));
        before - self.cells.len()
    }

    /// Export as the flat `{ "<key>": true }` object used by browser storage.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        let map: Map<String, Value> = self
            .cells
            .iter()
            .map(|key| (key.to_string(), Value::Bool(true)))
            .collect();
        Value::Object(map)
    }

    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Import the flat `{ "<key>": bool }` object. Entries set to `false` are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Json` if the text is not an object of
    /// booleans, and `CompletionError::MalformedKey` for unparsable keys.
    pub fn from_json_str(raw: &str) -> Result<Self, CompletionError> {
        let flags: BTreeMap<String, bool> =
            serde_json::from_str(raw).map_err(|e| CompletionError::Json(e.to_string()))?;
        flags
            .into_iter()
            .filter(|(_, done)| *done)
            .map(|(key, _)| key.parse::<CellKey>())
            .collect()
    }
}

impl FromIterator<CellKey> for CompletionSet {
    fn from_iter<I: IntoIterator<Item = CellKey>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Extend<CellKey> for CompletionSet {
    fn extend<I: IntoIterator<Item = CellKey>>(&mut self, iter: I) {
        self.cells.extend(iter);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
