use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::calendar::{DAYS_PER_WEEK, DayIndex, WeekIndex};
use crate::model::ids::ActivityId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActivityError {
    #[error("activity name cannot be empty")]
    EmptyName,

    #[error("activity must touch at least one week")]
    NoWeeks,

    #[error("activity weeks must be non-decreasing ({previous} then {next})")]
    WeeksOutOfOrder { previous: WeekIndex, next: WeekIndex },

    #[error("day offset {offset} is outside 0..=6")]
    DayOffsetOutOfRange { offset: DayIndex },

    #[error("single-week activity starts on day {first} after it ends on day {last}")]
    InvertedSingleWeek { first: DayIndex, last: DayIndex },

    #[error("unknown owner: {0}")]
    UnknownOwner(String),
}

//
// ─── OWNER ─────────────────────────────────────────────────────────────────────
//

/// Who is responsible for an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Owner {
    #[default]
    Student,
    Supervisor,
    Shared,
}

impl Owner {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Owner::Student => "student",
            Owner::Supervisor => "supervisor",
            Owner::Shared => "shared",
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Owner {
    type Err = ActivityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Owner::Student),
            "supervisor" | "tutor" => Ok(Owner::Supervisor),
            "shared" | "both" => Ok(Owner::Shared),
            other => Err(ActivityError::UnknownOwner(other.to_owned())),
        }
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated activity input, as collected from an edit form or a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivityDraft {
    pub name: String,
    pub owner: Owner,
    pub milestone: bool,
    pub weeks: Vec<WeekIndex>,
    pub first_day_offset: DayIndex,
    pub last_day_offset: DayIndex,
}

impl ActivityDraft {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        weeks: Vec<WeekIndex>,
        first_day_offset: DayIndex,
        last_day_offset: DayIndex,
    ) -> Self {
        Self {
            name: name.into(),
            owner: Owner::Student,
            milestone: false,
            weeks,
            first_day_offset,
            last_day_offset,
        }
    }

    #[must_use]
    pub fn owned_by(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    #[must_use]
    pub fn milestone(mut self, milestone: bool) -> Self {
        self.milestone = milestone;
        self
    }

    /// Validate the draft into an activity with the given id.
    ///
    /// Duplicate week entries are collapsed.
    ///
    /// # Errors
    ///
    /// Returns `ActivityError` if the name is blank, the week list is empty or
    /// decreasing, an offset is outside `0..=6`, or a single-week span is
    /// inverted.
    pub fn validate(self, id: ActivityId) -> Result<Activity, ActivityError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ActivityError::EmptyName);
        }
        for offset in [self.first_day_offset, self.last_day_offset] {
            if offset >= DAYS_PER_WEEK {
                return Err(ActivityError::DayOffsetOutOfRange { offset });
            }
        }
        if self.weeks.is_empty() {
            return Err(ActivityError::NoWeeks);
        }
        if let Some(pair) = self.weeks.windows(2).find(|pair| pair[1] < pair[0]) {
            return Err(ActivityError::WeeksOutOfOrder {
                previous: pair[0],
                next: pair[1],
            });
        }

        let mut weeks = self.weeks;
        weeks.dedup();
        if weeks.len() == 1 && self.first_day_offset > self.last_day_offset {
            return Err(ActivityError::InvertedSingleWeek {
                first: self.first_day_offset,
                last: self.last_day_offset,
            });
        }

        Ok(Activity {
            id,
            name: name.to_owned(),
            owner: self.owner,
            milestone: self.milestone,
            weeks,
            first_day_offset: self.first_day_offset,
            last_day_offset: self.last_day_offset,
        })
    }
}

//
// ─── ACTIVITY ──────────────────────────────────────────────────────────────────
//

/// One row of the chart: a span of days across one or more week buckets.
///
/// In the first week of the span only days `>= first_day_offset` count, in the
/// last week only days `<= last_day_offset`, and every day of the weeks in
/// between. A single-week span is bounded on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    id: ActivityId,
    name: String,
    owner: Owner,
    milestone: bool,
    weeks: Vec<WeekIndex>,
    first_day_offset: DayIndex,
    last_day_offset: DayIndex,
}

impl Activity {
    /// Shorthand for building a draft and validating it.
    ///
    /// # Errors
    ///
    /// See [`ActivityDraft::validate`].
    pub fn new(
        id: ActivityId,
        name: impl Into<String>,
        weeks: Vec<WeekIndex>,
        first_day_offset: DayIndex,
        last_day_offset: DayIndex,
    ) -> Result<Self, ActivityError> {
        ActivityDraft::new(name, weeks, first_day_offset, last_day_offset).validate(id)
    }

    #[must_use]
    pub fn id(&self) -> ActivityId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Whether the final day of the span is a deliverable checkpoint.
    #[must_use]
    pub fn is_milestone(&self) -> bool {
        self.milestone
    }

    #[must_use]
    pub fn weeks(&self) -> &[WeekIndex] {
        &self.weeks
    }

    #[must_use]
    pub fn first_day_offset(&self) -> DayIndex {
        self.first_day_offset
    }

    #[must_use]
    pub fn last_day_offset(&self) -> DayIndex {
        self.last_day_offset
    }

    #[must_use]
    pub fn first_week(&self) -> WeekIndex {
        self.weeks[0]
    }

    #[must_use]
    pub fn last_week(&self) -> WeekIndex {
        self.weeks[self.weeks.len() - 1]
    }

    #[must_use]
    pub fn touches_week(&self, week: WeekIndex) -> bool {
        self.weeks.binary_search(&week).is_ok()
    }

    /// Span membership, ignoring calendar validity.
    #[must_use]
    pub fn spans_day(&self, week: WeekIndex, day: DayIndex) -> bool {
        if day >= DAYS_PER_WEEK || !self.touches_week(week) {
            return false;
        }
        let after_start = week != self.first_week() || day >= self.first_day_offset;
        let before_end = week != self.last_week() || day <= self.last_day_offset;
        after_start && before_end
    }

    /// Back to an editable draft, e.g. to change a single field.
    #[must_use]
    pub fn to_draft(&self) -> ActivityDraft {
        ActivityDraft {
            name: self.name.clone(),
            owner: self.owner,
            milestone: self.milestone,
            weeks: self.weeks.clone(),
            first_day_offset: self.first_day_offset,
            last_day_offset: self.last_day_offset,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
