use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;

/// Zero-based index of a week bucket in a calendar.
pub type WeekIndex = u8;

/// Zero-based day slot inside a week bucket (Monday = 0).
pub type DayIndex = u8;

pub const DAYS_PER_WEEK: DayIndex = 7;

/// Number of week buckets in the standard thesis calendar.
pub const THESIS_WEEKS: usize = 14;

/// Upper bound on calendar length; a thesis never runs longer than a year.
pub const MAX_WEEKS: usize = 52;

const ALL_DAYS: u8 = 0b0111_1111;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CalendarError {
    #[error("calendar must contain at least one week")]
    NoWeeks,

    #[error("calendar spans {weeks} weeks, more than a year")]
    TooManyWeeks { weeks: usize },

    #[error("project end {end} is before start {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("week label cannot be empty")]
    EmptyLabel,

    #[error("day mask {mask:#010b} uses bits beyond the seven day slots")]
    InvalidDayMask { mask: u8 },
}

//
// ─── WEEK ──────────────────────────────────────────────────────────────────────
//

/// One week bucket of the chart: a display label and which of its seven day
/// slots are usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekDefinition {
    label: String,
    day_mask: u8,
}

impl WeekDefinition {
    /// Week with all seven day slots usable.
    ///
    /// # Errors
    ///
    /// Returns `CalendarError::EmptyLabel` if the label is blank.
    pub fn full(label: impl Into<String>) -> Result<Self, CalendarError> {
        Self::with_mask(label, ALL_DAYS)
    }

    /// Week whose first `valid_days` slots are usable and the rest are not.
    ///
    /// # Errors
    ///
    /// Returns `CalendarError::EmptyLabel` if the label is blank.
    pub fn truncated(label: impl Into<String>, valid_days: DayIndex) -> Result<Self, CalendarError> {
        let valid_days = valid_days.min(DAYS_PER_WEEK);
        let mask = if valid_days == DAYS_PER_WEEK {
            ALL_DAYS
        } else {
            (1_u8 << valid_days) - 1
        };
        Self::with_mask(label, mask)
    }

    /// Week with an explicit bit mask of usable slots (bit 0 = Monday).
    ///
    /// # Errors
    ///
    /// Returns `CalendarError::EmptyLabel` for a blank label and
    /// `CalendarError::InvalidDayMask` if bit 7 is set.
    pub fn with_mask(label: impl Into<String>, day_mask: u8) -> Result<Self, CalendarError> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(CalendarError::EmptyLabel);
        }
        if day_mask & !ALL_DAYS != 0 {
            return Err(CalendarError::InvalidDayMask { mask: day_mask });
        }
        Ok(Self {
            label: label.trim().to_owned(),
            day_mask,
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn day_mask(&self) -> u8 {
        self.day_mask
    }

    #[must_use]
    pub fn is_day_valid(&self, day: DayIndex) -> bool {
        day < DAYS_PER_WEEK && self.day_mask & (1 << day) != 0
    }

    #[must_use]
    pub fn valid_day_count(&self) -> u32 {
        self.day_mask.count_ones()
    }
}

//
// ─── CALENDAR ──────────────────────────────────────────────────────────────────
//

/// The ordered week buckets a plan is laid out over.
///
/// A calendar may be anchored to a real start date (the Monday of the first
/// week), which lets callers locate "today" on the chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    anchor: Option<NaiveDate>,
    weeks: Vec<WeekDefinition>,
}

impl Calendar {
    /// Build an undated calendar from explicit week definitions.
    ///
    /// # Errors
    ///
    /// Returns `CalendarError::NoWeeks` or `CalendarError::TooManyWeeks` if the
    /// week count is out of range.
    pub fn new(weeks: Vec<WeekDefinition>) -> Result<Self, CalendarError> {
        Self::build(None, weeks)
    }

    /// Rehydrate a calendar, optionally anchored at the Monday of week 0.
    ///
    /// Anchors that are not Mondays are snapped back to the preceding Monday.
    ///
    /// # Errors
    ///
    /// Same as [`Calendar::new`].
    pub fn from_persisted(
        anchor: Option<NaiveDate>,
        weeks: Vec<WeekDefinition>,
    ) -> Result<Self, CalendarError> {
        Self::build(anchor.map(monday_of), weeks)
    }

    fn build(anchor: Option<NaiveDate>, weeks: Vec<WeekDefinition>) -> Result<Self, CalendarError> {
        if weeks.is_empty() {
            return Err(CalendarError::NoWeeks);
        }
        if weeks.len() > MAX_WEEKS {
            return Err(CalendarError::TooManyWeeks { weeks: weeks.len() });
        }
        Ok(Self { anchor, weeks })
    }

    /// The standard 14-week thesis calendar. The project ends on the second
    /// day of the final week, so week 13 only has day slots 0 and 1.
    #[must_use]
    pub fn default_thesis() -> Self {
        let mut weeks = Vec::with_capacity(THESIS_WEEKS);
        for idx in 0..THESIS_WEEKS {
            let label = format!("Week {}", idx + 1);
            let week = if idx + 1 == THESIS_WEEKS {
                WeekDefinition::truncated(label, 2)
            } else {
                WeekDefinition::full(label)
            };
            // Labels are never blank and masks never overflow here.
            if let Ok(week) = week {
                weeks.push(week);
            }
        }
        Self {
            anchor: None,
            weeks,
        }
    }

    /// Lay weeks out from `start` to `end` inclusive.
    ///
    /// Week 0 begins on the Monday on or before `start`. Slots before `start`
    /// and after `end` are marked invalid. Labels read `dd/mm - dd/mm`.
    ///
    /// # Errors
    ///
    /// Returns `CalendarError::EndBeforeStart` if the range is inverted and
    /// `CalendarError::TooManyWeeks` if it spans more than [`MAX_WEEKS`].
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, CalendarError> {
        if end < start {
            return Err(CalendarError::EndBeforeStart { start, end });
        }
        let anchor = monday_of(start);
        let span_days = (end - anchor).num_days();
        let week_count = usize::try_from(span_days / 7 + 1).unwrap_or(usize::MAX);
        if week_count > MAX_WEEKS {
            return Err(CalendarError::TooManyWeeks { weeks: week_count });
        }

        let mut weeks = Vec::with_capacity(week_count);
        for week in 0..week_count {
            let week_start = anchor + Duration::weeks(i64::try_from(week).unwrap_or(0));
            let week_end = week_start + Duration::days(6);
            let mut mask = 0_u8;
            for day in 0..DAYS_PER_WEEK {
                let date = week_start + Duration::days(i64::from(day));
                if date >= start && date <= end {
                    mask |= 1 << day;
                }
            }
            let label = format!(
                "{} - {}",
                week_start.format("%d/%m"),
                week_end.format("%d/%m")
            );
            weeks.push(WeekDefinition::with_mask(label, mask)?);
        }

        Ok(Self {
            anchor: Some(anchor),
            weeks,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    #[must_use]
    pub fn weeks(&self) -> &[WeekDefinition] {
        &self.weeks
    }

    #[must_use]
    pub fn week(&self, week: WeekIndex) -> Option<&WeekDefinition> {
        self.weeks.get(usize::from(week))
    }

    #[must_use]
    pub fn contains_week(&self, week: WeekIndex) -> bool {
        usize::from(week) < self.weeks.len()
    }

    /// Monday of week 0, when the calendar is dated.
    #[must_use]
    pub fn anchor(&self) -> Option<NaiveDate> {
        self.anchor
    }

    /// Whether the (week, day) slot exists and is usable.
    #[must_use]
    pub fn is_day_valid(&self, week: WeekIndex, day: DayIndex) -> bool {
        self.week(week).is_some_and(|w| w.is_day_valid(day))
    }

    /// Date of a slot, when the calendar is dated and the week exists.
    #[must_use]
    pub fn date_of(&self, week: WeekIndex, day: DayIndex) -> Option<NaiveDate> {
        if !self.contains_week(week) || day >= DAYS_PER_WEEK {
            return None;
        }
        let anchor = self.anchor?;
        Some(anchor + Duration::days(i64::from(week) * 7 + i64::from(day)))
    }

    /// Position of `date` on the chart, if the calendar is dated and the date
    /// falls inside one of its weeks.
    #[must_use]
    pub fn locate(&self, date: NaiveDate) -> Option<(WeekIndex, DayIndex)> {
        let anchor = self.anchor?;
        let offset = (date - anchor).num_days();
        if offset < 0 {
            return None;
        }
        let week = usize::try_from(offset / 7).ok()?;
        if week >= self.weeks.len() {
            return None;
        }
        let day = DayIndex::try_from(offset % 7).ok()?;
        Some((WeekIndex::try_from(week).ok()?, day))
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::default_thesis()
    }
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
