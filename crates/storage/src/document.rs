//! Serialized shape of a plan.
//!
//! Plans are stored as a single JSON document so the domain types stay free of
//! storage concerns. Converting back always goes through the domain
//! constructors, so a tampered document cannot smuggle in a broken plan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use thesis_core::model::{
    Activity, ActivityDraft, ActivityError, ActivityId, Calendar, CalendarError, DayIndex, Owner,
    Plan, PlanError, Task, TaskError, TaskId, WeekDefinition, WeekIndex,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("invalid plan document: {0}")]
    Json(String),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub calendar: CalendarDocument,
    pub tasks: Vec<TaskDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<NaiveDate>,
    pub weeks: Vec<WeekDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekDocument {
    pub label: String,
    pub day_mask: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub activities: Vec<ActivityDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDocument {
    pub id: ActivityId,
    pub name: String,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub milestone: bool,
    pub weeks: Vec<WeekIndex>,
    pub first_day_offset: DayIndex,
    pub last_day_offset: DayIndex,
}

impl PlanDocument {
    #[must_use]
    pub fn from_plan(plan: &Plan) -> Self {
        let calendar = plan.calendar();
        Self {
            calendar: CalendarDocument {
                anchor: calendar.anchor(),
                weeks: calendar
                    .weeks()
                    .iter()
                    .map(|w| WeekDocument {
                        label: w.label().to_owned(),
                        day_mask: w.day_mask(),
                    })
                    .collect(),
            },
            tasks: plan
                .tasks()
                .iter()
                .map(|task| TaskDocument {
                    id: task.id(),
                    name: task.name().to_owned(),
                    activities: task.activities().iter().map(ActivityDocument::from_activity).collect(),
                })
                .collect(),
        }
    }

    /// Convert the document back into a domain `Plan` at the given version.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError` if any part fails domain validation.
    pub fn into_plan(self, version: u64) -> Result<Plan, DocumentError> {
        let weeks = self
            .calendar
            .weeks
            .into_iter()
            .map(|w| WeekDefinition::with_mask(w.label, w.day_mask))
            .collect::<Result<Vec<_>, _>>()?;
        let calendar = Calendar::from_persisted(self.calendar.anchor, weeks)?;

        let mut tasks = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            let activities = task
                .activities
                .into_iter()
                .map(ActivityDocument::into_activity)
                .collect::<Result<Vec<_>, _>>()?;
            tasks.push(Task::with_activities(task.id, task.name, activities)?);
        }

        Ok(Plan::from_persisted(calendar, tasks, version)?)
    }

    /// # Errors
    ///
    /// Returns `DocumentError::Json` if the text is not a plan document.
    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(raw).map_err(|e| DocumentError::Json(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns `DocumentError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string(self).map_err(|e| DocumentError::Json(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns `DocumentError::Json` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::Json(e.to_string()))
    }
}

impl ActivityDocument {
    #[must_use]
    pub fn from_activity(activity: &Activity) -> Self {
        Self {
            id: activity.id(),
            name: activity.name().to_owned(),
            owner: activity.owner(),
            milestone: activity.is_milestone(),
            weeks: activity.weeks().to_vec(),
            first_day_offset: activity.first_day_offset(),
            last_day_offset: activity.last_day_offset(),
        }
    }

    /// # Errors
    ///
    /// Returns `ActivityError` if the stored fields fail validation.
    pub fn into_activity(self) -> Result<Activity, ActivityError> {
        ActivityDraft {
            name: self.name,
            owner: self.owner,
            milestone: self.milestone,
            weeks: self.weeks,
            first_day_offset: self.first_day_offset,
            last_day_offset: self.last_day_offset,
        }
        .validate(self.id)
    }
}
