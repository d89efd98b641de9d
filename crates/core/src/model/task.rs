use thiserror::Error;

use crate::model::activity::Activity;
use crate::model::ids::{ActivityId, TaskId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaskError {
    #[error("task name cannot be empty")]
    EmptyName,
}

/// A named group of activities, rendered as a section of the chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    name: String,
    activities: Vec<Activity>,
}

impl Task {
    /// Creates an empty task.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::EmptyName` if name is empty or whitespace-only.
    pub fn new(id: TaskId, name: impl Into<String>) -> Result<Self, TaskError> {
        Self::with_activities(id, name, Vec::new())
    }

    /// Creates a task holding the given activities in order.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::EmptyName` if name is empty or whitespace-only.
    pub fn with_activities(
        id: TaskId,
        name: impl Into<String>,
        activities: Vec<Activity>,
    ) -> Result<Self, TaskError> {
        Ok(Self {
            id,
            name: validate_name(name.into())?,
            activities,
        })
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    #[must_use]
    pub fn activity(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id() == id)
    }

    pub(crate) fn position_of(&self, id: ActivityId) -> Option<usize> {
        self.activities.iter().position(|a| a.id() == id)
    }

    pub(crate) fn rename(&mut self, name: String) -> Result<(), TaskError> {
        self.name = validate_name(name)?;
        Ok(())
    }

    pub(crate) fn activities_mut(&mut self) -> &mut Vec<Activity> {
        &mut self.activities
    }
}

fn validate_name(name: String) -> Result<String, TaskError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TaskError::EmptyName);
    }
    Ok(trimmed.to_owned())
}
