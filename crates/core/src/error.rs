use thiserror::Error;

use crate::model::{ActivityError, CalendarError, CompletionError, PlanError, TaskError};

/// Umbrella error for callers that do not care which domain rule failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Task(#[from] TaskError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Calendar, Plan, TaskId};
    use chrono::NaiveDate;

    fn rename_first(plan: &mut Plan, name: &str) -> Result<(), Error> {
        plan.rename_task(TaskId::new(1), name)?;
        Ok(())
    }

    fn dated(start: NaiveDate, end: NaiveDate) -> Result<Calendar, Error> {
        Ok(Calendar::from_dates(start, end)?)
    }

    #[test]
    fn domain_errors_convert_into_umbrella() {
        let mut plan = Plan::default_thesis();
        assert!(matches!(
            rename_first(&mut plan, "  "),
            Err(Error::Plan(PlanError::Task(TaskError::EmptyName)))
        ));

        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(matches!(
            dated(start, end),
            Err(Error::Calendar(CalendarError::EndBeforeStart { .. }))
        ));
    }
}
