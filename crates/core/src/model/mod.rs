mod activity;
mod calendar;
mod completion;
mod ids;
mod plan;
mod task;

pub use activity::{Activity, ActivityDraft, ActivityError, Owner};
pub use calendar::{
    Calendar, CalendarError, DAYS_PER_WEEK, DayIndex, MAX_WEEKS, THESIS_WEEKS, WeekDefinition,
    WeekIndex,
};
pub use completion::{CellKey, CompletionError, CompletionSet};
pub use ids::{ActivityId, ParseIdError, PlanId, TaskId};
pub use plan::{Plan, PlanError};
pub use task::{Task, TaskError};
