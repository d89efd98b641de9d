use thesis_core::model::{
    Activity, ActivityDraft, ActivityId, Calendar, CellKey, CompletionSet, DayIndex, Plan, TaskId,
    WeekIndex,
};
use thesis_core::progress::{self, ProgressSummary};

use crate::error::TimelineError;

/// Everything a user can do to the timeline.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TimelineAction {
    ToggleCell(CellKey),
    SetCell { key: CellKey, done: bool },
    ClearCompletion,
    ImportCompletion(CompletionSet),
    AddTask { name: String },
    RenameTask { task: TaskId, name: String },
    RemoveTask(TaskId),
    MoveTask { from: usize, to: usize },
    AddActivity { task: TaskId, draft: ActivityDraft },
    UpdateActivity { activity: ActivityId, draft: ActivityDraft },
    RemoveActivity(ActivityId),
    MoveActivity { task: TaskId, from: usize, to: usize },
    SetCalendar(Calendar),
}

/// What an applied action did, as reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Unchanged,
    Cell { key: CellKey, done: bool },
    CompletionReplaced { cells: usize, dropped: usize },
    TaskAdded(TaskId),
    ActivityAdded(ActivityId),
    PlanEdited { version: u64, pruned: usize },
}

/// Which parts of the state need to be written back after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Persist {
    Nothing,
    Cell { key: CellKey, done: bool },
    Completion,
    Plan,
    PlanAndCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reduced {
    pub outcome: ActionOutcome,
    pub persist: Persist,
}

/// The plan plus its completion set: the single source of truth the chart
/// renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineState {
    plan: Plan,
    completion: CompletionSet,
}

impl TimelineState {
    #[must_use]
    pub fn new(plan: Plan, completion: CompletionSet) -> Self {
        Self { plan, completion }
    }

    #[must_use]
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    #[must_use]
    pub fn completion(&self) -> &CompletionSet {
        &self.completion
    }

    #[must_use]
    pub fn is_done(&self, key: &CellKey) -> bool {
        self.completion.contains(key)
    }

    /// See [`progress::is_day_in_span`]. Unknown activities are never in span.
    #[must_use]
    pub fn is_day_in_span(&self, activity: ActivityId, week: WeekIndex, day: DayIndex) -> bool {
        self.plan
            .activity(activity)
            .is_some_and(|a| progress::is_day_in_span(self.plan.calendar(), a, week, day))
    }

    /// # Errors
    ///
    /// Returns `TimelineError::UnknownActivity` if the id is not in the plan.
    pub fn activity_progress(&self, activity: ActivityId) -> Result<f64, TimelineError> {
        let activity = self.activity(activity)?;
        Ok(progress::compute_progress(
            self.plan.calendar(),
            activity,
            &self.completion,
        ))
    }

    /// # Errors
    ///
    /// Returns `TimelineError::UnknownActivity` if the id is not in the plan.
    pub fn activity_summary(&self, activity: ActivityId) -> Result<ProgressSummary, TimelineError> {
        let activity = self.activity(activity)?;
        Ok(progress::activity_summary(
            self.plan.calendar(),
            activity,
            &self.completion,
        ))
    }

    /// Pooled progress of a task, if it exists.
    #[must_use]
    pub fn task_summary(&self, task: TaskId) -> Option<ProgressSummary> {
        self.plan
            .task(task)
            .map(|t| progress::task_summary(self.plan.calendar(), t, &self.completion))
    }

    #[must_use]
    pub fn plan_summary(&self) -> ProgressSummary {
        progress::plan_summary(&self.plan, &self.completion)
    }

    /// Drop completed cells that no longer fall inside any activity's span.
    /// Returns how many were dropped.
    pub fn prune_completion(&mut self) -> usize {
        let plan = &self.plan;
        self.completion.retain(|key| {
            plan.activity(key.activity()).is_some_and(|a| {
                progress::is_day_in_span(plan.calendar(), a, key.week(), key.day())
            })
        })
    }

    fn activity(&self, id: ActivityId) -> Result<&Activity, TimelineError> {
        self.plan
            .activity(id)
            .ok_or(TimelineError::UnknownActivity(id))
    }

    fn check_cell(&self, key: CellKey) -> Result<(), TimelineError> {
        let activity = self.activity(key.activity())?;
        if !progress::is_day_in_span(self.plan.calendar(), activity, key.week(), key.day()) {
            return Err(TimelineError::CellOutsideSpan(key));
        }
        Ok(())
    }

    /// Apply one action. On error the state is left as it was.
    pub(crate) fn reduce(&mut self, action: TimelineAction) -> Result<Reduced, TimelineError> {
        match action {
            TimelineAction::ToggleCell(key) => {
                self.check_cell(key)?;
                let done = self.completion.toggle(key);
                Ok(cell_changed(key, done))
            }
            TimelineAction::SetCell { key, done } => {
                self.check_cell(key)?;
                if self.completion.set(key, done) {
                    Ok(cell_changed(key, done))
                } else {
                    Ok(unchanged())
                }
            }
            TimelineAction::ClearCompletion => {
                if self.completion.is_empty() {
                    return Ok(unchanged());
                }
                let dropped = self.completion.len();
                self.completion.clear();
                Ok(Reduced {
                    outcome: ActionOutcome::CompletionReplaced { cells: 0, dropped },
                    persist: Persist::Completion,
                })
            }
            TimelineAction::ImportCompletion(imported) => {
                self.completion = imported;
                let dropped = self.prune_completion();
                Ok(Reduced {
                    outcome: ActionOutcome::CompletionReplaced {
                        cells: self.completion.len(),
                        dropped,
                    },
                    persist: Persist::Completion,
                })
            }
            TimelineAction::AddTask { name } => {
                let id = self.plan.next_task_id();
                self.plan.add_task(id, name)?;
                Ok(self.plan_changed(ActionOutcome::TaskAdded(id)))
            }
            TimelineAction::RenameTask { task, name } => {
                self.plan.rename_task(task, name)?;
                Ok(self.plan_edited())
            }
            TimelineAction::RemoveTask(task) => {
                self.plan.remove_task(task)?;
                Ok(self.plan_edited())
            }
            TimelineAction::MoveTask { from, to } => {
                self.plan.move_task(from, to)?;
                Ok(self.plan_edited())
            }
            TimelineAction::AddActivity { task, draft } => {
                let id = self.plan.add_activity_draft(task, draft)?;
                Ok(self.plan_changed(ActionOutcome::ActivityAdded(id)))
            }
            TimelineAction::UpdateActivity { activity, draft } => {
                let updated = draft.validate(activity)?;
                self.plan.replace_activity(updated)?;
                Ok(self.plan_edited())
            }
            TimelineAction::RemoveActivity(activity) => {
                self.plan.remove_activity(activity)?;
                Ok(self.plan_edited())
            }
            TimelineAction::MoveActivity { task, from, to } => {
                self.plan.move_activity(task, from, to)?;
                Ok(self.plan_edited())
            }
            TimelineAction::SetCalendar(calendar) => {
                self.plan.set_calendar(calendar)?;
                Ok(self.plan_edited())
            }
        }
    }

    fn plan_edited(&mut self) -> Reduced {
        self.plan_changed(ActionOutcome::PlanEdited {
            version: 0,
            pruned: 0,
        })
    }

    /// Plan edits can shrink spans, so stale cells are pruned alongside.
    fn plan_changed(&mut self, outcome: ActionOutcome) -> Reduced {
        let pruned = self.prune_completion();
        let outcome = match outcome {
            ActionOutcome::PlanEdited { .. } => ActionOutcome::PlanEdited {
                version: self.plan.version(),
                pruned,
            },
            other => other,
        };
        let persist = if pruned > 0 {
            Persist::PlanAndCompletion
        } else {
            Persist::Plan
        };
        Reduced { outcome, persist }
    }
}

fn cell_changed(key: CellKey, done: bool) -> Reduced {
    Reduced {
        outcome: ActionOutcome::Cell { key, done },
        persist: Persist::Cell { key, done },
    }
}

fn unchanged() -> Reduced {
    Reduced {
        outcome: ActionOutcome::Unchanged,
        persist: Persist::Nothing,
    }
}
