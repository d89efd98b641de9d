use std::collections::HashSet;

use thiserror::Error;

use crate::model::activity::{Activity, ActivityDraft, ActivityError, Owner};
use crate::model::calendar::{Calendar, WeekIndex};
use crate::model::ids::{ActivityId, TaskId};
use crate::model::task::{Task, TaskError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlanError {
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("unknown activity {0}")]
    UnknownActivity(ActivityId),

    #[error("task {0} already exists")]
    DuplicateTask(TaskId),

    #[error("activity {0} already exists")]
    DuplicateActivity(ActivityId),

    #[error("activity {activity} uses week {week}, outside the {weeks}-week calendar")]
    WeekOutsideCalendar {
        activity: ActivityId,
        week: WeekIndex,
        weeks: usize,
    },

    #[error("position {index} is out of range for {len} entries")]
    PositionOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Activity(#[from] ActivityError),
}

//
// ─── PLAN ──────────────────────────────────────────────────────────────────────
//

/// The canonical, versioned list of tasks and activities for one thesis.
///
/// Every edit either succeeds and bumps `version`, or fails and leaves the
/// plan untouched. Activity ids are unique across all tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    calendar: Calendar,
    tasks: Vec<Task>,
    version: u64,
}

impl Plan {
    /// An empty plan over the given calendar.
    #[must_use]
    pub fn new(calendar: Calendar) -> Self {
        Self {
            calendar,
            tasks: Vec::new(),
            version: 0,
        }
    }

    /// Rehydrate a plan from storage, re-checking cross-entity invariants.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` on duplicate ids or weeks outside the calendar.
    pub fn from_persisted(
        calendar: Calendar,
        tasks: Vec<Task>,
        version: u64,
    ) -> Result<Self, PlanError> {
        let mut task_ids = HashSet::new();
        let mut activity_ids = HashSet::new();
        for task in &tasks {
            if !task_ids.insert(task.id()) {
                return Err(PlanError::DuplicateTask(task.id()));
            }
            for activity in task.activities() {
                if !activity_ids.insert(activity.id()) {
                    return Err(PlanError::DuplicateActivity(activity.id()));
                }
                check_weeks(&calendar, activity)?;
            }
        }
        Ok(Self {
            calendar,
            tasks,
            version,
        })
    }

    #[must_use]
    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    #[must_use]
    pub fn activity(&self, id: ActivityId) -> Option<&Activity> {
        self.activities().find(|a| a.id() == id)
    }

    /// Every activity in chart order.
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.tasks.iter().flat_map(Task::activities)
    }

    /// The task that owns the given activity.
    #[must_use]
    pub fn task_of(&self, id: ActivityId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.activity(id).is_some())
    }

    #[must_use]
    pub fn next_task_id(&self) -> TaskId {
        TaskId::new(self.tasks.iter().map(|t| t.id().value()).max().unwrap_or(0) + 1)
    }

    #[must_use]
    pub fn next_activity_id(&self) -> ActivityId {
        ActivityId::new(self.activities().map(|a| a.id().value()).max().unwrap_or(0) + 1)
    }

    // ─── Task edits ───────────────────────────────────────────────────────────

    /// Append a new, empty task.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::DuplicateTask` or a name validation error.
    pub fn add_task(&mut self, id: TaskId, name: impl Into<String>) -> Result<(), PlanError> {
        if self.task(id).is_some() {
            return Err(PlanError::DuplicateTask(id));
        }
        let task = Task::new(id, name)?;
        self.tasks.push(task);
        self.bump();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `PlanError::UnknownTask` or a name validation error.
    pub fn rename_task(&mut self, id: TaskId, name: impl Into<String>) -> Result<(), PlanError> {
        let task = self.task_mut(id)?;
        task.rename(name.into())?;
        self.bump();
        Ok(())
    }

    /// Remove a task and all of its activities, returning it.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::UnknownTask` if the task does not exist.
    pub fn remove_task(&mut self, id: TaskId) -> Result<Task, PlanError> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id() == id)
            .ok_or(PlanError::UnknownTask(id))?;
        let task = self.tasks.remove(idx);
        self.bump();
        Ok(task)
    }

    /// Move the task at position `from` to position `to`.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::PositionOutOfRange` if either index is invalid.
    pub fn move_task(&mut self, from: usize, to: usize) -> Result<(), PlanError> {
        move_entry(&mut self.tasks, from, to)?;
        self.bump();
        Ok(())
    }

    // ─── Activity edits ───────────────────────────────────────────────────────

    /// Append an activity to a task.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` if the task is unknown, the activity id is taken,
    /// or the activity uses weeks outside the calendar.
    pub fn add_activity(&mut self, task_id: TaskId, activity: Activity) -> Result<(), PlanError> {
        if self.activity(activity.id()).is_some() {
            return Err(PlanError::DuplicateActivity(activity.id()));
        }
        check_weeks(&self.calendar, &activity)?;
        self.task_mut(task_id)?.activities_mut().push(activity);
        self.bump();
        Ok(())
    }

    /// Validate a draft with the next free id and append it to a task.
    ///
    /// # Errors
    ///
    /// Same as [`Plan::add_activity`], plus draft validation errors.
    pub fn add_activity_draft(
        &mut self,
        task_id: TaskId,
        draft: ActivityDraft,
    ) -> Result<ActivityId, PlanError> {
        let activity = draft.validate(self.next_activity_id())?;
        let id = activity.id();
        self.add_activity(task_id, activity)?;
        Ok(id)
    }

    /// Replace the activity with the same id, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::UnknownActivity` or `PlanError::WeekOutsideCalendar`.
    pub fn replace_activity(&mut self, activity: Activity) -> Result<Activity, PlanError> {
        check_weeks(&self.calendar, &activity)?;
        let id = activity.id();
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.activity(id).is_some())
            .ok_or(PlanError::UnknownActivity(id))?;
        let pos = task
            .position_of(id)
            .ok_or(PlanError::UnknownActivity(id))?;
        let previous = std::mem::replace(&mut task.activities_mut()[pos], activity);
        self.bump();
        Ok(previous)
    }

    /// Remove an activity, returning it.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::UnknownActivity` if no task holds it.
    pub fn remove_activity(&mut self, id: ActivityId) -> Result<Activity, PlanError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.activity(id).is_some())
            .ok_or(PlanError::UnknownActivity(id))?;
        let pos = task
            .position_of(id)
            .ok_or(PlanError::UnknownActivity(id))?;
        let removed = task.activities_mut().remove(pos);
        self.bump();
        Ok(removed)
    }

    /// Reorder activities inside one task.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::UnknownTask` or `PlanError::PositionOutOfRange`.
    pub fn move_activity(&mut self, task_id: TaskId, from: usize, to: usize) -> Result<(), PlanError> {
        move_entry(self.task_mut(task_id)?.activities_mut(), from, to)?;
        self.bump();
        Ok(())
    }

    /// Swap in a new calendar, e.g. once real project dates are known.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::WeekOutsideCalendar` if an activity would no longer fit.
    pub fn set_calendar(&mut self, calendar: Calendar) -> Result<(), PlanError> {
        for activity in self.activities() {
            check_weeks(&calendar, activity)?;
        }
        self.calendar = calendar;
        self.bump();
        Ok(())
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, PlanError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or(PlanError::UnknownTask(id))
    }

    fn bump(&mut self) {
        self.version = self.version.saturating_add(1);
    }

    /// The stock thesis plan over the 14-week calendar.
    ///
    /// # Panics
    ///
    /// Never in practice: the seed data is fixed and satisfies every invariant.
    #[must_use]
    pub fn default_thesis() -> Self {
        build_default_thesis().expect("default thesis plan is valid")
    }
}

fn build_default_thesis() -> Result<Plan, PlanError> {
    #[allow(clippy::type_complexity)]
    let seed: [(&str, &[(&str, Owner, bool, &[WeekIndex], u8, u8)]); 5] = [
        (
            "Planning",
            &[
                ("Topic definition", Owner::Shared, false, &[0], 0, 4),
                ("Project proposal", Owner::Student, true, &[0, 1], 2, 4),
            ],
        ),
        (
            "Research",
            &[
                ("State of the art", Owner::Student, false, &[1, 2, 3], 3, 4),
                ("Methodology design", Owner::Student, false, &[3, 4], 0, 2),
                ("Methodology sign-off", Owner::Supervisor, true, &[4], 3, 4),
            ],
        ),
        (
            "Development",
            &[
                ("Implementation", Owner::Student, false, &[5, 6, 7, 8], 0, 4),
                ("Experiments", Owner::Student, false, &[8, 9, 10], 3, 2),
            ],
        ),
        (
            "Writing",
            &[
                ("Draft chapters", Owner::Student, false, &[9, 10, 11], 0, 4),
                ("Supervisor review", Owner::Supervisor, false, &[11, 12], 2, 3),
                ("Final submission", Owner::Student, true, &[12, 13], 4, 1),
            ],
        ),
        (
            "Defense",
            &[("Presentation rehearsal", Owner::Shared, false, &[12, 13], 0, 1)],
        ),
    ];

    let mut plan = Plan::new(Calendar::default_thesis());
    for (name, activities) in seed {
        let task_id = plan.next_task_id();
        plan.add_task(task_id, name)?;
        for (act_name, owner, milestone, weeks, first, last) in activities {
            let draft = ActivityDraft::new(*act_name, weeks.to_vec(), *first, *last)
                .owned_by(*owner)
                .milestone(*milestone);
            plan.add_activity_draft(task_id, draft)?;
        }
    }
    plan.version = 0;
    Ok(plan)
}

fn check_weeks(calendar: &Calendar, activity: &Activity) -> Result<(), PlanError> {
    match activity.weeks().iter().find(|w| !calendar.contains_week(**w)) {
        Some(week) => Err(PlanError::WeekOutsideCalendar {
            activity: activity.id(),
            week: *week,
            weeks: calendar.len(),
        }),
        None => Ok(()),
    }
}

fn move_entry<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), PlanError> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(PlanError::PositionOutOfRange { index, len });
        }
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_seed_builds_from_fixed_data() -> Result<(), PlanError> {
        let plan = build_default_thesis()?;
        assert_eq!(plan.version(), 0);
        assert_eq!(plan.tasks().len(), 5);
        assert_eq!(plan, Plan::default_thesis());
        Ok(())
    }

    fn plan_with_task() -> Plan {
        let mut plan = Plan::new(Calendar::default_thesis());
        plan.add_task(TaskId::new(1), "Writing").unwrap();
        plan
    }

    fn act(id: u64, weeks: Vec<WeekIndex>) -> Activity {
        Activity::new(ActivityId::new(id), format!("A{id}"), weeks, 0, 6).unwrap()
    }

    #[test]
    fn default_thesis_is_consistent() {
        let plan = Plan::default_thesis();
        assert_eq!(plan.version(), 0);
        assert_eq!(plan.tasks().len(), 5);
        assert_eq!(plan.activities().count(), 11);
        assert_eq!(plan.next_activity_id(), ActivityId::new(12));
        assert!(plan.activities().any(Activity::is_milestone));
    }

    #[test]
    fn edits_bump_version() {
        let mut plan = plan_with_task();
        assert_eq!(plan.version(), 1);
        plan.add_activity(TaskId::new(1), act(1, vec![2])).unwrap();
        plan.rename_task(TaskId::new(1), "Thesis writing").unwrap();
        assert_eq!(plan.version(), 3);
        assert_eq!(plan.task(TaskId::new(1)).unwrap().name(), "Thesis writing");
    }

    #[test]
    fn failed_edits_leave_plan_untouched() {
        let mut plan = plan_with_task();
        plan.add_activity(TaskId::new(1), act(1, vec![2])).unwrap();
        let before = plan.clone();

        assert_eq!(
            plan.add_task(TaskId::new(1), "Again").unwrap_err(),
            PlanError::DuplicateTask(TaskId::new(1))
        );
        assert_eq!(
            plan.add_activity(TaskId::new(1), act(1, vec![3])).unwrap_err(),
            PlanError::DuplicateActivity(ActivityId::new(1))
        );
        assert_eq!(
            plan.add_activity(TaskId::new(9), act(2, vec![3])).unwrap_err(),
            PlanError::UnknownTask(TaskId::new(9))
        );
        assert_eq!(
            plan.add_activity(TaskId::new(1), act(3, vec![13, 14])).unwrap_err(),
            PlanError::WeekOutsideCalendar {
                activity: ActivityId::new(3),
                week: 14,
                weeks: 14
            }
        );
        assert_eq!(
            plan.rename_task(TaskId::new(1), " ").unwrap_err(),
            PlanError::Task(TaskError::EmptyName)
        );
        assert_eq!(plan, before);
    }

    #[test]
    fn replace_keeps_position() {
        let mut plan = plan_with_task();
        plan.add_activity(TaskId::new(1), act(1, vec![1])).unwrap();
        plan.add_activity(TaskId::new(1), act(2, vec![2])).unwrap();

        let updated = Activity::new(ActivityId::new(1), "Renamed", vec![1, 2], 3, 3).unwrap();
        let previous = plan.replace_activity(updated).unwrap();
        assert_eq!(previous.name(), "A1");

        let task = plan.task(TaskId::new(1)).unwrap();
        assert_eq!(task.activities()[0].name(), "Renamed");
        assert_eq!(task.activities()[1].id(), ActivityId::new(2));
    }

    #[test]
    fn replace_unknown_activity_fails() {
        let mut plan = plan_with_task();
        let err = plan.replace_activity(act(5, vec![1])).unwrap_err();
        assert_eq!(err, PlanError::UnknownActivity(ActivityId::new(5)));
    }

    #[test]
    fn remove_and_reorder() {
        let mut plan = plan_with_task();
        for id in 1..=3 {
            plan.add_activity(TaskId::new(1), act(id, vec![1])).unwrap();
        }
        plan.move_activity(TaskId::new(1), 0, 2).unwrap();
        let order: Vec<u64> = plan
            .task(TaskId::new(1))
            .unwrap()
            .activities()
            .iter()
            .map(|a| a.id().value())
            .collect();
        assert_eq!(order, vec![2, 3, 1]);

        let removed = plan.remove_activity(ActivityId::new(3)).unwrap();
        assert_eq!(removed.id(), ActivityId::new(3));
        assert!(plan.activity(ActivityId::new(3)).is_none());

        assert_eq!(
            plan.move_activity(TaskId::new(1), 0, 5).unwrap_err(),
            PlanError::PositionOutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn move_and_remove_tasks() {
        let mut plan = plan_with_task();
        plan.add_task(TaskId::new(2), "Defense").unwrap();
        plan.move_task(1, 0).unwrap();
        assert_eq!(plan.tasks()[0].id(), TaskId::new(2));

        let removed = plan.remove_task(TaskId::new(1)).unwrap();
        assert_eq!(removed.name(), "Writing");
        assert_eq!(plan.tasks().len(), 1);
        assert_eq!(
            plan.remove_task(TaskId::new(1)).unwrap_err(),
            PlanError::UnknownTask(TaskId::new(1))
        );
    }

    #[test]
    fn add_activity_draft_assigns_next_id() {
        let mut plan = plan_with_task();
        plan.add_activity(TaskId::new(1), act(7, vec![1])).unwrap();
        let id = plan
            .add_activity_draft(TaskId::new(1), ActivityDraft::new("New", vec![2], 0, 3))
            .unwrap();
        assert_eq!(id, ActivityId::new(8));
        assert_eq!(plan.task_of(id).unwrap().id(), TaskId::new(1));
    }

    #[test]
    fn from_persisted_rejects_duplicate_activity_ids() {
        let calendar = Calendar::default_thesis();
        let t1 = Task::with_activities(TaskId::new(1), "A", vec![act(1, vec![1])]).unwrap();
        let t2 = Task::with_activities(TaskId::new(2), "B", vec![act(1, vec![2])]).unwrap();
        let err = Plan::from_persisted(calendar, vec![t1, t2], 4).unwrap_err();
        assert_eq!(err, PlanError::DuplicateActivity(ActivityId::new(1)));
    }

    #[test]
    fn set_calendar_rejects_shorter_calendar() {
        let mut plan = Plan::default_thesis();
        let short = Calendar::new(vec![
            crate::model::WeekDefinition::full("Only").unwrap(),
        ])
        .unwrap();
        let err = plan.set_calendar(short).unwrap_err();
        assert!(matches!(err, PlanError::WeekOutsideCalendar { .. }));
        assert_eq!(plan.version(), 0);
    }
}
