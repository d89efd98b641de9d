//! Day-span membership and completion percentages for chart rows.
//!
//! Everything here is a pure query over a [`Calendar`], the plan's
//! activities and a borrowed [`CompletionSet`]. Nothing is mutated.

use serde::Serialize;

use crate::model::{
    Activity, Calendar, CellKey, CompletionSet, DAYS_PER_WEEK, DayIndex, Plan, Task, WeekIndex,
};

/// Whether the (week, day) cell belongs to the activity's span.
///
/// A cell is in the span when the week is one of the activity's weeks, the
/// calendar slot is usable, and the day respects the first-week lower bound
/// and the last-week upper bound. For single-week activities both bounds
/// apply to the same week.
#[must_use]
pub fn is_day_in_span(
    calendar: &Calendar,
    activity: &Activity,
    week: WeekIndex,
    day: DayIndex,
) -> bool {
    calendar.is_day_valid(week, day) && activity.spans_day(week, day)
}

/// Every cell of the activity's span in (week, day) order.
#[must_use]
pub fn activity_cells(calendar: &Calendar, activity: &Activity) -> Vec<CellKey> {
    activity
        .weeks()
        .iter()
        .flat_map(|&week| (0..DAYS_PER_WEEK).map(move |day| (week, day)))
        .filter(|&(week, day)| is_day_in_span(calendar, activity, week, day))
        .map(|(week, day)| CellKey::new(activity.id(), week, day))
        .collect()
}

/// Completion percentage of one activity, in `[0, 100]`.
///
/// Returns `0.0` when the span has no usable cells.
#[must_use]
pub fn compute_progress(
    calendar: &Calendar,
    activity: &Activity,
    completion: &CompletionSet,
) -> f64 {
    activity_summary(calendar, activity, completion).percent()
}

/// Completed / total cell counts for some part of the plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
}

impl ProgressSummary {
    /// `100 * completed / total`, or `0.0` for an empty span.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.completed as f64 / self.total as f64
    }

    /// Percentage rounded to a whole number, for display.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rounded_percent(&self) -> u8 {
        self.percent().round().clamp(0.0, 100.0) as u8
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total - self.completed
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            completed: self.completed + other.completed,
            total: self.total + other.total,
        }
    }
}

#[must_use]
pub fn activity_summary(
    calendar: &Calendar,
    activity: &Activity,
    completion: &CompletionSet,
) -> ProgressSummary {
    let cells = activity_cells(calendar, activity);
    let completed = cells.iter().filter(|key| completion.contains(key)).count();
    ProgressSummary {
        completed,
        total: cells.len(),
    }
}

/// Pools every cell of every activity in the task.
#[must_use]
pub fn task_summary(calendar: &Calendar, task: &Task, completion: &CompletionSet) -> ProgressSummary {
    task.activities()
        .iter()
        .map(|activity| activity_summary(calendar, activity, completion))
        .fold(ProgressSummary::default(), ProgressSummary::merge)
}

/// Pools every cell in the plan.
#[must_use]
pub fn plan_summary(plan: &Plan, completion: &CompletionSet) -> ProgressSummary {
    plan.tasks()
        .iter()
        .map(|task| task_summary(plan.calendar(), task, completion))
        .fold(ProgressSummary::default(), ProgressSummary::merge)
}

/// The last usable cell of the span, where a milestone is drawn.
#[must_use]
pub fn final_cell(calendar: &Calendar, activity: &Activity) -> Option<CellKey> {
    activity_cells(calendar, activity).pop()
}

/// Span cells strictly before `today` that are not yet done.
#[must_use]
pub fn cells_behind(
    calendar: &Calendar,
    activity: &Activity,
    completion: &CompletionSet,
    today: (WeekIndex, DayIndex),
) -> usize {
    activity_cells(calendar, activity)
        .into_iter()
        .filter(|key| (key.week(), key.day()) < today && !completion.contains(key))
        .count()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityId, Plan, TaskId};

    fn activity(weeks: Vec<WeekIndex>, first: DayIndex, last: DayIndex) -> Activity {
        Activity::new(ActivityId::new(7), "Experiments", weeks, first, last).unwrap()
    }

    fn sample_activities() -> Vec<Activity> {
        vec![
            activity(vec![0], 0, 6),
            activity(vec![1, 2], 4, 2),
            activity(vec![3, 4, 5], 6, 0),
            activity(vec![5], 2, 5),
            activity(vec![12, 13], 3, 4),
            activity(vec![13], 0, 6),
        ]
    }

    fn complete_all(calendar: &Calendar, activity: &Activity) -> CompletionSet {
        activity_cells(calendar, activity).into_iter().collect()
    }

    #[test]
    fn empty_completion_gives_zero() {
        let calendar = Calendar::default_thesis();
        for act in sample_activities() {
            assert!(compute_progress(&calendar, &act, &CompletionSet::new()).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn full_completion_gives_hundred() {
        let calendar = Calendar::default_thesis();
        for act in sample_activities() {
            let full = complete_all(&calendar, &act);
            assert!((compute_progress(&calendar, &act, &full) - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn weeks_outside_span_never_match() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![3, 4], 0, 6);
        for week in [0, 1, 2, 5, 13] {
            for day in 0..DAYS_PER_WEEK {
                assert!(!is_day_in_span(&calendar, &act, week, day));
            }
        }
    }

    #[test]
    fn two_week_span_respects_offsets() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![1, 2], 4, 2);
        assert!(!is_day_in_span(&calendar, &act, 1, 3));
        assert!(is_day_in_span(&calendar, &act, 1, 4));
        assert!(is_day_in_span(&calendar, &act, 2, 2));
        assert!(!is_day_in_span(&calendar, &act, 2, 3));
        assert_eq!(activity_cells(&calendar, &act).len(), 3 + 3);
    }

    // Single-week activities enforce the upper bound as well as the lower one.
    #[test]
    fn single_week_span_enforces_both_bounds() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![5], 2, 5);
        assert!(!is_day_in_span(&calendar, &act, 5, 6));
        assert!(!is_day_in_span(&calendar, &act, 5, 1));
        assert!(is_day_in_span(&calendar, &act, 5, 2));
        assert!(is_day_in_span(&calendar, &act, 5, 5));
        assert_eq!(activity_cells(&calendar, &act).len(), 4);
    }

    #[test]
    fn truncated_final_week_is_excluded() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![12, 13], 3, 4);
        assert!(is_day_in_span(&calendar, &act, 13, 0));
        assert!(is_day_in_span(&calendar, &act, 13, 1));
        for day in 2..DAYS_PER_WEEK {
            assert!(!is_day_in_span(&calendar, &act, 13, day));
        }

        // Week 12: days 3..=6, week 13: days 0..=1.
        let cells = activity_cells(&calendar, &act);
        assert_eq!(cells.len(), 4 + 2);
        assert!(cells.iter().all(|c| c.week() != 13 || c.day() < 2));

        // Marking an invalid slot done must not change the percentage.
        let mut done = complete_all(&calendar, &act);
        done.set(CellKey::new(act.id(), 13, 3), true);
        assert!((compute_progress(&calendar, &act, &done) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn span_with_no_usable_cells_is_zero() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![13], 3, 6);
        assert!(activity_cells(&calendar, &act).is_empty());
        let mut done = CompletionSet::new();
        done.set(CellKey::new(act.id(), 13, 4), true);
        assert!(compute_progress(&calendar, &act, &done).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_progress_is_fractional() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![1, 2], 4, 2);
        let mut done = CompletionSet::new();
        done.set(CellKey::new(act.id(), 1, 4), true);
        done.set(CellKey::new(act.id(), 2, 0), true);
        let pct = compute_progress(&calendar, &act, &done);
        assert!((pct - 100.0 * 2.0 / 6.0).abs() < 1e-9);
        assert_eq!(activity_summary(&calendar, &act, &done).rounded_percent(), 33);
    }

    #[test]
    fn double_toggle_restores_progress() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![3, 4, 5], 6, 0);
        let mut done = CompletionSet::new();
        done.set(CellKey::new(act.id(), 4, 2), true);
        let before = compute_progress(&calendar, &act, &done);

        let cell = CellKey::new(act.id(), 4, 3);
        done.toggle(cell);
        assert!(compute_progress(&calendar, &act, &done) > before);
        done.toggle(cell);
        assert!((compute_progress(&calendar, &act, &done) - before).abs() < f64::EPSILON);
    }

    #[test]
    fn other_activities_cells_do_not_count() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![0], 0, 6);
        let mut done = CompletionSet::new();
        done.set(CellKey::new(ActivityId::new(99), 0, 0), true);
        assert!(compute_progress(&calendar, &act, &done).abs() < f64::EPSILON);
    }

    #[test]
    fn plan_summary_pools_cells() {
        let plan = Plan::default_thesis();
        let calendar = plan.calendar();
        let first_task = &plan.tasks()[0];
        let mut done = CompletionSet::new();
        for act in first_task.activities() {
            done.extend(activity_cells(calendar, act));
        }

        let task = task_summary(calendar, first_task, &done);
        assert!(task.is_complete());
        let other = task_summary(calendar, plan.task(TaskId::new(2)).unwrap(), &done);
        assert_eq!(other.completed, 0);

        let overall = plan_summary(&plan, &done);
        assert_eq!(overall.completed, task.total);
        assert!(overall.total > task.total);
        assert!(overall.percent() > 0.0 && overall.percent() < 100.0);
    }

    #[test]
    fn final_cell_respects_calendar() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![12, 13], 3, 4);
        assert_eq!(final_cell(&calendar, &act), Some(CellKey::new(act.id(), 13, 1)));
    }

    #[test]
    fn cells_behind_counts_past_undone_cells() {
        let calendar = Calendar::default_thesis();
        let act = activity(vec![1, 2], 4, 2);
        let mut done = CompletionSet::new();
        done.set(CellKey::new(act.id(), 1, 4), true);

        assert_eq!(cells_behind(&calendar, &act, &done, (1, 0)), 0);
        // Before (2, 1): cells 1-4, 1-5, 1-6, 2-0; one of them is done.
        assert_eq!(cells_behind(&calendar, &act, &done, (2, 1)), 3);
        assert_eq!(cells_behind(&calendar, &act, &done, (9, 0)), 5);
    }

    #[test]
    fn summary_merge_and_remaining() {
        let a = ProgressSummary {
            completed: 1,
            total: 4,
        };
        let b = ProgressSummary {
            completed: 3,
            total: 4,
        };
        let merged = a.merge(b);
        assert_eq!(merged.remaining(), 4);
        assert!((merged.percent() - 50.0).abs() < f64::EPSILON);
        assert!(!ProgressSummary::default().is_complete());
    }
}
