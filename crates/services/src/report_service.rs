use std::fmt::Write as _;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use thesis_core::model::{ActivityId, DayIndex, Owner, TaskId, WeekIndex};
use thesis_core::progress::{self, ProgressSummary};

use crate::Clock;
use crate::error::ReportError;
use crate::timeline::TimelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(ReportError::UnknownFormat(other.to_owned())),
        }
    }
}

/// Where "today" falls on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TodayMarker {
    pub date: Option<NaiveDate>,
    pub week: WeekIndex,
    pub day: DayIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressLine {
    pub completed: usize,
    pub total: usize,
    pub remaining: usize,
    pub percent: f64,
}

impl From<ProgressSummary> for ProgressLine {
    fn from(summary: ProgressSummary) -> Self {
        Self {
            completed: summary.completed,
            total: summary.total,
            remaining: summary.remaining(),
            percent: summary.percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityReport {
    pub id: ActivityId,
    pub name: String,
    pub owner: Owner,
    pub milestone: bool,
    pub first_week: WeekIndex,
    pub last_week: WeekIndex,
    pub progress: ProgressLine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behind: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub name: String,
    pub progress: ProgressLine,
    pub activities: Vec<ActivityReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneReport {
    pub activity: ActivityId,
    pub name: String,
    pub week: WeekIndex,
    pub day: DayIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub done: bool,
}

/// Progress report over one timeline snapshot.
///
/// Holds numbers, not formatted text. Rendering happens in
/// [`ReportService::render`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today: Option<TodayMarker>,
    pub overall: ProgressLine,
    pub tasks: Vec<TaskReport>,
    pub milestones: Vec<MilestoneReport>,
}

impl Report {
    /// Span cells before today that are still open, across the plan.
    #[must_use]
    pub fn total_behind(&self) -> usize {
        self.tasks
            .iter()
            .flat_map(|t| &t.activities)
            .filter_map(|a| a.behind)
            .sum()
    }
}

/// Builds and renders progress reports.
#[derive(Clone)]
pub struct ReportService {
    clock: Clock,
}

impl ReportService {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Build a report, placing "today" on the chart when the calendar is dated.
    #[must_use]
    pub fn build(&self, state: &TimelineState) -> Report {
        let calendar = state.plan().calendar();
        let date = self.clock.today();
        let today = calendar.locate(date).map(|(week, day)| TodayMarker {
            date: Some(date),
            week,
            day,
        });
        Self::build_at(state, today)
    }

    /// Build a report against an explicit chart position for "today".
    #[must_use]
    pub fn build_at(state: &TimelineState, today: Option<TodayMarker>) -> Report {
        let plan = state.plan();
        let calendar = plan.calendar();
        let completion = state.completion();

        let mut milestones = Vec::new();
        let tasks = plan
            .tasks()
            .iter()
            .map(|task| {
                let activities = task
                    .activities()
                    .iter()
                    .map(|activity| {
                        if activity.is_milestone() {
                            if let Some(cell) = progress::final_cell(calendar, activity) {
                                milestones.push(MilestoneReport {
                                    activity: activity.id(),
                                    name: activity.name().to_owned(),
                                    week: cell.week(),
                                    day: cell.day(),
                                    date: calendar.date_of(cell.week(), cell.day()),
                                    done: completion.contains(&cell),
                                });
                            }
                        }
                        ActivityReport {
                            id: activity.id(),
                            name: activity.name().to_owned(),
                            owner: activity.owner(),
                            milestone: activity.is_milestone(),
                            first_week: activity.first_week(),
                            last_week: activity.last_week(),
                            progress: progress::activity_summary(calendar, activity, completion)
                                .into(),
                            behind: today.map(|t| {
                                progress::cells_behind(calendar, activity, completion, (t.week, t.day))
                            }),
                        }
                    })
                    .collect();
                TaskReport {
                    id: task.id(),
                    name: task.name().to_owned(),
                    progress: progress::task_summary(calendar, task, completion).into(),
                    activities,
                }
            })
            .collect();

        Report {
            today,
            overall: state.plan_summary().into(),
            tasks,
            milestones,
        }
    }

    /// # Errors
    ///
    /// Returns `ReportError::Json` if JSON serialization fails.
    pub fn render(&self, report: &Report, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Markdown => Ok(render_markdown(report)),
            ReportFormat::Json => render_json(report),
        }
    }
}

fn render_json(report: &Report) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn render_markdown(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Thesis progress");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Overall: {:.1}% ({}/{} days, {} left)",
        report.overall.percent,
        report.overall.completed,
        report.overall.total,
        report.overall.remaining
    );
    if let Some(today) = report.today {
        let _ = match today.date {
            Some(date) => writeln!(
                out,
                "Today: {date} (week {}, day {})",
                u16::from(today.week) + 1,
                u16::from(today.day) + 1
            ),
            None => writeln!(
                out,
                "Today: week {}, day {}",
                u16::from(today.week) + 1,
                u16::from(today.day) + 1
            ),
        };
        let _ = writeln!(out, "Days behind schedule: {}", report.total_behind());
    }

    for task in &report.tasks {
        let _ = writeln!(out);
        let _ = writeln!(out, "## {} ({:.1}%)", task.name, task.progress.percent);
        let _ = writeln!(out);
        if task.activities.is_empty() {
            let _ = writeln!(out, "_No activities._");
            continue;
        }
        let _ = writeln!(out, "| Activity | Owner | Weeks | Done | Progress |");
        let _ = writeln!(out, "|---|---|---|---|---|");
        for activity in &task.activities {
            let marker = if activity.milestone { " ◆" } else { "" };
            let _ = writeln!(
                out,
                "| {}{marker} | {} | {}-{} | {}/{} | {:.1}% |",
                activity.name,
                activity.owner,
                u16::from(activity.first_week) + 1,
                u16::from(activity.last_week) + 1,
                activity.progress.completed,
                activity.progress.total,
                activity.progress.percent
            );
        }
    }

    if !report.milestones.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Milestones");
        let _ = writeln!(out);
        for m in &report.milestones {
            let check = if m.done { "x" } else { " " };
            let when = m.date.map_or_else(
                || format!("week {}, day {}", u16::from(m.week) + 1, u16::from(m.day) + 1),
                |d| d.to_string(),
            );
            let _ = writeln!(out, "- [{check}] {} ({when})", m.name);
        }
    }
    out
}
