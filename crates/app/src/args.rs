use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use services::ReportFormat;
use thesis_core::model::{ActivityId, CellKey, DAYS_PER_WEEK, DayIndex, PlanId, WeekIndex};

pub const DEFAULT_DB_URL: &str = "sqlite://thesis.sqlite3";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    UnknownSubcommand(String),
    InvalidPlanId { raw: String },
    InvalidActivityId { raw: String },
    InvalidWeek { raw: String },
    InvalidDay { raw: String },
    InvalidDate { flag: &'static str, raw: String },
    InvalidFormat { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "missing required {flag}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownSubcommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidPlanId { raw } => write!(f, "invalid --plan-id value: {raw}"),
            ArgsError::InvalidActivityId { raw } => write!(f, "invalid --activity value: {raw}"),
            ArgsError::InvalidWeek { raw } => write!(f, "invalid --week value: {raw}"),
            ArgsError::InvalidDay { raw } => {
                write!(f, "invalid --day value: {raw} (expected 0-{})", DAYS_PER_WEEK - 1)
            }
            ArgsError::InvalidDate { flag, raw } => {
                write!(f, "invalid {flag} value: {raw} (expected YYYY-MM-DD)")
            }
            ArgsError::InvalidFormat { raw } => write!(f, "invalid --format value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Progress { activity: Option<ActivityId> },
    Toggle { key: CellKey },
    Report { format: ReportFormat },
    Seed,
    SetDates { start: NaiveDate, end: NaiveDate },
    ExportCompletion,
    ImportCompletion { file: PathBuf },
    ExportPlan,
}

/// Values picked up from the environment before flags are applied.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    pub db_url: Option<String>,
    pub plan_id: Option<String>,
}

impl Defaults {
    pub fn from_env() -> Self {
        Self {
            db_url: std::env::var("THESIS_DB_URL").ok(),
            plan_id: std::env::var("THESIS_PLAN_ID").ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub db_url: String,
    pub plan_id: PlanId,
    pub command: Command,
}

/// Flags a subcommand may take; the shared `--db` / `--plan-id` are handled
/// separately.
#[derive(Default)]
struct CommandFlags {
    activity: Option<String>,
    week: Option<String>,
    day: Option<String>,
    format: Option<String>,
    start: Option<String>,
    end: Option<String>,
    file: Option<String>,
}

impl Args {
    /// Parse everything after the program name. `Ok(None)` means help was
    /// requested.
    pub fn parse(
        argv: impl IntoIterator<Item = String>,
        defaults: Defaults,
    ) -> Result<Option<Self>, ArgsError> {
        let mut args = argv.into_iter();
        let Some(sub) = args.next() else {
            return Ok(None);
        };
        if matches!(sub.as_str(), "--help" | "-h" | "help") {
            return Ok(None);
        }

        let mut db_url = defaults
            .db_url
            .map_or_else(|| DEFAULT_DB_URL.to_owned(), normalize_sqlite_url);
        let mut plan_id = defaults
            .plan_id
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| PlanId::new(1), PlanId::new);
        let mut flags = CommandFlags::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--plan-id" => {
                    let value = require_value(&mut args, "--plan-id")?;
                    plan_id = value
                        .parse::<PlanId>()
                        .map_err(|_| ArgsError::InvalidPlanId { raw: value.clone() })?;
                }
                "--activity" => flags.activity = Some(require_value(&mut args, "--activity")?),
                "--week" => flags.week = Some(require_value(&mut args, "--week")?),
                "--day" => flags.day = Some(require_value(&mut args, "--day")?),
                "--format" => flags.format = Some(require_value(&mut args, "--format")?),
                "--start" => flags.start = Some(require_value(&mut args, "--start")?),
                "--end" => flags.end = Some(require_value(&mut args, "--end")?),
                "--file" => flags.file = Some(require_value(&mut args, "--file")?),
                "--help" | "-h" => return Ok(None),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = build_command(&sub, flags)?;
        Ok(Some(Self {
            db_url,
            plan_id,
            command,
        }))
    }
}

fn build_command(sub: &str, flags: CommandFlags) -> Result<Command, ArgsError> {
    let command = match sub {
        "progress" => Command::Progress {
            activity: flags.activity.map(parse_activity).transpose()?,
        },
        "toggle" => {
            let activity = parse_activity(
                flags
                    .activity
                    .ok_or(ArgsError::MissingFlag { flag: "--activity" })?,
            )?;
            let week = parse_week(flags.week.ok_or(ArgsError::MissingFlag { flag: "--week" })?)?;
            let day = parse_day(flags.day.ok_or(ArgsError::MissingFlag { flag: "--day" })?)?;
            Command::Toggle {
                key: CellKey::new(activity, week, day),
            }
        }
        "report" => Command::Report {
            format: flags
                .format
                .map(|raw| {
                    raw.parse::<ReportFormat>()
                        .map_err(|_| ArgsError::InvalidFormat { raw })
                })
                .transpose()?
                .unwrap_or_default(),
        },
        "seed" => Command::Seed,
        "set-dates" => Command::SetDates {
            start: parse_date(
                "--start",
                flags.start.ok_or(ArgsError::MissingFlag { flag: "--start" })?,
            )?,
            end: parse_date(
                "--end",
                flags.end.ok_or(ArgsError::MissingFlag { flag: "--end" })?,
            )?,
        },
        "export-completion" => Command::ExportCompletion,
        "import-completion" => Command::ImportCompletion {
            file: PathBuf::from(flags.file.ok_or(ArgsError::MissingFlag { flag: "--file" })?),
        },
        "export-plan" => Command::ExportPlan,
        other => return Err(ArgsError::UnknownSubcommand(other.to_owned())),
    };
    Ok(command)
}

fn parse_activity(raw: String) -> Result<ActivityId, ArgsError> {
    raw.parse::<ActivityId>()
        .map_err(|_| ArgsError::InvalidActivityId { raw })
}

fn parse_week(raw: String) -> Result<WeekIndex, ArgsError> {
    raw.parse::<WeekIndex>()
        .map_err(|_| ArgsError::InvalidWeek { raw })
}

fn parse_day(raw: String) -> Result<DayIndex, ArgsError> {
    match raw.parse::<DayIndex>() {
        Ok(day) if day < DAYS_PER_WEEK => Ok(day),
        _ => Err(ArgsError::InvalidDay { raw }),
    }
}

fn parse_date(flag: &'static str, raw: String) -> Result<NaiveDate, ArgsError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ArgsError::InvalidDate { flag, raw })
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  thesis progress [--activity <id>]");
    eprintln!("  thesis toggle --activity <id> --week <0-based> --day <0-6>");
    eprintln!("  thesis report [--format markdown|json]");
    eprintln!("  thesis seed");
    eprintln!("  thesis set-dates --start <YYYY-MM-DD> --end <YYYY-MM-DD>");
    eprintln!("  thesis export-completion");
    eprintln!("  thesis import-completion --file <path>");
    eprintln!("  thesis export-plan");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>   (default {DEFAULT_DB_URL})");
    eprintln!("  --plan-id <id>      (default 1)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  THESIS_DB_URL, THESIS_PLAN_ID, RUST_LOG");
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}
