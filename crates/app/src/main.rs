mod args;

use services::{ActionOutcome, AppServices, Clock, TimelineAction, TimelineState};
use thesis_core::model::Calendar;
use tracing::info;
use tracing_subscriber::EnvFilter;

use args::{Args, ArgsError, Command, Defaults, print_usage};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match Args::parse(argv, Defaults::from_env()) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    // Open + migrate SQLite here so core/services never touch the filesystem.
    prepare_sqlite_file(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), parsed.plan_id).await?;
    let timeline = services.timeline();
    info!(db = %parsed.db_url, plan = %services.plan_id(), "timeline opened");

    match parsed.command {
        Command::Progress { activity: Some(id) } => {
            let percent = timeline.activity_progress(id).await?;
            println!("{percent:.1}");
            let state = timeline.snapshot().await;
            for cell in state.completion().cells_of(id) {
                println!("  {cell}");
            }
        }
        Command::Progress { activity: None } => {
            print_progress(&timeline.snapshot().await);
        }
        Command::Toggle { key } => {
            let done = timeline.toggle(key).await?;
            let percent = timeline.activity_progress(key.activity()).await?;
            let state = if done { "done" } else { "open" };
            let snapshot = timeline.snapshot().await;
            match snapshot.plan().task_of(key.activity()) {
                Some(task) => println!("{key} {state} ({percent:.1}%) in {}", task.name()),
                None => println!("{key} {state} ({percent:.1}%)"),
            }
        }
        Command::Report { format } => {
            let reports = services.reports();
            let report = reports.build(&timeline.snapshot().await);
            print!("{}", reports.render(&report, format)?);
        }
        Command::Seed => {
            if services.seeded() {
                println!("seeded default plan {}", services.plan_id());
            } else {
                println!("plan {} already exists", services.plan_id());
            }
        }
        Command::SetDates { start, end } => {
            let calendar = Calendar::from_dates(start, end)?;
            let weeks = calendar.len();
            let outcome = timeline
                .dispatch(TimelineAction::SetCalendar(calendar))
                .await?;
            if let ActionOutcome::PlanEdited { pruned, .. } = outcome {
                println!("calendar set to {weeks} weeks, dropped {pruned} completed days");
            }
        }
        Command::ExportCompletion => {
            println!("{}", timeline.export_completion_json().await);
        }
        Command::ImportCompletion { file } => {
            let raw = std::fs::read_to_string(&file)?;
            if let ActionOutcome::CompletionReplaced { cells, dropped } =
                timeline.import_completion_json(&raw).await?
            {
                println!("imported {cells} completed days, dropped {dropped}");
            }
        }
        Command::ExportPlan => {
            println!("{}", timeline.export_plan_json().await?);
        }
    }
    Ok(())
}

fn print_progress(state: &TimelineState) {
    let overall = state.plan_summary();
    println!(
        "overall {:.1}% ({}/{})",
        overall.percent(),
        overall.completed,
        overall.total
    );
    for task in state.plan().tasks() {
        let summary = state.task_summary(task.id()).unwrap_or_default();
        println!("{} {}%", task.name(), summary.rounded_percent());
        for activity in task.activities() {
            let summary = state.activity_summary(activity.id()).unwrap_or_default();
            println!(
                "  [{}] {} {:.1}% ({}/{})",
                activity.id(),
                activity.name(),
                summary.percent(),
                summary.completed,
                summary.total
            );
        }
    }
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
