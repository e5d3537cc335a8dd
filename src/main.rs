//! CLI entry point for the classroom dashboard.
//!
//! Provides subcommands for inspecting a single student's radar or activity
//! profile, listing the class roster, and running the interactive dashboard
//! loop that reconciles both dataset loads with picker commands from stdin.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use classroom_dashboard::analyzers::types::RadarSeries;
use classroom_dashboard::config::DashboardConfig;
use classroom_dashboard::coordinator::{DashboardEvent, SelectionCoordinator};
use classroom_dashboard::fetch::BasicClient;
use classroom_dashboard::loader::{load_mastery, load_submissions};
use classroom_dashboard::output::{Frame, JsonLinesRenderer, print_json, write_records};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::Instrument;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "classroom_dashboard")]
#[command(about = "Mastery and activity views for a classroom dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Dataset overrides shared by every subcommand.
#[derive(Args, Clone, Default)]
struct DatasetArgs {
    /// JSON config file (defaults to $DASHBOARD_CONFIG, then built-in defaults)
    #[arg(long)]
    config: Option<String>,

    /// Mastery dataset path or URL
    #[arg(long)]
    mastery: Option<String>,

    /// Fallback mastery location tried when the primary fails
    #[arg(long)]
    mastery_fallback: Option<String>,

    /// Submission dataset path or URL
    #[arg(long)]
    submissions: Option<String>,
}

impl DatasetArgs {
    fn resolve(&self) -> Result<DashboardConfig> {
        let mut config = DashboardConfig::resolve(self.config.as_deref())?;
        if let Some(mastery) = &self.mastery {
            config.mastery = mastery.clone();
        }
        if let Some(fallback) = &self.mastery_fallback {
            config.mastery_fallback = Some(fallback.clone());
        }
        if let Some(submissions) = &self.submissions {
            config.submissions = submissions.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the knowledge-point radar series for one student
    Radar {
        #[arg(short, long)]
        student: String,

        #[command(flatten)]
        datasets: DatasetArgs,
    },
    /// Print the hourly and calendar activity views for one student
    Profile {
        #[arg(short, long)]
        student: String,

        /// Also write the calendar view to this CSV file
        #[arg(long)]
        calendar_csv: Option<String>,

        /// Also write the hourly view to this CSV file
        #[arg(long)]
        hourly_csv: Option<String>,

        #[command(flatten)]
        datasets: DatasetArgs,
    },
    /// List classes and their students with overall mastery
    Roster {
        #[command(flatten)]
        datasets: DatasetArgs,
    },
    /// Load both datasets and render frames for picker commands read from stdin
    ///
    /// Commands: `select <id>`, `select` (clears), `options <id,id,...> [current]`.
    Dashboard {
        #[command(flatten)]
        datasets: DatasetArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _log_guard = init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Radar { student, datasets } => {
            let config = datasets.resolve()?;
            let client = BasicClient::new();
            let index = load_mastery(&client, &config.mastery, config.mastery_fallback.as_deref())
                .await
                .context("mastery data could not be loaded")?;

            let series = index
                .radar(&student, &config.knowledge)
                .unwrap_or_else(|| {
                    warn!(student = %student, "Student not in roster, showing empty radar");
                    RadarSeries::empty(&config.knowledge)
                });
            print_json(&Frame::Radar(series))?;
        }
        Commands::Profile {
            student,
            calendar_csv,
            hourly_csv,
            datasets,
        } => {
            let config = datasets.resolve()?;
            let client = BasicClient::new();
            let index = load_submissions(&client, &config.submissions, &config.submission_columns)
                .await
                .context("submission data could not be loaded")?;

            let activity = index.activity(&student);
            if let Some(path) = calendar_csv {
                write_records(&path, &activity.calendar)?;
                info!(path = %path, days = activity.calendar.len(), "Calendar view written");
            }
            if let Some(path) = hourly_csv {
                write_records(&path, &activity.hourly)?;
                info!(path = %path, buckets = activity.hourly.len(), "Hourly view written");
            }
            print_json(&Frame::Profile(activity))?;
        }
        Commands::Roster { datasets } => {
            let config = datasets.resolve()?;
            let client = BasicClient::new();
            let index = load_mastery(&client, &config.mastery, config.mastery_fallback.as_deref())
                .await
                .context("mastery data could not be loaded")?;

            if index.is_empty() {
                println!("No students found.");
                return Ok(());
            }

            for class_id in index.class_names() {
                println!("{class_id}");
                for student_id in index.class_roster(class_id) {
                    if let Some(profile) = index.profile(student_id) {
                        println!(
                            "  {} overall {:.1}% across {} knowledge points",
                            profile.id,
                            profile.overall_average * 100.0,
                            profile.kp_average.len()
                        );
                    }
                }
            }
        }
        Commands::Dashboard { datasets } => {
            let config = datasets.resolve()?;
            run_dashboard(config).await?;
        }
    }

    Ok(())
}

/// Colored stderr logging plus a JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/classroom_dashboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("classroom_dashboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

/// Starts both dataset loads and the stdin picker, then feeds every event
/// through the coordinator until all three sources are finished.
#[tracing::instrument(skip(config), fields(mastery = %config.mastery, submissions = %config.submissions))]
async fn run_dashboard(config: DashboardConfig) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = Arc::new(BasicClient::new());

    {
        let tx = tx.clone();
        let client = client.clone();
        let primary = config.mastery.clone();
        let fallback = config.mastery_fallback.clone();
        tokio::spawn(
            async move {
                let result = load_mastery(client.as_ref(), &primary, fallback.as_deref()).await;
                let _ = tx.send(DashboardEvent::MasteryLoaded(result));
            }
            .instrument(tracing::info_span!("mastery_load")),
        );
    }

    {
        let tx = tx.clone();
        let client = client.clone();
        let location = config.submissions.clone();
        let columns = config.submission_columns.clone();
        tokio::spawn(
            async move {
                let result = load_submissions(client.as_ref(), &location, &columns).await;
                let _ = tx.send(DashboardEvent::SubmissionsLoaded(result));
            }
            .instrument(tracing::info_span!("submission_load")),
        );
    }

    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    None => warn!(line = %line, "Unrecognized command"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
        debug!("Picker input closed");
    });

    let coordinator = SelectionCoordinator::new(
        config.knowledge.clone(),
        &config.radar_mount,
        JsonLinesRenderer::new(std::io::stdout()),
        JsonLinesRenderer::new(std::io::stdout()),
        JsonLinesRenderer::new(std::io::stdout()),
    );
    let coordinator = coordinator.run(rx).await;

    let ctx = coordinator.context();
    info!(
        mastery = ?ctx.mastery_state(),
        submissions = ?ctx.submission_state(),
        students = ctx.mastery().map(|m| m.len()).unwrap_or(0),
        records = ctx.submissions().map(|s| s.total_records()).unwrap_or(0),
        calendar = ?ctx.calendar_range(),
        "Dashboard finished"
    );
    Ok(())
}

/// Translates one stdin line into a picker event.
fn parse_command(line: &str) -> Option<DashboardEvent> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "select" => Some(DashboardEvent::SelectionChanged(
            parts.next().unwrap_or("").to_string(),
        )),
        "options" => {
            let options = parts
                .next()
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            let current = parts.next().unwrap_or("").to_string();
            Some(DashboardEvent::OptionsChanged { options, current })
        }
        _ => None,
    }
}
