use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

extern crate pretty_env_logger;
#[macro_use] extern crate log;

use crate::config::Settings;
use crate::pipeline::severity::Severity;
use crate::pipeline::{ReportFormatter, SyncError};
use crate::datadog::{ApiError, ClientOptions, MonitorFilters, RetryPolicy, MAX_PAGE_SIZE};
use crate::db::reports::{Report, ReportScope};

mod config;
mod pipeline;
mod datadog;
mod db;

#[derive(Parser, Debug)]
#[command(name = "datadog-downloader")]
#[command(about = "Download Datadog monitors into SQLite and report on them")]
struct Cli {
    /// SQLite file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch all monitors and replace the local snapshot
    Fetch(FetchArgs),
    /// Run one report, or `all` of them, against the local snapshot
    Report(ReportArgs),
    /// List available reports
    Reports,
    /// Print one stored monitor with its tags and notification targets
    Show {
        id: i64,
    },
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Monitors per API page (1 to 1000)
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u16).range(1..=MAX_PAGE_SIZE as i64))]
    page_size: u16,

    /// Retries per page on rate limits and network errors
    #[arg(long, default_value = "5")]
    max_retries: u32,

    /// Only fetch monitors carrying these tags (comma separated)
    #[arg(long)]
    tags: Option<String>,

    /// Only fetch monitors whose name contains this text
    #[arg(long)]
    name: Option<String>,

    /// Keep monitors missing from this fetch marked active
    #[arg(long)]
    no_prune: bool,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Report name, or `all`
    name: String,

    /// Include monitors no longer returned by the API
    #[arg(long)]
    include_inactive: bool,

    /// Show at most this many rows
    #[arg(long)]
    limit: Option<u32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            exit_code(&e)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load();
    if let Some(db) = cli.db {
        settings.database = db;
    }
    let settings = settings
        .validate()
        .context("Error checking env variables.")?;

    match cli.command {
        Command::Fetch(args) => fetch(&settings, args).await,
        Command::Report(args) => report(&settings, args).await,
        Command::Reports => {
            for r in Report::ALL {
                println!("{:<14}{}", r.name(), r.description());
            }
            Ok(())
        }
        Command::Show { id } => show(&settings, id).await,
    }
}

async fn fetch(settings: &Settings, args: FetchArgs) -> Result<()> {
    info!("🚀 Starting Datadog monitor sync.");

    let credentials = settings.credentials()?;
    let filters = MonitorFilters {
        tags: args.tags,
        name: args.name,
    };
    // A filtered fetch does not see every monitor, so it cannot tell which are gone.
    let prune = !args.no_prune && filters.is_empty();

    let options = ClientOptions {
        page_size: usize::from(args.page_size),
        retry: RetryPolicy {
            max_retries: args.max_retries,
            ..RetryPolicy::default()
        },
        filters,
        ..ClientOptions::default()
    };
    let client = datadog::init(&credentials, options).context("Error creating Datadog client.")?;

    let pool = db::init(&settings.db_url())
        .await
        .context("Error initializing database pool.")?;

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping after the current page...");
            signal_token.cancel();
        }
    });

    let summary = match pipeline::run_sync(&client, &pool, prune, &cancel_token).await {
        Ok(summary) => summary,
        Err(e) => {
            pool.close().await;
            return Err(anyhow::Error::from(e).context("Monitor sync failed, previous snapshot kept"));
        }
    };
    let active = db::monitors::count_monitors(&pool, false).await?;
    pool.close().await;
    info!("Database connection closed.");

    println!(
        "Fetched {} monitors: stored {}, skipped {}, marked inactive {}. {} active monitors in {:?}",
        summary.fetched, summary.stored, summary.skipped, summary.deactivated, active, settings.database
    );
    Ok(())
}

async fn report(settings: &Settings, args: ReportArgs) -> Result<()> {
    let reports: Vec<Report> = if args.name.eq_ignore_ascii_case("all") {
        Report::ALL.to_vec()
    } else {
        vec![args.name.parse::<Report>().map_err(anyhow::Error::msg)?]
    };

    let pool = open_existing(settings).await?;

    let scope = ReportScope {
        include_inactive: args.include_inactive,
        limit: args.limit,
    };

    let mut json_out = Vec::new();
    for r in reports {
        let rows = db::reports::run_report(&pool, r, scope).await?;
        match args.format {
            OutputFormat::Text => println!("{}", ReportFormatter::table(r, &rows)),
            OutputFormat::Json => json_out.push(ReportFormatter::json(r, &rows)),
        }
    }

    if args.format == OutputFormat::Json {
        let value = match json_out.len() {
            1 => json_out.remove(0),
            _ => serde_json::Value::Array(json_out),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    pool.close().await;
    Ok(())
}

async fn show(settings: &Settings, id: i64) -> Result<()> {
    let pool = open_existing(settings).await?;

    let monitor = db::monitors::get_monitor(&pool, id)
        .await?
        .with_context(|| format!("Monitor {} not found in {:?}", id, settings.database))?;
    let tags = db::monitors::get_tags(&pool, id).await?;
    let targets = db::monitors::get_notifications(&pool, id).await?;
    pool.close().await;

    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    println!("{} {}", monitor.id, monitor.name);
    println!("  severity:     {}", Severity::from_name(&monitor.name));
    println!("  type:         {}", or_dash(&monitor.monitor_type));
    println!("  project:      {}", or_dash(&monitor.project));
    println!("  state:        {}", or_dash(&monitor.overall_state));
    println!("  priority:     {}", monitor.priority.map(|p| format!("P{}", p)).unwrap_or_else(|| "-".into()));
    println!("  active:       {}", monitor.is_active);
    println!("  first seen:   {}", monitor.first_seen.to_rfc3339());
    println!("  last updated: {}", monitor.last_updated.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()));
    println!("  tags:         {}", tags.join(", "));
    for t in targets {
        match &t.context {
            Some(ctx) => println!("  notifies:     @{} ({})", t.target, ctx),
            None => println!("  notifies:     @{}", t.target),
        }
    }
    Ok(())
}

async fn open_existing(settings: &Settings) -> Result<sqlx::SqlitePool> {
    anyhow::ensure!(
        settings.database.exists(),
        "No database at {:?}, run `fetch` first",
        settings.database
    );
    db::init(&settings.db_url())
        .await
        .context("Error initializing database pool.")
}

/// 2 for rejected credentials, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    let auth_failure = err.chain().any(|cause| {
        matches!(cause.downcast_ref::<SyncError>(), Some(SyncError::Api(ApiError::Authentication(_))))
            || matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Authentication(_)))
    });
    if auth_failure {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}
