mod classify;
mod collector;
mod config;
mod dispatch;
mod filter;
mod hh;
mod markup;
mod models;
mod normalize;
mod output;
mod period;
mod pipeline;
mod report;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use chrono::Utc;
use chrono_tz::Tz;
use clap::Parser;
use tracing::{error, info};

use classify::classify;
use config::{AppConfig, validate_contact};
use dispatch::{ChannelSession, DispatchOutcome, MessageChannel, UnlinkedConnector, open_session};
use hh::{HttpTransport, SearchClient, build_user_agent};
use period::{format_local, format_period};
use pipeline::{RunOutcome, RunParams, run_once};
use report::tally;

const RULE: &str = "============================================================";

#[derive(Parser)]
#[command(name = "it-vacancies")]
#[command(about = "Collect fresh IT vacancies from hh.ru, filter by period and city, and publish a digest")]
#[command(after_help = "Search window: from the cutoff hour yesterday to the cutoff hour today \
    (REPORT_CUTOFF_HOUR, default 20:00) in REPORT_TIMEZONE (default Europe/Moscow).\n\
    Cities: Москва, Санкт-Петербург.\n\
    Channel dispatch needs API_ID, API_HASH, TELETHON_SESSION_STRING and DEST_CHANNEL \
    plus a linked messaging client.")]
struct Cli {
    /// Contact e-mail sent in the User-Agent header
    #[arg(short, long, env = "HH_CONTACT")]
    contact: Option<String>,

    /// Number of vacancies to show in the report
    #[arg(short = 'n', long, default_value_t = 15, allow_negative_numbers = true)]
    limit: i64,

    /// Report file path (overrides OUTPUT_PATH)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not send the report to the channel even if it is configured
    #[arg(long)]
    no_dispatch: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init(&config.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match try_main(cli, config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn try_main(cli: Cli, config: AppConfig) -> Result<usize> {
    let contact = cli
        .contact
        .as_deref()
        .filter(|c| validate_contact(Some(*c)))
        .ok_or_else(|| {
            anyhow!(
                "A valid contact e-mail is required for the User-Agent. \
                 Pass --contact \"you@domain.tld\" or set HH_CONTACT."
            )
        })?;

    let limit = cli.limit.max(1) as usize;
    let out_path = cli.output.unwrap_or_else(|| config.output_path.clone());

    let session = if cli.no_dispatch {
        println!("⏭️ Channel dispatch disabled by --no-dispatch");
        None
    } else {
        match &config.channel {
            Ok(channel) => open_session(&UnlinkedConnector, channel).await,
            Err(setup) => {
                println!("❌ Channel dispatch disabled: {}", setup);
                None
            }
        }
    };

    // The session is closed on every path out of the pipeline, errors included.
    let result = collect_once(contact, limit, &out_path, &config, session.as_ref()).await;
    if let Some(session) = session {
        session.close().await;
    }
    result
}

async fn collect_once<C: MessageChannel>(
    contact: &str,
    limit: usize,
    out_path: &Path,
    config: &AppConfig,
    session: Option<&ChannelSession<C>>,
) -> Result<usize> {
    let user_agent = build_user_agent(contact);
    info!(user_agent = %user_agent, "Using User-Agent");
    info!(limit, "Target limit");

    let client = SearchClient::new(HttpTransport::new(&user_agent)?);
    let params = RunParams {
        limit,
        now: Utc::now(),
        tz: config.timezone,
        cutoff_hour: config.cutoff_hour,
        out_path,
    };
    let run = run_once(&client, session, &params).await?;

    match &run.dispatch {
        DispatchOutcome::Sent { chunks } => {
            println!("✅ Report sent to channel in {} message(s)", chunks);
            println!("📊 Vacancies in report: {}", run.final_set.len());
        }
        DispatchOutcome::Skipped(reason) => println!("⏭️ Channel dispatch skipped: {}", reason),
        DispatchOutcome::Failed(reason) => println!("❌ Failed to send report to channel: {}", reason),
    }

    print_summary(&run, config.timezone, out_path);
    Ok(run.final_set.len())
}

fn print_summary(run: &RunOutcome, tz: Tz, out_path: &Path) {
    println!("\n{}", RULE);
    println!("🎯 IT STATISTICS:");
    println!("• Total found on hh.ru: {}", run.collection.total_found);
    println!(
        "• Collected: {} from {} page(s), stopped: {}",
        run.collection.records.len(),
        run.collection.pages_fetched,
        run.collection.stop_reason
    );
    if run.collection.items_skipped > 0 {
        println!("• Malformed items skipped: {}", run.collection.items_skipped);
    }
    println!("• After filtering: {}", run.filtered_count);
    println!("• In report: {}", run.final_set.len());
    println!("• Period: {}", format_period(&run.period, tz));

    if let (Some(newest), Some(oldest)) = (run.final_set.first(), run.final_set.last()) {
        let cities = tally(run.final_set.iter().map(|v| v.record.city_name.as_str()));
        let categories = tally(run.final_set.iter().map(|v| {
            classify(
                &v.record.title,
                &v.record.snippet_requirement,
                &v.record.snippet_responsibility,
            )
        }));
        println!(
            "• Cities: {}",
            cities
                .iter()
                .take(3)
                .map(|(city, n)| format!("{}({})", city, n))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "• Specializations: {}",
            categories
                .iter()
                .take(3)
                .map(|(category, n)| format!("{}({})", category, n))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "• Date range: {} - {}",
            format_local(newest.published_at, tz),
            format_local(oldest.published_at, tz)
        );
    } else {
        println!("• ❌ No vacancies matched the criteria");
    }

    if run.saved {
        println!(
            "• 📄 Report: {} ({} characters)",
            out_path.display(),
            run.report.chars().count()
        );
    } else {
        println!("• 📄 Report printed above, could not write {}", out_path.display());
    }
    println!("{}", RULE);
}
