//! NutriTrack - HEIFA population dashboard
//!
//! A CLI tool that aggregates patient HEIFA diet-quality scores into a
//! clinician dashboard and asks a local Ollama model for insights.
//!
//! Exit codes:
//!   0 - Success (including when insight generation failed)
//!   1 - Runtime error (bad arguments, unreadable records, write failure)

mod analysis;
mod cli;
mod config;
mod insights;
mod models;
mod records;
mod report;
mod state;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use insights::{InsightGenerator, OllamaClient, OllamaConfig};
use models::{
    DashboardReport, InsightOutcome, PatientHealthRecord, PatientTip, ReportMetadata,
};
use report::RenderOptions;
use state::{DashboardState, InsightState};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging starts so `general.verbose` can apply
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("NutriTrack v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run_dashboard(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .nutritrack.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, record limits, and report layout.");
    Ok(())
}

/// Initialize logging at `level`.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the dashboard workflow. Returns the exit code.
async fn run_dashboard(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let input = args
        .input
        .clone()
        .context("An input path is required (--input)")?;
    let output = PathBuf::from(&config.general.output);

    // Step 1: Load records
    println!("📥 Loading patient records: {}", input.display());
    let records = records::load_records(&input, &records::LoadOptions::from(&config.records))?;
    info!("Read {} entries", records.len());

    // Step 2: Aggregate
    let dashboard = DashboardState::new(config.model.insight_count);
    let watcher = spawn_state_logger(&dashboard);
    let summary = dashboard.refresh(&records);

    // Step 3: Insights and patient tip
    let wants_model = config.general.insights || args.patient.is_some();
    let client = if wants_model {
        println!("🤖 Connecting to model...");
        println!("   Model: {}", config.model.name);
        println!("   Ollama: {}", config.model.ollama_url);
        Some(OllamaClient::new(OllamaConfig::from(&config.model))?)
    } else {
        None
    };

    if let (Some(client), true) = (client.as_ref(), config.general.insights) {
        let spinner = start_spinner(&args, "Generating population insights...");
        let state = dashboard.generate_insights(client).await;
        finish_spinner(spinner, &state);
    }

    let patient_tip = match (client.as_ref(), args.patient.as_deref()) {
        (Some(client), Some(user_id)) => {
            Some(generate_patient_tip(&args, client, &records, user_id).await)
        }
        _ => None,
    };

    // Step 4: Build the report from the latest published snapshot
    println!("\n📝 Generating report...");
    let snapshot = dashboard.snapshot();

    let report = DashboardReport {
        metadata: ReportMetadata {
            source: input.display().to_string(),
            generated_at: Utc::now(),
            model_used: client.as_ref().map(|c| c.model().to_string()),
            records_read: records.len(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        summary: (*snapshot.summary).clone(),
        nutrient_averages: (*snapshot.nutrient_averages).clone(),
        insights: InsightOutcome::from(&snapshot.insights),
        patient_tip,
    };

    let rendered = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, &RenderOptions::from(&config.report))
        }
    };

    std::fs::write(&output, &rendered)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    watcher.abort();

    // Print summary
    let total = summary.total_patients;
    println!("\n📊 Population Summary:");
    println!(
        "   Patients: {} (👨 {} | 👩 {})",
        total, summary.male_count, summary.female_count
    );
    println!(
        "   - 🟢 Healthy: {} ({}%) | 🟡 At risk: {} ({}%) | 🔴 Unhealthy: {} ({}%)",
        summary.healthy_count,
        analysis::percentage(summary.healthy_count, total),
        summary.at_risk_count,
        analysis::percentage(summary.at_risk_count, total),
        summary.unhealthy_count,
        analysis::percentage(summary.unhealthy_count, total),
    );
    println!(
        "   Average score: {} (male {}, female {})",
        summary.overall_average_score, summary.male_average_score, summary.female_average_score
    );
    if let InsightState::Failed(ref message) = snapshot.insights {
        println!("   ⚠️  Insights unavailable: {}", message);
    }
    println!(
        "\n✅ Dashboard complete! Report saved to: {}",
        output.display()
    );

    Ok(0)
}

/// Log every published dashboard snapshot.
fn spawn_state_logger(dashboard: &DashboardState) -> tokio::task::JoinHandle<()> {
    let mut updates = dashboard.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            debug!(
                "Dashboard update: {} patients, insights {:?}",
                snapshot.summary.total_patients, snapshot.insights
            );
        }
    })
}

/// Generate a dietary tip for one patient.
async fn generate_patient_tip<G: InsightGenerator>(
    args: &Args,
    generator: &G,
    records: &[Option<PatientHealthRecord>],
    user_id: &str,
) -> PatientTip {
    let Some(record) = records::find_patient(records, user_id) else {
        warn!("Patient {} not found in records", user_id);
        return PatientTip {
            user_id: user_id.to_string(),
            outcome: InsightOutcome::Failed {
                message: format!("Patient {} not found", user_id),
            },
        };
    };

    let prompt = insights::prompt::build_patient_tip_prompt(record);
    let spinner = start_spinner(args, &format!("Generating tip for patient {}...", user_id));

    let outcome = match generator.generate(&prompt).await {
        Ok(text) => InsightOutcome::Generated {
            insights: text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
        },
        Err(e) => {
            warn!("Tip generation failed: {}", e);
            InsightOutcome::Failed {
                message: e.to_string(),
            }
        }
    };

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    PatientTip {
        user_id: user_id.to_string(),
        outcome,
    }
}

/// Start a spinner unless running quietly.
fn start_spinner(args: &Args, message: &str) -> Option<ProgressBar> {
    if args.quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn finish_spinner(spinner: Option<ProgressBar>, state: &InsightState) {
    let Some(pb) = spinner else {
        return;
    };
    match state {
        InsightState::Ready(insights) => {
            pb.finish_with_message(format!("Received {} insights", insights.len()))
        }
        InsightState::Failed(_) => pb.finish_with_message("Insight generation failed"),
        InsightState::Idle | InsightState::Loading => pb.finish_and_clear(),
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before the subscriber is installed, so problems go to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
