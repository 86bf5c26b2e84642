//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use recruitreport_confluence::{ConfluenceStore, PublishTarget, Publisher};
use recruitreport_core::narrative::{GeminiClient, ReportGenerator, load_template};
use recruitreport_core::pipeline::{
    ProgressReporter, RunSummary, STAGE_COUNT, Stages, report_failure, run_and_report_failure,
};
use recruitreport_core::stages::SheetsSource;
use recruitreport_shared::{AppConfig, RunId, init_config, load_config};
use recruitreport_slack::SlackClient;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Monthly recruitment report: Sheets → analysis → Gemini → Confluence → Slack.
#[derive(Parser)]
#[command(
    name = "recruitreport",
    version,
    about = "Generate, publish and announce the monthly recruitment performance report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.recruitreport/recruitreport.toml when present).
    #[arg(long, global = true, env = "RECRUITREPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full report pipeline once.
    Run {
        /// Date whose month names the report page (YYYY-MM-DD, defaults to today).
        #[arg(long)]
        report_date: Option<NaiveDate>,

        /// Prompt template file, overriding `report.prompt_path`.
        #[arg(long)]
        prompt: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init,
    /// Show resolved configuration with secrets redacted.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "recruitreport=info",
        1 => "recruitreport=debug",
        _ => "recruitreport=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            report_date,
            prompt,
        } => cmd_run(config_path, report_date, prompt).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    report_date: Option<NaiveDate>,
    prompt: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(prompt) = prompt {
        config.report.prompt_path = prompt.display().to_string();
    }
    config.validate()?;

    let report_date = report_date.unwrap_or_else(|| Local::now().date_naive());
    let run_id = RunId::new();
    info!(%run_id, %report_date, "monthly report run");

    // Built first so every later failure can still be announced.
    let notifier = SlackClient::new(&config.slack)?;

    let (generator, publisher) = match build_stages(&config) {
        Ok(built) => built,
        Err(e) => {
            report_failure(&notifier, &e).await;
            return Err(e.into());
        }
    };
    let source = SheetsSource::new(config.sheets.clone());

    let stages = Stages {
        source: &source,
        generator: &generator,
        publisher: &publisher,
        notifier: &notifier,
    };

    let reporter = CliProgress::new();
    let summary = match run_and_report_failure(&stages, run_id, report_date, &reporter).await {
        Ok(summary) => summary,
        Err(e) => {
            reporter.fail(&e.to_string());
            return Err(e.into());
        }
    };

    println!();
    println!("  Monthly report published!");
    println!("  Run:     {}", summary.run_id);
    println!("  Month:   {}", summary.report_month);
    println!("  Page:    {}", summary.page_title);
    println!("  URL:     {}", summary.url);
    println!(
        "  Status:  {}",
        if summary.created { "created" } else { "updated" }
    );
    println!(
        "  Slack:   {}",
        if summary.notified { "sent" } else { "FAILED (see log)" }
    );
    println!("  Time:    {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn build_stages(
    config: &AppConfig,
) -> recruitreport_shared::Result<(ReportGenerator, Publisher<ConfluenceStore>)> {
    let template = load_template(Path::new(&config.report.prompt_path))?;
    let generator = ReportGenerator::new(GeminiClient::new(&config.gemini)?, template);

    let store = ConfluenceStore::new(&config.confluence)?;
    let publisher = Publisher::new(store, PublishTarget::from_config(&config.confluence));

    Ok((generator, publisher))
}

/// Spinner-based progress reporter for interactive CLI use.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn fail(&self, message: &str) {
        self.spinner.abandon_with_message(format!("✗ {message}"));
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, step: usize, name: &str) {
        self.spinner
            .set_message(format!("[{step}/{STAGE_COUNT}] {name}..."));
    }

    fn stage_done(&self, detail: Option<&str>) {
        let line = match detail {
            Some(detail) => format!("  ✓ {} ({detail})", self.spinner.message()),
            None => format!("  ✓ {}", self.spinner.message()),
        };
        self.spinner.println(line);
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = init_config(config_path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}
