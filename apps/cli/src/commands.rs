//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use lessongen_core::generator::LessonGenerator;
use lessongen_core::pacing::FixedDelay;
use lessongen_core::pipeline::{self, ItemOutcome, ItemStage, ProgressReporter, RunSummary};
use lessongen_core::report;
use lessongen_shared::{AppConfig, Settings, Skill, init_config, load_config};
use lessongen_storage::RecordStore;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// lessongen: generate lesson content for curriculum skills.
#[derive(Parser)]
#[command(
    name = "lessongen",
    version,
    about = "Generate lesson content for every curriculum skill that lacks it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `run` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug, PartialEq)]
pub(crate) enum Command {
    /// Generate content for every skill without a lesson.
    Run {
        /// Seconds to wait between generator calls (overrides config).
        #[arg(long)]
        delay_secs: Option<u64>,
    },

    /// List all skills in the store.
    List,

    /// Regenerate one skill, replacing any stored lesson.
    Single {
        /// Skill code, e.g. `ADD-1`.
        skill_code: String,
        /// Subject code, e.g. `MATH`.
        subject_code: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug, PartialEq)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Environment & tracing setup
// ---------------------------------------------------------------------------

/// Load `.env.local` then `.env` from the working directory.
///
/// Variables already set in the process environment are left alone, so
/// `.env.local` wins over `.env` and the real environment wins over both.
pub(crate) fn load_dotenv() -> Result<()> {
    for name in [".env.local", ".env"] {
        match dotenvy::from_filename(name) {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(eyre!("failed to load {name}: {e}")),
        }
    }
    Ok(())
}

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lessongen=info",
        1 => "lessongen=debug",
        _ => "lessongen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Command::Run { delay_secs: None }) {
        Command::Run { delay_secs } => cmd_run(delay_secs).await,
        Command::List => cmd_list().await,
        Command::Single {
            skill_code,
            subject_code,
        } => cmd_single(&skill_code, &subject_code).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Load the config file and resolve credentials from the environment.
fn resolve_settings() -> Result<Settings> {
    let config = load_config()?;
    Ok(Settings::from_env(&config)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(delay_secs: Option<u64>) -> Result<()> {
    let settings = resolve_settings()?;
    let store = RecordStore::new(&settings.store)?;
    let generator = LessonGenerator::new(&settings.generator)?;
    let pacing = FixedDelay(
        delay_secs
            .map(Duration::from_secs)
            .unwrap_or(settings.pacing_delay),
    );

    info!(
        model = generator.model(),
        delay_ms = pacing.0.as_millis(),
        "starting lesson generation"
    );

    let reporter = CliProgress::new();
    let summary = pipeline::run_batch(&store, &generator, &pacing, &reporter).await?;

    println!();
    println!("{}", report::format_summary(&summary));
    println!();

    Ok(())
}

async fn cmd_list() -> Result<()> {
    let settings = resolve_settings()?;
    let store = RecordStore::new(&settings.store)?;

    let skills = store.list_skills().await?;
    for skill in &skills {
        println!("{}", skill.label());
    }
    println!();
    println!("  {} skills", skills.len());

    Ok(())
}

async fn cmd_single(skill_code: &str, subject_code: &str) -> Result<()> {
    let settings = resolve_settings()?;
    let store = RecordStore::new(&settings.store)?;
    let generator = LessonGenerator::new(&settings.generator)?;

    let spinner = new_spinner();
    spinner.set_message(format!("Generating {subject_code}/{skill_code}..."));
    let result = pipeline::generate_one(&store, &generator, skill_code, subject_code).await;
    spinner.finish_and_clear();

    println!("{}", report::format_single(&result?));
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// CLI progress reporter: persistent lines above an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            spinner: new_spinner(),
        }
    }

    fn line(&self, text: &str) {
        self.spinner.suspend(|| println!("{text}"));
    }
}

impl ProgressReporter for CliProgress {
    fn run_started(&self, total: usize) {
        self.line(&format!("Found {total} skills"));
    }

    fn item_started(&self, index: usize, total: usize, skill: &Skill) {
        self.line(&report::progress_line(index, total, skill));
    }

    fn item_stage(&self, stage: ItemStage) {
        self.spinner.set_message(report::stage_line(stage));
    }

    fn item_finished(&self, _skill: &Skill, outcome: &ItemOutcome) {
        self.line(&report::outcome_line(outcome));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
