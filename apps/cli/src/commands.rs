//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use researchflow_core::{Pipeline, ProgressReporter, ResearchContext, RunReport};
use researchflow_shared::{
    AppConfig, Credentials, init_config, load_config, load_config_from, validate_config,
};
use tracing::info;

/// Topic researched when none is given.
const DEFAULT_TOPIC: &str = "AI in Healthcare";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// researchflow: search, summarize, and save.
#[derive(Parser)]
#[command(
    name = "researchflow",
    version,
    about = "Research a topic: fetch news articles, summarize them, and save the summaries.",
    long_about = None,
)]
pub(crate) struct Cli {
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
    /// Run the research pipeline for a topic.
    Run {
        /// Topic to research.
        #[arg(default_value = DEFAULT_TOPIC)]
        topic: String,

        /// Output file for the summaries (overrides config).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Config file to load instead of ~/.researchflow/researchflow.toml.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Completion model (overrides config).
        #[arg(long)]
        model: Option<String>,

        /// Article search endpoint (overrides config).
        #[arg(long)]
        search_endpoint: Option<String>,
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
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "researchflow=info",
        1 => "researchflow=debug",
        _ => "researchflow=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
    match cli.command {
        Command::Run {
            topic,
            out,
            config,
            model,
            search_endpoint,
        } => {
            let overrides = Overrides {
                out,
                model,
                search_endpoint,
            };
            cmd_run(&topic, config.as_deref(), overrides).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Flag values that take precedence over the config file.
#[derive(Debug, Default)]
struct Overrides {
    out: Option<PathBuf>,
    model: Option<String>,
    search_endpoint: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(out) = self.out {
            config.defaults.output_path = out;
        }
        if let Some(model) = self.model {
            config.completion.model = model;
        }
        if let Some(endpoint) = self.search_endpoint {
            config.search.endpoint = endpoint;
        }
    }
}

/// Load config from `path` if given, else from the default location.
fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    overrides.apply(&mut config);
    validate_config(&config)?;
    Ok(config)
}

async fn cmd_run(topic: &str, config_path: Option<&Path>, overrides: Overrides) -> Result<()> {
    let config = resolve_config(config_path, overrides)?;

    // Credentials before anything touches the network
    let credentials = Credentials::from_env(&config)?;
    let ctx = ResearchContext::from_config(&config, &credentials)?;

    info!(
        topic,
        model = %config.completion.model,
        out = %config.defaults.output_path.display(),
        "starting research"
    );

    let reporter = CliProgress::new()?;
    let mut pipeline = Pipeline::research(&ctx);

    let report = match pipeline.run_with_progress(topic, &reporter).await {
        Ok(report) => report,
        Err(e) => {
            reporter.spinner.abandon_with_message("Research failed");
            return Err(eyre!("research pipeline failed: {e}"));
        }
    };

    let receipt = report
        .receipt()
        .ok_or_else(|| eyre!("pipeline finished without writing summaries"))?;

    println!();
    println!("  Research complete!");
    println!("  Topic:     {topic}");
    println!("  Summaries: {}", receipt.blocks);
    println!("  File:      {}", receipt.path.display());
    println!("  SHA-256:   {}", receipt.sha256);
    println!("  Run:       {}", report.run_id);
    println!(
        "  Time:      {:.1}s",
        report.elapsed.as_secs_f64()
    );
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, name: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("[{current}/{total}] {name}"));
    }

    fn stage_finished(&self, name: &str, elapsed: Duration) {
        self.spinner
            .println(format!("  {name} done in {:.1}s", elapsed.as_secs_f64()));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_to_healthcare_topic() {
        let cli = Cli::try_parse_from(["researchflow", "run"]).unwrap();
        match cli.command {
            Command::Run { topic, out, .. } => {
                assert_eq!(topic, "AI in Healthcare");
                assert!(out.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_accepts_topic_and_overrides() {
        let cli = Cli::try_parse_from([
            "researchflow",
            "-vv",
            "--log-format",
            "json",
            "run",
            "quantum sensing",
            "--out",
            "out/q.txt",
            "--model",
            "my-model",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Json));
        match cli.command {
            Command::Run {
                topic, out, model, ..
            } => {
                assert_eq!(topic, "quantum sensing");
                assert_eq!(out, Some(PathBuf::from("out/q.txt")));
                assert_eq!(model.as_deref(), Some("my-model"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = AppConfig::default();
        Overrides {
            out: Some(PathBuf::from("elsewhere.txt")),
            model: None,
            search_endpoint: Some("http://localhost:8080/search".into()),
        }
        .apply(&mut config);

        assert_eq!(config.defaults.output_path, PathBuf::from("elsewhere.txt"));
        assert_eq!(config.completion.model, "gpt-3.5-turbo-instruct");
        assert_eq!(config.search.endpoint, "http://localhost:8080/search");
    }

    #[test]
    fn invalid_endpoint_override_is_rejected() {
        let dir = std::env::temp_dir().join(format!("rf-cli-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("researchflow.toml");
        std::fs::write(&path, "").unwrap();

        let overrides = Overrides {
            search_endpoint: Some("not a url".into()),
            ..Default::default()
        };
        assert!(resolve_config(Some(&path), overrides).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
