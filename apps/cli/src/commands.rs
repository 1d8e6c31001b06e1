//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use arxivsummary_catalog::ArxivClient;
use arxivsummary_core::{Fetcher, Pipeline, ProgressReporter, RunResult, SummaryGenerator};
use arxivsummary_generator::{GeminiClient, GenerationOptions, TextGenerator};
use arxivsummary_shared::{
    AppConfig, GeneratorConfig, OutputConfig, SearchConfig, init_config, load_config,
    load_config_from, resolve_api_key,
};
use arxivsummary_storage::CursorStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// arxivsummary: summarize what is new on arXiv since the last run.
#[derive(Parser)]
#[command(
    name = "arxivsummary",
    version,
    about = "Fetch new arXiv papers since the last run and summarize them with Gemini.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.arxivsummary/arxivsummary.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Fetch new papers, summarize them and write a report.
    Run(RunArgs),

    /// Check that the generator answers a trivial prompt.
    Ping,

    /// Inspect or reset the last-seen cursor.
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `run`; each one overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Free-text search term.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Category filter, repeatable (e.g. --category cond-mat.supr-con).
    #[arg(short, long = "category")]
    pub categories: Vec<String>,

    /// Upper bound on papers fetched per run.
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Directory for reports, metadata and the cursor file.
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Gemini model id.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Papers per generation request.
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(query) = &self.query {
            config.search.query = query.clone();
        }
        if !self.categories.is_empty() {
            config.search.categories = self.categories.clone();
        }
        if let Some(max) = self.max_results {
            config.search.max_total_results = max;
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(model) = &self.model {
            config.generator.model = model.clone();
        }
        if let Some(size) = self.batch_size {
            config.generator.batch_size = size;
        }
    }
}

/// Cursor subcommands.
#[derive(Subcommand)]
pub(crate) enum CursorAction {
    /// Print the stored cursor.
    Show,
    /// Delete the stored cursor so the next run fetches the full window.
    Reset,
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
        0 => "arxivsummary=info",
        1 => "arxivsummary=debug",
        _ => "arxivsummary=trace",
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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(config_path, &args).await,
        Command::Ping => cmd_ping(config_path).await,
        Command::Cursor { action } => match action {
            CursorAction::Show => cmd_cursor_show(config_path),
            CursorAction::Reset => cmd_cursor_reset(config_path),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

fn gemini_client(config: &AppConfig) -> Result<GeminiClient> {
    let api_key = resolve_api_key(config)?;
    Ok(GeminiClient::new(&GeneratorConfig::from(config), api_key)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    args.apply(&mut config);

    // Fail on a missing key before touching the catalog.
    let generator = gemini_client(&config)?;
    let search = SearchConfig::from(&config);
    let generator_config = GeneratorConfig::from(&config);
    let output = OutputConfig::from(&config);

    info!(
        query = %search.query,
        categories = ?search.categories,
        max_results = search.max_results,
        model = %generator_config.model,
        "starting run"
    );

    let query = search.query.clone();
    let categories = search.categories.clone();
    let pipeline = Pipeline::new(
        Fetcher::new(ArxivClient::new(&search)?, search),
        SummaryGenerator::new(generator, &generator_config),
        output,
        generator_config.batch_size,
    );

    let reporter = CliProgress::new();
    let result = pipeline.run(&query, &categories, &reporter).await?;

    print_run_summary(&result);
    Ok(())
}

fn print_run_summary(result: &RunResult) {
    println!();
    if result.summary_units.is_empty() {
        println!("  No new papers since the last run.");
    } else {
        println!("  Papers:  {}", result.summary_units.len());
        println!("  Failed:  {}", result.failed_count());
    }
    if !result.anomalies.is_empty() {
        println!("  Skipped: {} malformed entries", result.anomalies.len());
    }
    if let Some(path) = &result.report_path {
        println!("  Report:  {}", path.display());
    }
    if let Some(path) = &result.metadata_path {
        println!("  Records: {}", path.display());
    }
    if result.cursor_advanced {
        if let Some(cursor) = &result.cursor {
            println!("  Cursor advanced to {}", cursor.last_seen_id);
        }
    } else if !result.overall_succeeded {
        println!("  Cursor NOT advanced: failed papers will be retried next run.");
    } else {
        println!("  Cursor unchanged.");
    }
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

async fn cmd_ping(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let client = gemini_client(&config)?;
    let options = GenerationOptions::from(&GeneratorConfig::from(&config));

    info!(model = client.model(), "pinging generator");
    let reply = client
        .generate("Reply with the single word: pong", &options)
        .await
        .map_err(|e| eyre!("generator unreachable: {e}"))?;

    println!("{} replied: {}", client.model(), reply.trim());
    Ok(())
}

fn cursor_store(config_path: Option<&Path>) -> Result<CursorStore> {
    let config = resolve_config(config_path)?;
    Ok(CursorStore::new(OutputConfig::from(&config).cursor_path))
}

fn cmd_cursor_show(config_path: Option<&Path>) -> Result<()> {
    let store = cursor_store(config_path)?;
    match store.load()? {
        Some(cursor) => {
            println!("  Last seen: {}", cursor.last_seen_id);
            println!("  Saved at:  {}", cursor.saved_at.to_rfc3339());
            println!("  Count:     {}", cursor.count_at_save);
        }
        None => println!("No cursor at {}", store.path().display()),
    }
    Ok(())
}

fn cmd_cursor_reset(config_path: Option<&Path>) -> Result<()> {
    let store = cursor_store(config_path)?;
    if store.clear()? {
        println!("Cursor removed: {}", store.path().display());
    } else {
        println!("No cursor to remove.");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
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
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn records_fetched(&self, count: usize) {
        self.spinner.set_message(format!("Fetched {count} new papers"));
    }

    fn batch_started(&self, current: usize, total: usize, records: usize) {
        self.spinner
            .set_message(format!("Summarizing batch [{current}/{total}] ({records} papers)"));
    }

    fn batch_finished(&self, current: usize, failed: usize) {
        if failed > 0 {
            self.spinner
                .println(format!("  batch {current}: {failed} paper(s) could not be summarized"));
        }
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "arxivsummary",
            "run",
            "--query",
            "flat band",
            "--category",
            "cond-mat.supr-con",
            "--category",
            "cond-mat.str-el",
            "--max-results",
            "50",
            "--batch-size",
            "10",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.query.as_deref(), Some("flat band"));
        assert_eq!(args.categories.len(), 2);
        assert_eq!(args.max_results, Some(50));
        assert_eq!(args.batch_size, Some(10));
    }

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        let args = RunArgs {
            query: Some("nickelate".into()),
            categories: vec!["cond-mat.str-el".into()],
            output_dir: Some("/tmp/out".into()),
            model: Some("gemini-1.5-pro".into()),
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.search.query, "nickelate");
        assert_eq!(config.search.categories, vec!["cond-mat.str-el".to_string()]);
        assert_eq!(config.output.dir, "/tmp/out");
        assert_eq!(config.generator.model, "gemini-1.5-pro");
        assert_eq!(config.generator.batch_size, AppConfig::default().generator.batch_size);
    }

    #[test]
    fn empty_flags_keep_config() {
        let mut config = AppConfig::default();
        config.search.categories = vec!["hep-th".into()];
        RunArgs::default().apply(&mut config);
        assert_eq!(config.search.categories, vec!["hep-th".to_string()]);
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["arxivsummary", "cursor", "show", "--config", "a.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
        assert!(matches!(cli.command, Command::Cursor { action: CursorAction::Show }));
    }
}
