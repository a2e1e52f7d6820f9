//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use fdrdict_core::pipeline::{
    GenerateConfig, GenerateResult, ProgressReporter, TagConfig, TagResult,
};
use fdrdict_fetcher::cancel_pair;
use fdrdict_shared::{
    AppConfig, CloudRegion, FdrError, FetchConfig, UnmatchedEntry, init_config, load_config,
    resolve_credentials,
};
use fdrdict_tagging::expand_name;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// How many unmatched entries the tag summary lists before summarising.
const UNMATCHED_PREVIEW: usize = 10;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// fdrdict: build a tagged dictionary of FDR event schemas.
#[derive(Parser)]
#[command(
    name = "fdrdict",
    version,
    about = "Fetch the FDR event-schema catalog and tag it for search.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also append logs to this file (plain text, no colours).
    #[arg(long, env = "FDRDICT_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// API connection flags shared by `generate` and `validate`.
#[derive(Args, Debug, Default)]
pub(crate) struct ApiArgs {
    /// API client id.
    #[arg(long, env = "FALCON_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// API client secret.
    #[arg(long, env = "FALCON_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Cloud region: auto, us1, us2, eu1, usgov1, usgov2.
    #[arg(long, env = "FALCON_CLIENT_CLOUD")]
    pub cloud: Option<String>,

    /// API base URL; overrides the cloud region.
    #[arg(long, env = "FALCON_BASE_URL")]
    pub base_url: Option<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch the full event-schema catalog and write it as JSON.
    Generate {
        #[command(flatten)]
        api: ApiArgs,

        /// Output file (defaults to <output_dir>/<default_output_file> from config).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Ids per enumeration page (1-500).
        #[arg(long)]
        page_size: Option<u32>,

        /// Concurrent detail requests.
        #[arg(long)]
        concurrency: Option<u32>,
    },

    /// Add expanded names and tags to a previously generated catalog.
    Tag {
        /// Catalog JSON to read.
        input: PathBuf,

        /// Where to write the tagged catalog (may equal the input).
        output: PathBuf,

        /// Extra keyword YAML file, merged onto the table (repeatable).
        #[arg(short = 't', long = "tag-file")]
        tag_files: Vec<PathBuf>,

        /// Do not start from the bundled keyword table.
        #[arg(long)]
        no_defaults: bool,
    },

    /// Check that the credentials authenticate and can read the catalog.
    Validate {
        #[command(flatten)]
        api: ApiArgs,
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
pub(crate) fn init_tracing(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match cli.verbose {
        0 => "fdrdict=info",
        1 => "fdrdict=debug",
        _ => "fdrdict=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match cli.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}

/// Open `path` for appending, creating it and its parent directories.
fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create log directory {}", dir.display()))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("failed to open log file {}", path.display()))
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            api,
            output,
            page_size,
            concurrency,
        } => cmd_generate(&api, output, page_size, concurrency).await,
        Command::Tag {
            input,
            output,
            tag_files,
            no_defaults,
        } => cmd_tag(&input, &output, tag_files, no_defaults),
        Command::Validate { api } => cmd_validate(&api).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Apply `--cloud` / `--base-url` onto the loaded config and resolve the
/// runtime fetch settings.
fn fetch_config(config: &mut AppConfig, api: &ApiArgs) -> Result<FetchConfig> {
    if let Some(cloud) = &api.cloud {
        // Reject typos before they reach URL resolution.
        cloud.parse::<CloudRegion>()?;
        config.falcon.cloud = cloud.clone();
    }
    if let Some(base_url) = &api.base_url {
        config.falcon.base_url = Some(base_url.clone());
    }
    Ok(FetchConfig::from_app(config)?)
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(
    api: &ApiArgs,
    output: Option<PathBuf>,
    page_size: Option<u32>,
    concurrency: Option<u32>,
) -> Result<()> {
    let mut config = load_config()?;
    let credentials = resolve_credentials(
        &config,
        api.client_id.as_deref(),
        api.client_secret.as_deref(),
    )?;

    let mut fetch = fetch_config(&mut config, api)?;
    if let Some(size) = page_size {
        fetch = fetch.with_page_size(size);
    }
    if let Some(workers) = concurrency {
        fetch = fetch.with_concurrency(workers);
    }

    let output_path = output.unwrap_or_else(|| {
        Path::new(&config.output.output_dir).join(&config.output.default_output_file)
    });

    info!(
        base_url = %fetch.base_url,
        page_size = fetch.page_size,
        workers = fetch.worker_concurrency,
        output = %output_path.display(),
        "generating event dictionary"
    );

    let generate_config = GenerateConfig {
        fetch,
        credentials,
        output_path,
    };

    let (cancel_handle, cancel_token) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel_handle.cancel();
        }
    });

    let reporter = CliProgress::new();
    let outcome =
        fdrdict_core::pipeline::generate_catalog(&generate_config, cancel_token, &reporter).await;
    reporter.finish();
    interrupt.abort();

    let result = match outcome {
        Ok(result) => result,
        Err(FdrError::Cancelled) => {
            return Err(eyre!("generation cancelled; no file was written"));
        }
        Err(e) => return Err(e.into()),
    };

    print_generate_summary(&result);
    Ok(())
}

fn print_generate_summary(result: &GenerateResult) {
    println!();
    println!("  Event dictionary written!");
    println!("  Entries:   {}", result.entry_count);
    println!("  Enumerated: {}", result.enumerated);
    if let Some(total) = result.reported_total {
        println!("  Reported:  {total}");
    }
    println!("  Skipped:   {}", result.skipped.len());
    for skipped in &result.skipped {
        println!(
            "    - {} after {} attempt(s): {}",
            skipped.id, skipped.attempts, skipped.reason
        );
    }
    println!("  Path:      {}", result.output_path.display());
    println!("  Generated: {}", result.generated_at.to_rfc3339());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// tag
// ---------------------------------------------------------------------------

fn cmd_tag(input: &Path, output: &Path, tag_files: Vec<PathBuf>, no_defaults: bool) -> Result<()> {
    let config = load_config()?;

    let tag_files = if tag_files.is_empty() {
        config.tags.tag_files.iter().map(PathBuf::from).collect()
    } else {
        tag_files
    };

    let tag_config = TagConfig {
        input_path: input.to_path_buf(),
        output_path: output.to_path_buf(),
        tag_files,
        include_defaults: !no_defaults,
    };

    info!(
        input = %input.display(),
        output = %output.display(),
        tag_files = tag_config.tag_files.len(),
        "tagging event dictionary"
    );

    let reporter = CliProgress::new();
    let outcome = fdrdict_core::pipeline::tag_catalog_file(&tag_config, &reporter);
    reporter.finish();

    print_tag_summary(&outcome?);
    Ok(())
}

fn print_tag_summary(result: &TagResult) {
    println!();
    println!("  Tagging complete!");
    println!("  Tags:      {}", result.tag_count);
    println!("  Entries:   {}", result.entry_count);
    println!("  Tagged:    {}", result.tagged_count());
    println!("  Unmatched: {}", result.unmatched.len());
    for line in unmatched_preview(&result.unmatched, UNMATCHED_PREVIEW) {
        println!("    {line}");
    }
    for error in &result.tag_file_errors {
        println!("  Skipped tag file: {error}");
    }
    println!("  Path:      {}", result.output_path.display());
    println!();
}

/// `(id) Expanded Name` for the first `limit` unmatched entries, then a
/// count of the rest.
fn unmatched_preview(unmatched: &[UnmatchedEntry], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = unmatched
        .iter()
        .take(limit)
        .map(|entry| format!("({}) {}", entry.id, expand_name(&entry.name)))
        .collect();
    if unmatched.len() > limit {
        lines.push(format!("... and {} more", unmatched.len() - limit));
    }
    lines
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

async fn cmd_validate(api: &ApiArgs) -> Result<()> {
    let mut config = load_config()?;
    let credentials = resolve_credentials(
        &config,
        api.client_id.as_deref(),
        api.client_secret.as_deref(),
    )?;
    let fetch = fetch_config(&mut config, api)?;

    let report = fdrdict_core::pipeline::validate_credentials(&fetch, &credentials).await?;

    println!();
    println!("  Credentials OK");
    println!("  API:       {}", report.base_url);
    match report.reported_total {
        Some(total) => println!("  Schemas:   {total}"),
        None => println!("  Schemas:   (not reported)"),
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

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

/// CLI progress reporter: a spinner for phases that turns into a bar while
/// details are fetched.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn ids_enumerated(&self, so_far: usize, reported_total: Option<u64>) {
        let message = match reported_total {
            Some(total) => format!("Enumerating event schemas [{so_far}/{total}]"),
            None => format!("Enumerating event schemas [{so_far}]"),
        };
        self.bar.set_message(message);
    }

    fn entry_fetched(&self, done: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_style(bar_style());
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(done as u64);
    }
}
