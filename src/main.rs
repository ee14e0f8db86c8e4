//! CLI entry point for the similarity index.
//!
//! Commands: `init`, `build`, `query`, `info`, `config`. Results go to
//! stdout; logs and progress go to stderr.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use insight_index::display::{
    THEME, create_build_table, create_info_table, create_progress_bar, create_results_table,
    with_spinner,
};
use insight_index::io::{ExitCode, OutputFormat, OutputManager};
use insight_index::{
    BuildPipeline, BuildProgress, BuildReport, EmbeddingProvider, FastEmbedProvider, IndexError,
    IndexPersistence, IndexResult, ReadyIndex, Settings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic similarity search over a document corpus
#[derive(Parser)]
#[command(
    name = "insight-index",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic similarity search over a document corpus",
    long_about = "Embed a CSV or JSON Lines corpus, persist an exact nearest-neighbor index, and query it for similar documents.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .insight directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(
        about = "Embed a corpus and publish a new index",
        after_help = "Examples:\n  insight-index build papers.csv\n  insight-index build papers.jsonl --output /data/papers-index"
    )]
    Build {
        /// CSV, JSON Lines or JSON array corpus
        corpus: PathBuf,

        /// Index directory (overrides index_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Batches embedded in parallel (overrides embedding.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Texts per embedding call (overrides embedding.batch_size)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    #[command(
        about = "Find the documents most similar to a text",
        after_help = "Examples:\n  insight-index query \"graph neural networks for molecules\"\n  insight-index query \"protein folding\" -k 10 --json"
    )]
    Query {
        /// Text to embed and search for
        text: String,

        /// Number of results (defaults to query.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Index directory (overrides index_path)
        #[arg(long)]
        index: Option<PathBuf>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Show the manifest of the published index")]
    Info {
        /// Index directory (overrides index_path)
        #[arg(long)]
        index: Option<PathBuf>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Display effective settings")]
    Config,
}

impl Commands {
    fn wants_json(&self) -> bool {
        matches!(
            self,
            Commands::Query { json: true, .. } | Commands::Info { json: true, .. }
        )
    }
}

fn main() {
    let cli = Cli::parse();
    let format = OutputFormat::from_json_flag(cli.command.wants_json());

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => OutputManager::new(format)
            .failure(&format!("{e:#}"))
            .unwrap_or(ExitCode::GeneralError),
    };
    tracing::debug!(code = i32::from(code), "{}", code.description());

    std::process::exit(code.into());
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .map_err(|e| anyhow::anyhow!("Configuration error loading {}: {e}", path.display()))?,
        None => Settings::load().map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?,
    };

    let default_level = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let code = match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            eprintln!(
                "{}",
                THEME.success_with_icon(&format!("Created configuration file at {}", path.display()))
            );
            ExitCode::Success
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&settings)?);
            ExitCode::Success
        }
        Commands::Build {
            corpus,
            output,
            concurrency,
            batch_size,
        } => {
            let mut settings = settings;
            if let Some(output) = output {
                settings.index_path = output;
            }
            if let Some(concurrency) = concurrency {
                settings.embedding.concurrency = concurrency;
            }
            if let Some(batch_size) = batch_size {
                settings.embedding.batch_size = batch_size;
            }
            let mut out = OutputManager::new(OutputFormat::Text);
            match run_build(&settings, &corpus) {
                Ok(report) => {
                    out.info(&THEME.success_with_icon(&format!(
                        "Indexed {} records from {}",
                        report.records,
                        corpus.display()
                    )))?;
                    out.success(&(), &create_build_table(&report))?
                }
                Err(e) => out.error(&e)?,
            }
        }
        Commands::Query {
            text,
            k,
            index,
            json,
        } => {
            let mut out = OutputManager::new(OutputFormat::from_json_flag(json));
            let path = index.unwrap_or_else(|| settings.index_path.clone());
            let k = k.unwrap_or(settings.query.default_k);
            match run_query(&settings, path, &text, k) {
                Ok(results) => out.success(&results, &create_results_table(&results))?,
                Err(e) => out.error(&e)?,
            }
        }
        Commands::Info { index, json } => {
            let mut out = OutputManager::new(OutputFormat::from_json_flag(json));
            let path = index.unwrap_or_else(|| settings.index_path.clone());
            match IndexPersistence::new(path).manifest() {
                Ok(manifest) => out.success(&manifest, &create_info_table(&manifest))?,
                Err(e) => out.error(&IndexError::from(e))?,
            }
        }
    };

    Ok(code)
}

fn load_provider(settings: &Settings) -> IndexResult<Arc<dyn EmbeddingProvider>> {
    let provider = with_spinner(
        &format!("Loading embedding model {}", settings.embedding.model),
        || {
            FastEmbedProvider::new(
                &settings.embedding.model,
                settings.embedding.cache_dir.clone(),
                true,
            )
        },
    )
    .map_err(|source| IndexError::ModelLoad {
        model: settings.embedding.model.clone(),
        source,
    })?;
    Ok(Arc::new(provider))
}

fn run_build(settings: &Settings, corpus: &Path) -> IndexResult<BuildReport> {
    settings.validate()?;
    let provider = load_provider(settings)?;

    let bar = create_progress_bar(0, "embedding");
    let progress_bar = bar.clone();
    let mut pipeline = BuildPipeline::from_settings(settings, provider).with_progress(Arc::new(
        move |event| match event {
            BuildProgress::Loaded { records } => progress_bar.set_length(records as u64),
            BuildProgress::Embedded { records } => progress_bar.inc(records as u64),
        },
    ));

    let result = pipeline.run(corpus);
    bar.finish_and_clear();
    result
}

fn run_query(
    settings: &Settings,
    path: PathBuf,
    text: &str,
    k: usize,
) -> IndexResult<Vec<insight_index::SimilarRecord>> {
    if k == 0 {
        return Err(IndexError::InvalidK { k });
    }
    let provider = load_provider(settings)?;
    let ready = ReadyIndex::open(&path, provider)?.with_timeout(settings.embedding.timeout());
    ready.similar(text, k)
}
