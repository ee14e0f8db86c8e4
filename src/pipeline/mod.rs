//! Build pipeline: corpus → embeddings → index → persisted artifacts.
//!
//! The pipeline is a one-shot state machine:
//!
//! ```text
//! Idle → Loading → Embedding → Indexing → Persisting → Done
//!   └────────┴──────────┴──────────┴───────────┴──→ Failed
//! ```
//!
//! Nothing is written to disk before `Persisting`, and the persistence layer
//! either publishes a complete index or leaves the previous one in place, so
//! a failed build never produces a loadable partial index.

mod embed;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{EmbeddingConfig, Settings};
use crate::corpus::CorpusLoader;
use crate::error::{IndexError, IndexResult};
use crate::index::SimilarityIndex;
use crate::storage::IndexPersistence;
use crate::types::Record;
use crate::vector::EmbeddingProvider;

use embed::BatchEmbedder;

/// Progress notifications emitted during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildProgress {
    /// The corpus was read; `records` texts will be embedded.
    Loaded { records: usize },
    /// One batch finished embedding `records` texts.
    Embedded { records: usize },
}

pub type ProgressFn = Arc<dyn Fn(BuildProgress) + Send + Sync>;

/// Where the build currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Loading,
    Embedding,
    Indexing,
    Persisting,
    Done,
    /// Terminal failure, remembering the state it happened in.
    Failed { during: &'static str },
}

impl BuildState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Loading => "Loading",
            Self::Embedding => "Embedding",
            Self::Indexing => "Indexing",
            Self::Persisting => "Persisting",
            Self::Done => "Done",
            Self::Failed { .. } => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { during } => write!(f, "Failed (during {during})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Shared flag a caller flips to abandon a build.
///
/// Honored until the pipeline enters `Persisting`; from then on the write
/// runs to completion.
#[derive(Debug, Clone, Default)]
pub struct BuildCanceller(Arc<AtomicBool>);

impl BuildCanceller {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self, state: &str) -> IndexResult<()> {
        if self.is_cancelled() {
            return Err(IndexError::Cancelled {
                state: state.to_string(),
            });
        }
        Ok(())
    }
}

/// Batching, retry and timeout knobs for the embedding stage.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub batch_size: usize,
    /// Retries after the first failed attempt of a batch.
    pub max_retries: usize,
    pub retry_backoff: Duration,
    /// `None` waits for the provider indefinitely.
    pub timeout: Option<Duration>,
    pub concurrency: usize,
}

impl From<&EmbeddingConfig> for BuildOptions {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
            timeout: config.timeout(),
            concurrency: config.concurrency,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&EmbeddingConfig::default())
    }
}

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub records: usize,
    pub dimension: usize,
    pub batches: usize,
    pub retries: usize,
    pub generation: u64,
    pub elapsed: Duration,
    pub output: PathBuf,
}

enum CorpusSource<'a> {
    File(&'a Path),
    Records(Vec<Record>),
}

/// Single-use builder of a persisted index.
pub struct BuildPipeline {
    loader: CorpusLoader,
    provider: Arc<dyn EmbeddingProvider>,
    options: BuildOptions,
    output: PathBuf,
    canceller: BuildCanceller,
    progress: Option<ProgressFn>,
    state: BuildState,
    history: Vec<BuildState>,
}

impl BuildPipeline {
    pub fn new(
        loader: CorpusLoader,
        provider: Arc<dyn EmbeddingProvider>,
        options: BuildOptions,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            loader,
            provider,
            options,
            output: output.into(),
            canceller: BuildCanceller::default(),
            progress: None,
            state: BuildState::Idle,
            history: vec![BuildState::Idle],
        }
    }

    /// Pipeline configured from settings, writing to `settings.index_path`.
    pub fn from_settings(settings: &Settings, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(
            CorpusLoader::from_config(&settings.corpus),
            provider,
            BuildOptions::from(&settings.embedding),
            settings.index_path.clone(),
        )
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Handle for abandoning this build from another thread.
    pub fn canceller(&self) -> BuildCanceller {
        self.canceller.clone()
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[BuildState] {
        &self.history
    }

    /// Build from a corpus file.
    pub fn run(&mut self, corpus: &Path) -> IndexResult<BuildReport> {
        self.run_source(CorpusSource::File(corpus))
    }

    /// Build from records already in memory.
    pub fn run_records(&mut self, records: Vec<Record>) -> IndexResult<BuildReport> {
        self.run_source(CorpusSource::Records(records))
    }

    fn run_source(&mut self, source: CorpusSource<'_>) -> IndexResult<BuildReport> {
        if self.state != BuildState::Idle {
            return Err(IndexError::config(format!(
                "build pipeline already ran (state: {})",
                self.state
            )));
        }

        let started = Instant::now();
        match self.execute(source, started) {
            Ok(report) => Ok(report),
            Err(err) => {
                let during = self.state.name();
                self.transition(BuildState::Failed { during });
                tracing::error!(during, error = %err, "build failed");
                Err(err)
            }
        }
    }

    fn execute(&mut self, source: CorpusSource<'_>, started: Instant) -> IndexResult<BuildReport> {
        self.enter(BuildState::Loading)?;
        let records = match source {
            CorpusSource::File(path) => self.loader.load(path)?,
            CorpusSource::Records(records) if records.is_empty() => {
                return Err(IndexError::config("corpus contains no records"));
            }
            CorpusSource::Records(records) => records,
        };
        if let Some(progress) = &self.progress {
            progress(BuildProgress::Loaded {
                records: records.len(),
            });
        }

        self.enter(BuildState::Embedding)?;
        let texts: Vec<String> = records
            .iter()
            .map(|r| r.embedding_text().to_string())
            .collect();
        let outcome = BatchEmbedder::new(
            &self.provider,
            &self.options,
            &self.canceller,
            self.progress.as_ref(),
        )
        .embed_all(&texts)?;

        self.enter(BuildState::Indexing)?;
        let index = SimilarityIndex::build(&outcome.vectors, records)?;

        // Last point at which cancellation is honored.
        self.enter(BuildState::Persisting)?;
        let manifest =
            IndexPersistence::new(&self.output).save(&index, self.provider.model_id())?;

        self.transition(BuildState::Done);
        Ok(BuildReport {
            records: index.len(),
            dimension: index.dimension().get(),
            batches: outcome.batches,
            retries: outcome.retries,
            generation: manifest.generation,
            elapsed: started.elapsed(),
            output: self.output.clone(),
        })
    }

    fn enter(&mut self, next: BuildState) -> IndexResult<()> {
        self.canceller.check(self.state.name())?;
        self.transition(next);
        Ok(())
    }

    fn transition(&mut self, next: BuildState) {
        tracing::info!(from = %self.state, to = %next, "build state changed");
        self.state = next;
        self.history.push(next);
    }
}

impl fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("model_id", &self.provider.model_id())
            .field("options", &self.options)
            .field("output", &self.output)
            .field("state", &self.state)
            .finish()
    }
}
