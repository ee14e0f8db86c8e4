//! Batched, bounded-parallel embedding with retry and timeout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rayon::prelude::*;

use super::{BuildCanceller, BuildOptions, BuildProgress, ProgressFn};
use crate::error::{IndexError, IndexResult};
use crate::vector::{EmbeddingProvider, ProviderError, embed_with_timeout};

/// Upper bound for the delay between two attempts of one batch.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Vectors in corpus order plus counters for the build report.
#[derive(Debug)]
pub(crate) struct EmbedOutcome {
    pub vectors: Vec<Vec<f32>>,
    pub batches: usize,
    pub retries: usize,
}

pub(crate) struct BatchEmbedder<'a> {
    provider: &'a Arc<dyn EmbeddingProvider>,
    options: &'a BuildOptions,
    canceller: &'a BuildCanceller,
    progress: Option<&'a ProgressFn>,
    dimension: OnceLock<usize>,
    retries: AtomicUsize,
}

impl<'a> BatchEmbedder<'a> {
    pub fn new(
        provider: &'a Arc<dyn EmbeddingProvider>,
        options: &'a BuildOptions,
        canceller: &'a BuildCanceller,
        progress: Option<&'a ProgressFn>,
    ) -> Self {
        let dimension = OnceLock::new();
        if let Some(hint) = provider.dimension() {
            let _ = dimension.set(hint.get());
        }
        Self {
            provider,
            options,
            canceller,
            progress,
            dimension,
            retries: AtomicUsize::new(0),
        }
    }

    /// Embed every text, returning vectors in input order.
    ///
    /// Batches run on a pool of `concurrency` threads. The first batch that
    /// fails for good aborts the whole call.
    pub fn embed_all(&self, texts: &[String]) -> IndexResult<EmbedOutcome> {
        let batches: Vec<Arc<Vec<String>>> = texts
            .chunks(self.options.batch_size.max(1))
            .map(|chunk| Arc::new(chunk.to_vec()))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.concurrency.max(1))
            .thread_name(|idx| format!("insight-embed-{idx}"))
            .build()
            .map_err(|e| IndexError::config(format!("failed to create embedding pool: {e}")))?;

        tracing::debug!(
            batches = batches.len(),
            concurrency = self.options.concurrency,
            "dispatching embedding batches"
        );

        let embedded: Vec<Vec<Vec<f32>>> = pool.install(|| {
            batches
                .par_iter()
                .enumerate()
                .map(|(batch, texts)| self.embed_batch(batch, texts))
                .collect::<IndexResult<Vec<_>>>()
        })?;

        Ok(EmbedOutcome {
            vectors: embedded.into_iter().flatten().collect(),
            batches: batches.len(),
            retries: self.retries.load(Ordering::Relaxed),
        })
    }

    fn embed_batch(&self, batch: usize, texts: &Arc<Vec<String>>) -> IndexResult<Vec<Vec<f32>>> {
        let mut attempts = 0;
        loop {
            self.canceller.check("Embedding")?;
            attempts += 1;

            match self.attempt(texts) {
                Ok(vectors) => {
                    self.check_dimensions(batch, &vectors)?;
                    tracing::debug!(batch, attempts, size = vectors.len(), "embedded batch");
                    if let Some(progress) = self.progress {
                        progress(BuildProgress::Embedded {
                            records: vectors.len(),
                        });
                    }
                    return Ok(vectors);
                }
                Err(err) if err.is_retryable() && attempts <= self.options.max_retries => {
                    let delay = backoff(self.options.retry_backoff, attempts);
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        batch,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "embedding batch failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(source) => {
                    return Err(IndexError::Provider {
                        batch,
                        attempts,
                        source,
                    });
                }
            }
        }
    }

    /// One provider call, bounded by the configured timeout.
    fn attempt(&self, texts: &Arc<Vec<String>>) -> Result<Vec<Vec<f32>>, ProviderError> {
        embed_with_timeout(self.provider, Arc::clone(texts), self.options.timeout)
    }

    /// The first vector seen fixes the build's dimension.
    fn check_dimensions(&self, batch: usize, vectors: &[Vec<f32>]) -> IndexResult<()> {
        for vector in vectors {
            let expected = *self.dimension.get_or_init(|| vector.len());
            if vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                    context: format!("embedding batch {batch}"),
                });
            }
        }
        Ok(())
    }
}

/// Delay before retry number `attempt` (1-based): doubles each time.
fn backoff(initial: Duration, attempt: usize) -> Duration {
    let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
    initial.saturating_mul(factor).min(MAX_BACKOFF)
}
