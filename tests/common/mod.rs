#![allow(dead_code)]

use insight_index::{
    BuildOptions, BuildPipeline, ColumnMapping, CorpusLoader, EmbeddingProvider, ProviderError,
    StaticEmbeddingProvider,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn index_dir(&self) -> PathBuf {
        self.dir.path().join("index")
    }
}

/// Three papers whose abstracts map to [1,0], [0,1] and [1,1].
pub const PAPERS_CSV: &str = "\
id,title,abstract,tldr
101,East,points east,heads east
102,North,points north,
103,North East,points north east,heads both ways
";

pub fn papers_provider() -> StaticEmbeddingProvider {
    StaticEmbeddingProvider::new("static-2d")
        .with_entry("points east", vec![1.0, 0.0])
        .with_entry("points north", vec![0.0, 1.0])
        .with_entry("points north east", vec![1.0, 1.0])
        .with_entry("eastbound", vec![1.0, 0.0])
}

/// Options with short backoff so retry tests stay fast.
pub fn fast_options() -> BuildOptions {
    BuildOptions {
        batch_size: 2,
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
        timeout: None,
        concurrency: 2,
    }
}

pub fn pipeline_with(
    provider: Arc<dyn EmbeddingProvider>,
    options: BuildOptions,
    output: &Path,
) -> BuildPipeline {
    BuildPipeline::new(
        CorpusLoader::new(ColumnMapping::default(), None),
        provider,
        options,
        output,
    )
}

/// What a scripted provider does on a given call.
#[derive(Clone)]
pub enum Step {
    Fail(ProviderError),
    Sleep(Duration),
    /// Return vectors of this width regardless of input.
    Width(usize),
}

/// Provider following a script of per-call behaviors, then answering
/// normally with 2-d vectors derived from text length.
pub struct ScriptedProvider {
    script: Vec<Step>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for ScriptedProvider {
    fn model_id(&self) -> &str {
        "scripted"
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let width = match self.script.get(call).cloned() {
            Some(Step::Fail(err)) => return Err(err),
            Some(Step::Sleep(duration)) => {
                std::thread::sleep(duration);
                2
            }
            Some(Step::Width(width)) => width,
            None => 2,
        };
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; width];
                v[0] = t.len() as f32;
                v
            })
            .collect())
    }
}

/// File names in `dir`, sorted; empty when the directory does not exist.
pub fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
