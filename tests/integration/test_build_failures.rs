//! Builds that must fail without leaving a loadable index behind.

use crate::common::{
    PAPERS_CSV, ScriptedProvider, Step, TestProject, fast_options, list_files, papers_provider,
    pipeline_with,
};
use insight_index::{
    BuildOptions, BuildProgress, BuildState, CorpusError, EmbeddingProvider, ErrorCategory,
    IndexError, IndexPersistence, ProviderError, ReadyIndex,
};
use std::sync::Arc;
use std::time::Duration;

fn single_batch() -> BuildOptions {
    BuildOptions {
        batch_size: 16,
        concurrency: 1,
        ..fast_options()
    }
}

#[test]
fn test_empty_corpus_is_config_error_without_artifacts() {
    let project = TestProject::new();
    let corpus = project.add_file("empty.csv", "id,title,abstract,tldr\n");
    let mut pipeline = pipeline_with(Arc::new(papers_provider()), fast_options(), &project.index_dir());

    let err = pipeline.run(&corpus).unwrap_err();
    assert!(matches!(err, IndexError::Corpus(CorpusError::Empty { .. })));
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(pipeline.state(), BuildState::Failed { during: "Loading" });
    assert!(!project.index_dir().exists());
}

#[test]
fn test_missing_text_column_fails_before_embedding() {
    let project = TestProject::new();
    let corpus = project.add_file("papers.csv", "id,title,body\n1,T,text\n");
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let mut pipeline = pipeline_with(
        Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
        fast_options(),
        &project.index_dir(),
    );

    let err = pipeline.run(&corpus).unwrap_err();
    match err {
        IndexError::Corpus(CorpusError::MissingColumn { column, .. }) => {
            assert_eq!(column, "abstract")
        }
        other => panic!("Expected missing column, got {other:?}"),
    }
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_transient_failures_are_retried_to_success() {
    let project = TestProject::new();
    let corpus = project.add_file("papers.csv", PAPERS_CSV);
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Fail(ProviderError::Transient("rate limited".to_string())),
        Step::Fail(ProviderError::Transient("rate limited".to_string())),
    ]));
    let mut pipeline = pipeline_with(
        Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
        single_batch(),
        &project.index_dir(),
    );

    let report = pipeline.run(&corpus).unwrap();
    assert_eq!(report.retries, 2);
    assert_eq!(provider.calls(), 3);
    assert!(IndexPersistence::new(project.index_dir()).exists());
}

#[test]
fn test_exhausted_retries_fail_the_build() {
    let project = TestProject::new();
    let corpus = project.add_file("papers.csv", PAPERS_CSV);
    let failure = Step::Fail(ProviderError::Malformed("bad input".to_string()));
    let provider = Arc::new(ScriptedProvider::new(vec![failure.clone(), failure.clone(), failure]));
    let mut pipeline = pipeline_with(
        Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
        single_batch(),
        &project.index_dir(),
    );

    let err = pipeline.run(&corpus).unwrap_err();
    match &err {
        IndexError::Provider { batch, attempts, .. } => {
            assert_eq!(*batch, 0);
            assert_eq!(*attempts, 3);
        }
        other => panic!("Expected provider error, got {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::Provider);
    assert_eq!(pipeline.state(), BuildState::Failed { during: "Embedding" });
    assert!(list_files(&project.index_dir()).is_empty());
}

#[test]
fn test_slow_call_times_out_and_is_retried() {
    let project = TestProject::new();
    let corpus = project.add_file("papers.csv", PAPERS_CSV);
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Sleep(Duration::from_millis(500))]));
    let options = BuildOptions {
        timeout: Some(Duration::from_millis(50)),
        ..single_batch()
    };
    let mut pipeline = pipeline_with(
        Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
        options,
        &project.index_dir(),
    );

    let report = pipeline.run(&corpus).unwrap();
    assert_eq!(report.retries, 1);
    assert_eq!(report.records, 3);
}

#[test]
fn test_timeouts_without_retries_fail() {
    let project = TestProject::new();
    let corpus = project.add_file("papers.csv", PAPERS_CSV);
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Sleep(Duration::from_millis(500))]));
    let options = BuildOptions {
        timeout: Some(Duration::from_millis(20)),
        max_retries: 0,
        ..single_batch()
    };
    let mut pipeline = pipeline_with(provider, options, &project.index_dir());

    match pipeline.run(&corpus).unwrap_err() {
        IndexError::Provider { source, .. } => {
            assert_eq!(source, ProviderError::Timeout { after_ms: 20 })
        }
        other => panic!("Expected timeout, got {other:?}"),
    }
}

#[test]
fn test_dimension_change_between_batches_is_fatal() {
    let project = TestProject::new();
    let corpus = project.add_file("papers.csv", PAPERS_CSV);
    // Batch 0 answers with width 2, batch 1 with width 3.
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Width(2), Step::Width(3)]));
    let options = BuildOptions {
        batch_size: 2,
        concurrency: 1,
        ..fast_options()
    };
    let mut pipeline = pipeline_with(
        Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
        options,
        &project.index_dir(),
    );

    let err = pipeline.run(&corpus).unwrap_err();
    assert!(matches!(
        err,
        IndexError::DimensionMismatch {
            expected: 2,
            actual: 3,
            ..
        }
    ));
    assert_eq!(err.category(), ErrorCategory::Alignment);
    // Not retried.
    assert_eq!(provider.calls(), 2);
    assert!(!IndexPersistence::new(project.index_dir()).exists());
}

#[test]
fn test_cancel_during_embedding() {
    let project = TestProject::new();
    let rows: String = (0..6).map(|i| format!("{i},T{i},text {i},\n")).collect();
    let corpus = project.add_file("papers.csv", &format!("id,title,abstract,tldr\n{rows}"));
    let options = BuildOptions {
        batch_size: 1,
        concurrency: 1,
        ..fast_options()
    };
    let pipeline = pipeline_with(
        Arc::new(ScriptedProvider::new(Vec::new())),
        options,
        &project.index_dir(),
    );
    let canceller = pipeline.canceller();
    let mut pipeline = pipeline.with_progress(Arc::new(move |event| {
        if let BuildProgress::Embedded { .. } = event {
            canceller.cancel();
        }
    }));

    let err = pipeline.run(&corpus).unwrap_err();
    assert!(matches!(err, IndexError::Cancelled { .. }));
    assert_eq!(err.category(), ErrorCategory::Cancelled);
    assert_eq!(pipeline.state(), BuildState::Failed { during: "Embedding" });
    assert!(!IndexPersistence::new(project.index_dir()).exists());
}

#[test]
fn test_failed_rebuild_keeps_previous_index() {
    let project = TestProject::new();
    let corpus = project.add_file("papers.csv", PAPERS_CSV);
    pipeline_with(Arc::new(papers_provider()), fast_options(), &project.index_dir())
        .run(&corpus)
        .unwrap();

    let broken = project.add_file("broken.csv", "id,title,abstract\n1,T,unknown text\n");
    let err = pipeline_with(Arc::new(papers_provider()), fast_options(), &project.index_dir())
        .run(&broken)
        .unwrap_err();
    assert!(matches!(err, IndexError::Provider { .. }));

    let ready = ReadyIndex::open(&project.index_dir(), Arc::new(papers_provider())).unwrap();
    assert_eq!(ready.len(), 3);
    assert_eq!(ready.info().generation, 1);
}
