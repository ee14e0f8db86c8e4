//! End-to-end: corpus file → build → persisted index → queries.

use crate::common::{PAPERS_CSV, TestProject, fast_options, papers_provider, pipeline_with};
use insight_index::{
    BuildState, EmbeddingProvider, IndexPersistence, Position, ReadyIndex, RecordId,
};
use std::sync::Arc;

fn build_papers(project: &TestProject) {
    let corpus = project.add_file("papers.csv", PAPERS_CSV);
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(papers_provider());
    let mut pipeline = pipeline_with(provider, fast_options(), &project.index_dir());

    let report = pipeline.run(&corpus).unwrap();
    assert_eq!(report.records, 3);
    assert_eq!(report.dimension, 2);
    assert_eq!(report.batches, 2);
    assert_eq!(pipeline.state(), BuildState::Done);
}

#[test]
fn test_nearest_two_for_east_vector() {
    let project = TestProject::new();
    build_papers(&project);

    let ready = ReadyIndex::open(&project.index_dir(), Arc::new(papers_provider())).unwrap();
    let results = ready.similar_to_vector(&[1.0, 0.0], 2).unwrap();

    let positions: Vec<Position> = results.iter().map(|r| r.position).collect();
    let distances: Vec<f32> = results.iter().map(|r| r.distance).collect();
    assert_eq!(positions, vec![Position(0), Position(2)]);
    assert_eq!(distances, vec![0.0, 1.0]);
    assert_eq!(results[0].record.id, RecordId::Int(101));
    assert_eq!(results[1].record.title, "North East");
}

#[test]
fn test_text_query_uses_provider() {
    let project = TestProject::new();
    build_papers(&project);

    let ready = ReadyIndex::open(&project.index_dir(), Arc::new(papers_provider())).unwrap();
    let results = ready.similar("eastbound", 3).unwrap();

    let titles: Vec<&str> = results.iter().map(|r| r.record.title.as_str()).collect();
    assert_eq!(titles, vec!["East", "North East", "North"]);
    assert_eq!(results[0].record.summary, "heads east");
    assert_eq!(results[2].record.summary, "");
}

#[test]
fn test_k_larger_than_index_returns_everything() {
    let project = TestProject::new();
    build_papers(&project);

    let ready = ReadyIndex::open(&project.index_dir(), Arc::new(papers_provider())).unwrap();
    assert_eq!(ready.similar_to_vector(&[0.0, 0.0], 50).unwrap().len(), 3);
}

#[test]
fn test_equal_distances_keep_corpus_order() {
    let project = TestProject::new();
    let corpus = project.add_file(
        "dupes.jsonl",
        r#"{"id": "a", "title": "A", "abstract": "same"}
{"id": "b", "title": "B", "abstract": "same"}
{"id": "c", "title": "C", "abstract": "same"}
"#,
    );
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(
        insight_index::StaticEmbeddingProvider::new("static-2d").with_entry("same", vec![0.5, 0.5]),
    );
    pipeline_with(Arc::clone(&provider), fast_options(), &project.index_dir())
        .run(&corpus)
        .unwrap();

    let ready = ReadyIndex::open(&project.index_dir(), provider).unwrap();
    let results = ready.similar_to_vector(&[0.0, 0.0], 3).unwrap();
    let ids: Vec<String> = results.iter().map(|r| r.record.id.to_string()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_rebuild_publishes_next_generation() {
    let project = TestProject::new();
    build_papers(&project);
    build_papers(&project);

    let manifest = IndexPersistence::new(project.index_dir()).manifest().unwrap();
    assert_eq!(manifest.generation, 2);
    assert_eq!(manifest.model, "static-2d");

    let ready = ReadyIndex::open(&project.index_dir(), Arc::new(papers_provider())).unwrap();
    assert_eq!(ready.info().generation, 2);
    assert_eq!(ready.len(), 3);
}

#[test]
fn test_concurrent_readers_agree() {
    let project = TestProject::new();
    build_papers(&project);

    let ready = Arc::new(ReadyIndex::open(&project.index_dir(), Arc::new(papers_provider())).unwrap());
    let expected = ready.similar_to_vector(&[0.2, 0.9], 3).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ready = Arc::clone(&ready);
                scope.spawn(move || {
                    (0..50)
                        .map(|_| ready.similar_to_vector(&[0.2, 0.9], 3).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for results in handle.join().unwrap() {
                assert_eq!(results, expected);
            }
        }
    });
}
