//! Settings files drive the loader and the pipeline.

use crate::common::{TestProject, papers_provider};
use insight_index::{BuildOptions, BuildPipeline, ReadyIndex, RecordId, Settings};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_custom_columns_from_settings_file() {
    let project = TestProject::new();
    let config = project.add_file(
        ".insight/settings.toml",
        &format!(
            r#"
index_path = "{}"

[corpus]
id_column = "paper_id"
text_column = "body"
summary_column = ""
format = "csv"

[embedding]
batch_size = 1
retry_backoff_ms = 1
timeout_ms = 0
concurrency = 1
"#,
            project.index_dir().display()
        ),
    );
    let corpus = project.add_file(
        "papers.txt",
        "paper_id,title,body\nP-1,East,points east\nP-2,North,points north\n",
    );

    let settings = Settings::load_from(&config).unwrap();
    settings.validate().unwrap();
    assert_eq!(
        BuildOptions::from(&settings.embedding),
        BuildOptions {
            batch_size: 1,
            max_retries: 3,
            retry_backoff: Duration::from_millis(1),
            timeout: None,
            concurrency: 1,
        }
    );

    let report = BuildPipeline::from_settings(&settings, Arc::new(papers_provider()))
        .run(&corpus)
        .unwrap();
    assert_eq!(report.batches, 2);
    assert_eq!(report.output, project.index_dir());

    let ready = ReadyIndex::open(&settings.index_path, Arc::new(papers_provider())).unwrap();
    let top = ready.similar_to_vector(&[0.0, 1.0], 1).unwrap();
    assert_eq!(top[0].record.id, RecordId::Text("P-2".to_string()));
}

#[test]
fn test_saved_settings_round_trip() {
    let project = TestProject::new();
    let settings = Settings::default();
    let path = project.path().join("nested/settings.toml");
    settings.save(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded, settings);
}
