//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, CellAlignment, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};

use crate::pipeline::BuildReport;
use crate::query::SimilarRecord;
use crate::storage::IndexManifest;

/// Width after which long text cells are cut.
const SNIPPET_CHARS: usize = 80;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        Self { table }
    }

    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Right-align a numeric column.
    pub fn align_right(mut self, column: usize) -> Self {
        if let Some(col) = self.table.column_mut(column) {
            col.set_cell_alignment(CellAlignment::Right);
        }
        self
    }

    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Ranked query results.
pub fn create_results_table(results: &[SimilarRecord]) -> String {
    let mut builder = TableBuilder::new().set_headers(vec![
        "Rank", "Distance", "Id", "Title", "Summary",
    ]);

    for hit in results {
        let summary = if hit.record.summary.is_empty() {
            snippet(&hit.record.abstract_text)
        } else {
            snippet(&hit.record.summary)
        };
        builder = builder.add_row(vec![
            hit.rank.to_string(),
            format!("{:.4}", hit.distance),
            hit.record.id.to_string(),
            hit.record.title.clone(),
            summary,
        ]);
    }

    builder.align_right(0).align_right(1).build()
}

/// Summary of a finished build.
pub fn create_build_table(report: &BuildReport) -> String {
    let seconds = report.elapsed.as_secs_f64();
    let rate = if seconds > 0.0 {
        report.records as f64 / seconds
    } else {
        0.0
    };

    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec!["Records".to_string(), report.records.to_string()])
        .add_row(vec!["Dimension".to_string(), report.dimension.to_string()])
        .add_row(vec!["Batches".to_string(), report.batches.to_string()])
        .add_row(vec!["Retries".to_string(), report.retries.to_string()])
        .add_row(vec!["Generation".to_string(), report.generation.to_string()])
        .add_row(vec!["Time".to_string(), format!("{:.2?}", report.elapsed)])
        .add_row(vec!["Rate".to_string(), format!("{rate:.0} records/s")])
        .add_row(vec!["Output".to_string(), report.output.display().to_string()])
        .build()
}

/// Manifest of a published index.
pub fn create_info_table(manifest: &IndexManifest) -> String {
    TableBuilder::new()
        .set_headers(vec!["Property", "Value"])
        .add_row(vec!["Model".to_string(), manifest.model.clone()])
        .add_row(vec!["Records".to_string(), manifest.count.to_string()])
        .add_row(vec!["Dimension".to_string(), manifest.dimension.to_string()])
        .add_row(vec!["Generation".to_string(), manifest.generation.to_string()])
        .add_row(vec!["Created".to_string(), manifest.created_at.clone()])
        .add_row(vec!["Vectors".to_string(), manifest.vectors_file.clone()])
        .add_row(vec!["Records file".to_string(), manifest.records_file.clone()])
        .add_row(vec![
            "Format version".to_string(),
            manifest.format_version.to_string(),
        ])
        .build()
}

fn snippet(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
