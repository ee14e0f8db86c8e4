use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::CorpusError;
use crate::config::CorpusConfig;
use crate::types::{Record, RecordId};

/// Which source columns feed which record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub id: String,
    pub title: String,
    /// The primary text field; this is what gets embedded.
    pub text: String,
    /// Optional short summary; absent column means empty summaries.
    pub summary: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            title: "title".to_string(),
            text: "abstract".to_string(),
            summary: Some("tldr".to_string()),
        }
    }
}

/// Source encoding of a corpus file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    Csv,
    JsonLines,
    /// A single top-level array of objects.
    JsonArray,
}

impl CorpusFormat {
    /// Pick a format from the file extension.
    pub fn detect(path: &Path) -> Result<Self, CorpusError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("jsonl" | "ndjson") => Ok(Self::JsonLines),
            Some("json") => Ok(Self::JsonArray),
            _ => Err(CorpusError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Resolved positions of the mapped columns in a CSV header.
struct CsvColumns {
    id: usize,
    title: usize,
    text: usize,
    summary: Option<usize>,
}

/// Reads a corpus file into records in source row order.
#[derive(Debug, Clone, Default)]
pub struct CorpusLoader {
    columns: ColumnMapping,
    format: Option<CorpusFormat>,
}

impl CorpusLoader {
    /// `format: None` detects the format from the file extension.
    pub fn new(columns: ColumnMapping, format: Option<CorpusFormat>) -> Self {
        Self { columns, format }
    }

    pub fn from_config(config: &CorpusConfig) -> Self {
        let format = match config.format.as_str() {
            "csv" => Some(CorpusFormat::Csv),
            "jsonl" => Some(CorpusFormat::JsonLines),
            "json" => Some(CorpusFormat::JsonArray),
            _ => None,
        };
        let columns = ColumnMapping {
            id: config.id_column.clone(),
            title: config.title_column.clone(),
            text: config.text_column.clone(),
            summary: config.summary_column.clone().filter(|c| !c.is_empty()),
        };
        Self::new(columns, format)
    }

    pub fn columns(&self) -> &ColumnMapping {
        &self.columns
    }

    /// Load all records from `path`.
    pub fn load(&self, path: &Path) -> Result<Vec<Record>, CorpusError> {
        let format = match self.format {
            Some(format) => format,
            None => CorpusFormat::detect(path)?,
        };
        let file = File::open(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let records = match format {
            CorpusFormat::Csv => self.read_csv(file, path)?,
            CorpusFormat::JsonLines => self.read_jsonl(BufReader::new(file), path)?,
            CorpusFormat::JsonArray => self.read_json_array(BufReader::new(file), path)?,
        };

        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "corpus loaded"
        );
        Ok(records)
    }

    /// Parse CSV with a header row.
    pub fn read_csv<R: Read>(&self, reader: R, origin: &Path) -> Result<Vec<Record>, CorpusError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| malformed(origin, &e))?
            .clone();
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let columns = CsvColumns {
            text: find(&self.columns.text).ok_or_else(|| missing(&self.columns.text, origin))?,
            id: find(&self.columns.id).ok_or_else(|| missing(&self.columns.id, origin))?,
            title: find(&self.columns.title).ok_or_else(|| missing(&self.columns.title, origin))?,
            summary: self.columns.summary.as_deref().and_then(find),
        };

        let mut builder = RecordBuilder::new(origin);
        for (index, row) in csv_reader.records().enumerate() {
            let row = row.map_err(|e| malformed(origin, &e))?;
            let cell = |i: usize| row.get(i).unwrap_or("").to_string();

            let id = RecordId::parse(row.get(columns.id).unwrap_or(""));
            builder.push(
                index + 1,
                id,
                cell(columns.title),
                cell(columns.text),
                columns.summary.map(cell).unwrap_or_default(),
            )?;
        }

        builder.finish()
    }

    /// Parse JSON Lines: one object per non-blank line.
    ///
    /// Columns are validated against the keys of the first object; later rows
    /// missing a text key get an empty value.
    pub fn read_jsonl<R: BufRead>(
        &self,
        reader: R,
        origin: &Path,
    ) -> Result<Vec<Record>, CorpusError> {
        let mut builder = RecordBuilder::new(origin);
        let mut row = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| CorpusError::Io {
                path: origin.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let object = match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(CorpusError::Malformed {
                        path: origin.to_path_buf(),
                        line: line_no as u64 + 1,
                        reason: "expected a JSON object".to_string(),
                    });
                }
                Err(e) => {
                    return Err(CorpusError::Malformed {
                        path: origin.to_path_buf(),
                        line: line_no as u64 + 1,
                        reason: e.to_string(),
                    });
                }
            };

            row += 1;
            self.push_object(&mut builder, row, &object)?;
        }

        builder.finish()
    }

    /// Parse a JSON document whose top level is an array of objects.
    ///
    /// Columns are validated against the keys of the first element, as for
    /// JSON Lines.
    pub fn read_json_array<R: Read>(
        &self,
        reader: R,
        origin: &Path,
    ) -> Result<Vec<Record>, CorpusError> {
        let document: Value = serde_json::from_reader(reader).map_err(|e| CorpusError::Malformed {
            path: origin.to_path_buf(),
            line: e.line() as u64,
            reason: e.to_string(),
        })?;
        let Value::Array(elements) = document else {
            return Err(CorpusError::Malformed {
                path: origin.to_path_buf(),
                line: 1,
                reason: "expected a top-level JSON array".to_string(),
            });
        };

        let mut builder = RecordBuilder::new(origin);
        for (index, element) in elements.into_iter().enumerate() {
            let Value::Object(object) = element else {
                return Err(CorpusError::Malformed {
                    path: origin.to_path_buf(),
                    line: 1,
                    reason: format!("array element {} is not a JSON object", index + 1),
                });
            };
            self.push_object(&mut builder, index + 1, &object)?;
        }

        builder.finish()
    }

    /// Map one JSON object onto a record; `row` is 1-based.
    fn push_object(
        &self,
        builder: &mut RecordBuilder<'_>,
        row: usize,
        object: &Map<String, Value>,
    ) -> Result<(), CorpusError> {
        if row == 1 {
            for column in [&self.columns.text, &self.columns.id, &self.columns.title] {
                if !object.contains_key(column.as_str()) {
                    return Err(missing(column, builder.origin));
                }
            }
        }

        let id = match object.get(&self.columns.id) {
            Some(Value::Number(n)) => n
                .as_i64()
                .map(RecordId::Int)
                .or_else(|| RecordId::parse(&n.to_string())),
            Some(Value::String(s)) => RecordId::parse(s),
            _ => None,
        };
        let summary = self
            .columns
            .summary
            .as_deref()
            .map(|c| text_field(object, c))
            .unwrap_or_default();

        builder.push(
            row,
            id,
            text_field(object, &self.columns.title),
            text_field(object, &self.columns.text),
            summary,
        )
    }
}

/// Accumulates records while enforcing id presence and uniqueness.
struct RecordBuilder<'a> {
    origin: &'a Path,
    records: Vec<Record>,
    seen: HashMap<RecordId, usize>,
}

impl<'a> RecordBuilder<'a> {
    fn new(origin: &'a Path) -> Self {
        Self {
            origin,
            records: Vec::new(),
            seen: HashMap::new(),
        }
    }

    fn push(
        &mut self,
        row: usize,
        id: Option<RecordId>,
        title: String,
        abstract_text: String,
        summary: String,
    ) -> Result<(), CorpusError> {
        let id = id.ok_or_else(|| CorpusError::MissingId {
            row,
            path: self.origin.to_path_buf(),
        })?;
        if let Some(&first_row) = self.seen.get(&id) {
            return Err(CorpusError::DuplicateId {
                id,
                first_row,
                row,
                path: self.origin.to_path_buf(),
            });
        }
        self.seen.insert(id.clone(), row);
        self.records.push(Record {
            id,
            title,
            abstract_text,
            summary,
        });
        Ok(())
    }

    fn finish(self) -> Result<Vec<Record>, CorpusError> {
        if self.records.is_empty() {
            return Err(CorpusError::Empty {
                path: self.origin.to_path_buf(),
            });
        }
        Ok(self.records)
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn missing(column: &str, path: &Path) -> CorpusError {
    CorpusError::MissingColumn {
        column: column.to_string(),
        path: path.to_path_buf(),
    }
}

fn malformed(path: &Path, err: &csv::Error) -> CorpusError {
    CorpusError::Malformed {
        path: PathBuf::from(path),
        line: err.position().map(|p| p.line()).unwrap_or(0),
        reason: err.to_string(),
    }
}
