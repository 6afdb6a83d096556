//! Reference dataset
//!
//! The phone catalog recommendations are drawn from. Rows are addressed by
//! position, which must match the row order the recommender was fitted on.

use std::collections::HashMap;
use std::io::Read;

use serde_json::{Map, Value};

use super::{ArtifactError, InferenceError};

/// One catalog row: column name to value, in file column order.
pub type ReferenceRecord = Map<String, Value>;

/// Cell spellings read as missing.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ReferenceDataset {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        Self::from_reader(bytes)
    }

    /// Parse CSV with a header row, inferring one type per column.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ArtifactError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let columns = dedupe_columns(reader.headers()?.iter());
        if columns.is_empty() {
            return Err(ArtifactError::Invalid("reference data has no columns".into()));
        }

        let mut raw: Vec<csv::StringRecord> = Vec::new();
        for record in reader.records() {
            raw.push(record?);
        }

        let kinds: Vec<ColumnKind> = (0..columns.len())
            .map(|c| infer_kind(raw.iter().filter_map(|r| r.get(c))))
            .collect();

        let rows = raw
            .iter()
            .map(|record| {
                kinds
                    .iter()
                    .enumerate()
                    .map(|(c, kind)| parse_cell(record.get(c).unwrap_or(""), *kind))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<ReferenceRecord> {
        self.rows.get(index).map(|row| {
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }

    /// Rows at `indices`, in the order given.
    pub fn select<I>(&self, indices: I) -> Result<Vec<ReferenceRecord>, InferenceError>
    where
        I: IntoIterator<Item = usize>,
    {
        indices
            .into_iter()
            .map(|index| {
                self.record(index).ok_or(InferenceError::IndexOutOfBounds {
                    index,
                    len: self.len(),
                })
            })
            .collect()
    }
}

/// Repeated header names get `.1`, `.2`, ... suffixes.
fn dedupe_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::new();
    for header in headers {
        let count = seen.entry(header.to_string()).or_insert(0);
        if *count == 0 {
            columns.push(header.to_string());
        } else {
            columns.push(format!("{}.{}", header, count));
        }
        *count += 1;
    }
    columns
}

fn is_na(cell: &str) -> bool {
    NA_VALUES.contains(&cell)
}

/// Integral columns with missing cells widen to float.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind = ColumnKind::Integer;
    let mut has_na = false;
    for cell in cells {
        if is_na(cell) {
            has_na = true;
            continue;
        }
        let trimmed = cell.trim();
        if kind == ColumnKind::Integer && trimmed.parse::<i64>().is_err() {
            kind = ColumnKind::Float;
        }
        if kind == ColumnKind::Float && trimmed.parse::<f64>().is_err() {
            return ColumnKind::Text;
        }
    }
    if kind == ColumnKind::Integer && has_na {
        ColumnKind::Float
    } else {
        kind
    }
}

fn parse_cell(cell: &str, kind: ColumnKind) -> Value {
    if is_na(cell) {
        return Value::Null;
    }
    match kind {
        ColumnKind::Integer => cell.trim().parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        // Non-finite floats have no JSON form and become null.
        ColumnKind::Float => cell.trim().parse::<f64>().map(Value::from).unwrap_or(Value::Null),
        ColumnKind::Text => Value::String(cell.to_string()),
    }
}
