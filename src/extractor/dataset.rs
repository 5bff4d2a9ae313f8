//! Flattening of heterogeneous records into one typed table.
//!
//! The column set is the union of every record's keys in first-seen order.
//! Each column gets the narrowest Arrow type that holds all of its non-null
//! cells; columns that mix kinds or hold nested values fall back to text,
//! with non-string cells rendered as compact JSON.

use crate::error::Result;
use crate::extractor::record_collector::Record;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Column holding the run's extraction timestamp, identical on every row.
pub const EXTRACTED_AT_COLUMN: &str = "extracted_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl ColumnKind {
    fn infer<'a>(cells: impl Iterator<Item = &'a Value>) -> Self {
        let mut kind: Option<ColumnKind> = None;

        for cell in cells {
            let cell_kind = match cell {
                Value::Bool(_) => ColumnKind::Boolean,
                Value::Number(n) if n.as_i64().is_some() => ColumnKind::Int64,
                Value::Number(_) => ColumnKind::Float64,
                Value::String(_) => ColumnKind::Utf8,
                // nested values only fit in a text column
                _ => return ColumnKind::Utf8,
            };

            kind = Some(match (kind, cell_kind) {
                (None, k) => k,
                (Some(a), b) if a == b => a,
                (Some(ColumnKind::Int64), ColumnKind::Float64)
                | (Some(ColumnKind::Float64), ColumnKind::Int64) => ColumnKind::Float64,
                _ => return ColumnKind::Utf8,
            });
        }

        kind.unwrap_or(ColumnKind::Utf8)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Utf8 => DataType::Utf8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Record>,
    extracted_at: String,
}

impl Dataset {
    pub fn from_records(rows: Vec<Record>, extracted_at: impl Into<String>) -> Self {
        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for row in &rows {
            for key in row.keys() {
                if seen.insert(key.as_str()) {
                    names.push(key.clone());
                }
            }
        }

        if !seen.contains(EXTRACTED_AT_COLUMN) {
            names.push(EXTRACTED_AT_COLUMN.to_string());
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let kind = if name == EXTRACTED_AT_COLUMN {
                    ColumnKind::Utf8
                } else {
                    ColumnKind::infer(rows.iter().filter_map(|row| cell(row, &name)))
                };
                Column { name, kind }
            })
            .collect();

        Self {
            columns,
            rows,
            extracted_at: extracted_at.into(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.kind)
    }

    pub fn schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c.name.as_str(), c.kind.data_type(), true))
            .collect();
        Arc::new(Schema::new(fields))
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter()
            .map(|column| self.build_array(column))
            .collect();

        Ok(RecordBatch::try_new(self.schema(), arrays)?)
    }

    fn build_array(&self, column: &Column) -> ArrayRef {
        if column.name == EXTRACTED_AT_COLUMN {
            let values = vec![Some(self.extracted_at.as_str()); self.rows.len()];
            return Arc::new(StringArray::from(values));
        }

        let cells = self.rows.iter().map(|row| cell(row, &column.name));

        match column.kind {
            ColumnKind::Boolean => Arc::new(BooleanArray::from(
                cells.map(|v| v.and_then(Value::as_bool)).collect::<Vec<_>>(),
            )),
            ColumnKind::Int64 => Arc::new(Int64Array::from(
                cells.map(|v| v.and_then(Value::as_i64)).collect::<Vec<_>>(),
            )),
            ColumnKind::Float64 => Arc::new(Float64Array::from(
                cells.map(|v| v.and_then(Value::as_f64)).collect::<Vec<_>>(),
            )),
            ColumnKind::Utf8 => Arc::new(StringArray::from(
                cells.map(|v| v.map(render_text)).collect::<Vec<_>>(),
            )),
        }
    }
}

/// A missing key and an explicit JSON null both read as an empty cell.
fn cell<'a>(row: &'a Record, name: &str) -> Option<&'a Value> {
    row.get(name).filter(|v| !v.is_null())
}

fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
