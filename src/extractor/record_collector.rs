use crate::error::{ExtractError, Result};
use crate::scanner::MetadataFile;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::time::{Duration, Instant};

/// Column added to every record with the file's path below the input root.
pub const SOURCE_FILE_COLUMN: &str = "source_file";

/// One decoded metadata file. Field order follows the source document.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub current_file: Option<String>,
    pub start_time: Instant,
    pub errors: Vec<String>,
}

impl ExtractionProgress {
    pub fn new(total_files: usize, total_bytes: u64) -> Self {
        Self {
            files_processed: 0,
            total_files,
            bytes_processed: 0,
            total_bytes,
            current_file: None,
            start_time: Instant::now(),
            errors: Vec::new(),
        }
    }

    pub fn update_file(&mut self, filename: String, bytes: u64) {
        self.files_processed += 1;
        self.bytes_processed += bytes;
        self.current_file = Some(filename);
    }

    pub fn add_error<S: Into<String>>(&mut self, error: S) {
        self.errors.push(error.into());
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn estimated_remaining(&self) -> Duration {
        if self.files_processed == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.elapsed();
        let rate = self.files_processed as f64 / elapsed.as_secs_f64();
        let remaining_files = self.total_files.saturating_sub(self.files_processed);

        if rate > 0.0 && rate.is_finite() {
            Duration::from_secs_f64(remaining_files as f64 / rate)
        } else {
            Duration::from_secs(0)
        }
    }
}

/// A metadata file that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub source_file: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct CollectionOutcome {
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedFile>,
    pub progress: ExtractionProgress,
}

pub struct RecordCollector {
    max_file_size: u64,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Decodes every file in order. A file that fails with a recoverable
    /// error is recorded in `skipped` and the remaining files are still read;
    /// any other error ends the collection.
    pub fn collect(
        &self,
        files: &[MetadataFile],
        progress_callback: Option<&dyn Fn(&ExtractionProgress)>,
    ) -> Result<CollectionOutcome> {
        let total_bytes = files.iter().map(|f| f.size).sum();
        let mut progress = ExtractionProgress::new(files.len(), total_bytes);
        let mut records = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();

        for file in files {
            if let Some(callback) = progress_callback {
                callback(&progress);
            }

            match self.read_record(file) {
                Ok(record) => records.push(record),
                Err(e) if e.is_recoverable() => {
                    progress.add_error(e.to_string());
                    skipped.push(SkippedFile {
                        source_file: file.relative_path.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }

            progress.update_file(file.relative_path.clone(), file.size);
        }

        if let Some(callback) = progress_callback {
            callback(&progress);
        }

        Ok(CollectionOutcome {
            records,
            skipped,
            progress,
        })
    }

    pub fn read_record(&self, file: &MetadataFile) -> Result<Record> {
        let path = file.relative_path.clone();

        if file.size > self.max_file_size {
            return Err(ExtractError::FileTooLarge {
                path,
                size: file.size,
                max_size: self.max_file_size,
            });
        }

        let content = fs::read_to_string(&file.source_path).map_err(|source| {
            ExtractError::Read {
                path: path.clone(),
                source,
            }
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|source| {
            ExtractError::Decode {
                path: path.clone(),
                source,
            }
        })?;

        let mut record = match value {
            Value::Object(map) => map,
            other => {
                return Err(ExtractError::NotAnObject {
                    path,
                    found: json_kind(&other).to_string(),
                })
            }
        };

        // An existing key of the same name is replaced in place
        record.insert(SOURCE_FILE_COLUMN.to_string(), Value::String(path));

        Ok(record)
    }
}

impl Default for RecordCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
