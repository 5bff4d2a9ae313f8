use crate::config::OutputConfig;
use crate::error::{ExtractError, Result};
use crate::extractor::dataset::Dataset;
use crate::extractor::record_collector::SkippedFile;
use arrow::csv::WriterBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-run provenance summary written next to the dataset files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub extracted_at: String,
    pub record_count: usize,
    pub source_repository: String,
}

impl RunMetadata {
    pub fn new(
        extracted_at: impl Into<String>,
        record_count: usize,
        source_repository: impl Into<String>,
    ) -> Self {
        Self {
            extracted_at: extracted_at.into(),
            record_count,
            source_repository: source_repository.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub extracted_at: String,
    pub input_root: PathBuf,
    pub files_discovered: usize,
    pub record_count: usize,
    pub skipped: Vec<SkippedFile>,
    pub scan_warnings: Vec<String>,
    pub columns: Vec<String>,
    pub parquet_file: Option<PathBuf>,
    pub csv_file: Option<PathBuf>,
    pub metadata_file: PathBuf,
    pub source_repository: String,
    pub duration_ms: u64,
}

impl ExtractionReport {
    pub fn dataset_written(&self) -> bool {
        self.parquet_file.is_some() && self.csv_file.is_some()
    }
}

pub struct OutputManager {
    output_directory: PathBuf,
    parquet_path: PathBuf,
    csv_path: PathBuf,
    metadata_path: PathBuf,
}

impl OutputManager {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            output_directory: config.directory.clone(),
            parquet_path: config.parquet_path(),
            csv_path: config.csv_path(),
            metadata_path: config.metadata_path(),
        }
    }

    /// Creates the output directory if needed. Files already in it are left
    /// alone; each writer truncates only its own target.
    pub fn initialize(&self) -> Result<()> {
        if self.output_directory.exists() && !self.output_directory.is_dir() {
            return Err(ExtractError::InvalidPath {
                path: format!(
                    "{} exists and is not a directory",
                    self.output_directory.display()
                ),
            });
        }

        fs::create_dir_all(&self.output_directory).map_err(ExtractError::Io)?;
        Ok(())
    }

    pub fn get_output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn write_parquet(&self, dataset: &Dataset) -> Result<PathBuf> {
        let batch = dataset.to_record_batch()?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_created_by(format!(
                "{} version {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build();

        let file = fs::File::create(&self.parquet_path).map_err(ExtractError::Io)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        Ok(self.parquet_path.clone())
    }

    pub fn write_csv(&self, dataset: &Dataset) -> Result<PathBuf> {
        let batch = dataset.to_record_batch()?;

        let file = fs::File::create(&self.csv_path).map_err(ExtractError::Io)?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(&batch)?;

        Ok(self.csv_path.clone())
    }

    pub fn write_run_metadata(&self, metadata: &RunMetadata) -> Result<PathBuf> {
        let json_content =
            serde_json::to_string_pretty(metadata).map_err(ExtractError::Serialize)?;

        fs::write(&self.metadata_path, json_content).map_err(ExtractError::Io)?;

        Ok(self.metadata_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::record_collector::Record;
    use arrow::array::{Array, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    const TS: &str = "2024-05-01T12:00:00.000000+00:00";

    fn create_test_config(dir: &Path) -> OutputConfig {
        OutputConfig {
            directory: dir.join("data"),
            ..OutputConfig::default()
        }
    }

    fn create_test_dataset() -> Dataset {
        let rows: Vec<Record> = vec![
            json!({"name": "test-model-1", "version": "1.0.0", "description": "A model, with a comma", "source_file": "models/model1.json"}),
            json!({"name": "test-model-2", "category": "diffusion", "source_file": "models/model2.json"}),
        ]
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

        Dataset::from_records(rows, TS)
    }

    #[test]
    fn test_output_directory_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(&create_test_config(temp_dir.path()));

        manager.initialize().unwrap();
        assert!(manager.get_output_directory().is_dir());

        // Existing directory with unrelated files is kept
        fs::write(manager.get_output_directory().join("keep.txt"), "x").unwrap();
        manager.initialize().unwrap();
        assert!(manager.get_output_directory().join("keep.txt").exists());
    }

    #[test]
    fn test_initialize_rejects_file_in_the_way() {
        let temp_dir = TempDir::new().unwrap();
        let config = create_test_config(temp_dir.path());
        fs::write(&config.directory, "not a directory").unwrap();

        let result = OutputManager::new(&config).initialize();
        assert!(matches!(result, Err(ExtractError::InvalidPath { .. })));
    }

    #[test]
    fn test_parquet_output_reads_back() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(&create_test_config(temp_dir.path()));
        manager.initialize().unwrap();

        let path = manager.write_parquet(&create_test_dataset()).unwrap();

        let file = fs::File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();

        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);

        let schema = batches[0].schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["name", "version", "description", "source_file", "category", "extracted_at"]
        );

        let category = batches[0]
            .column_by_name("category")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert!(category.is_null(0));
        assert_eq!(category.value(1), "diffusion");
    }

    #[test]
    fn test_csv_output_has_header_and_quoting() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(&create_test_config(temp_dir.path()));
        manager.initialize().unwrap();

        let path = manager.write_csv(&create_test_dataset()).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "name,version,description,source_file,category,extracted_at"
        );
        assert!(lines[1].contains("\"A model, with a comma\""));
        assert_eq!(
            lines[2],
            format!("test-model-2,,,models/model2.json,diffusion,{}", TS)
        );
    }

    #[test]
    fn test_outputs_are_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(&create_test_config(temp_dir.path()));
        manager.initialize().unwrap();

        let csv_path = manager.get_output_directory().join("community_models.csv");
        fs::write(&csv_path, "stale\nstale\nstale\nstale\nstale\n").unwrap();

        manager.write_csv(&create_test_dataset()).unwrap();
        let content = fs::read_to_string(&csv_path).unwrap();
        assert!(!content.contains("stale"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_run_metadata_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(&create_test_config(temp_dir.path()));
        manager.initialize().unwrap();

        let metadata = RunMetadata::new(TS, 2, "https://github.com/drawthings/community-models");
        let path = manager.write_run_metadata(&metadata).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("\n  \"record_count\": 2"));

        let parsed: Value = serde_json::from_str(&content).unwrap();
        let object = parsed.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["extracted_at"], TS);
        assert_eq!(object["record_count"], 2);
        assert_eq!(
            object["source_repository"],
            "https://github.com/drawthings/community-models"
        );
    }
}
