pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod scanner;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, OutputConfig, ProvenanceConfig, ScanConfig};
pub use error::{ExtractError, Result, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{
    CollectionOutcome, Dataset, ExtractionProgress, ExtractionReport, OutputManager, Record,
    RecordCollector, RunMetadata, SkippedFile,
};
pub use scanner::{FileFilter, MetadataFile, MetadataScanner};
pub use ui::{OutputFormatter, OutputMode, ProgressManager};

use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// How a run ended when it did not fail.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The input root does not exist; nothing was read or written.
    InputMissing { root: PathBuf },
    Completed(ExtractionReport),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&ExtractionReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::InputMissing { .. } => None,
        }
    }
}

/// Main library interface: discover, parse, aggregate and export metadata files.
pub struct Extractor {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl Extractor {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);

        Self {
            config,
            output_formatter,
            progress_manager,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Ok(Self::new(
            config,
            output_mode,
            cli_args.verbosity_level(),
            cli_args.quiet,
        ))
    }

    /// Runs one extraction. A missing input root ends the run early without
    /// touching the output directory; failures while writing outputs are
    /// returned as errors.
    pub fn run(&self) -> Result<RunOutcome> {
        let start_time = Instant::now();
        let input_root = self.config.scan.root.clone();

        if !input_root.is_dir() {
            self.output_formatter.print_input_missing(&input_root);
            return Ok(RunOutcome::InputMissing { root: input_root });
        }

        self.output_formatter
            .start_operation("Starting metadata extraction");

        let output_manager = OutputManager::new(&self.config.output);
        output_manager.initialize()?;

        // Step 1: Discover metadata files
        let (files, scan_warnings) = self.scan_metadata(&input_root)?;

        // Step 2: Parse and aggregate records
        let outcome = self.collect_records(&files)?;
        for skipped in &outcome.skipped {
            self.output_formatter
                .error(&format!("Error reading {}: {}", skipped.source_file, skipped.reason));
        }

        let record_count = outcome.records.len();
        let extracted_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);

        // Step 3: Build the table and export it
        let (columns, parquet_file, csv_file) = if outcome.records.is_empty() {
            self.output_formatter.info(&format!(
                "No metadata records found in {}",
                input_root.display()
            ));
            (Vec::new(), None, None)
        } else {
            let dataset = Dataset::from_records(outcome.records, extracted_at.as_str());
            let columns: Vec<String> = dataset
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let (parquet_path, csv_path) = self.export_dataset(&output_manager, &dataset)?;
            (columns, Some(parquet_path), Some(csv_path))
        };

        // Step 4: Always write the run metadata
        let metadata = RunMetadata::new(
            extracted_at.as_str(),
            record_count,
            self.config.provenance.source_repository.as_str(),
        );
        let metadata_file = output_manager.write_run_metadata(&metadata)?;
        self.output_formatter.success(&format!(
            "Created metadata file: {}",
            metadata_file.display()
        ));

        let report = ExtractionReport {
            extracted_at,
            input_root,
            files_discovered: files.len(),
            record_count,
            skipped: outcome.skipped,
            scan_warnings,
            columns,
            parquet_file,
            csv_file,
            metadata_file,
            source_repository: metadata.source_repository,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        Ok(RunOutcome::Completed(report))
    }

    fn scan_metadata(&self, input_root: &Path) -> Result<(Vec<MetadataFile>, Vec<String>)> {
        self.output_formatter
            .start_operation("Scanning for metadata files");

        let spinner = self.progress_manager.create_spinner("Scanning...");
        let scanner = MetadataScanner::new(&self.config.scan);
        let result = scanner.scan_directory(input_root);
        spinner.finish_and_clear();
        let result = result?;

        for warning in &result.warnings {
            self.output_formatter.warning(warning);
        }

        let stats = scanner.get_statistics(&result.files);
        self.output_formatter.debug(&stats.display_summary());
        self.output_formatter.info(&format!(
            "Found {} metadata files",
            result.files.len()
        ));

        Ok((result.files, result.warnings))
    }

    fn collect_records(&self, files: &[MetadataFile]) -> Result<CollectionOutcome> {
        let file_progress = self.progress_manager.create_file_progress(files.len() as u64);
        let progress_callback = {
            let pb = file_progress.clone();
            move |progress: &ExtractionProgress| {
                ui::progress::update_file_progress(&pb, progress);
            }
        };

        let collector =
            RecordCollector::new().with_max_file_size(self.config.scan.max_file_size);
        let outcome = collector.collect(files, Some(&progress_callback))?;

        ui::progress::finish_progress_with_summary(
            &file_progress,
            &format!("Parsed {} records", outcome.records.len()),
            outcome.progress.elapsed(),
        );

        Ok(outcome)
    }

    fn export_dataset(
        &self,
        output_manager: &OutputManager,
        dataset: &Dataset,
    ) -> Result<(PathBuf, PathBuf)> {
        self.output_formatter
            .start_operation("Writing dataset files");

        let parquet_path = output_manager.write_parquet(dataset)?;
        self.output_formatter.success(&format!(
            "Created parquet file: {} with {} records",
            parquet_path.display(),
            dataset.num_rows()
        ));

        let csv_path = output_manager.write_csv(dataset)?;
        self.output_formatter.success(&format!(
            "Created CSV file: {} with {} records",
            csv_path.display(),
            dataset.num_rows()
        ));

        Ok((parquet_path, csv_path))
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config).map_err(ExtractError::Io)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn handle_error(&self, error: &ExtractError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Convenience function: run with default settings, explicit paths and no console output.
pub fn run_extraction<I: Into<PathBuf>, O: Into<PathBuf>>(
    input_root: I,
    output_dir: O,
) -> Result<RunOutcome> {
    let config = Config::with_paths(input_root, output_dir);
    config.validate()?;

    Extractor::new(config, OutputMode::Plain, 0, true).run()
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
