pub mod dataset;
pub mod output_manager;
pub mod record_collector;

pub use dataset::{Column, ColumnKind, Dataset, EXTRACTED_AT_COLUMN};
pub use output_manager::{ExtractionReport, OutputManager, RunMetadata};
pub use record_collector::{
    CollectionOutcome, ExtractionProgress, Record, RecordCollector, SkippedFile,
    SOURCE_FILE_COLUMN,
};
