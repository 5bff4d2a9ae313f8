pub mod file_filter;
pub mod metadata_scanner;

pub use file_filter::FileFilter;
pub use metadata_scanner::{MetadataFile, MetadataScanner, ScanResult, ScanStatistics};
