use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected a JSON object in {path}, found {found}")]
    NotAnObject { path: String, found: String },

    #[error("File too large: {path} is {size} bytes (max: {max_size} bytes)")]
    FileTooLarge {
        path: String,
        size: u64,
        max_size: u64,
    },

    #[error("Arrow conversion failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet write failed: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Failed to serialize run metadata: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },
}

impl ExtractError {
    /// Per-file failures that are reported and skipped instead of ending the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExtractError::Read { .. }
                | ExtractError::Decode { .. }
                | ExtractError::NotAnObject { .. }
                | ExtractError::FileTooLarge { .. }
        )
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ExtractError {
    fn user_message(&self) -> String {
        match self {
            ExtractError::Read { path, source } => {
                format!("Could not read {}: {}", path, source)
            }
            ExtractError::Decode { path, source } => {
                format!("Malformed JSON in {}: {}", path, source)
            }
            ExtractError::NotAnObject { path, found } => {
                format!("{} holds a JSON {} instead of an object", path, found)
            }
            ExtractError::FileTooLarge {
                path,
                size,
                max_size,
            } => {
                format!(
                    "{} is too large: {} (maximum allowed: {})",
                    path,
                    format_bytes(*size),
                    format_bytes(*max_size)
                )
            }
            ExtractError::Arrow(e) => format!("Could not build the dataset table: {}", e),
            ExtractError::Parquet(e) => format!("Could not write the Parquet file: {}", e),
            ExtractError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ExtractError::InvalidPath { path } => {
                format!("Invalid path: {}", path)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ExtractError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Some(
                "Ensure you have write permission for the output directory.".to_string()
            ),
            ExtractError::Io(_) => Some(
                "Check that the output directory is writable and the disk is not full.".to_string()
            ),
            ExtractError::Decode { .. } | ExtractError::NotAnObject { .. } => Some(
                "Fix or remove the file; it was skipped and the remaining files were processed.".to_string()
            ),
            ExtractError::FileTooLarge { .. } => Some(
                "Raise max_file_size in the [scan] section of the configuration file.".to_string()
            ),
            ExtractError::Config { .. } => Some(
                "Check your configuration file syntax, or regenerate one with --generate-config.".to_string()
            ),
            ExtractError::InvalidPath { .. } => Some(
                "Pass an existing directory with --input and a writable location with --output.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ExtractError {
    fn from(error: toml::de::Error) -> Self {
        ExtractError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
