use crate::error::{ExtractError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_SOURCE_REPOSITORY: &str = "https://github.com/drawthings/community-models";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub output: OutputConfig,
    pub provenance: ProvenanceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub exclude_patterns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    pub follow_links: bool,
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub parquet_file: String,
    pub csv_file: String,
    pub metadata_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    pub source_repository: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("external-repo"),
            extensions: vec!["json".to_string()],
            exclude_dirs: Vec::new(),
            exclude_patterns: Vec::new(),
            max_depth: None,
            follow_links: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
            parquet_file: "community_models.parquet".to_string(),
            csv_file: "community_models.csv".to_string(),
            metadata_file: "extraction_metadata.json".to_string(),
        }
    }
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            source_repository: DEFAULT_SOURCE_REPOSITORY.to_string(),
        }
    }
}

impl OutputConfig {
    pub fn parquet_path(&self) -> PathBuf {
        self.directory.join(&self.parquet_file)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.directory.join(&self.csv_file)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.directory.join(&self.metadata_file)
    }
}

impl Config {
    /// Defaults with the input root and output directory replaced.
    pub fn with_paths<I: Into<PathBuf>, O: Into<PathBuf>>(input_root: I, output_dir: O) -> Self {
        let mut config = Self::default();
        config.scan.root = input_root.into();
        config.output.directory = output_dir.into();
        config
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExtractError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ExtractError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ExtractError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["models-extract.toml", ".models-extract.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref input_root) = cli_args.input_root {
            self.scan.root = input_root.clone();
        }

        if let Some(ref output_dir) = cli_args.output_dir {
            self.output.directory = output_dir.clone();
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ExtractError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| ExtractError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(ExtractError::Config {
                message: "At least one file extension must be specified".to_string(),
            });
        }

        if self.scan.max_file_size == 0 {
            return Err(ExtractError::Config {
                message: "Maximum file size must be greater than 0".to_string(),
            });
        }

        if self.scan.max_depth == Some(0) {
            return Err(ExtractError::Config {
                message: "Maximum directory depth must be greater than 0".to_string(),
            });
        }

        for pattern in &self.scan.exclude_patterns {
            Regex::new(pattern).map_err(|e| ExtractError::Config {
                message: format!("Invalid exclude pattern '{}': {}", pattern, e),
            })?;
        }

        let output_files = [
            ("parquet_file", &self.output.parquet_file),
            ("csv_file", &self.output.csv_file),
            ("metadata_file", &self.output.metadata_file),
        ];

        let mut seen = HashSet::new();
        for (key, name) in output_files {
            if !is_plain_file_name(name) {
                return Err(ExtractError::Config {
                    message: format!("output.{} must be a plain file name, got '{}'", key, name),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(ExtractError::Config {
                    message: format!("output.{} reuses the file name '{}'", key, name),
                });
            }
        }

        let url = Url::parse(&self.provenance.source_repository).map_err(|e| {
            ExtractError::Config {
                message: format!(
                    "provenance.source_repository is not a valid URL ({}): {}",
                    self.provenance.source_repository, e
                ),
            }
        })?;

        if url.cannot_be_a_base() {
            return Err(ExtractError::Config {
                message: format!(
                    "provenance.source_repository must be an absolute URL: {}",
                    url
                ),
            });
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let path = Path::new(name);
    !name.trim().is_empty()
        && path.file_name().and_then(|n| n.to_str()) == Some(name)
        && name != "."
        && name != ".."
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub input_root: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input_root(mut self, input_root: Option<PathBuf>) -> Self {
        self.input_root = input_root;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }
}
