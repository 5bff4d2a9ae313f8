use crate::config::ScanConfig;
use crate::error::{ExtractError, Result};
use crate::scanner::file_filter::FileFilter;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct MetadataFile {
    pub source_path: PathBuf,
    /// Path below the scan root, always `/`-separated.
    pub relative_path: String,
    pub size: u64,
}

impl MetadataFile {
    pub fn new(source_path: PathBuf, relative_path: String, size: u64) -> Self {
        Self {
            source_path,
            relative_path,
            size,
        }
    }

    pub fn display_path(&self) -> &str {
        &self.relative_path
    }
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<MetadataFile>,
    /// Walk errors (unreadable directories, broken links); the scan continues past them.
    pub warnings: Vec<String>,
}

pub struct MetadataScanner {
    filter: FileFilter,
    max_depth: Option<usize>,
    follow_links: bool,
}

impl MetadataScanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            filter: FileFilter::new(config),
            max_depth: config.max_depth,
            follow_links: config.follow_links,
        }
    }

    pub fn scan_directory<P: AsRef<Path>>(&self, root: P) -> Result<ScanResult> {
        let root_path = root.as_ref();

        if !root_path.exists() {
            return Err(ExtractError::InvalidPath {
                path: root_path.display().to_string(),
            });
        }

        if !root_path.is_dir() {
            return Err(ExtractError::InvalidPath {
                path: format!("{} is not a directory", root_path.display()),
            });
        }

        let mut result = ScanResult::default();

        let mut walker = WalkDir::new(root_path).follow_links(self.follow_links);
        if let Some(max_depth) = self.max_depth {
            walker = walker.max_depth(max_depth);
        }

        let entries = walker
            .into_iter()
            .filter_entry(|e| self.should_traverse(e, root_path));

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err
                        .io_error()
                        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
                    {
                        result.warnings.push(format!("Permission denied: {}", err));
                    } else {
                        result.warnings.push(format!("Scan error: {}", err));
                    }
                    continue;
                }
            };

            if !is_file_entry(&entry) || !self.filter.is_metadata_file(entry.path()) {
                continue;
            }

            match self.process_file(&entry, root_path) {
                Ok(file) => result.files.push(file),
                Err(err) => result.warnings.push(format!(
                    "Error processing {}: {}",
                    entry.path().display(),
                    err
                )),
            }
        }

        // Sort by relative path for consistent output
        result
            .files
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        Ok(result)
    }

    fn should_traverse(&self, entry: &DirEntry, root_path: &Path) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }

        match entry.path().strip_prefix(root_path) {
            Ok(relative) => self.filter.should_traverse_directory(relative),
            Err(_) => true,
        }
    }

    fn process_file(&self, entry: &DirEntry, root_path: &Path) -> Result<MetadataFile> {
        let path = entry.path();

        // A dangling link gets size 0 here; reading it later reports the failure
        let size = if entry.path_is_symlink() {
            fs::metadata(path).map(|m| m.len()).unwrap_or(0)
        } else {
            entry
                .metadata()
                .map_err(|e| ExtractError::Io(e.into()))?
                .len()
        };

        let relative_path = calculate_relative_path(path, root_path)?;

        Ok(MetadataFile::new(path.to_path_buf(), relative_path, size))
    }

    pub fn get_statistics(&self, files: &[MetadataFile]) -> ScanStatistics {
        let total_files = files.len();
        let total_size = files.iter().map(|f| f.size).sum();

        let (largest_file_size, largest_file_path) = files
            .iter()
            .max_by_key(|f| f.size)
            .map(|f| (f.size, f.relative_path.clone()))
            .unwrap_or((0, String::new()));

        let max_nesting = files
            .iter()
            .map(|f| f.relative_path.matches('/').count())
            .max()
            .unwrap_or(0);

        ScanStatistics {
            total_files,
            total_size,
            largest_file_size,
            largest_file_path,
            max_nesting,
        }
    }
}

/// Regular files, plus links that do not resolve to a directory. Unfollowed
/// links report their own type, so the target decides.
fn is_file_entry(entry: &DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }

    entry.path_is_symlink() && !entry.file_type().is_dir() && !entry.path().is_dir()
}

fn calculate_relative_path(file_path: &Path, root_path: &Path) -> Result<String> {
    let relative = file_path
        .strip_prefix(root_path)
        .map_err(|_| ExtractError::InvalidPath {
            path: format!(
                "Cannot calculate relative path for {} from root {}",
                file_path.display(),
                root_path.display()
            ),
        })?;

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ExtractError::InvalidPath {
            path: format!(
                "Path contains parent directory references: {}",
                relative.display()
            ),
        });
    }

    Ok(to_forward_slash(relative))
}

pub(crate) fn to_forward_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Default)]
pub struct ScanStatistics {
    pub total_files: usize,
    pub total_size: u64,
    pub largest_file_size: u64,
    pub largest_file_path: String,
    pub max_nesting: usize,
}

impl ScanStatistics {
    pub fn display_summary(&self) -> String {
        let mut summary = format!(
            "Scan Results:\n  Metadata files: {}\n  Total size: {}\n  Deepest nesting: {}\n",
            self.total_files,
            crate::error::format_bytes(self.total_size),
            self.max_nesting
        );

        if self.largest_file_size > 0 {
            summary.push_str(&format!(
                "  Largest file: {} ({})\n",
                self.largest_file_path,
                crate::error::format_bytes(self.largest_file_size)
            ));
        }

        summary
    }
}
