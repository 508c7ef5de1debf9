//! Ingest: enumerate candidate FEL files under a scan root.

use crate::core::config::IngestConfig;
use crate::core::error::Result;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A file that failed to decode as UTF-8 or otherwise could not be read.
#[derive(Debug, Clone)]
pub struct IngestWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Result of an ingest pass: the ordered file list plus any warnings.
#[derive(Debug, Default)]
pub struct IngestResult {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<IngestWarning>,
}

const INCLUDED_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Enumerates FEL source files under a root, honoring `.gitignore` and a fixed
/// set of excluded path fragments.
pub struct Ingest<'a> {
    root: PathBuf,
    config: &'a IngestConfig,
}

impl<'a> Ingest<'a> {
    pub fn new(root: &Path, config: &'a IngestConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// Enumerate every candidate file under the root, in lexicographic order.
    pub fn scan(&self) -> Result<IngestResult> {
        let mut files = self.walk()?;
        files.sort();
        Ok(IngestResult {
            files,
            warnings: Vec::new(),
        })
    }

    /// Enumerate only the given paths (relative to root), intersected with the
    /// include/exclude filters, for incremental scans.
    pub fn scan_changed(&self, changed: &[PathBuf]) -> Result<IngestResult> {
        let all: HashSet<PathBuf> = self.walk()?.into_iter().collect();
        let mut files: Vec<PathBuf> = changed
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    self.root.join(p)
                }
            })
            .filter(|p| all.contains(p))
            .collect();
        files.sort();
        Ok(IngestResult {
            files,
            warnings: Vec::new(),
        })
    }

    fn walk(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();

            if path.is_dir() {
                continue;
            }

            if self.is_excluded(path) {
                continue;
            }

            if let Ok(meta) = path.metadata() {
                if meta.len() > self.config.max_file_size {
                    continue;
                }
            }

            if Self::is_fel_file(path) {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let s = path.to_string_lossy();
        self.config
            .excluded_fragments
            .iter()
            .any(|frag| s.contains(frag.as_str()))
    }

    fn is_fel_file(path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        INCLUDED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}
