//! Filesystem service
//!
//! The task only needs a handful of primitives: existence checks, reading a
//! report, writing a summary and expanding a glob. They sit behind a trait so
//! the orchestrator can be exercised against an in-memory tree.

use crate::error::{Error, Result};
use glob::MatchOptions;
use std::path::{Path, PathBuf};

/// Filesystem primitives used by the build task
pub trait FileSystem: Send + Sync {
    /// Whether a file or directory exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Whether a regular file exists at `path`
    fn is_file(&self, path: &Path) -> bool;

    /// Read a whole file as UTF-8
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write `contents` to `path`, creating parent directories as needed
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Expand `pattern` relative to `root`, returning matching files in match order
    fn find_matching(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

/// Match options for result globs: case-insensitive, `*` stays within one
/// path component, dot files are matched like any other.
fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| {
            Error::from(e).with_context(format!("While reading {}", path.display()))
        })
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents).map_err(|e| {
            Error::from(e).with_context(format!("While writing {}", path.display()))
        })
    }

    fn find_matching(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        let full_pattern = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            root.join(pattern)
        };
        let full_pattern = full_pattern.to_string_lossy();

        let entries = glob::glob_with(&full_pattern, match_options()).map_err(|e| {
            Error::invalid_input("testResultsFiles", pattern).with_context(e.to_string())
        })?;

        Ok(entries
            .filter_map(|e| e.ok())
            .filter(|p| p.is_file())
            .collect())
    }
}
