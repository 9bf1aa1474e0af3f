// Document source module
// Loads raw markdown documents from a local directory tree

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{RagError, Result};

/// A raw document loaded from the document source. Immutable; discarded after
/// chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub raw_text: String,
    pub source_path: String,
}

/// Configuration for the local document source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Root directory that is scanned for markdown files
    pub root: PathBuf,
}

impl Default for SourceConfig {
    #[inline]
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/docs"),
        }
    }
}

/// Provider of raw documents for indexing. Returns documents in a stable
/// order; a source with no matching files yields an empty Vec, not an error.
pub trait DocumentSource: Send + Sync {
    fn load(&self) -> Result<Vec<Document>>;
}

/// Document source that walks a directory tree for `*.md` files
#[derive(Debug, Clone)]
pub struct MarkdownDirSource {
    root: PathBuf,
}

impl MarkdownDirSource {
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentSource for MarkdownDirSource {
    #[inline]
    fn load(&self) -> Result<Vec<Document>> {
        if !self.root.exists() {
            warn!("Document root {} does not exist", self.root.display());
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                RagError::Storage(format!("Failed to walk document root: {}", e))
            })?;

            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }

            let raw_text = fs::read_to_string(entry.path())?;
            let source_path = relative_display_path(entry.path(), &self.root);

            debug!(
                "Loaded document {} ({} characters)",
                source_path,
                raw_text.chars().count()
            );

            documents.push(Document {
                id: source_path.clone(),
                raw_text,
                source_path,
            });
        }

        debug!(
            "Loaded {} documents from {}",
            documents.len(),
            self.root.display()
        );
        Ok(documents)
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

fn relative_display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
