//! Directory loader

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Document, DocumentError, FileExtractor};

/// Loads documents from a directory, dispatching by file extension
pub struct DocumentStore {
    dir: PathBuf,
    /// Lowercase extension without the dot → extractor
    extractors: HashMap<String, Arc<dyn FileExtractor>>,
    /// Lowercase extensions that are ignored
    skipped: HashSet<String>,
}

impl DocumentStore {
    /// Create a store over `dir` with no extractors registered
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extractors: HashMap::new(),
            skipped: HashSet::new(),
        }
    }

    /// Route files with `extension` (e.g. "pdf" or ".pdf") through `extractor`
    pub fn with_extractor(mut self, extension: &str, extractor: Arc<dyn FileExtractor>) -> Self {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.extractors.insert(ext, extractor);
        self
    }

    /// Ignore files with `extension`, e.g. when no extractor is available for them
    pub fn skip_extension(mut self, extension: &str) -> Self {
        self.skipped
            .insert(extension.trim_start_matches('.').to_ascii_lowercase());
        self
    }

    /// Load every non-hidden regular file in the directory, sorted by name.
    ///
    /// Subdirectories are not descended into. Files that yield no text are skipped.
    pub async fn load(&self) -> Result<Vec<Document>, DocumentError> {
        let io_err = |source| DocumentError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if is_hidden(&path) {
                continue;
            }
            if lowercase_extension(&path).is_some_and(|ext| self.skipped.contains(&ext)) {
                warn!(path = %path.display(), "Skipping file with unsupported extension");
                continue;
            }
            let file_type = entry.file_type().await.map_err(io_err)?;
            if file_type.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let text = match self.extractor_for(&path) {
                Some(extractor) => {
                    info!(path = %path.display(), "Extracting document");
                    extractor.extract(&path).await?
                }
                None => {
                    let bytes = tokio::fs::read(&path).await.map_err(|source| DocumentError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    String::from_utf8_lossy(&bytes).into_owned()
                }
            };

            if text.trim().is_empty() {
                warn!(path = %path.display(), "Skipping document with no text");
                continue;
            }
            debug!(path = %path.display(), chars = text.len(), "Loaded document");
            documents.push(Document { path, text });
        }

        info!(dir = %self.dir.display(), count = documents.len(), "Documents loaded");
        Ok(documents)
    }

    fn extractor_for(&self, path: &Path) -> Option<&Arc<dyn FileExtractor>> {
        self.extractors.get(&lowercase_extension(path)?)
    }
}

fn lowercase_extension(path: &Path) -> Option<String> {
    Some(path.extension()?.to_str()?.to_ascii_lowercase())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
