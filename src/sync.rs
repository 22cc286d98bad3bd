use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::cloud::{ContentItem, ObjectStorage};
use crate::error::{PreviewError, Step};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Fixed extension to MIME type table; the extension is matched lowercased
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("xml", "application/xml"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
];

/// Content type for a file, from its extension
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_CONTENT_TYPE;
    };
    let ext = ext.to_lowercase();

    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Object key for `path` under `root`: the relative path with `/` separators
pub fn object_key(root: &Path, path: &Path) -> anyhow::Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not under {}", path.display(), root.display()))?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    Ok(parts.join("/"))
}

/// Regular files below `dir`, recursively, in a stable order
fn walk_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        if path.is_dir() {
            files.extend(walk_files(&path)?);
        } else if path.is_file() {
            files.push(path);
        }
    }

    Ok(files)
}

/// Uploads a local directory tree into an environment's bucket
pub struct ContentSync {
    storage: Arc<dyn ObjectStorage>,
}

impl ContentSync {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Upload every regular file below `source_dir` and return how many were
    /// uploaded. The first failing file aborts the sync.
    pub async fn sync(&self, source_dir: &Path, bucket: &str) -> Result<usize, PreviewError> {
        info!("Syncing files from {} to S3...", source_dir.display());

        let files = walk_files(source_dir)
            .with_context(|| format!("Failed to walk {}", source_dir.display()))
            .map_err(|e| PreviewError::lookup(Step::SyncContent, e))?;

        let mut count = 0;
        for path in files {
            let key = object_key(source_dir, &path)
                .map_err(|e| PreviewError::mutation(Step::SyncContent, e))?;

            let body = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read file {}", path.display()))
                .map_err(|e| PreviewError::mutation(Step::SyncContent, e))?;

            let content_type = content_type_for(&path);
            let item = ContentItem {
                key: key.clone(),
                body,
                content_type,
            };

            self.storage
                .put_object(bucket, item)
                .await
                .with_context(|| format!("Failed to upload {}", key))
                .map_err(|e| PreviewError::mutation(Step::SyncContent, e))?;

            debug!("Uploaded {} ({})", key, content_type);
            count += 1;
        }

        info!("✓ Uploaded {} files", count);
        Ok(count)
    }
}
