use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Attachment, Id};

/// Upload size cap shared by every context.
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024; // 50 MB

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Validation context for an upload. Projects only take PDFs; documents and
/// FAQs validate against their own document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("file exceeds the {} MB limit", MAX_FILE_SIZE / 1024 / 1024)]
    TooLarge,
    #[error("{0}")]
    UnsupportedType(String),
    #[error("not_found")]
    NotFound,
    #[error("io: {0}")]
    Io(String),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Validates and persists an upload under the per-entity directory,
    /// returning the attachment record for the stored file. Nothing is
    /// written if validation fails.
    async fn save(
        &self,
        scope: &str,
        entity_id: Id,
        original_name: &str,
        kind: FileKind,
        category: Option<String>,
        bytes: &[u8],
    ) -> Result<Attachment, FileStoreError>;

    /// Removes the file addressed by an attachment's `file_path`.
    /// Callers treat a missing file as non-fatal.
    async fn delete(&self, file_path: &str) -> Result<(), FileStoreError>;
}

/// Filesystem store rooted at the uploads directory. Files land under
/// `<root>/<scope>/<entity_id>/<stored_filename>` and are addressed by the
/// relative `uploads/...` path recorded on the attachment, which is also the
/// URL path they are served under.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Maps a recorded "uploads/..." path back onto the physical root.
    fn resolve(&self, file_path: &str) -> PathBuf {
        let rel = file_path.strip_prefix("uploads/").unwrap_or(file_path);
        self.root.join(rel)
    }
}

/// Strips any path components and replaces characters that are unsafe in
/// filenames or URLs. Non-ASCII (e.g. CJK) filenames pass through untouched.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '%') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

fn validate(original_name: &str, kind: FileKind, bytes: &[u8]) -> Result<Option<String>, FileStoreError> {
    if bytes.len() > MAX_FILE_SIZE {
        return Err(FileStoreError::TooLarge);
    }
    let ext = extension_of(original_name);
    // Sniff first, fall back to the extension for formats infer does not know.
    let sniffed = infer::get(bytes).map(|t| t.mime_type().to_string());
    let mime = sniffed.clone().or_else(|| mime_from_extension(&ext).map(String::from));
    match kind {
        FileKind::Pdf => {
            if ext != "pdf" {
                return Err(FileStoreError::UnsupportedType(
                    "only PDF files (.pdf) are accepted here".into(),
                ));
            }
            if let Some(m) = &sniffed {
                if m != "application/pdf" {
                    return Err(FileStoreError::UnsupportedType(format!(
                        "file content is {m}, not a PDF"
                    )));
                }
            }
        }
        FileKind::Image => {
            if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                return Err(FileStoreError::UnsupportedType(format!(
                    "only image files ({}) are accepted here",
                    IMAGE_EXTENSIONS.join(", ")
                )));
            }
            if let Some(m) = &mime {
                if !m.starts_with("image/") {
                    return Err(FileStoreError::UnsupportedType(format!(
                        "file content is {m}, not an image"
                    )));
                }
            }
        }
    }
    Ok(mime)
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(
        &self,
        scope: &str,
        entity_id: Id,
        original_name: &str,
        kind: FileKind,
        category: Option<String>,
        bytes: &[u8],
    ) -> Result<Attachment, FileStoreError> {
        let mime_type = validate(original_name, kind, bytes)?;

        let dir = self.root.join(scope).join(entity_id.to_string());
        std::fs::create_dir_all(&dir).map_err(|e| FileStoreError::Io(e.to_string()))?;

        let safe = sanitize_filename(original_name);
        let ts = Utc::now().timestamp();
        let mut stored_filename = format!("{ts}_{safe}");
        // Timestamp prefix makes collisions rare; a short random infix breaks
        // same-second uploads of the same name.
        while dir.join(&stored_filename).exists() {
            let salt: u16 = rand::thread_rng().gen();
            stored_filename = format!("{ts}_{salt:04x}_{safe}");
        }

        let target = dir.join(&stored_filename);
        std::fs::write(&target, bytes).map_err(|e| {
            // Leave no partial file behind.
            let _ = std::fs::remove_file(&target);
            FileStoreError::Io(e.to_string())
        })?;
        info!("stored upload {} ({} bytes)", target.display(), bytes.len());

        Ok(Attachment {
            filename: original_name.to_string(),
            stored_filename: stored_filename.clone(),
            file_path: format!("uploads/{scope}/{entity_id}/{stored_filename}"),
            file_size: bytes.len() as i64,
            mime_type,
            upload_time: Utc::now(),
            category,
        })
    }

    async fn delete(&self, file_path: &str) -> Result<(), FileStoreError> {
        let full = self.resolve(file_path);
        if !full.exists() {
            return Err(FileStoreError::NotFound);
        }
        std::fs::remove_file(&full).map_err(|e| FileStoreError::Io(e.to_string()))
    }
}

/// Best-effort removal used by attachment deletes: a file already gone is
/// logged, never surfaced to the caller.
pub async fn delete_quietly(store: &dyn FileStore, file_path: &str) {
    match store.delete(file_path).await {
        Ok(()) => {}
        Err(FileStoreError::NotFound) => {
            warn!("attachment file already absent: {file_path}");
        }
        Err(e) => {
            warn!("failed to remove attachment file {file_path}: {e}");
        }
    }
}

// Factory used in main.
pub fn build_file_store() -> Arc<dyn FileStore> {
    let store = LocalFileStore::from_env();
    info!("using local file store at '{}'", store.root().display());
    Arc::new(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths_and_bad_chars() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("a b:c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_filename("接口文档.pdf"), "接口文档.pdf");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn pdf_validation_rejects_wrong_extension() {
        let err = validate("notes.txt", FileKind::Pdf, b"hello").unwrap_err();
        assert!(matches!(err, FileStoreError::UnsupportedType(_)));
    }

    #[test]
    fn oversize_rejected_before_type_check() {
        let big = vec![0u8; MAX_FILE_SIZE + 1];
        let err = validate("big.pdf", FileKind::Pdf, &big).unwrap_err();
        assert!(matches!(err, FileStoreError::TooLarge));
    }
}
