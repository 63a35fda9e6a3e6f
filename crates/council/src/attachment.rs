use std::path::{Path, PathBuf};

use council_models::AttachmentFailurePolicy;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AttachmentError;

pub const PDF_MIME: &str = "application/pdf";

/// A file the user sent along with their message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Pdf,
    Text,
    Unsupported,
}

impl Attachment {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a local file, guessing its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = std::fs::read(path).map_err(|source| AttachmentError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, mime_for_path(path), bytes))
    }

    pub fn kind(&self) -> AttachmentKind {
        let mime = self.mime.to_ascii_lowercase();
        if mime == PDF_MIME {
            AttachmentKind::Pdf
        } else if mime.starts_with("text/") {
            AttachmentKind::Text
        } else {
            AttachmentKind::Unsupported
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.kind() != AttachmentKind::Unsupported
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => PDF_MIME,
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

/// Text content of an attachment, or `None` for types that are not read.
pub async fn extract_text(attachment: &Attachment) -> Result<Option<String>, AttachmentError> {
    match attachment.kind() {
        AttachmentKind::Pdf => {
            let bytes = attachment.bytes.clone();
            let extracted =
                tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                    .await
                    .map_err(|e| AttachmentError::Pdf {
                        name: attachment.name.clone(),
                        reason: format!("extractor panicked: {e}"),
                    })?;
            let text = extracted.map_err(|e| AttachmentError::Pdf {
                name: attachment.name.clone(),
                reason: e.to_string(),
            })?;
            Ok(Some(text))
        }
        AttachmentKind::Text => String::from_utf8(attachment.bytes.clone())
            .map(Some)
            .map_err(|_| AttachmentError::Encoding {
                name: attachment.name.clone(),
            }),
        AttachmentKind::Unsupported => {
            debug!(name = %attachment.name, mime = %attachment.mime, "Ignoring unsupported attachment");
            Ok(None)
        }
    }
}

/// The task string: the user's input followed by each readable attachment
/// in the order given.
pub async fn compose_task(
    input: &str,
    attachments: &[Attachment],
    policy: AttachmentFailurePolicy,
) -> Result<String, AttachmentError> {
    let mut task = input.to_string();
    for attachment in attachments {
        let text = match extract_text(attachment).await {
            Ok(Some(text)) => text,
            Ok(None) => continue,
            Err(e) => match policy {
                AttachmentFailurePolicy::Abort => return Err(e),
                AttachmentFailurePolicy::Inline => {
                    warn!(name = %attachment.name, error = %e, "Embedding attachment error in task");
                    e.to_string()
                }
            },
        };
        task.push_str(&format!("\n\nFile: {}\n{}", attachment.name, text));
    }
    Ok(task)
}

/// Copy an attachment to `{dir}/{uuid}_{name}`.
pub async fn archive(attachment: &Attachment, dir: &Path) -> Result<PathBuf, AttachmentError> {
    let archive_error = |source| AttachmentError::Archive {
        name: attachment.name.clone(),
        source,
    };
    // Keep only the final path component so names cannot escape the directory.
    let file_name = Path::new(&attachment.name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    tokio::fs::create_dir_all(dir).await.map_err(archive_error)?;
    let path = dir.join(format!("{}_{}", Uuid::new_v4(), file_name));
    tokio::fs::write(&path, &attachment.bytes)
        .await
        .map_err(archive_error)?;
    info!(path = %path.display(), "Archived attachment");
    Ok(path)
}
