//! Chat attachment handling.
//!
//! Attachments are stored by (sanitized) name under a configured upload
//! root. The persisted message gets a markup fragment — an inline preview
//! for images, a download link otherwise — and the remote agent gets a
//! plain-text note naming the file, never the bytes.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::UploadError;

/// Extensions accepted for upload.
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "pdf", "docx", "doc", "txt"];

/// Extensions rendered as an inline image preview.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// An uploaded file, in memory.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Result of storing an attachment.
#[derive(Debug, Clone)]
pub struct StoredAttachment {
    /// Sanitized filename the bytes were stored under.
    pub filename: String,
    /// Markup fragment appended to the persisted inbound message.
    pub markup: String,
    /// Plain-text note appended to the text sent to the agent.
    pub agent_note: String,
}

/// Attachment store rooted at a writable directory.
pub struct UploadStore {
    root: PathBuf,
    /// URL prefix the stored files are served under.
    public_prefix: String,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_prefix: "/uploads".to_string(),
        }
    }

    /// Whether the filename's extension is in the allow-list.
    pub fn is_allowed(filename: &str) -> bool {
        extension_of(filename)
            .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Store an attachment and build its transcript markup and agent note.
    pub async fn store(&self, attachment: &Attachment) -> Result<StoredAttachment, UploadError> {
        let ext = extension_of(&attachment.filename)
            .ok_or_else(|| UploadError::DisallowedExtension(attachment.filename.clone()))?;
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(UploadError::DisallowedExtension(ext));
        }

        let filename = sanitize_filename(&attachment.filename)
            .ok_or_else(|| UploadError::UnusableFilename(attachment.filename.clone()))?;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&filename);
        tokio::fs::write(&path, &attachment.bytes).await?;
        info!(path = %path.display(), size = attachment.bytes.len(), "Attachment stored");

        let web_path = format!("{}/{filename}", self.public_prefix);
        let markup = if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            format!("<br><img src=\"{web_path}\" class=\"chat-attachment\">")
        } else {
            format!("<br><a href=\"{web_path}\" target=\"_blank\" class=\"file-link\">{filename}</a>")
        };

        Ok(StoredAttachment {
            agent_note: format!("\n[User uploaded file: {filename}]"),
            filename,
            markup,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Path separators and parent references are stripped so the result can
/// never escape the upload root; anything outside a conservative character
/// set collapses to `_`. Returns None when nothing usable remains.
fn sanitize_filename(filename: &str) -> Option<String> {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    let cleaned: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_' || c == '.') {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list() {
        assert!(UploadStore::is_allowed("photo.PNG"));
        assert!(UploadStore::is_allowed("notes.txt"));
        assert!(UploadStore::is_allowed("paper.pdf"));
        assert!(!UploadStore::is_allowed("script.sh"));
        assert!(!UploadStore::is_allowed("noextension"));
        assert!(!UploadStore::is_allowed("trailingdot."));
    }

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(
            sanitize_filename("../../etc/passwd.txt").as_deref(),
            Some("passwd.txt")
        );
        assert_eq!(
            sanitize_filename("C:\\Users\\x\\report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            sanitize_filename("my photo (1).jpg").as_deref(),
            Some("my_photo__1_.jpg")
        );
        assert!(sanitize_filename("///").is_none());
        assert!(sanitize_filename("...").is_none());
    }

    #[tokio::test]
    async fn store_image_builds_inline_markup() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let stored = store
            .store(&Attachment {
                filename: "pic.png".into(),
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();

        assert_eq!(stored.filename, "pic.png");
        assert!(stored.markup.contains("<img"));
        assert!(stored.markup.contains("/uploads/pic.png"));
        assert_eq!(stored.agent_note, "\n[User uploaded file: pic.png]");
        assert!(dir.path().join("pic.png").exists());
    }

    #[tokio::test]
    async fn store_document_builds_download_link() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let stored = store
            .store(&Attachment {
                filename: "homework.pdf".into(),
                bytes: b"pdf".to_vec(),
            })
            .await
            .unwrap();

        assert!(stored.markup.contains("<a href"));
        assert!(stored.markup.contains("homework.pdf"));
    }

    #[tokio::test]
    async fn disallowed_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let err = store
            .store(&Attachment {
                filename: "evil.exe".into(),
                bytes: vec![0],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::DisallowedExtension(_)));
    }

    #[tokio::test]
    async fn traversal_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));
        let stored = store
            .store(&Attachment {
                filename: "../../escape.txt".into(),
                bytes: b"x".to_vec(),
            })
            .await
            .unwrap();
        assert_eq!(stored.filename, "escape.txt");
        assert!(dir.path().join("uploads/escape.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }
}
