//! Per-client document archive.
//!
//! Folder and file ids are opaque strings. A `None` id means the operation
//! failed and was already logged.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::onboarding::questions::question_text;
use crate::onboarding::validate::{crm_phone, sanitize_folder_name};
use crate::storage::ObjectStorage;

pub const DOCUMENTS_FOLDER: &str = "documents";

#[async_trait]
pub trait Archive: Send + Sync + 'static {
    async fn create_folder(&self, name: &str, parent: Option<&str>) -> Option<String>;

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        name: &str,
        folder_id: &str,
        content_type: Option<&str>,
    ) -> Option<String>;
}

/// Archive over an object store: folders are key prefixes marked by an
/// empty `<prefix>/` object, file ids are object keys.
pub struct ObjectArchive {
    storage: Arc<dyn ObjectStorage>,
}

impl ObjectArchive {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

fn join_key(parent: Option<&str>, name: &str) -> String {
    match parent.map(|p| p.trim_end_matches('/')) {
        Some(parent) if !parent.is_empty() => format!("{parent}/{name}"),
        _ => name.to_string(),
    }
}

#[async_trait]
impl Archive for ObjectArchive {
    async fn create_folder(&self, name: &str, parent: Option<&str>) -> Option<String> {
        let prefix = join_key(parent, name);
        let marker = format!("{prefix}/");
        match self
            .storage
            .put_object(&marker, Vec::new(), Some("application/x-directory"))
            .await
        {
            Ok(()) => Some(prefix),
            Err(err) => {
                warn!(folder = %prefix, error = %err, "failed to create archive folder");
                None
            }
        }
    }

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        name: &str,
        folder_id: &str,
        content_type: Option<&str>,
    ) -> Option<String> {
        let name = sanitize_file_name(name);
        let key = join_key(Some(folder_id), &name);
        let guessed;
        let content_type = match content_type {
            Some(content_type) => content_type,
            None => {
                guessed = mime_guess::from_path(&name).first_or_octet_stream();
                guessed.essence_str()
            }
        };

        match self.storage.put_object(&key, bytes, Some(content_type)).await {
            Ok(()) => {
                info!(key = %key, content_type, "uploaded file to archive");
                Some(key)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "failed to upload file to archive");
                None
            }
        }
    }
}

/// A single key segment: path separators, reserved and control characters
/// are dropped, as are leading dots.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| {
            !ch.is_control()
                && !matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<sanitized full name>_<phone digits>`
pub fn client_folder_name(full_name: &str, phone: &str) -> String {
    format!("{}_{}", sanitize_folder_name(full_name), crm_phone(phone))
}

/// Creates the client folder and its `documents` sub-folder under `root`.
/// Returns the client folder id; a missing sub-folder is tolerated.
pub async fn create_client_folders(
    archive: &dyn Archive,
    root: &str,
    full_name: &str,
    phone: &str,
) -> Option<String> {
    let name = client_folder_name(full_name, phone);
    let root = (!root.is_empty()).then_some(root);
    let folder_id = archive.create_folder(&name, root).await?;
    if archive
        .create_folder(DOCUMENTS_FOLDER, Some(&folder_id))
        .await
        .is_none()
    {
        warn!(folder = %folder_id, "client folder has no documents sub-folder");
    }
    info!(folder = %folder_id, "created client archive folder");
    Some(folder_id)
}

pub fn transcript_file_name(phone: &str) -> String {
    format!("anketa_{}.txt", crm_phone(phone))
}

pub fn transcript(answers: &BTreeMap<u8, String>, phone: &str) -> String {
    let rule = "=".repeat(50);
    let mut content = format!("АНКЕТА КЛІЄНТА\n{rule}\n\n");
    for (number, answer) in answers {
        let question = question_text(*number).unwrap_or_default();
        content.push_str(&format!("{number}. {question}\nВідповідь: {answer}\n\n"));
    }
    content.push_str(&format!("{rule}\nТелефон: {phone}\n"));
    content
}
