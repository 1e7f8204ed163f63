use bytes::Bytes;
use tracing::info;

use super::FilenameSanitizer;
use crate::storage::AssetStore;
use crate::types::{AppError, AppResult};

/// One uploaded part: the client's filename (untrusted, only mined for an
/// extension) and its payload.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: Option<String>,
    pub data: Bytes,
}

/// Store every file under a freshly generated key and return the keys in
/// upload order. Nothing is written unless every part has content.
pub async fn store_uploads(
    store: &AssetStore,
    names: &FilenameSanitizer,
    files: Vec<IncomingFile>,
) -> AppResult<Vec<String>> {
    if files.is_empty() {
        return Err(AppError::Validation("no files uploaded".to_string()));
    }
    if let Some(position) = files.iter().position(|file| file.data.is_empty()) {
        return Err(AppError::Validation(format!("file part {} is empty", position)));
    }

    let mut keys = Vec::with_capacity(files.len());
    for file in files {
        let key = names.generate(file.original_name.as_deref());
        store.store(&key, &file.data).await?;
        info!(key = %key, size = file.data.len(), "Upload stored");
        keys.push(key);
    }

    Ok(keys)
}
