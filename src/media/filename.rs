//! Storage key validation and generation
//!
//! Client-supplied names never reach the filesystem directly. Uploads get a
//! freshly generated key; any key coming back from a client (fetch, attach,
//! delete) must pass [`FilenameSanitizer::validate`] first.
//!
//! Comparison is exact and case-sensitive. No Unicode or case normalization
//! is applied, so look-alike names are distinct keys.

use rand::rngs::OsRng;
use rand::RngCore;

/// Longest extension carried over from a client filename.
const MAX_EXTENSION_LEN: usize = 10;

/// Bytes of OS randomness in each generated key (64 bits).
const RANDOM_SUFFIX_BYTES: usize = 8;

#[derive(Debug, Clone)]
pub struct FilenameSanitizer {
    prefix: String,
    default_extension: String,
}

impl FilenameSanitizer {
    pub fn new(prefix: impl Into<String>, default_extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            default_extension: default_extension.into(),
        }
    }

    /// Key scheme for product photos: `product_<millis>_<hex>.<ext>`, default `jpg`.
    pub fn products() -> Self {
        Self::new("product_", "jpg")
    }

    /// Key scheme for avatars: `avatar_<millis>_<hex>.<ext>`, default `png`.
    pub fn avatars() -> Self {
        Self::new("avatar_", "png")
    }

    /// Returns true when `name` is safe to use as a flat storage key.
    pub fn validate(name: Option<&str>) -> bool {
        let Some(name) = name else {
            return false;
        };

        !name.trim().is_empty()
            && !name.contains("..")
            && !name.contains(['/', '\\', '\0'])
    }

    /// Builds a fresh storage key, keeping the extension of `original_name`
    /// when it is a short alphanumeric token.
    pub fn generate(&self, original_name: Option<&str>) -> String {
        let extension = original_name
            .and_then(extract_extension)
            .unwrap_or(&self.default_extension);

        let mut random = [0u8; RANDOM_SUFFIX_BYTES];
        OsRng.fill_bytes(&mut random);

        format!(
            "{}{}_{}.{}",
            self.prefix,
            chrono::Utc::now().timestamp_millis(),
            hex::encode(random),
            extension
        )
    }
}

fn extract_extension(original: &str) -> Option<&str> {
    // Only the final path component of the client name is considered.
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let (_, ext) = base.rsplit_once('.')?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}
