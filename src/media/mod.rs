//! Product media
//!
//! - [`FilenameSanitizer`] validates client keys and generates fresh ones
//! - [`store_uploads`] writes uploaded payloads under generated keys
//! - [`MediaCatalog`] binds stored keys to products and owns the thumbnail
//! - [`KeyLocks`] orders attach against file deletion per key

pub mod catalog;
pub mod filename;
pub mod key_locks;
pub mod upload;

pub use catalog::MediaCatalog;
pub use filename::FilenameSanitizer;
pub use key_locks::{KeyGuard, KeyLocks};
pub use upload::{store_uploads, IncomingFile};
