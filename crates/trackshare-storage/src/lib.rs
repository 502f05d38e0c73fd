pub mod asset;
pub mod memory;
pub mod storage;

pub use asset::{
    asset_extension, content_type_for, is_safe_asset_name, sanitize_filename, unique_asset_name,
    AssetKind,
};
pub use memory::MemoryStorage;
pub use storage::{LocalStorage, S3Storage, StorageBackend, StorageError};
