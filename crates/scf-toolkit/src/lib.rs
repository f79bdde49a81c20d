//! Ready-made collaborators for `scf-component` that need no vendor SDK.

pub mod download;
pub mod packaging;
pub mod state;
pub mod storage;

pub use download::HttpTemplateDownloader;
pub use packaging::ZipPackager;
pub use state::{FileStateStore, MemoryStateStore};
pub use storage::LocalObjectStorage;
