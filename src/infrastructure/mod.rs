//! 基础设施层
//!
//! 持有存储资源，只暴露读写能力，不认识题目。

pub mod blob_store;
pub mod fs_store;
pub mod memory_store;

pub use blob_store::{content_type_for, BlobStore};
pub use fs_store::FsBlobStore;
pub use memory_store::MemoryBlobStore;
