//! Chunk storage on top of region files.
//!
//! [`ChunkStore`] is the synchronous facade the server talks to.
//! [`RegionStorage`] exposes the same store through the async
//! [`ChunkStorage`] trait.

use anyhow::Result;
use async_trait::async_trait;

pub mod cache;
pub mod config;
pub mod payload;
pub mod region_storage;
pub mod store;

pub use cache::RegionCache;
pub use config::StoreConfig;
pub use payload::{NbtCodec, PayloadCodec};
pub use region_storage::RegionStorage;
pub use store::ChunkStore;

#[async_trait]
pub trait ChunkStorage: Send + Sync {
    /// Save a chunk payload. Data is the serialized (uncompressed) chunk.
    async fn save_chunk(&self, x: i32, z: i32, data: &[u8]) -> Result<()>;

    /// Load a chunk payload.
    /// Returns None if the chunk was never saved or has been deleted.
    async fn load_chunk(&self, x: i32, z: i32) -> Result<Option<Vec<u8>>>;

    /// Returns whether a chunk was actually removed.
    async fn delete_chunk(&self, x: i32, z: i32) -> Result<bool>;

    async fn get_total_size(&self) -> Result<u64> { Ok(0) }
}
