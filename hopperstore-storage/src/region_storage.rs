//! Async access to a [`ChunkStore`].
//!
//! Region I/O is blocking, so every call runs on tokio's blocking pool.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hopperstore_anvil::RegionPos;

use crate::ChunkStorage;
use crate::store::ChunkStore;

#[derive(Clone)]
pub struct RegionStorage {
    store: Arc<ChunkStore>,
}

impl RegionStorage {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    async fn run<T, F>(&self, what: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ChunkStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .with_context(|| format!("{what} task panicked"))?
    }
}

#[async_trait]
impl ChunkStorage for RegionStorage {
    async fn save_chunk(&self, x: i32, z: i32, data: &[u8]) -> Result<()> {
        let data = data.to_vec();
        self.run("save", move |store| {
            store
                .save_chunk(x, z, &data)
                .with_context(|| format!("Failed to save chunk ({x}, {z})"))
        })
        .await
    }

    async fn load_chunk(&self, x: i32, z: i32) -> Result<Option<Vec<u8>>> {
        self.run("load", move |store| {
            store
                .load_chunk(x, z)
                .with_context(|| format!("Failed to load chunk ({x}, {z})"))
        })
        .await
    }

    async fn delete_chunk(&self, x: i32, z: i32) -> Result<bool> {
        self.run("delete", move |store| {
            store
                .delete_chunk(x, z)
                .with_context(|| format!("Failed to delete chunk ({x}, {z})"))
        })
        .await
    }

    /// Sum of the sizes of all region files in the base directory.
    async fn get_total_size(&self) -> Result<u64> {
        self.run("size", |store| {
            let config = store.config();
            let entries = fs::read_dir(config.base_dir())
                .with_context(|| format!("Failed to list {}", config.base_dir().display()))?;
            let mut total = 0;
            for entry in entries {
                let entry = entry?;
                let name = entry.file_name();
                let is_region = name
                    .to_str()
                    .and_then(|n| RegionPos::from_file_name(n, &config.extension))
                    .is_some();
                if is_region {
                    total += entry.metadata()?.len();
                }
            }
            Ok(total)
        })
        .await
    }
}
