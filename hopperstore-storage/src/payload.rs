//! Conversion between chunk objects and the opaque payload bytes the store
//! keeps. The store itself never looks inside a payload.

use std::marker::PhantomData;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub trait PayloadCodec {
    type Chunk;

    fn encode_payload(&self, chunk: &Self::Chunk) -> Result<Vec<u8>>;
    fn decode_payload(&self, bytes: &[u8]) -> Result<Self::Chunk>;
}

/// Stores serde types as uncompressed NBT.
pub struct NbtCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> NbtCodec<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for NbtCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> PayloadCodec for NbtCodec<T> {
    type Chunk = T;

    fn encode_payload(&self, chunk: &T) -> Result<Vec<u8>> {
        fastnbt::to_bytes(chunk).context("Failed to serialize chunk NBT")
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<T> {
        fastnbt::from_bytes(bytes).context("Failed to parse chunk NBT")
    }
}
