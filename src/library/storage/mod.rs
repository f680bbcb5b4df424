//! Shared key-value substrate used to exchange state between cooperating instances
//!
//! The substrate consists of named maps, each holding opaque values under string keys.
//! Access is limited to per-key operations with last-writer-wins semantics; there are
//! no transactions spanning multiple keys. Consumers that follow a read-modify-write
//! pattern on a single key (like the interest index) may therefore lose concurrent
//! updates made by another instance to the same key.
//!
//! Two layers exist:
//!
//! 1. [`RawKeyValueStore`] which moves raw bytes and is implemented by the backends
//! 2. [`KeyValueStore`] which moves strongly typed values and is provided for every backend
//!    that implements the [`JsonKeyValueStore`](json::JsonKeyValueStore) marker trait
//!
//! In addition, [`DistributedMutex`] implementations allow instances to agree on which
//! one of them executes a recurring task.

mod json;
mod lock;
mod memory;
mod redis;

pub use self::redis::{RedisKeyValueStore, RedisMutex};
pub use json::JsonKeyValueStore;
pub use lock::DistributedMutex;
pub use memory::{MemoryKeyValueStore, MemoryMutex};

use super::{BoxedError, EmptyResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the substrate implementations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached or rejected the command
    #[error("storage backend unavailable")]
    Unavailable(#[from] ::redis::RedisError),
    /// Stored value could not be (de-)serialized
    #[error("malformed value in map {map} at key {key}")]
    Malformed {
        /// Name of the map
        map: String,
        /// Key of the affected value
        key: String,
        /// Underlying serialization error
        #[source]
        source: serde_json::Error,
    },
}

/// Byte-level access to named maps
#[async_trait]
pub trait RawKeyValueStore: Send + Sync {
    /// Reads the value stored at `key` in `map`
    async fn get_raw(&self, map: &str, key: &str) -> Result<Option<Vec<u8>>, BoxedError>;

    /// Writes the value at `key` in `map`, replacing any previous value
    async fn put_raw(&self, map: &str, key: &str, value: &[u8]) -> EmptyResult;

    /// Deletes `key` from `map` and returns the value it held
    async fn remove_raw(&self, map: &str, key: &str) -> Result<Option<Vec<u8>>, BoxedError>;

    /// Reads every key-value pair of `map`
    async fn entries_raw(&self, map: &str) -> Result<Vec<(String, Vec<u8>)>, BoxedError>;

    /// Number of keys in `map`
    async fn len(&self, map: &str) -> Result<usize, BoxedError>;
}

/// Strongly typed access to named maps
#[async_trait]
pub trait KeyValueStore: RawKeyValueStore {
    /// Reads and decodes the value stored at `key` in `map`
    async fn get<T>(&self, map: &str, key: &str) -> Result<Option<T>, BoxedError>
    where
        T: DeserializeOwned + Send;

    /// Encodes and writes the value at `key` in `map`
    async fn put<T>(&self, map: &str, key: &str, value: &T) -> EmptyResult
    where
        T: Serialize + Send + Sync;

    /// Deletes `key` from `map` and returns the decoded value it held
    async fn remove<T>(&self, map: &str, key: &str) -> Result<Option<T>, BoxedError>
    where
        T: DeserializeOwned + Send;

    /// Reads and decodes every key-value pair of `map`
    async fn entries<T>(&self, map: &str) -> Result<Vec<(String, T)>, BoxedError>
    where
        T: DeserializeOwned + Send;
}
