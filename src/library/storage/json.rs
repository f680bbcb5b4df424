//! Serialization and deserialization provided by [`serde_json`] using a marker trait
//!
//! Backends only have to move raw bytes around. By implementing the marker trait, they
//! receive a default [`KeyValueStore`] implementation which translates between the
//! serialized representation and strongly typed values.

use super::{KeyValueStore, RawKeyValueStore, StorageError};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker trait providing a default [`KeyValueStore`] implementation based on [`serde_json`]
pub trait JsonKeyValueStore: RawKeyValueStore + Send + Sync {}

fn decode<T: DeserializeOwned>(map: &str, key: &str, data: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(data).map_err(|source| StorageError::Malformed {
        map: map.to_owned(),
        key: key.to_owned(),
        source,
    })
}

#[async_trait]
impl<S> KeyValueStore for S
where
    S: JsonKeyValueStore,
{
    async fn get<T>(&self, map: &str, key: &str) -> Result<Option<T>, BoxedError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_raw(map, key).await? {
            Some(data) => Ok(Some(decode(map, key, &data)?)),
            None => Ok(None),
        }
    }

    /// Serializes the value using [`serde_json::to_vec`]
    async fn put<T>(&self, map: &str, key: &str, value: &T) -> EmptyResult
    where
        T: Serialize + Send + Sync,
    {
        let data = serde_json::to_vec(value)?;
        self.put_raw(map, key, &data).await
    }

    async fn remove<T>(&self, map: &str, key: &str) -> Result<Option<T>, BoxedError>
    where
        T: DeserializeOwned + Send,
    {
        match self.remove_raw(map, key).await? {
            Some(data) => Ok(Some(decode(map, key, &data)?)),
            None => Ok(None),
        }
    }

    async fn entries<T>(&self, map: &str) -> Result<Vec<(String, T)>, BoxedError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.entries_raw(map).await?;
        let mut entries = Vec::with_capacity(raw.len());

        for (key, data) in raw {
            let value = decode(map, &key, &data)?;
            entries.push((key, value));
        }

        Ok(entries)
    }
}
