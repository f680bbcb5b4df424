use super::{DistributedMutex, JsonKeyValueStore, RawKeyValueStore};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Maps = HashMap<String, HashMap<String, Vec<u8>>>;

/// In-process substrate for tests and single instance deployments
///
/// Clones share the same underlying maps.
#[derive(Clone, Default)]
pub struct MemoryKeyValueStore {
    maps: Arc<Mutex<Maps>>,
}

impl MemoryKeyValueStore {
    /// Creates a new, empty instance
    pub fn new() -> Self {
        Self::default()
    }

    fn with_maps<R>(&self, f: impl FnOnce(&mut Maps) -> R) -> Result<R, BoxedError> {
        let mut maps = self
            .maps
            .lock()
            .map_err(|_| "memory store mutex poisoned")?;

        Ok(f(&mut maps))
    }
}

impl JsonKeyValueStore for MemoryKeyValueStore {}

#[async_trait]
impl RawKeyValueStore for MemoryKeyValueStore {
    async fn get_raw(&self, map: &str, key: &str) -> Result<Option<Vec<u8>>, BoxedError> {
        self.with_maps(|maps| maps.get(map).and_then(|m| m.get(key)).cloned())
    }

    async fn put_raw(&self, map: &str, key: &str, value: &[u8]) -> EmptyResult {
        self.with_maps(|maps| {
            maps.entry(map.to_owned())
                .or_default()
                .insert(key.to_owned(), value.to_vec());
        })
    }

    async fn remove_raw(&self, map: &str, key: &str) -> Result<Option<Vec<u8>>, BoxedError> {
        self.with_maps(|maps| maps.get_mut(map).and_then(|m| m.remove(key)))
    }

    async fn entries_raw(&self, map: &str) -> Result<Vec<(String, Vec<u8>)>, BoxedError> {
        self.with_maps(|maps| {
            maps.get(map)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default()
        })
    }

    async fn len(&self, map: &str) -> Result<usize, BoxedError> {
        self.with_maps(|maps| maps.get(map).map(HashMap::len).unwrap_or(0))
    }
}

/// In-process [`DistributedMutex`] which only coordinates tasks of the current process
#[derive(Clone, Default)]
pub struct MemoryMutex {
    held: Arc<Mutex<HashMap<String, Instant>>>,
}

impl MemoryMutex {
    /// Creates a new instance with no keys held
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedMutex for MemoryMutex {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, BoxedError> {
        let mut held = self.held.lock().map_err(|_| "mutex registry poisoned")?;
        let now = Instant::now();

        match held.get(key) {
            Some(expiry) if *expiry > now => Ok(false),
            _ => {
                held.insert(key.to_owned(), now + ttl);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> EmptyResult {
        let mut held = self.held.lock().map_err(|_| "mutex registry poisoned")?;
        held.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::super::KeyValueStore;
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn store_and_remove_typed_values() {
        let store = MemoryKeyValueStore::new();

        store.put("numbers", "answer", &42usize).await.unwrap();
        assert_eq!(store.get::<usize>("numbers", "answer").await.unwrap(), Some(42));
        assert_eq!(store.len("numbers").await.unwrap(), 1);

        let removed = store.remove::<usize>("numbers", "answer").await.unwrap();
        assert_eq!(removed, Some(42));
        assert_eq!(store.get::<usize>("numbers", "answer").await.unwrap(), None);
        assert_eq!(store.remove::<usize>("numbers", "answer").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keep_maps_separate() {
        let store = MemoryKeyValueStore::new();

        store.put("a", "key", &"first").await.unwrap();
        store.put("b", "key", &"second").await.unwrap();

        let entries = store.entries::<String>("a").await.unwrap();
        assert_eq!(entries, vec![("key".to_owned(), "first".to_owned())]);
        assert_eq!(store.len("c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn share_state_between_clones() {
        let store = MemoryKeyValueStore::new();
        let clone = store.clone();

        store.put("map", "key", &true).await.unwrap();
        assert_eq!(clone.get::<bool>("map", "key").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn reject_malformed_values() {
        let store = MemoryKeyValueStore::new();

        store.put_raw("map", "key", b"not json").await.unwrap();
        assert!(store.get::<usize>("map", "key").await.is_err());
    }

    #[tokio::test]
    async fn refuse_held_mutex() {
        let mutex = MemoryMutex::new();
        let ttl = Duration::from_secs(60);

        assert!(mutex.try_acquire("job", ttl).await.unwrap());
        assert!(!mutex.try_acquire("job", ttl).await.unwrap());
        assert!(mutex.try_acquire("other", ttl).await.unwrap());

        mutex.release("job").await.unwrap();
        assert!(mutex.try_acquire("job", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn reacquire_expired_mutex() {
        let mutex = MemoryMutex::new();

        assert!(mutex.try_acquire("job", Duration::from_millis(0)).await.unwrap());
        assert!(mutex.try_acquire("job", Duration::from_secs(60)).await.unwrap());
    }
}
