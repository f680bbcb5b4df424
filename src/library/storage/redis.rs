//! Substrate implementation using [`redis`](::redis)
//!
//! Every named map is stored as a redis hash. All clones of a store share one
//! multiplexed connection, so commands are never blocking each other.

use super::{DistributedMutex, JsonKeyValueStore, RawKeyValueStore, StorageError};
use crate::library::{BoxedError, EmptyResult};
use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, RedisResult, Script};
use async_trait::async_trait;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(2);
const CONNECT_REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

lazy_static! {
    /// Deletes a lock only if it is still held by the caller
    static ref RELEASE_SCRIPT: Script = Script::new(
        r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
            return redis.call("DEL", KEYS[1])
        else
            return 0
        end
    "#
    );
}

/// Opens a multiplexed connection, retrying until the server becomes reachable
async fn connect(url: &str) -> RedisResult<MultiplexedConnection> {
    let client = Client::open(url)?;
    let mut warn = true;

    loop {
        let con_future = client.get_multiplexed_tokio_connection();

        match timeout(CONNECT_REQUEST_TIMEOUT, con_future).await {
            Ok(Ok(connection)) => {
                debug!(url, "Connected to redis");
                return Ok(connection);
            }
            Ok(Err(error)) => {
                if warn {
                    warn = false;
                    warn!(?error, "Unable to connect to redis server")
                }
            }
            Err(_) => {
                if warn {
                    warn = false;
                    warn!("Timed out while connecting to redis")
                }
            }
        }

        sleep(CONNECT_RETRY_INTERVAL).await;
    }
}

/// Key-value substrate backed by redis hashes
#[derive(Clone)]
pub struct RedisKeyValueStore {
    con: MultiplexedConnection,
}

impl RedisKeyValueStore {
    /// Connects to the redis server at the given URL
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        Ok(Self {
            con: connect(url).await?,
        })
    }
}

impl JsonKeyValueStore for RedisKeyValueStore {}

#[async_trait]
impl RawKeyValueStore for RedisKeyValueStore {
    async fn get_raw(&self, map: &str, key: &str) -> Result<Option<Vec<u8>>, BoxedError> {
        let mut con = self.con.clone();
        let value: Option<Vec<u8>> = con.hget(map, key).await.map_err(StorageError::from)?;
        Ok(value)
    }

    async fn put_raw(&self, map: &str, key: &str, value: &[u8]) -> EmptyResult {
        let mut con = self.con.clone();
        con.hset::<_, _, _, ()>(map, key, value)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn remove_raw(&self, map: &str, key: &str) -> Result<Option<Vec<u8>>, BoxedError> {
        let mut con = self.con.clone();
        let (value,): (Option<Vec<u8>>,) = ::redis::pipe()
            .atomic()
            .hget(map, key)
            .hdel(map, key)
            .ignore()
            .query_async(&mut con)
            .await
            .map_err(StorageError::from)?;

        Ok(value)
    }

    async fn entries_raw(&self, map: &str) -> Result<Vec<(String, Vec<u8>)>, BoxedError> {
        let mut con = self.con.clone();
        let entries: HashMap<String, Vec<u8>> =
            con.hgetall(map).await.map_err(StorageError::from)?;
        Ok(entries.into_iter().collect())
    }

    async fn len(&self, map: &str) -> Result<usize, BoxedError> {
        let mut con = self.con.clone();
        let len: usize = con.hlen(map).await.map_err(StorageError::from)?;
        Ok(len)
    }
}

/// [`DistributedMutex`] using `SET NX PX` with a per-instance token
#[derive(Clone)]
pub struct RedisMutex {
    con: MultiplexedConnection,
    token: String,
}

impl RedisMutex {
    /// Connects to the redis server at the given URL using a random token
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        Ok(Self {
            con: connect(url).await?,
            token: Uuid::new_v4().to_string(),
        })
    }
}

#[async_trait]
impl DistributedMutex for RedisMutex {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, BoxedError> {
        let mut con = self.con.clone();
        let reply: Option<String> = ::redis::cmd("SET")
            .arg(key)
            .arg(&self.token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut con)
            .await
            .map_err(StorageError::from)?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> EmptyResult {
        let mut con = self.con.clone();
        RELEASE_SCRIPT
            .key(key)
            .arg(&self.token)
            .invoke_async::<_, i64>(&mut con)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
