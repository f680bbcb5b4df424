//! Suppression of repeated pushes

use crate::domain::keys;
use crate::library::storage::KeyValueStore;
use crate::library::BoxedError;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Time-windowed record of the messages pushed to each subscription
///
/// Every push attempt is recorded with its timestamp, regardless of its outcome. A
/// recorded attempt suppresses further attempts with the same fingerprint until the
/// retention window has passed. Suppressed attempts do not extend the window.
///
/// The check and the record are separate substrate operations, two instances
/// handling the same event at once may therefore both push the message.
#[derive(Clone)]
pub struct DedupCache<S> {
    kv: S,
    retention: Duration,
}

impl<S: KeyValueStore> DedupCache<S> {
    /// Creates a new cache which keeps entries for the given duration
    pub fn new(kv: S, retention: std::time::Duration) -> Self {
        Self {
            kv,
            retention: Duration::from_std(retention).unwrap_or_else(|_| Duration::days(36_500)),
        }
    }

    /// Records an attempt unless an unexpired one exists, returns whether it was recorded
    pub async fn check_and_record(
        &self,
        subscription_id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, BoxedError> {
        let key = keys::dedup::attempt(subscription_id, fingerprint);
        let previous: Option<i64> = self.kv.get(keys::dedup::ATTEMPTS, &key).await?;

        if let Some(timestamp) = previous {
            if !self.is_expired(timestamp, now) {
                return Ok(false);
            }
        }

        self.kv
            .put(keys::dedup::ATTEMPTS, &key, &now.timestamp_millis())
            .await?;

        Ok(true)
    }

    /// Removes every entry older than the retention window, returns how many were removed
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize, BoxedError> {
        let entries: Vec<(String, i64)> = self.kv.entries(keys::dedup::ATTEMPTS).await?;
        let mut evicted = 0;

        for (key, timestamp) in entries {
            if self.is_expired(timestamp, now) {
                self.kv.remove::<i64>(keys::dedup::ATTEMPTS, &key).await?;
                evicted += 1;
            }
        }

        debug!(evicted, "Evicted expired push attempts");

        Ok(evicted)
    }

    fn is_expired(&self, timestamp: i64, now: DateTime<Utc>) -> bool {
        let age = Duration::milliseconds(now.timestamp_millis().saturating_sub(timestamp));
        age >= self.retention
    }
}
