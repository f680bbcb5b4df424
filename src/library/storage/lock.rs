use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::time::Duration;

/// Mutual exclusion across all instances sharing a substrate
///
/// A held key expires after its time-to-live so that a crashed holder does not
/// block the others forever. Implementations are not reentrant.
#[async_trait]
pub trait DistributedMutex: Send + Sync {
    /// Attempts to take the lock without waiting, returns whether it succeeded
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, BoxedError>;

    /// Gives up the lock if it is held by this instance
    async fn release(&self, key: &str) -> EmptyResult;
}
