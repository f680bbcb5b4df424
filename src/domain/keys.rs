//! Substrate map names and keys
//!
//! This module contains the names of all maps stored in the shared substrate
//! as well as functions to build composite keys. The keys are stored in
//! submodules organised by components.

/// Subscription records keyed by their identifier
pub mod subscription {
    /// Map holding every [`Subscription`](crate::domain::Subscription)
    pub const RECORDS: &str = "subscriptions";
    /// Derived name to the identifiers of the subscriptions carrying it
    pub const NAMES: &str = "subscriptions.names";
}

/// Inverted indices mapping a reference to a set of subscription identifiers
pub mod index {
    /// Stop point or stop place reference to subscriptions
    pub const STOPS: &str = "index.stops";
    /// Line reference to subscriptions without stop points
    pub const LINES: &str = "index.lines";
    /// Codespace to subscriptions without stop points
    pub const CODESPACES: &str = "index.codespaces";
}

/// Record of already pushed messages
pub mod dedup {
    /// Map holding the time of every push attempt
    pub const ATTEMPTS: &str = "push.attempts";

    /// Key of a single push attempt
    pub fn attempt(subscription_id: &str, fingerprint: &str) -> String {
        format!("{}:{}", subscription_id, fingerprint)
    }
}

/// Distributed mutex keys
pub mod lock {
    /// Held by the instance which currently runs the maintenance cycle
    pub const MAINTENANCE: &str = "lock:maintenance";
}
