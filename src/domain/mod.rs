//! Domain specific structures, implementations, and logic

pub mod event;
pub mod keys;
pub mod request;
pub mod subscription;

pub use subscription::{Subscription, SubscriptionError, SubscriptionIdentifier, SubscriptionType};
