//! Structures for sending HTTP requests

mod push;

pub use push::{PushClient, PushError, PushResponse, ReqwestPushClient};
