//! Constant values used across modules

/// Response body by which a subscriber acknowledges a push
pub const PUSH_RESPONSE_OK: &str = "OK";

/// Response body by which a subscriber asks to be removed
pub const PUSH_RESPONSE_FORGET_ME: &str = "FORGET_ME";

/// Value replacing confidential fields in the admin listing
pub const REDACTED_PLACEHOLDER: &str = "---redacted---";
