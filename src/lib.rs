//! This library crate contains everything needed to run a transit push hub instance.
//!
//! Submodules have been introduced to split responsibilities. Each module has a specific focus
//! and they together form a chain of dependencies from the low-level [`library`], over the transit [`domain`]
//! specific data structures, through the executable [`harness`], up to the high-level [`modules`](module)
//! which contain the subscription registry, matching, redaction, and push delivery.

#![deny(missing_docs)]

pub mod constants;
pub mod domain;
pub mod harness;
pub mod library;
pub mod module;
