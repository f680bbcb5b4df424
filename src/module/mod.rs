//! Runnable modules each bundling multiple services and providing a unified configuration

pub mod options;

pub mod hub;
