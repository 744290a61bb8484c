//! Core library for berth
//!
//! This crate drives an external container CLI (docker-compatible) to manage
//! containers, images, volumes and networks: typed requests become argv
//! vectors, invocations are bounded and reported as uniform results, output
//! is normalized into a stable model, and per-kind caches keep snapshots
//! fresh by polling.

pub mod args;
pub mod cache;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod service;
pub mod validation;

// Re-export IndexMap for building request label/env maps in dependent crates
pub use indexmap::IndexMap;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
