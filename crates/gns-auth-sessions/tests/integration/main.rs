//! Integration Test Runner
//!
//! Entry point for all integration tests.
//!
//! Run all tests:
//! ```bash
//! cargo test --test integration
//! ```
//!
//! Run a specific module:
//! ```bash
//! cargo test --test integration pairing_flow
//! cargo test --test integration http_flow
//! ```
//!
//! Test categories:
//! - `pairing_flow`: approve, reject, cancel and race behaviour of the engine
//! - `expiry_flow`: expiry boundaries and the reaper
//! - `storage_flow`: SQLite-backed browser sessions through the engine
//! - `http_flow`: the router in-process and a live server with client agents

mod support;

mod expiry_flow;
mod http_flow;
mod storage_flow;
