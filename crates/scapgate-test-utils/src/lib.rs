#![deny(unsafe_code)]

//! Shared test utilities for the scapgate workspace.
//!
//! Provides an in-memory OpenSCAP daemon, config builders, a live-gateway
//! harness, and tracing helpers so that individual crate tests stay concise
//! and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! scapgate-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fake_daemon;
pub mod gateway;
pub mod tracing_setup;

pub use config::{TestConfigBuilder, TestConfigFile};
pub use fake_daemon::{Call, FakeDaemon, FakeTask};
pub use gateway::TestGateway;
