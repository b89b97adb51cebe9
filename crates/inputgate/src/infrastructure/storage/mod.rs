//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration file from the
//! platform-appropriate directory, or from an explicit path, and falls back
//! to defaults when no file exists yet.  The daemon only reads it at start-up;
//! bindings made at runtime are never written back.

pub mod config;
