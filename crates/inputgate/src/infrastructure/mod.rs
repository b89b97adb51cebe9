//! Infrastructure layer.
//!
//! Contains OS-facing adapters: low-level hooks and input injection for
//! Windows, the in-memory mock platform, and file-system storage of the
//! configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `inputgate_core`, but MUST NOT be imported by the `application` layer.

pub mod platform;
pub mod storage;
