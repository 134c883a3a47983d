//! Sourcefetch Core Library
//!
//! This crate provides the domain types shared by every getter backend:
//! source addresses, retrieval requests, the file/directory mode, error types,
//! configuration, and the cancellation-aware copy primitive.
//!
//! # Address format
//!
//! Addresses are URLs with an explicit scheme, optionally prefixed by a forced
//! getter name:
//!
//! - **Plain**: `file:///work/modules/foo`, `s3://bucket/key`
//! - **Forced**: `hg::https://example.com/repo?rev=abc123`
//!
//! The getter that owns an address is the forced name when present, otherwise
//! the URL scheme.

pub mod address;
pub mod config;
pub mod copy;
pub mod error;
pub mod mode;
pub mod paths;

// Re-export commonly used types
pub use address::Address;
pub use config::FetchConfig;
pub use copy::{copy_stream_with_cancel, copy_with_cancel, DEFAULT_COPY_BUFFER_SIZE};
pub use error::{ErrorKind, FetchError, FetchResult, LogLevel};
pub use mode::{Mode, Request};
pub use tokio_util::sync::CancellationToken;
