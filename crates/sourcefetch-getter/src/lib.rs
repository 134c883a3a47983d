//! Sourcefetch Getter Library
//!
//! This crate provides the `Getter` trait, the built-in getters (local files,
//! Mercurial, S3) and the detection chain that turns loose source strings into
//! addresses.
//!
//! # Detection order
//!
//! Getters are offered a source in registration order. The defaults register
//! `hg`, `s3`, then `file`; the file getter accepts any path and therefore must
//! stay last.

pub mod client;
pub mod detect;
pub mod file;
#[cfg(feature = "getter-hg")]
pub mod hg;
pub mod registry;
#[cfg(feature = "getter-s3")]
pub mod s3;
pub mod shorthand;
pub mod traits;

// Re-export commonly used types
pub use client::Client;
pub use detect::DetectionChain;
pub use file::FileGetter;
#[cfg(feature = "getter-hg")]
pub use hg::HgGetter;
pub use registry::GetterRegistry;
#[cfg(feature = "getter-s3")]
pub use s3::S3Getter;
pub use shorthand::{HostingShorthand, Shorthand, ShorthandDetector};
pub use sourcefetch_core::{
    Address, CancellationToken, ErrorKind, FetchConfig, FetchError, FetchResult, Mode, Request,
};
pub use traits::{DetectRequest, Getter};
