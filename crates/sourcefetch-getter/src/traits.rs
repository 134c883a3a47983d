//! Getter abstraction trait
//!
//! This module defines the `Getter` trait that every backend implements, along
//! with the detection helpers the backends share.

use std::path::Path;

use async_trait::async_trait;
use sourcefetch_core::address::parse_url;
use sourcefetch_core::paths::join_pwd;
use sourcefetch_core::{Address, CancellationToken, FetchResult, Mode, Request};

/// Input to a single getter's detection step.
#[derive(Debug, Clone, Copy)]
pub struct DetectRequest<'a> {
    pub src: &'a str,
    pub pwd: Option<&'a Path>,
    /// Getter name the caller forced, if any.
    pub forced: Option<&'a str>,
}

impl<'a> DetectRequest<'a> {
    pub fn new(src: &'a str, pwd: Option<&'a Path>, forced: Option<&'a str>) -> Self {
        DetectRequest { src, pwd, forced }
    }

    /// True when another getter was forced and `getter` must stay out.
    pub fn excludes(&self, getter: &dyn Getter) -> bool {
        self.forced.is_some_and(|forced| !getter.valid_scheme(forced))
    }

    pub fn is_forced_to(&self, getter: &dyn Getter) -> bool {
        self.forced.is_some_and(|forced| getter.valid_scheme(forced))
    }
}

/// Getter abstraction trait
///
/// One implementation per scheme. The registry dispatches on
/// `Address::getter()`; callers probe `mode` before choosing between `get` and
/// `get_file`.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Scheme this getter owns (`file`, `s3`, `hg`, ...).
    fn scheme(&self) -> &'static str;

    fn valid_scheme(&self, scheme: &str) -> bool {
        scheme.eq_ignore_ascii_case(self.scheme())
    }

    /// Turn a raw source string into an address this getter owns.
    ///
    /// `Ok(None)` means "not applicable"; errors are reserved for sources the
    /// getter recognises but cannot make sense of.
    fn detect(&self, req: &DetectRequest<'_>) -> FetchResult<Option<Address>>;

    async fn mode(&self, address: &Address, cancel: &CancellationToken) -> FetchResult<Mode>;

    /// Directory retrieval into `req.dst`.
    async fn get(&self, req: &mut Request) -> FetchResult<()>;

    /// Single-file retrieval into `req.dst`.
    async fn get_file(&self, req: &mut Request) -> FetchResult<()>;
}

/// Outcome of offering a source to a getter as an explicit URL.
pub(crate) enum UrlClaim {
    Claimed(Address),
    /// A URL with a scheme that belongs to someone else.
    Declined,
    NotUrl,
}

/// Shared first step of detection: explicit URLs are taken verbatim by the
/// getter owning their scheme, or by the forced getter.
pub(crate) fn claim_url(getter: &dyn Getter, req: &DetectRequest<'_>) -> UrlClaim {
    let url = match parse_url(req.src) {
        Some(url) => url,
        None => return UrlClaim::NotUrl,
    };

    if req.is_forced_to(getter) {
        return UrlClaim::Claimed(Address::forced(getter.scheme(), url));
    }
    if getter.valid_scheme(url.scheme()) {
        return UrlClaim::Claimed(Address::new(url));
    }
    UrlClaim::Declined
}

/// Last resort for a forced getter: treat the source as a local path.
pub(crate) fn forced_path_fallback(
    getter: &dyn Getter,
    req: &DetectRequest<'_>,
) -> FetchResult<Option<Address>> {
    if !req.is_forced_to(getter) {
        return Ok(None);
    }
    let path = join_pwd(req.src, req.pwd)?;
    let address = Address::from_file_path(&path)?;
    Ok(Some(Address::forced(getter.scheme(), address.into_url())))
}
