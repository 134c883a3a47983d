//! Detection chain
//!
//! Turns a loosely specified source string into an `Address` by offering it to
//! every registered getter in order. A forced getter (either passed explicitly or
//! written as a `name::` prefix) makes every other getter sit the round out.

use std::path::Path;

use sourcefetch_core::address::{parse_url, split_forced};
use sourcefetch_core::paths::join_pwd;
use sourcefetch_core::{Address, FetchError, FetchResult};

use crate::registry::GetterRegistry;
use crate::traits::DetectRequest;

pub struct DetectionChain<'a> {
    registry: &'a GetterRegistry,
}

impl<'a> DetectionChain<'a> {
    pub fn new(registry: &'a GetterRegistry) -> Self {
        DetectionChain { registry }
    }

    /// Resolve `raw` into an address.
    ///
    /// An empty source is not a candidate and yields `Ok(None)`.
    pub fn resolve(
        &self,
        raw: &str,
        pwd: Option<&Path>,
        forced: Option<&str>,
    ) -> FetchResult<Option<Address>> {
        if raw.is_empty() {
            return Ok(None);
        }

        let (prefix, src) = split_forced(raw);
        let forced = match (forced.filter(|f| !f.is_empty()), prefix) {
            (Some(arg), Some(prefix)) if !arg.eq_ignore_ascii_case(prefix) => {
                return Err(FetchError::invalid_address(
                    raw,
                    format!("forced getter {} conflicts with prefix {}", arg, prefix),
                ));
            }
            (Some(arg), _) => Some(arg),
            (None, prefix) => prefix,
        };

        if let Some(forced) = forced {
            if self.registry.get(forced).is_none() {
                return Err(FetchError::UnsupportedGetter(forced.to_string()));
            }
        }

        if let Some(address) = self.offer(src, pwd, forced)? {
            return Ok(Some(address));
        }

        // Nobody claimed the relative path; offer it again rooted at pwd. URLs
        // with an unregistered scheme are not paths.
        if parse_url(src).is_none() && !Path::new(src).is_absolute() && pwd.is_some() {
            let joined = join_pwd(src, pwd)?;
            let joined = joined.to_string_lossy();
            if let Some(address) = self.offer(&joined, pwd, forced)? {
                return Ok(Some(address));
            }
        }

        Err(FetchError::invalid_address(
            raw,
            "no registered getter recognises this source",
        ))
    }

    fn offer(
        &self,
        src: &str,
        pwd: Option<&Path>,
        forced: Option<&str>,
    ) -> FetchResult<Option<Address>> {
        let req = DetectRequest::new(src, pwd, forced);
        for getter in self.registry.iter() {
            if req.excludes(getter.as_ref()) {
                continue;
            }
            if let Some(address) = getter.detect(&req)? {
                tracing::debug!(
                    src = %src,
                    getter = getter.scheme(),
                    address = %address,
                    "Source detected"
                );
                return Ok(Some(address));
            }
        }
        Ok(None)
    }
}
