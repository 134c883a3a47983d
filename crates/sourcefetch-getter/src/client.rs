//! Retrieval façade
//!
//! `Client` ties detection and dispatch together: detect a source string into
//! an address, probe its mode, then hand the request to the getter that owns it.

use std::path::Path;
use std::sync::Arc;

use sourcefetch_core::{
    Address, CancellationToken, FetchConfig, FetchError, FetchResult, LogLevel, Mode, Request,
};

use crate::detect::DetectionChain;
use crate::registry::GetterRegistry;
use crate::traits::Getter;

#[derive(Clone)]
pub struct Client {
    registry: GetterRegistry,
}

impl Client {
    pub fn new(registry: GetterRegistry) -> Self {
        Client { registry }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Client::new(GetterRegistry::with_defaults(config))
    }

    pub fn registry(&self) -> &GetterRegistry {
        &self.registry
    }

    pub fn detect(
        &self,
        src: &str,
        pwd: Option<&Path>,
        forced: Option<&str>,
    ) -> FetchResult<Option<Address>> {
        DetectionChain::new(&self.registry)
            .resolve(src, pwd, forced)
            .inspect_err(log_error)
    }

    /// The getter responsible for `address`, honouring an explicit override.
    pub fn getter_for(
        &self,
        address: &Address,
        forced: Option<&str>,
    ) -> FetchResult<&Arc<dyn Getter>> {
        let name = match forced.filter(|f| !f.is_empty()) {
            Some(forced)
                if address.is_forced() && !forced.eq_ignore_ascii_case(address.getter()) =>
            {
                return Err(FetchError::invalid_address(
                    address.to_string(),
                    format!("forced getter {} conflicts with {}", forced, address.getter()),
                ));
            }
            Some(forced) => forced,
            None => address.getter(),
        };

        self.registry
            .get(name)
            .ok_or_else(|| FetchError::UnsupportedGetter(name.to_string()))
    }

    pub async fn mode(&self, address: &Address, cancel: &CancellationToken) -> FetchResult<Mode> {
        let getter = self.getter_for(address, None)?;
        getter.mode(address, cancel).await.inspect_err(log_error)
    }

    pub async fn get(&self, req: &mut Request) -> FetchResult<()> {
        let getter = self.request_getter(req)?;
        getter.get(req).await.inspect_err(log_error)
    }

    pub async fn get_file(&self, req: &mut Request) -> FetchResult<()> {
        let getter = self.request_getter(req)?;
        getter.get_file(req).await.inspect_err(log_error)
    }

    /// Probe the source mode, then retrieve it as a directory or a single file.
    pub async fn fetch(&self, req: &mut Request) -> FetchResult<Mode> {
        let getter = self.request_getter(req)?;
        let mode = getter
            .mode(&req.address, &req.cancel)
            .await
            .inspect_err(log_error)?;

        let result = match mode {
            Mode::Directory => getter.get(req).await,
            Mode::File => getter.get_file(req).await,
        };
        result.inspect_err(log_error)?;

        tracing::info!(
            address = %req.address,
            dst = %req.dst.display(),
            mode = %mode,
            "Source fetched"
        );
        Ok(mode)
    }

    fn request_getter(&self, req: &Request) -> FetchResult<Arc<dyn Getter>> {
        self.getter_for(&req.address, req.forced.as_deref())
            .cloned()
            .inspect_err(log_error)
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::from_config(&FetchConfig::default())
    }
}

fn log_error(error: &FetchError) {
    let kind = error.kind();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, kind = ?kind, "Retrieval failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, kind = ?kind, "Retrieval failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, kind = ?kind, "Retrieval failed");
        }
    }
}
