//! Ordered getter registry
//!
//! The registry replaces a linked chain of getters: detection walks it in
//! registration order, retrieval looks getters up by scheme.

use std::sync::Arc;

use sourcefetch_core::{FetchConfig, FetchError, FetchResult};

use crate::file::FileGetter;
#[cfg(feature = "getter-hg")]
use crate::hg::HgGetter;
#[cfg(feature = "getter-s3")]
use crate::s3::S3Getter;
use crate::traits::Getter;

#[derive(Clone, Default)]
pub struct GetterRegistry {
    getters: Vec<Arc<dyn Getter>>,
}

impl GetterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `hg`, then `s3`, then `file`.
    ///
    /// The file getter claims any path, so it must come last.
    pub fn with_defaults(config: &FetchConfig) -> Self {
        let mut registry = GetterRegistry::new();
        #[cfg(feature = "getter-hg")]
        registry.getters.push(Arc::new(HgGetter::new(config)));
        #[cfg(feature = "getter-s3")]
        registry.getters.push(Arc::new(S3Getter::new(config)));
        registry
            .getters
            .push(Arc::new(FileGetter::new(config.copy_buffer_size)));
        registry
    }

    /// Append a getter; a scheme may only be registered once.
    pub fn register(&mut self, getter: Arc<dyn Getter>) -> FetchResult<()> {
        if self.get(getter.scheme()).is_some() {
            return Err(FetchError::DuplicateGetter(getter.scheme().to_string()));
        }
        self.getters.push(getter);
        Ok(())
    }

    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn Getter>> {
        self.getters.iter().find(|g| g.valid_scheme(scheme))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Getter>> {
        self.getters.iter()
    }

    pub fn schemes(&self) -> Vec<&'static str> {
        self.getters.iter().map(|g| g.scheme()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.getters.is_empty()
    }
}
