//! Configuration module
//!
//! Process-wide defaults for the getters. Nothing here is credential material:
//! credentials are resolved per request by the S3 getter.

use std::env;

use crate::copy::DEFAULT_COPY_BUFFER_SIZE;

const HG_BINARY: &str = "hg";
const S3_DEFAULT_REGION: &str = "us-east-1";
const S3_PAGE_SIZE: usize = 1000;
const METADATA_URL: &str = "http://169.254.169.254";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchConfig {
    /// Mercurial client executable, resolved on the PATH at retrieval time.
    pub hg_binary: String,
    /// Region assumed when neither the host nor the query names one.
    pub s3_default_region: String,
    /// Maximum keys requested per listing page.
    pub s3_page_size: usize,
    /// Instance metadata endpoint used as the last credential source.
    pub metadata_url: String,
    pub copy_buffer_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            hg_binary: HG_BINARY.to_string(),
            s3_default_region: S3_DEFAULT_REGION.to_string(),
            s3_page_size: S3_PAGE_SIZE,
            metadata_url: METADATA_URL.to_string(),
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build from an arbitrary variable source (the process environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = FetchConfig::default();

        let s3_page_size = match lookup("SOURCEFETCH_S3_PAGE_SIZE") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("SOURCEFETCH_S3_PAGE_SIZE must be a valid number"))?,
            None => defaults.s3_page_size,
        };

        let copy_buffer_size = match lookup("SOURCEFETCH_COPY_BUFFER_SIZE") {
            Some(v) => v.trim().parse::<usize>().map_err(|_| {
                anyhow::anyhow!("SOURCEFETCH_COPY_BUFFER_SIZE must be a valid number")
            })?,
            None => defaults.copy_buffer_size,
        };

        Ok(FetchConfig {
            hg_binary: lookup("SOURCEFETCH_HG_BINARY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.hg_binary),
            s3_default_region: lookup("SOURCEFETCH_S3_DEFAULT_REGION")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.s3_default_region),
            s3_page_size,
            metadata_url: lookup("AWS_METADATA_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.metadata_url),
            copy_buffer_size,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.s3_page_size == 0 {
            return Err(anyhow::anyhow!("SOURCEFETCH_S3_PAGE_SIZE must be greater than 0"));
        }
        if self.copy_buffer_size == 0 {
            return Err(anyhow::anyhow!(
                "SOURCEFETCH_COPY_BUFFER_SIZE must be greater than 0"
            ));
        }
        if self.hg_binary.trim().is_empty() {
            return Err(anyhow::anyhow!("SOURCEFETCH_HG_BINARY cannot be empty"));
        }
        Ok(())
    }
}
