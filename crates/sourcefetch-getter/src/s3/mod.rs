//! S3 getter
//!
//! Single objects and whole key prefixes from AWS S3 or any S3-compatible
//! service. Directory retrieval walks the listing page by page and streams every
//! object to disk.

pub mod bucket;
pub mod credentials;
pub mod location;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sourcefetch_core::{
    copy_stream_with_cancel, Address, CancellationToken, FetchConfig, FetchError, FetchResult,
    Mode, Request,
};
use tokio::fs;

use crate::file::{create_parent_dirs, symlink_metadata};
use crate::traits::{claim_url, forced_path_fallback, DetectRequest, Getter, UrlClaim};

pub use bucket::{
    AmazonS3Connector, BucketClient, BucketConnector, ByteStream, ListPage, ObjectStoreBucket,
};
pub use credentials::{CredentialSource, StaticCredentials};
pub use location::S3Location;

pub struct S3Getter {
    connector: Arc<dyn BucketConnector>,
    default_region: String,
    page_size: usize,
    metadata_url: String,
}

impl S3Getter {
    pub fn new(config: &FetchConfig) -> Self {
        S3Getter {
            connector: Arc::new(AmazonS3Connector),
            default_region: config.s3_default_region.clone(),
            page_size: config.s3_page_size.max(1),
            metadata_url: config.metadata_url.clone(),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn BucketConnector>) -> Self {
        self.connector = connector;
        self
    }

    async fn connect(
        &self,
        address: &Address,
    ) -> FetchResult<(S3Location, Arc<dyn BucketClient>)> {
        let location = location::parse_location(address, &self.default_region)?;
        let credentials =
            credentials::discover_credentials(location.credentials.clone(), &self.metadata_url)
                .await;

        tracing::debug!(
            bucket = %location.bucket,
            region = %location.region,
            credentials = credentials.name(),
            "S3 client configured"
        );

        let client = self.connector.connect(&location, &credentials)?;
        Ok((location, client))
    }

    async fn fetch_object(
        &self,
        cancel: &CancellationToken,
        client: &dyn BucketClient,
        dst: &Path,
        key: &str,
        version: Option<&str>,
    ) -> FetchResult<u64> {
        let start = Instant::now();

        let stream = client.get_object(key, version).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %client.bucket(),
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 download failed"
            );
            e
        })?;

        create_parent_dirs(dst).await?;
        let mut file = fs::File::create(dst)
            .await
            .map_err(|e| FetchError::io(dst, e))?;
        let size = copy_stream_with_cancel(cancel, stream, &mut file, dst).await?;

        tracing::info!(
            bucket = %client.bucket(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );
        Ok(size)
    }
}

#[async_trait]
impl Getter for S3Getter {
    fn scheme(&self) -> &'static str {
        "s3"
    }

    fn detect(&self, req: &DetectRequest<'_>) -> FetchResult<Option<Address>> {
        if req.src.is_empty() || req.excludes(self) {
            return Ok(None);
        }

        match claim_url(self, req) {
            UrlClaim::Claimed(address) => return Ok(Some(address)),
            UrlClaim::Declined => return Ok(None),
            UrlClaim::NotUrl => {}
        }

        if req.src.contains(".amazonaws.com/") {
            return location::detect_http(req.src, &self.default_region).map(Some);
        }

        forced_path_fallback(self, req)
    }

    async fn mode(&self, address: &Address, cancel: &CancellationToken) -> FetchResult<Mode> {
        let (location, client) = self.connect(address).await?;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        if client.head(&location.key).await? {
            return Ok(Mode::File);
        }

        let prefix = directory_prefix(&location.key);
        let page = client.list_page(&prefix, None, 1).await?;
        if page.keys.is_empty() {
            Ok(Mode::File)
        } else {
            Ok(Mode::Directory)
        }
    }

    async fn get(&self, req: &mut Request) -> FetchResult<()> {
        let (location, client) = self.connect(&req.address).await?;
        let start = Instant::now();

        // The destination is replaced wholesale.
        if let Some(meta) = symlink_metadata(&req.dst).await? {
            let removed = if meta.is_dir() {
                fs::remove_dir_all(&req.dst).await
            } else {
                fs::remove_file(&req.dst).await
            };
            removed.map_err(|e| FetchError::io(&req.dst, e))?;
        }
        create_parent_dirs(&req.dst).await?;

        let prefix = directory_prefix(&location.key);
        let prefix = prefix.as_str();
        let mut marker: Option<String> = None;
        let mut objects = 0usize;
        let mut total_bytes = 0u64;

        loop {
            if req.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let page = client
                .list_page(prefix, marker.as_deref(), self.page_size)
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        bucket = %location.bucket,
                        prefix = %prefix,
                        "S3 listing failed"
                    );
                    e
                })?;

            tracing::debug!(
                bucket = %location.bucket,
                prefix = %prefix,
                keys = page.keys.len(),
                truncated = page.is_truncated,
                "S3 listing page"
            );

            for key in &page.keys {
                marker = Some(key.clone());

                // Directory placeholder objects.
                if key.ends_with('/') {
                    continue;
                }

                let dst = object_destination(&req.dst, prefix, key)?;
                total_bytes += self
                    .fetch_object(&req.cancel, client.as_ref(), &dst, key, None)
                    .await?;
                objects += 1;
            }

            if !page.is_truncated || page.keys.is_empty() {
                break;
            }
        }

        tracing::info!(
            bucket = %location.bucket,
            prefix = %prefix,
            objects = objects,
            size_bytes = total_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 prefix downloaded"
        );
        Ok(())
    }

    async fn get_file(&self, req: &mut Request) -> FetchResult<()> {
        let (location, client) = self.connect(&req.address).await?;
        self.fetch_object(
            &req.cancel,
            client.as_ref(),
            &req.dst,
            &location.key,
            location.version.as_deref(),
        )
        .await?;
        Ok(())
    }
}

/// Listing prefix for the directory at `key`: only keys below `key/` belong to
/// it, `key-other` does not.
fn directory_prefix(key: &str) -> String {
    match key.trim_end_matches('/') {
        "" => String::new(),
        key => format!("{}/", key),
    }
}

/// Local path for `key` when the prefix `prefix` is materialized at `dst`.
///
/// Keys that would land outside `dst` are rejected.
pub fn object_destination(dst: &Path, prefix: &str, key: &str) -> FetchResult<PathBuf> {
    let rel = key
        .strip_prefix(prefix)
        .unwrap_or(key)
        .trim_start_matches('/');
    if rel.is_empty() {
        return Ok(dst.to_path_buf());
    }

    let rel = Path::new(rel);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(FetchError::invalid_address(
            key,
            "object key escapes the destination directory",
        ));
    }
    Ok(dst.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn getter() -> S3Getter {
        S3Getter::new(&FetchConfig::default())
    }

    #[test]
    fn detect_claims_s3_urls_and_amazon_hosts() {
        let g = getter();
        let req = DetectRequest::new("s3://bucket/key", None, None);
        assert_eq!(g.detect(&req).unwrap().unwrap().to_string(), "s3://bucket/key");

        let req = DetectRequest::new("bucket.s3.us-west-2.amazonaws.com/key/obj.txt", None, None);
        assert_eq!(
            g.detect(&req).unwrap().unwrap().to_string(),
            "s3::https://s3.us-west-2.amazonaws.com/bucket/key/obj.txt"
        );

        let req = DetectRequest::new("https://example.com/x", None, None);
        assert!(g.detect(&req).unwrap().is_none());

        let req = DetectRequest::new("./local/dir", None, None);
        assert!(g.detect(&req).unwrap().is_none());
    }

    #[test]
    fn forced_s3_takes_any_url() {
        let g = getter();
        let req = DetectRequest::new("http://127.0.0.1:9000/bucket/key", None, Some("s3"));
        assert_eq!(
            g.detect(&req).unwrap().unwrap().to_string(),
            "s3::http://127.0.0.1:9000/bucket/key"
        );
    }

    #[test]
    fn object_paths_stay_under_destination() {
        let dst = Path::new("/tmp/out");
        assert_eq!(
            object_destination(dst, "dir", "dir/sub/a.txt").unwrap(),
            PathBuf::from("/tmp/out/sub/a.txt")
        );
        assert_eq!(
            object_destination(dst, "", "a.txt").unwrap(),
            PathBuf::from("/tmp/out/a.txt")
        );
        assert_eq!(
            object_destination(dst, "dir/a.txt", "dir/a.txt").unwrap(),
            PathBuf::from("/tmp/out")
        );
        assert!(object_destination(dst, "dir", "dir/../../etc/passwd").is_err());
        assert!(object_destination(dst, "", "/abs").is_ok());
    }
}
