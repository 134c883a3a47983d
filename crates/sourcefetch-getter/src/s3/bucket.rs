//! Bucket access
//!
//! `BucketClient` is the narrow surface the S3 getter needs: existence checks,
//! paged listing, and streamed reads. The production implementation sits on
//! `object_store`; tests plug in their own.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{Error as ObjectStoreError, GetOptions, ObjectMeta, ObjectStore};
use sourcefetch_core::{FetchError, FetchResult};

use super::credentials::CredentialSource;
use super::location::S3Location;

pub type ByteStream = Pin<Box<dyn Stream<Item = FetchResult<Bytes>> + Send>>;

/// One page of a key listing, in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// More keys follow the last one on this page.
    pub is_truncated: bool,
}

#[async_trait]
pub trait BucketClient: Send + Sync {
    fn bucket(&self) -> &str;

    /// Whether an object exists at exactly `key`.
    async fn head(&self, key: &str) -> FetchResult<bool>;

    /// Keys under `prefix` strictly after `marker`, at most `max_keys` of them.
    async fn list_page(
        &self,
        prefix: &str,
        marker: Option<&str>,
        max_keys: usize,
    ) -> FetchResult<ListPage>;

    async fn get_object(&self, key: &str, version: Option<&str>) -> FetchResult<ByteStream>;
}

/// Builds a client for one request's location and credentials.
pub trait BucketConnector: Send + Sync {
    fn connect(
        &self,
        location: &S3Location,
        credentials: &CredentialSource,
    ) -> FetchResult<Arc<dyn BucketClient>>;
}

/// `BucketClient` over any `object_store` backend.
pub struct ObjectStoreBucket {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreBucket {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        ObjectStoreBucket {
            store,
            bucket: bucket.into(),
        }
    }

    fn transport(&self, key: &str, e: ObjectStoreError) -> FetchError {
        match e {
            ObjectStoreError::NotFound { .. } => FetchError::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            },
            other => FetchError::Transport(other.to_string()),
        }
    }
}

#[async_trait]
impl BucketClient for ObjectStoreBucket {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head(&self, key: &str) -> FetchResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }

        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        match self.store.get_opts(&Path::from(key), options).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(FetchError::Transport(e.to_string())),
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        marker: Option<&str>,
        max_keys: usize,
    ) -> FetchResult<ListPage> {
        let prefix = (!prefix.is_empty()).then(|| Path::from(prefix));
        let listing = match marker {
            Some(marker) => self
                .store
                .list_with_offset(prefix.as_ref(), &Path::from(marker)),
            None => self.store.list(prefix.as_ref()),
        };

        // One extra entry tells us whether another page exists.
        let metas: Vec<ObjectMeta> = listing
            .take(max_keys + 1)
            .try_collect()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let is_truncated = metas.len() > max_keys;
        let keys = metas
            .into_iter()
            .take(max_keys)
            .map(|meta| meta.location.to_string())
            .collect();

        Ok(ListPage { keys, is_truncated })
    }

    async fn get_object(&self, key: &str, version: Option<&str>) -> FetchResult<ByteStream> {
        let options = GetOptions {
            version: version.map(str::to_string),
            ..Default::default()
        };
        let result = self
            .store
            .get_opts(&Path::from(key), options)
            .await
            .map_err(|e| self.transport(key, e))?;

        Ok(Box::pin(result.into_stream().map(|chunk| {
            chunk.map_err(|e| FetchError::Transport(e.to_string()))
        })))
    }
}

/// Production connector: an `AmazonS3` store per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmazonS3Connector;

impl BucketConnector for AmazonS3Connector {
    fn connect(
        &self,
        location: &S3Location,
        credentials: &CredentialSource,
    ) -> FetchResult<Arc<dyn BucketClient>> {
        let mut builder = AmazonS3Builder::new()
            .with_region(location.region.clone())
            .with_bucket_name(location.bucket.clone());

        match credentials {
            CredentialSource::InstanceMetadata { endpoint } => {
                builder = builder.with_metadata_endpoint(endpoint.clone());
            }
            other => {
                if let Some(creds) = other.static_credentials() {
                    builder = builder
                        .with_access_key_id(creds.access_key_id.clone())
                        .with_secret_access_key(creds.secret_access_key.clone());
                    if let Some(token) = &creds.session_token {
                        builder = builder.with_token(token.clone());
                    }
                }
            }
        }

        // S3-compatible services: explicit endpoint, path-style requests.
        if let Some(endpoint) = &location.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(location.allow_http)
                .with_virtual_hosted_style_request(false);
        }

        let store = builder.build().map_err(|e| {
            FetchError::invalid_address(
                format!("s3://{}/{}", location.bucket, location.key),
                e.to_string(),
            )
        })?;

        Ok(Arc::new(ObjectStoreBucket::new(
            Arc::new(store),
            location.bucket.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use object_store::{PutOptions, PutPayload};

    async fn seeded(keys: &[&str]) -> ObjectStoreBucket {
        let store = InMemory::new();
        for key in keys {
            store
                .put_opts(
                    &Path::from(*key),
                    PutPayload::from(Bytes::from(format!("content of {}", key))),
                    PutOptions::default(),
                )
                .await
                .unwrap();
        }
        ObjectStoreBucket::new(Arc::new(store), "bucket")
    }

    #[tokio::test]
    async fn head_distinguishes_objects_from_prefixes() {
        let bucket = seeded(&["dir/a.txt"]).await;
        assert!(bucket.head("dir/a.txt").await.unwrap());
        assert!(!bucket.head("dir").await.unwrap());
        assert!(!bucket.head("").await.unwrap());
    }

    #[tokio::test]
    async fn list_pages_by_marker() {
        let bucket = seeded(&["dir/a", "dir/b", "dir/c", "other/d"]).await;

        let first = bucket.list_page("dir", None, 2).await.unwrap();
        assert_eq!(first.keys, vec!["dir/a", "dir/b"]);
        assert!(first.is_truncated);

        let second = bucket.list_page("dir", Some("dir/b"), 2).await.unwrap();
        assert_eq!(second.keys, vec!["dir/c"]);
        assert!(!second.is_truncated);
    }

    #[tokio::test]
    async fn get_object_streams_content() {
        let bucket = seeded(&["dir/a"]).await;
        let chunks: Vec<Bytes> = bucket
            .get_object("dir/a", None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"content of dir/a");

        let missing = bucket.get_object("dir/zzz", None).await;
        assert!(matches!(missing, Err(FetchError::ObjectNotFound { .. })));
    }

    #[test]
    fn connector_builds_compatible_endpoint_clients() {
        let location = S3Location {
            region: "us-east-1".into(),
            bucket: "bucket".into(),
            key: "key".into(),
            version: None,
            endpoint: Some("http://127.0.0.1:9000".into()),
            allow_http: true,
            credentials: None,
        };
        let client = AmazonS3Connector
            .connect(
                &location,
                &CredentialSource::InstanceMetadata {
                    endpoint: "http://169.254.169.254".into(),
                },
            )
            .unwrap();
        assert_eq!(client.bucket(), "bucket");
    }
}
