//! S3 address parsing
//!
//! Accepted forms:
//!
//! - `s3://bucket/key`
//! - path-style AWS hosts: `s3.amazonaws.com/bucket/key`, `s3-REGION.amazonaws.com/...`,
//!   `s3.REGION.amazonaws.com/...`
//! - virtual-hosted AWS hosts: `bucket.s3.amazonaws.com/key`,
//!   `bucket.s3-REGION.amazonaws.com/key`, `bucket.s3.REGION.amazonaws.com/key`
//! - any other host as an S3-compatible endpoint: `host[:port]/bucket/key`

use percent_encoding::percent_decode_str;
use sourcefetch_core::{Address, FetchError, FetchResult};
use url::Url;

use super::credentials::StaticCredentials;

pub const VERSION_PARAM: &str = "version";
pub const REGION_PARAM: &str = "region";
pub const ACCESS_KEY_ID_PARAM: &str = "aws_access_key_id";
pub const SECRET_ACCESS_KEY_PARAM: &str = "aws_access_key_secret";
pub const SESSION_TOKEN_PARAM: &str = "aws_access_token";

const AWS_DOMAIN: &str = ".amazonaws.com";

/// Everything needed to reach one object or prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub region: String,
    pub bucket: String,
    /// Object key, or key prefix for directory retrieval. Never starts with `/`.
    pub key: String,
    pub version: Option<String>,
    /// Explicit endpoint for S3-compatible services; `None` for AWS.
    pub endpoint: Option<String>,
    pub allow_http: bool,
    /// Static credentials carried in the address query.
    pub credentials: Option<StaticCredentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwsHost {
    PathStyle { region: String },
    VirtualHosted { bucket: String, region: String },
}

/// Classify an `*.amazonaws.com` host.
pub fn parse_aws_host(host: &str, default_region: &str) -> Option<AwsHost> {
    let labels: Vec<&str> = host.strip_suffix(AWS_DOMAIN)?.split('.').collect();
    let idx = labels
        .iter()
        .rposition(|l| *l == "s3" || l.starts_with("s3-"))?;

    let service = labels[idx];
    let region = match &labels[idx + 1..] {
        [] => service.strip_prefix("s3-").unwrap_or_default().to_string(),
        [region] if service == "s3" && !region.is_empty() => region.to_string(),
        _ => return None,
    };
    let region = if region.is_empty() {
        default_region.to_string()
    } else {
        region
    };

    let bucket = labels[..idx].join(".");
    if bucket.is_empty() {
        Some(AwsHost::PathStyle { region })
    } else {
        Some(AwsHost::VirtualHosted { bucket, region })
    }
}

/// Rewrite an `*.amazonaws.com/...` shorthand into the canonical path-style
/// address `s3::https://s3.REGION.amazonaws.com/bucket/key`.
pub fn detect_http(src: &str, default_region: &str) -> FetchResult<Address> {
    let invalid = |reason: &str| FetchError::invalid_address(src, reason);

    let (host, rest) = src
        .split_once('/')
        .ok_or_else(|| invalid("URL is not a valid S3 URL"))?;
    if rest.is_empty() {
        return Err(invalid("URL is not a valid S3 URL"));
    }

    let raw = match parse_aws_host(host, default_region) {
        Some(AwsHost::PathStyle { region }) => {
            format!("https://s3.{}.amazonaws.com/{}", region, rest)
        }
        Some(AwsHost::VirtualHosted { bucket, region }) => {
            format!("https://s3.{}.amazonaws.com/{}/{}", region, bucket, rest)
        }
        None => return Err(invalid("URL is not a valid S3 URL")),
    };

    let url = Url::parse(&raw)
        .map_err(|e| FetchError::invalid_address(src, format!("error parsing S3 URL: {}", e)))?;
    Ok(Address::forced("s3", url))
}

pub fn parse_location(address: &Address, default_region: &str) -> FetchResult<S3Location> {
    let url = address.url();
    let invalid = |reason: &str| FetchError::invalid_address(address.to_string(), reason);

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("URL has no host"))?;
    let query_region = address
        .query_param(REGION_PARAM)
        .filter(|r| !r.is_empty());

    let mut endpoint = None;
    let mut allow_http = false;

    let (region, bucket, key) = if url.scheme() == "s3" {
        let key = decode(url.path().trim_start_matches('/'));
        let region = query_region.unwrap_or_else(|| default_region.to_string());
        (region, host.to_string(), key)
    } else if host.ends_with(AWS_DOMAIN) {
        match parse_aws_host(host, default_region) {
            Some(AwsHost::PathStyle { region }) => {
                let (bucket, key) = split_bucket_key(url.path())
                    .ok_or_else(|| invalid("URL is not a valid S3 URL"))?;
                (query_region.unwrap_or(region), bucket, key)
            }
            Some(AwsHost::VirtualHosted { bucket, region }) => {
                let key = decode(url.path().trim_start_matches('/'));
                (query_region.unwrap_or(region), bucket, key)
            }
            None => return Err(invalid("URL is not a valid S3 URL")),
        }
    } else {
        let (bucket, key) = split_bucket_key(url.path())
            .ok_or_else(|| invalid("URL is not a valid S3 compliant URL"))?;
        endpoint = Some(url.origin().ascii_serialization());
        allow_http = url.scheme() == "http";
        let region = query_region.unwrap_or_else(|| default_region.to_string());
        (region, bucket, key)
    };

    Ok(S3Location {
        region,
        bucket,
        key,
        version: address
            .query_param(VERSION_PARAM)
            .filter(|v| !v.is_empty()),
        endpoint,
        allow_http,
        credentials: query_credentials(address),
    })
}

/// Static credentials from the query; present when any of the three keys is.
fn query_credentials(address: &Address) -> Option<StaticCredentials> {
    let present = [
        ACCESS_KEY_ID_PARAM,
        SECRET_ACCESS_KEY_PARAM,
        SESSION_TOKEN_PARAM,
    ]
    .iter()
    .any(|k| address.has_query_param(k));
    if !present {
        return None;
    }

    Some(StaticCredentials {
        access_key_id: address.query_param(ACCESS_KEY_ID_PARAM).unwrap_or_default(),
        secret_access_key: address
            .query_param(SECRET_ACCESS_KEY_PARAM)
            .unwrap_or_default(),
        session_token: address
            .query_param(SESSION_TOKEN_PARAM)
            .filter(|t| !t.is_empty()),
    })
}

/// `/bucket/key...` into its two parts; the key may be empty but the bucket not.
fn split_bucket_key(path: &str) -> Option<(String, String)> {
    let mut parts = path.splitn(3, '/');
    let leading = parts.next()?;
    let bucket = parts.next()?;
    let key = parts.next()?;
    if !leading.is_empty() || bucket.is_empty() {
        return None;
    }
    Some((decode(bucket), decode(key)))
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}
