//! Source addresses
//!
//! An `Address` is a URL plus an optional forced getter name. The string form is
//! `<getter>::<url>` when a getter is forced and differs from the URL scheme,
//! and the bare URL otherwise, so parsing a displayed address yields the same
//! address again.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::Url;

use crate::error::{FetchError, FetchResult};

/// Separator between a forced getter name and the rest of a source string.
pub const FORCED_SEPARATOR: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    forced: Option<String>,
    url: Url,
}

impl Address {
    pub fn new(url: Url) -> Self {
        Address { forced: None, url }
    }

    /// Address owned by `getter` regardless of the URL scheme.
    pub fn forced(getter: impl Into<String>, url: Url) -> Self {
        let getter = getter.into().to_ascii_lowercase();
        let forced = if getter == url.scheme() {
            None
        } else {
            Some(getter)
        };
        Address { forced, url }
    }

    /// `file://` address for an absolute local path.
    pub fn from_file_path(path: &Path) -> FetchResult<Self> {
        let url = Url::from_file_path(path).map_err(|_| {
            FetchError::invalid_address(path.display().to_string(), "path is not absolute")
        })?;
        Ok(Address::new(url))
    }

    pub fn parse(src: &str) -> FetchResult<Self> {
        let (forced, rest) = split_forced(src);
        let url = parse_url(rest)
            .ok_or_else(|| FetchError::invalid_address(src, "missing or invalid scheme"))?;
        Ok(match forced {
            Some(getter) => Address::forced(getter, url),
            None => Address::new(url),
        })
    }

    /// Name of the getter that owns this address.
    pub fn getter(&self) -> &str {
        self.forced.as_deref().unwrap_or_else(|| self.url.scheme())
    }

    pub fn is_forced(&self) -> bool {
        self.forced.is_some()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn into_url(self) -> Url {
        self.url
    }

    /// First value of a query parameter, percent-decoded.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn has_query_param(&self, key: &str) -> bool {
        self.url.query_pairs().any(|(k, _)| k == key)
    }

    /// The URL with every `key` parameter removed, plus the first removed value.
    ///
    /// Used before handing the address to a transport that does not understand
    /// the getter's reserved parameters.
    pub fn strip_query_param(&self, key: &str) -> (Url, Option<String>) {
        let mut url = self.url.clone();
        let mut taken = None;
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter_map(|(k, v)| {
                if k == key {
                    if taken.is_none() {
                        taken = Some(v.into_owned());
                    }
                    None
                } else {
                    Some((k.into_owned(), v.into_owned()))
                }
            })
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        (url, taken)
    }

    /// Local path of a `file://` address, percent-decoded.
    pub fn to_file_path(&self) -> FetchResult<PathBuf> {
        if self.url.scheme() != "file" {
            return Err(FetchError::invalid_address(
                self.to_string(),
                "not a file address",
            ));
        }
        self.url
            .to_file_path()
            .map_err(|_| FetchError::invalid_address(self.to_string(), "not a local file path"))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.forced {
            Some(getter) => write!(f, "{}{}{}", getter, FORCED_SEPARATOR, self.url),
            None => write!(f, "{}", self.url),
        }
    }
}

impl FromStr for Address {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

/// Split `name::rest` into the forced getter name and the remainder.
///
/// The name must be non-empty ASCII alphanumerics; anything else is left intact.
pub fn split_forced(src: &str) -> (Option<&str>, &str) {
    if let Some((name, rest)) = src.split_once(FORCED_SEPARATOR) {
        if !name.is_empty() && !rest.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return (Some(name), rest);
        }
    }
    (None, src)
}

/// Parse `src` as a URL with an explicit scheme.
///
/// Single-letter schemes are drive letters (`C:\foo`), not URLs.
pub fn parse_url(src: &str) -> Option<Url> {
    Url::parse(src).ok().filter(|url| url.scheme().len() > 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_idempotent_for_forced_addresses() {
        let raw = "hg::https://example.com/repo?rev=abc123";
        let address = Address::parse(raw).unwrap();
        assert_eq!(address.getter(), "hg");
        assert!(address.is_forced());
        assert_eq!(address.to_string(), raw);
        assert_eq!(Address::parse(&address.to_string()).unwrap(), address);
    }

    #[test]
    fn forcing_the_url_scheme_is_not_recorded() {
        let address = Address::parse("file::file:///work/foo").unwrap();
        assert!(!address.is_forced());
        assert_eq!(address.to_string(), "file:///work/foo");
    }

    #[test]
    fn split_forced_ignores_non_getter_prefixes() {
        assert_eq!(split_forced("s3::https://x/y"), (Some("s3"), "https://x/y"));
        assert_eq!(split_forced("http://[::1]/x"), (None, "http://[::1]/x"));
        assert_eq!(split_forced("::foo"), (None, "::foo"));
        assert_eq!(split_forced("./a::b"), (None, "./a::b"));
    }

    #[test]
    fn drive_letters_are_not_schemes() {
        assert!(parse_url("C:\\work\\foo").is_none());
        assert!(parse_url("c:/work/foo").is_none());
        assert!(parse_url("./modules/foo").is_none());
        assert!(parse_url("bucket.s3.amazonaws.com/key").is_none());
        assert!(parse_url("file:///work").is_some());
    }

    #[test]
    fn strip_query_param_removes_only_the_reserved_key() {
        let address = Address::parse("hg::https://example.com/repo?rev=abc&depth=1").unwrap();
        let (url, rev) = address.strip_query_param("rev");
        assert_eq!(rev.as_deref(), Some("abc"));
        assert_eq!(url.as_str(), "https://example.com/repo?depth=1");

        let address = Address::parse("https://example.com/repo?rev=abc").unwrap();
        let (url, rev) = address.strip_query_param("rev");
        assert_eq!(rev.as_deref(), Some("abc"));
        assert_eq!(url.as_str(), "https://example.com/repo");
    }

    #[test]
    fn query_params_are_decoded() {
        let address = Address::parse("s3://bucket/key?version=a%2Fb").unwrap();
        assert_eq!(address.query_param("version").as_deref(), Some("a/b"));
        assert!(address.has_query_param("version"));
        assert!(!address.has_query_param("region"));
    }

    #[cfg(unix)]
    #[test]
    fn file_addresses_round_trip_unescaped_paths() {
        let address = Address::from_file_path(Path::new("/work/my modules/foo")).unwrap();
        assert_eq!(address.to_string(), "file:///work/my%20modules/foo");
        assert_eq!(
            address.to_file_path().unwrap(),
            PathBuf::from("/work/my modules/foo")
        );
    }

    #[test]
    fn relative_paths_cannot_become_addresses() {
        assert!(Address::from_file_path(Path::new("modules/foo")).is_err());
    }
}
