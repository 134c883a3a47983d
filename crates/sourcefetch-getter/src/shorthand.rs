//! Code-hosting shorthand detection
//!
//! Rewrites `host/owner/repo` strings for known hosting providers into the
//! provider's clone URL. The VCS getters consult a `ShorthandDetector` and only
//! claim results tagged with their own VCS.

use sourcefetch_core::{FetchError, FetchResult};
use url::Url;

/// A recognised shorthand: which VCS serves it and where to clone from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shorthand {
    pub vcs: &'static str,
    pub url: Url,
}

pub trait ShorthandDetector: Send + Sync {
    /// `Ok(None)` when `src` does not start with a known host. Errors mean the
    /// host was recognised but the rest of the string is unusable.
    fn detect(&self, src: &str) -> FetchResult<Option<Shorthand>>;
}

#[derive(Debug, Clone, Copy)]
pub struct HostingProvider {
    pub host: &'static str,
    pub vcs: &'static str,
}

/// Mercurial hosting providers known out of the box.
pub const MERCURIAL_HOSTS: &[HostingProvider] = &[
    HostingProvider {
        host: "hg.sr.ht",
        vcs: "hg",
    },
    HostingProvider {
        host: "foss.heptapod.net",
        vcs: "hg",
    },
];

/// Table-driven detector: `host/owner/repo[/more][?query]` becomes
/// `https://host/owner/repo[/more][?query]`.
#[derive(Debug, Clone)]
pub struct HostingShorthand {
    providers: Vec<HostingProvider>,
}

impl HostingShorthand {
    pub fn new(providers: Vec<HostingProvider>) -> Self {
        HostingShorthand { providers }
    }
}

impl Default for HostingShorthand {
    fn default() -> Self {
        HostingShorthand::new(MERCURIAL_HOSTS.to_vec())
    }
}

impl ShorthandDetector for HostingShorthand {
    fn detect(&self, src: &str) -> FetchResult<Option<Shorthand>> {
        let provider = match self.providers.iter().find(|p| {
            src.strip_prefix(p.host)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        }) {
            Some(provider) => provider,
            None => return Ok(None),
        };

        let rest = &src[provider.host.len()..];
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(FetchError::invalid_address(
                src,
                format!("{} shorthand must name an owner and a repository", provider.host),
            ));
        }

        let mut raw = format!("https://{}/{}", provider.host, segments.join("/"));
        if let Some(query) = query {
            raw.push('?');
            raw.push_str(query);
        }
        let url = Url::parse(&raw)
            .map_err(|e| FetchError::invalid_address(src, format!("error parsing URL: {}", e)))?;

        Ok(Some(Shorthand {
            vcs: provider.vcs,
            url,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hosts_become_clone_urls() {
        let detector = HostingShorthand::default();
        let found = detector
            .detect("hg.sr.ht/~alice/project?rev=tip")
            .unwrap()
            .unwrap();
        assert_eq!(found.vcs, "hg");
        assert_eq!(found.url.as_str(), "https://hg.sr.ht/~alice/project?rev=tip");

        let found = detector
            .detect("foss.heptapod.net/group/repo/")
            .unwrap()
            .unwrap();
        assert_eq!(found.url.as_str(), "https://foss.heptapod.net/group/repo");
    }

    #[test]
    fn unknown_hosts_are_not_claimed() {
        let detector = HostingShorthand::default();
        assert!(detector.detect("example.com/owner/repo").unwrap().is_none());
        assert!(detector.detect("hg.sr.htx/owner/repo").unwrap().is_none());
    }

    #[test]
    fn incomplete_shorthand_is_an_error() {
        let detector = HostingShorthand::default();
        assert!(detector.detect("hg.sr.ht/~alice").is_err());
        assert!(detector.detect("hg.sr.ht").is_err());
    }
}
