//! URL filter chain (C1): accept/reject a URL by host allow/deny glob patterns.

use url::Url;

/// Capability interface for anything that decides whether a URL should be
/// crawled.
pub trait UrlFilter: Send + Sync {
    fn accept(&self, url: &Url) -> bool;
}

fn host_of(url: &Url) -> String {
    // Mirrors `to_host_port`: split netloc on ':' and take the first segment.
    // `Url::host_str` already excludes the port, so this is just a lowercase.
    url.host_str().unwrap_or_default().to_lowercase()
}

/// Accept a URL iff its host matches at least one of the configured
/// case-insensitive Unix-glob patterns. An empty pattern set means the
/// caller chose not to install this filter at all; callers should omit it
/// from the chain rather than rely on "empty = accept all" behavior, but we
/// honor that convention here too for direct callers.
pub struct DomainAllowList {
    patterns: Vec<glob::Pattern>,
}

impl DomainAllowList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| glob::Pattern::new(&p.as_ref().to_lowercase()).ok())
            .collect();
        DomainAllowList { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl UrlFilter for DomainAllowList {
    fn accept(&self, url: &Url) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let host = host_of(url);
        self.patterns.iter().any(|p| p.matches(&host))
    }
}

/// Accept a URL iff its host matches none of the configured case-insensitive
/// Unix-glob patterns.
pub struct DomainDenyList {
    patterns: Vec<glob::Pattern>,
}

impl DomainDenyList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| glob::Pattern::new(&p.as_ref().to_lowercase()).ok())
            .collect();
        DomainDenyList { patterns }
    }
}

impl UrlFilter for DomainDenyList {
    fn accept(&self, url: &Url) -> bool {
        let host = host_of(url);
        !self.patterns.iter().any(|p| p.matches(&host))
    }
}

/// A filter chain: a URL is accepted iff every sub-filter accepts it.
pub struct ChainedFilter {
    chain: Vec<Box<dyn UrlFilter>>,
}

impl ChainedFilter {
    pub fn new(chain: Vec<Box<dyn UrlFilter>>) -> Self {
        ChainedFilter { chain }
    }
}

impl UrlFilter for ChainedFilter {
    fn accept(&self, url: &Url) -> bool {
        self.chain.iter().all(|f| f.accept(url))
    }
}

/// Build the standard allow+deny chain used by the crawl engine: if an allow
/// list is configured it runs first, then the deny list always runs.
pub fn build_chain(allow: Vec<String>, deny: Vec<String>) -> ChainedFilter {
    let mut chain: Vec<Box<dyn UrlFilter>> = Vec::new();
    let allow_list = DomainAllowList::new(allow);
    if !allow_list.is_empty() {
        chain.push(Box::new(allow_list));
    }
    chain.push(Box::new(DomainDenyList::new(deny)));
    ChainedFilter::new(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn allow_list_matches_glob_patterns() {
        let filter = DomainAllowList::new(["*baidu.com", "*baidu*com"]);
        assert!(filter.accept(&url("http://baidu.com")));
        assert!(filter.accept(&url("http://www.baidu.com")));
        assert!(filter.accept(&url("http://www.baidu.xxxx.com")));
        assert!(!filter.accept(&url("http://baidu.cn")));
        assert!(!filter.accept(&url("http://xxx")));
    }

    #[test]
    fn chained_allow_then_deny() {
        let chain = build_chain(
            vec!["*baidu.com".to_string()],
            vec!["*baidu.sensitive.com".to_string()],
        );
        assert!(chain.accept(&url("http://baidu.com")));
        assert!(!chain.accept(&url("http://www.baidu.sensitive.com")));
    }

    #[test]
    fn empty_allow_list_accepts_everything() {
        let chain = build_chain(vec![], vec!["*.evil.com".to_string()]);
        assert!(chain.accept(&url("http://anything.example.com")));
        assert!(!chain.accept(&url("http://sub.evil.com")));
    }

    #[test]
    fn deny_list_is_case_insensitive() {
        let filter = DomainDenyList::new(["*.EVIL.com"]);
        assert!(!filter.accept(&url("http://sub.evil.com")));
    }
}
