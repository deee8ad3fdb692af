//! URL extractor (C4): given a base node and a response body, harvest child
//! URLs both by parsing HTML links and by running a regex ruleset over the
//! raw text, then sanitize and de-duplicate the union.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{Html, Selector};
use url::Url;

use crate::entity::UrlNode;
use crate::matcher::Handler;
use crate::sanitize::{self, is_static_resource};

pub struct Extractor {
    anchor: Selector,
    link: Selector,
    script: Selector,
    url_finder: Box<dyn Handler>,
}

impl Extractor {
    /// `url_finder` is a [`Handler`] (normally a [`crate::matcher::SecretMatcher`])
    /// compiled over the configured `urlFind`/`jsFind` regex ruleset.
    pub fn new(url_finder: Box<dyn Handler>) -> Self {
        Extractor {
            anchor: Selector::parse("a[href]").expect("static selector"),
            link: Selector::parse("link[href]").expect("static selector"),
            script: Selector::parse("script[src]").expect("static selector"),
            url_finder,
        }
    }

    /// Extract all child URL nodes at `base.depth + 1` found in `body`.
    pub fn extract(&self, base: &Arc<UrlNode>, body: &str) -> HashSet<Arc<UrlNode>> {
        let mut found = self.harvest_html(base, body);
        found.extend(self.harvest_regex(base, body));
        found
    }

    fn harvest_html(&self, base: &Arc<UrlNode>, body: &str) -> HashSet<Arc<UrlNode>> {
        let doc = Html::parse_document(body);
        let mut found = HashSet::new();

        for el in doc.select(&self.anchor) {
            if let Some(href) = el.value().attr("href") {
                if let Some(node) = resolve_as_reference(base, href) {
                    found.insert(node);
                }
            }
        }
        for el in doc.select(&self.link) {
            if let Some(href) = el.value().attr("href") {
                if let Some(node) = resolve_as_reference(base, href) {
                    found.insert(node);
                }
            }
        }
        for el in doc.select(&self.script) {
            if let Some(src) = el.value().attr("src") {
                if src.ends_with(".js") {
                    if let Some(node) = resolve_as_reference(base, src) {
                        found.insert(node);
                    }
                }
            }
        }
        found
    }

    fn harvest_regex(&self, base: &Arc<UrlNode>, body: &str) -> HashSet<Arc<UrlNode>> {
        let mut found = HashSet::new();
        let Ok(matches) = self.url_finder.handle(body) else {
            return found;
        };
        for secret in matches {
            if let Some(node) = resolve_with_scheme_substitution(base, &secret.data) {
                found.insert(node);
            }
        }
        found
    }
}

/// HTML-harvesting resolution: an href that already carries its own host is
/// kept as-is; everything else is stitched onto the base's scheme and host
/// verbatim, never resolved against the base's own path (mirrors
/// `urlparser.py`'s `URL(scheme=base.scheme, netloc=base.netloc, path=url_obj.path, ...)`).
fn resolve_as_reference(base: &Arc<UrlNode>, raw_href: &str) -> Option<Arc<UrlNode>> {
    let sanitized = sanitize::sanitize(raw_href);
    if sanitized.is_empty() {
        return None;
    }

    let resolved = match Url::parse(&sanitized) {
        Ok(u) if u.host_str().is_some_and(|h| !h.is_empty()) => u,
        _ => substitute_scheme_and_host(&base.url, &sanitized)?,
    };
    finish_node(base, resolved)
}

/// Regex-harvesting resolution: a candidate keeps its own scheme+host only
/// when the scheme is http(s) and the host is present; otherwise the base's
/// scheme/netloc are substituted onto the candidate's own path/query/fragment,
/// again following `urlparser.py`'s substitution rather than WHATWG joining.
fn resolve_with_scheme_substitution(base: &Arc<UrlNode>, candidate: &str) -> Option<Arc<UrlNode>> {
    let sanitized = sanitize::sanitize(candidate);
    if sanitized.is_empty() {
        return None;
    }

    let is_usable_absolute = Url::parse(&sanitized)
        .map(|u| {
            matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty())
        })
        .unwrap_or(false);

    let resolved = if is_usable_absolute {
        Url::parse(&sanitized).ok()?
    } else {
        substitute_scheme_and_host(&base.url, &sanitized)?
    };
    finish_node(base, resolved)
}

/// Build a URL from `base`'s scheme+host (+ port) and `candidate`'s own
/// path/query/fragment, taken literally rather than resolved against
/// `base`'s path. Joining `candidate` against a root URL (path `/`) rather
/// than against `base` itself is what keeps the candidate's path from being
/// merged into base's directory, matching Python's `urlparse`/`urlunparse`
/// pair: a relative `path` simply gets a leading `/` prepended, never
/// concatenated onto the base's own path segments.
fn substitute_scheme_and_host(base: &Url, candidate: &str) -> Option<Url> {
    let root = match base.port() {
        Some(port) => format!("{}://{}:{}/", base.scheme(), base.host_str()?, port),
        None => format!("{}://{}/", base.scheme(), base.host_str()?),
    };
    let root = Url::parse(&root).ok()?;
    root.join(candidate).ok()
}

fn finish_node(base: &Arc<UrlNode>, resolved: Url) -> Option<Arc<UrlNode>> {
    if is_static_resource(resolved.path()) {
        return None;
    }
    let raw = resolved.to_string();
    let depth = base.depth + 1;
    UrlNode::child(raw, resolved, depth, Arc::clone(base))
        .ok()
        .map(Arc::new)
}
