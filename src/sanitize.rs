//! URL sanitizer/classifier (C2): normalize raw href strings, discard static
//! assets and junk, and classify survivors as a JS asset or a general page.

use std::sync::LazyLock;
use url::Url;

static NOISE_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)[<>{}\[\]|^;]|/node_modules/|www\.w3\.org|example\.com|jquery[-.\w]*?\.js|\.src|\.replace|\.url|\.att|\.href|location\.href|javascript:|location:|application/x-www-form-urlencoded|\.createObject|:location|\.path|\*#__PURE__\*|\*\$0\*|\n",
    )
    .expect("noise pattern is a valid regex")
});

static HAS_ALNUM: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("[a-zA-Z0-9]+").expect("alnum pattern is a valid regex"));

const STATIC_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".css", ".ico", ".dtd", ".svg", ".scss", ".vue", ".ts",
];

/// Remove invalid characters from a raw URL string, returning an empty
/// string when the candidate looks unusable. Idempotent: re-sanitizing an
/// already-sanitized string is a no-op.
pub fn sanitize(raw: &str) -> String {
    let cleaned = raw
        .replace(' ', "")
        .replace("\\/", "/")
        .replace("%3A", ":")
        .replace("%2F", "/");

    if !HAS_ALNUM.is_match(&cleaned) {
        return String::new();
    }
    if NOISE_PATTERN.is_match(&cleaned) {
        return String::new();
    }
    if cleaned.trim_start().starts_with("javascript") {
        return String::new();
    }
    if let Ok(parsed) = Url::parse(&cleaned) {
        if let Some(host) = parsed.host_str() {
            if host == "127.0.0.1" || host.starts_with("localhost") {
                return String::new();
            }
        }
    }
    cleaned
}

/// True when `path` looks like a static asset that should never be crawled.
pub fn is_static_resource(path: &str) -> bool {
    STATIC_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(ext) || path.contains(&format!("{ext}?")))
}

/// Classification assigned to a discovered URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Js,
    Page,
}

/// Classify a URL as a JS asset or a general page based on its path.
pub fn classify(url: &Url) -> UrlKind {
    let path = url.path();
    if path.ends_with(".js") || path.ends_with(".js.map") || path.contains(".js?") {
        UrlKind::Js
    } else {
        UrlKind::Page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_is_idempotent() {
        for raw in [
            "http://example.org/path?q=1",
            "  http://a.com/%3Afoo%2Fbar  ",
            "<script>alert(1)</script>",
            "javascript:void(0)",
            "http://127.0.0.1/admin",
        ] {
            let once = sanitize(raw);
            let twice = sanitize(&once);
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn sanitize_rejects_noise() {
        assert_eq!(sanitize("javascript:void(0)"), "");
        assert_eq!(sanitize("http://127.0.0.1/x"), "");
        assert_eq!(sanitize("http://localhost:8080/x"), "");
        assert_eq!(sanitize("<div>"), "");
        assert_eq!(sanitize("....."), "");
        assert_eq!(sanitize("a.href = 1"), "");
    }

    #[test]
    fn sanitize_keeps_good_urls() {
        assert_eq!(
            sanitize("http://example.org/path?q=1"),
            "http://example.org/path?q=1"
        );
    }

    #[test]
    fn static_resource_stable_under_query_and_fragment() {
        assert!(is_static_resource("/assets/app.css"));
        assert!(is_static_resource("/assets/app.css?v=2"));
        assert!(!is_static_resource("/assets/app.css.bak"));
        assert!(!is_static_resource("/index.html"));
    }

    #[test]
    fn classify_detects_js_variants() {
        let js = Url::parse("http://x.com/bundle.js").unwrap();
        let map = Url::parse("http://x.com/bundle.js.map").unwrap();
        let qjs = Url::parse("http://x.com/bundle.js?v=3").unwrap();
        let page = Url::parse("http://x.com/about").unwrap();
        assert_eq!(classify(&js), UrlKind::Js);
        assert_eq!(classify(&map), UrlKind::Js);
        assert_eq!(classify(&qjs), UrlKind::Js);
        assert_eq!(classify(&page), UrlKind::Page);
    }
}
