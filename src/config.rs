//! Run configuration (A2): a frozen [`Options`] record assembled in three
//! layers — built-in defaults, an optional YAML file, then
//! `SECRETSCRAPER_*` environment overrides — with CLI flags merged in last
//! by the caller (highest precedence), mirroring the teacher's own
//! single-assembly-point settings pattern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::entity::{Range, Rule};
use crate::error::ConfigError;

/// Default named secret rules, equivalent to the generated `settings.yml`.
pub fn default_rules() -> Vec<Rule> {
    let raw: &[(&str, &str)] = &[
        ("Swagger", r#"(?i)"swagger"\s*:\s*"[\d.]+""#),
        (
            "ID Card",
            r"[^0-9]((1[1-5]|2[1-3]|3[1-7]|4[1-6]|5[0-4]|6[1-5]|71|81|82|91)\d{4}(19|20)\d{2}(0[1-9]|1[012])(0[1-9]|[12]\d|3[01])\d{3}[\dXx])[^0-9]",
        ),
        (
            "Phone",
            r"[^0-9]((?:(?:\+|00)86)?1(?:3[\d]|4[5-79]|5[0-35-9]|6[5-7]|7[0-8]|8[\d]|9[189])\d{8})[^0-9]",
        ),
        ("JS Map", r"\b([\w/]+?\.js\.map)"),
        (
            "URL as a Value",
            r#"[=](https?://[a-zA-Z0-9\-._~:/?#\[\]@!$&'()*+,;=%]+)"#,
        ),
        (
            "Email",
            r"\b(([a-zA-Z0-9][_|.])*[a-zA-Z0-9]+@([a-zA-Z0-9][-|_|.])*[a-zA-Z0-9]+\.([a-zA-Z]{2,}))\b",
        ),
        (
            "Internal IP",
            r"[^0-9]((127\.0\.0\.1)|(10\.\d{1,3}\.\d{1,3}\.\d{1,3})|(172\.((1[6-9])|(2\d)|(3[01]))\.\d{1,3}\.\d{1,3})|(192\.168\.\d{1,3}\.\d{1,3}))",
        ),
        (
            "Cloud Key",
            r#"(?i)(accesskeyid|accesskeysecret|aws_access_key_id|aws_secret_access_key)["']?\s*[:=]\s*["']?([A-Za-z0-9/+=]{16,60})"#,
        ),
        ("Shiro", r"rememberMe=[a-zA-Z0-9%+/]+={0,2}"),
        (
            "Suspicious API Key",
            r#"(?i)(api[_-]?key|secret|token)["']?\s*[:=]\s*["']([a-zA-Z0-9_\-]{16,64})["']"#,
        ),
    ];
    raw.iter()
        .map(|(name, regex)| Rule {
            name: name.to_string(),
            regex: regex.to_string(),
            loaded: true,
        })
        .collect()
}

pub fn default_url_find() -> Vec<String> {
    vec![
        r#"["']\s{0,6}(https?:[-a-zA-Z0-9()@:%_+.~#?&//={}]{2,100}?)\s{0,6}["']"#.to_string(),
        r#"["']\s{0,6}((?:/|\.\./|\./)[^"'><,;|*()(%%$^/\\\[\]][^"'><,;|()]{2,}?)\s{0,6}["']"#
            .to_string(),
    ]
}

pub fn default_js_find() -> Vec<String> {
    vec![
        r#"["']\s{0,6}([a-zA-Z0-9_/\\]{0,20}[a-zA-Z0-9_]\.js(?:\?[^"'<>\s]*)?)\s{0,6}["']"#
            .to_string(),
    ]
}

pub fn default_headers() -> HashMap<String, String> {
    HashMap::from([(
        "User-Agent".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .to_string(),
    )])
}

/// Mirrors the YAML config file's recognized top-level keys (§6).
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct FileConfig {
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    pub loglevel: Option<String>,
    pub logpath: Option<String>,
    pub proxy: Option<String>,
    pub max_depth: Option<i32>,
    pub max_page_num: Option<i64>,
    pub timeout: Option<u64>,
    pub follow_redirects: Option<bool>,
    pub workers_num: Option<usize>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, rename = "urlFind")]
    pub url_find: Vec<String>,
    #[serde(default, rename = "jsFind")]
    pub js_find: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default, rename = "dangerousPath")]
    pub dangerous_path: Vec<String>,
}

/// The fully assembled, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Options {
    pub debug: bool,
    pub log_path: Option<PathBuf>,
    pub proxy: Option<String>,
    pub max_depth: i32,
    pub max_page_num: i64,
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub workers_num: usize,
    pub headers: HashMap<String, String>,
    pub url_find: Vec<String>,
    pub js_find: Vec<String>,
    pub rules: Vec<Rule>,
    pub dangerous_path: Vec<String>,
    pub allow_domains: Vec<String>,
    pub deny_domains: Vec<String>,
    pub status_filter: Vec<Range>,
    pub hide_regex_output: bool,
    pub detail: bool,
    pub out_file: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            debug: false,
            log_path: None,
            proxy: None,
            max_depth: 4,
            max_page_num: 0,
            timeout: Duration::from_secs(5),
            follow_redirects: false,
            workers_num: 20,
            headers: default_headers(),
            url_find: default_url_find(),
            js_find: default_js_find(),
            rules: default_rules(),
            dangerous_path: Vec::new(),
            allow_domains: Vec::new(),
            deny_domains: Vec::new(),
            status_filter: Vec::new(),
            hide_regex_output: false,
            detail: false,
            out_file: PathBuf::from("crawler.log"),
        }
    }
}

impl Options {
    /// Layer an on-disk YAML config over the current defaults.
    pub fn merge_file(&mut self, file: FileConfig) {
        if let Some(v) = file.debug {
            self.debug = v;
        }
        if let Some(v) = file.logpath {
            self.log_path = Some(PathBuf::from(v));
        }
        if let Some(v) = file.proxy {
            self.proxy = Some(v);
        }
        if let Some(v) = file.max_depth {
            self.max_depth = v;
        }
        if let Some(v) = file.max_page_num {
            self.max_page_num = v;
        }
        if let Some(v) = file.timeout {
            self.timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.follow_redirects {
            self.follow_redirects = v;
        }
        if let Some(v) = file.workers_num {
            self.workers_num = v;
        }
        if !file.headers.is_empty() {
            self.headers.extend(file.headers);
        }
        if !file.url_find.is_empty() {
            self.url_find = file.url_find;
        }
        if !file.js_find.is_empty() {
            self.js_find = file.js_find;
        }
        if !file.rules.is_empty() {
            self.rules = file.rules;
        }
        if !file.dangerous_path.is_empty() {
            self.dangerous_path = file.dangerous_path;
        }
    }

    /// Apply `SECRETSCRAPER_*` environment overrides. Only a handful of
    /// scalar keys are recognized, matching the config surface's own scalar
    /// fields (`SECRETSCRAPER_PROXY`, `SECRETSCRAPER_MAX_DEPTH`, ...).
    pub fn merge_env(&mut self) {
        if let Ok(v) = std::env::var("SECRETSCRAPER_PROXY") {
            self.proxy = Some(v);
        }
        if let Ok(v) = std::env::var("SECRETSCRAPER_MAX_DEPTH") {
            if let Ok(v) = v.parse() {
                self.max_depth = v;
            }
        }
        if let Ok(v) = std::env::var("SECRETSCRAPER_MAX_PAGE_NUM") {
            if let Ok(v) = v.parse() {
                self.max_page_num = v;
            }
        }
        if let Ok(v) = std::env::var("SECRETSCRAPER_TIMEOUT") {
            if let Ok(v) = v.parse() {
                self.timeout = Duration::from_secs(v);
            }
        }
        if let Ok(v) = std::env::var("SECRETSCRAPER_DEBUG") {
            self.debug = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("SECRETSCRAPER_WORKERS_NUM") {
            if let Ok(v) = v.parse() {
                self.workers_num = v;
            }
        }
    }
}

/// Load a YAML config file from `path`, if given, generating a default
/// `settings.yml` next to it when absent.
pub fn load_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    if !path.exists() {
        let default_yaml =
            serde_yaml::to_string(&default_settings_template()).unwrap_or_default();
        let _ = std::fs::write(path, default_yaml);
        return Ok(FileConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailure {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::LoadFailure {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn default_settings_template() -> FileConfig {
    FileConfig {
        verbose: Some(false),
        debug: Some(false),
        loglevel: Some("info".to_string()),
        logpath: None,
        proxy: None,
        max_depth: Some(4),
        max_page_num: Some(0),
        timeout: Some(5),
        follow_redirects: Some(false),
        workers_num: Some(20),
        headers: default_headers(),
        url_find: default_url_find(),
        js_find: default_js_find(),
        rules: default_rules(),
        dangerous_path: Vec::new(),
    }
}

/// Parse a comma-separated status filter like `200,300-400` into half-open
/// ranges (`A-B` means `[A, B+1)`; a bare `N` means `[N, N+1)`).
pub fn parse_status_filter(raw: &str) -> Result<Vec<Range>, ConfigError> {
    let mut ranges = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let range = if let Some((start, end)) = part.split_once('-') {
            let start: i64 = start
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidStatusRange(part.to_string()))?;
            let end: i64 = end
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidStatusRange(part.to_string()))?;
            if end < start {
                return Err(ConfigError::InvalidStatusRange(part.to_string()));
            }
            Range::new(start, end + 1)
        } else {
            let value: i64 = part
                .parse()
                .map_err(|_| ConfigError::InvalidStatusRange(part.to_string()))?;
            Range::new(value, value + 1)
        };
        ranges.push(range);
    }
    Ok(ranges)
}

/// Parse a comma-separated glob list (`-d`/`-D`), trimming blanks.
pub fn parse_glob_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_parses_mixed_ranges() {
        let ranges = parse_status_filter("200,300-400").unwrap();
        assert_eq!(ranges, vec![Range::new(200, 201), Range::new(300, 401)]);
        assert!(ranges[1].contains(400));
        assert!(!ranges[1].contains(401));
    }

    #[test]
    fn status_filter_rejects_malformed_range() {
        let err = parse_status_filter("400-300").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStatusRange(_)));
        let err = parse_status_filter("abc").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStatusRange(_)));
    }

    #[test]
    fn glob_list_trims_and_drops_blanks() {
        assert_eq!(
            parse_glob_list(" *.evil.com , *.bad.net ,"),
            vec!["*.evil.com".to_string(), "*.bad.net".to_string()]
        );
    }

    #[test]
    fn env_overrides_apply_over_defaults() {
        // SAFETY: test runs single-threaded within this process's env;
        // the var is scoped to this test via a unique key.
        unsafe {
            std::env::set_var("SECRETSCRAPER_MAX_DEPTH", "7");
        }
        let mut options = Options::default();
        options.merge_env();
        assert_eq!(options.max_depth, 7);
        unsafe {
            std::env::remove_var("SECRETSCRAPER_MAX_DEPTH");
        }
    }

    #[test]
    fn file_config_merges_over_defaults_without_clobbering_unset_fields() {
        let mut options = Options::default();
        let file = FileConfig {
            max_page_num: Some(500),
            ..Default::default()
        };
        options.merge_file(file);
        assert_eq!(options.max_page_num, 500);
        assert_eq!(options.max_depth, 4);
    }
}
