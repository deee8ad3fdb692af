//! Command-line surface (A1): every flag in §6, using the same
//! `clap::Parser` + `ValueHint` conventions the teacher's `cli.rs` uses.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueHint};

static LONG_ABT: &str = r#"
secretscraper - A concurrent web crawler and secret scanner

• secretscraper crawls from one or more seed URLs (or scans local files), extracting links and
  scanning every response body against a configurable set of secret-matching rules.
• Built on tokio with a bounded worker pool so many requests are in flight at once.
"#;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "A concurrent web crawler and secret scanner",
    long_about = LONG_ABT
)]
#[command(group(ArgGroup::new("seed").args(["url", "url_file", "local"]).required(true)))]
pub struct Args {
    /// Seed URL to start crawling from.
    #[arg(short = 'u', long = "url", value_hint = ValueHint::Url)]
    pub url: Option<String>,

    /// File containing one seed URL per line.
    #[arg(short = 'f', long = "url-file", value_hint = ValueHint::FilePath)]
    pub url_file: Option<PathBuf>,

    /// Local file or directory to scan instead of crawling.
    #[arg(short = 'l', long = "local", value_hint = ValueHint::AnyPath)]
    pub local: Option<PathBuf>,

    /// Comma-separated glob allow-list for crawled domains.
    #[arg(short = 'd', long = "allow-domains")]
    pub allow_domains: Option<String>,

    /// Comma-separated glob deny-list for crawled domains.
    #[arg(short = 'D', long = "deny-domains")]
    pub deny_domains: Option<String>,

    /// Convenience mode: 1 sets max-depth=1, 2 sets max-depth=2.
    #[arg(short = 'm', long = "mode", value_parser = clap::value_parser!(u8).range(1..=2))]
    pub mode: Option<u8>,

    /// Maximum number of pages to fetch (0 = unlimited).
    #[arg(long = "max-page")]
    pub max_page: Option<i64>,

    /// Maximum crawl depth (0 = unlimited).
    #[arg(long = "max-depth")]
    pub max_depth: Option<i32>,

    /// HTTP/HTTPS proxy URL.
    #[arg(short = 'x', long = "proxy")]
    pub proxy: Option<String>,

    /// User-Agent header value.
    #[arg(short = 'a', long = "user-agent")]
    pub user_agent: Option<String>,

    /// Cookie header value.
    #[arg(short = 'c', long = "cookie")]
    pub cookie: Option<String>,

    /// Follow HTTP redirects.
    #[arg(short = 'F', long = "follow-redirects")]
    pub follow_redirects: bool,

    /// Comma-separated status filter for output, e.g. `200,300-400`.
    #[arg(short = 's', long = "status")]
    pub status: Option<String>,

    /// Output report path.
    #[arg(short = 'o', long = "output", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Hide the regex-matched-secret output.
    #[arg(short = 'H', long = "hide-regex")]
    pub hide_regex_output: bool,

    /// Render the full detailed hierarchy instead of the tidy summary.
    #[arg(long = "detail")]
    pub detail: bool,

    /// YAML configuration file.
    #[arg(short = 'i', long = "config", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(long = "debug")]
    pub debug: bool,

    /// Write a CSV report (URL, Title, Response Code, Content Length, Content Type, Secrets).
    #[arg(long = "csv", value_hint = ValueHint::FilePath)]
    pub csv: Option<PathBuf>,
}

impl Args {
    /// `-m` overwrites `--max-depth` when both are given; `-m` is read after
    /// `max_depth` so it always wins (documented in DESIGN.md).
    pub fn resolved_max_depth(&self) -> Option<i32> {
        match self.mode {
            Some(mode) => Some(mode as i32),
            None => self.max_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_overrides_explicit_max_depth() {
        let args = Args::parse_from(["secretscraper", "-u", "http://x", "-m", "1", "--max-depth", "9"]);
        assert_eq!(args.resolved_max_depth(), Some(1));
    }

    #[test]
    fn max_depth_used_when_mode_absent() {
        let args = Args::parse_from(["secretscraper", "-u", "http://x", "--max-depth", "9"]);
        assert_eq!(args.resolved_max_depth(), Some(9));
    }

    #[test]
    fn seed_group_requires_one_source() {
        let result = Args::try_parse_from(["secretscraper"]);
        assert!(result.is_err());
    }

    #[test]
    fn url_seed_parses_cleanly() {
        let args = Args::parse_from(["secretscraper", "-u", "http://example.com"]);
        assert_eq!(args.url.as_deref(), Some("http://example.com"));
    }
}
