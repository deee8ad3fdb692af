//! Report rendering (A4): a plain-text hierarchy/domain/secrets report
//! (grounded in `output_formatter.py`'s tidy-vs-detailed split and the
//! teacher's own buffered-writer `output.rs`), plus an enrichment CSV.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::crawler::Frontier;
use crate::entity::{Range, UrlNode};

/// Default status range shown when the caller doesn't pass `-s`: success and
/// redirect responses only. Matches the "404 always filtered out of the
/// default output" testable property.
const DEFAULT_STATUS_RANGE: Range = Range { start: 200, end: 400 };

/// Renders a completed [`Frontier`] into the plain-text report format.
pub struct Formatter<'a> {
    frontier: &'a Frontier,
    detail: bool,
    status_filter: &'a [Range],
    hide_regex_output: bool,
}

impl<'a> Formatter<'a> {
    pub fn new(frontier: &'a Frontier, detail: bool, status_filter: &'a [Range]) -> Self {
        Formatter {
            frontier,
            detail,
            status_filter,
            hide_regex_output: false,
        }
    }

    pub fn hide_regex_output(mut self, hide: bool) -> Self {
        self.hide_regex_output = hide;
        self
    }

    /// With no explicit `-s` filter, the report still only shows successes
    /// and redirects by default — a 404 (or any other non-2xx/3xx status)
    /// never appears unless the caller opts in with `-s`.
    fn status_allowed(&self, node: &UrlNode) -> bool {
        let Ok(status) = node.response_status.parse::<i64>() else {
            return false;
        };
        if self.status_filter.is_empty() {
            return DEFAULT_STATUS_RANGE.contains(status);
        }
        self.status_filter.iter().any(|r| r.contains(status))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.render_domains());
        out.push('\n');
        out.push_str(&self.render_hierarchy("URL hierarchy", &self.frontier.url_dict));
        out.push('\n');
        out.push_str(&self.render_hierarchy("JS hierarchy", &self.frontier.js_dict));
        if !self.hide_regex_output {
            out.push('\n');
            out.push_str(&self.render_secrets());
        }
        out
    }

    fn render_domains(&self) -> String {
        let mut domains: HashSet<String> = HashSet::new();
        for node in self.frontier.found.iter().chain(self.frontier.visited.iter()) {
            if let Some(host) = node.url.host_str() {
                domains.insert(host.to_lowercase());
            }
        }
        let mut domains: Vec<String> = domains.into_iter().collect();
        domains.sort();

        let mut out = String::from("== Domains ==\n");
        for domain in domains {
            out.push_str(&domain);
            out.push('\n');
        }
        out
    }

    fn render_hierarchy(
        &self,
        title: &str,
        dict: &HashMap<Arc<UrlNode>, HashSet<Arc<UrlNode>>>,
    ) -> String {
        let mut out = format!("== {title} ==\n");
        let mut bases: Vec<&Arc<UrlNode>> = dict.keys().collect();
        bases.sort_by(|a, b| a.url.as_str().cmp(b.url.as_str()));

        for base in bases {
            if !self.status_allowed(base) {
                continue;
            }
            let mut children: Vec<&Arc<UrlNode>> = dict[base].iter().collect();
            children.sort_by(|a, b| a.url.as_str().cmp(b.url.as_str()));
            let children: Vec<&Arc<UrlNode>> = children
                .into_iter()
                .filter(|c| self.status_allowed(c))
                .collect();
            if children.is_empty() {
                continue;
            }

            if self.detail {
                out.push_str(&format!(
                    "{} [{}] \"{}\"\n",
                    base.url, base.response_status, base.title
                ));
                for child in children {
                    out.push_str(&format!(
                        "  -> {} [{}]\n",
                        child.url, child.response_status
                    ));
                }
            } else {
                out.push_str(&format!("{} ({} links)\n", base.url, children.len()));
            }
        }
        out
    }

    fn render_secrets(&self) -> String {
        let mut out = String::from("== Secrets ==\n");
        let mut bases: Vec<&Arc<UrlNode>> = self.frontier.url_secrets.keys().collect();
        bases.sort_by(|a, b| a.url.as_str().cmp(b.url.as_str()));

        for base in bases {
            if !self.status_allowed(base) {
                continue;
            }
            let secrets = &self.frontier.url_secrets[base];
            if secrets.is_empty() {
                continue;
            }
            out.push_str(&format!("{}\n", base.url));
            let mut secrets: Vec<_> = secrets.iter().collect();
            secrets.sort_by(|a, b| (a.rule_name.as_str(), a.data.as_str()).cmp(&(b.rule_name.as_str(), b.data.as_str())));
            for secret in secrets {
                out.push_str(&format!("  [{}] {}\n", secret.rule_name, secret.data));
            }
        }
        out
    }
}

/// Render an already-scanned local-file-mode result using the same
/// "tidy vs detailed" rule as the crawl report's secrets section.
pub fn render_local_scan(
    results: &HashMap<std::path::PathBuf, Vec<crate::entity::Secret>>,
) -> String {
    let mut out = String::from("== Local scan secrets ==\n");
    let mut paths: Vec<&std::path::PathBuf> = results.keys().collect();
    paths.sort();
    for path in paths {
        let secrets = &results[path];
        if secrets.is_empty() {
            continue;
        }
        out.push_str(&format!("{}\n", path.display()));
        for secret in secrets {
            out.push_str(&format!("  [{}] {}\n", secret.rule_name, secret.data));
        }
    }
    out
}

pub async fn write_report(path: &Path, contents: &str) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)
        .await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(contents.as_bytes()).await?;
    writer.flush().await
}

/// Write the enrichment CSV (URL, Title, Response Code, Content Length,
/// Content Type, Secrets) for every processed node.
pub async fn write_csv(path: &Path, frontier: &Frontier) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)
        .await?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(b"URL,Title,Response Code,Content Length,Content Type,Secrets\n")
        .await?;

    let mut nodes: Vec<&Arc<UrlNode>> = frontier.visited.iter().collect();
    nodes.sort_by(|a, b| a.url.as_str().cmp(b.url.as_str()));

    for node in nodes {
        let secrets = frontier
            .url_secrets
            .get(node)
            .map(|s| {
                s.iter()
                    .map(|secret| secret.rule_name.as_str())
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .unwrap_or_default();

        let row = format!(
            "{},{},{},{},{},{}\n",
            csv_escape(node.url.as_str()),
            csv_escape(&node.title),
            csv_escape(&node.response_status),
            node.content_length,
            csv_escape(&node.content_type),
            csv_escape(&secrets),
        );
        writer.write_all(row.as_bytes()).await?;
    }
    writer.flush().await
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn base_with_children() -> Frontier {
        base_with_child_status("200")
    }

    fn base_with_child_status(child_status: &str) -> Frontier {
        let mut frontier = Frontier::default();
        let mut base = UrlNode::seed("http://x.com/", Url::parse("http://x.com/").unwrap());
        base.response_status = "200".to_string();
        let base = Arc::new(base);
        let mut child = UrlNode::child(
            "http://x.com/a",
            Url::parse("http://x.com/a").unwrap(),
            1,
            Arc::clone(&base),
        )
        .unwrap();
        child.response_status = child_status.to_string();
        let child = Arc::new(child);

        frontier
            .url_dict
            .insert(Arc::clone(&base), HashSet::from([Arc::clone(&child)]));
        frontier.visited.insert(base);
        frontier.visited.insert(child);
        frontier
    }

    #[test]
    fn tidy_render_summarizes_link_counts() {
        let frontier = base_with_children();
        let formatter = Formatter::new(&frontier, false, &[]);
        let rendered = formatter.render_hierarchy("URL hierarchy", &frontier.url_dict);
        assert!(rendered.contains("(1 links)"));
    }

    #[test]
    fn detail_render_lists_each_child() {
        let frontier = base_with_children();
        let formatter = Formatter::new(&frontier, true, &[]);
        let rendered = formatter.render_hierarchy("URL hierarchy", &frontier.url_dict);
        assert!(rendered.contains("-> http://x.com/a"));
    }

    #[test]
    fn status_filter_excludes_non_matching_children() {
        let frontier = base_with_children();
        let filter = vec![Range::new(400, 500)];
        let formatter = Formatter::new(&frontier, true, &filter);
        let rendered = formatter.render_hierarchy("URL hierarchy", &frontier.url_dict);
        assert!(!rendered.contains("http://x.com/a"));
    }

    #[test]
    fn empty_filter_still_excludes_404_by_default() {
        let frontier = base_with_child_status("404");
        let formatter = Formatter::new(&frontier, true, &[]);
        let rendered = formatter.render_hierarchy("URL hierarchy", &frontier.url_dict);
        assert!(!rendered.contains("http://x.com/a"));
    }

    #[test]
    fn empty_filter_still_shows_2xx_and_3xx_by_default() {
        let frontier = base_with_child_status("301");
        let formatter = Formatter::new(&frontier, true, &[]);
        let rendered = formatter.render_hierarchy("URL hierarchy", &frontier.url_dict);
        assert!(rendered.contains("http://x.com/a"));
    }

    #[test]
    fn csv_escape_quotes_commas_and_quotes() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("a\"b"), "\"a\"\"b\"");
    }
}
