//! Post-pass validator (C8): after the crawl, re-check every node whose
//! response status isn't numeric (never fetched, or fetch failed) with a
//! bounded-concurrency re-fetch of *that* node's own URL.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::crawler::Frontier;
use crate::entity::UrlNode;
use crate::fetch::Fetcher;

/// Re-fetch every non-numeric-status node in `frontier.url_dict` and
/// `frontier.js_dict` (bases and children alike), writing the observed
/// status back. Exceptions are swallowed — this pass is best-effort.
pub async fn validate(frontier: &mut Frontier, fetcher: Arc<Fetcher>, concurrency: usize) {
    let mut candidates: HashSet<Arc<UrlNode>> = HashSet::new();
    for (base, children) in frontier.url_dict.iter().chain(frontier.js_dict.iter()) {
        if !is_numeric_status(&base.response_status) {
            candidates.insert(Arc::clone(base));
        }
        for child in children {
            if !is_numeric_status(&child.response_status) {
                candidates.insert(Arc::clone(child));
            }
        }
    }

    if candidates.is_empty() {
        return;
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut joins: JoinSet<(Arc<UrlNode>, Option<String>)> = JoinSet::new();

    for node in candidates {
        let fetcher = Arc::clone(&fetcher);
        let semaphore = Arc::clone(&semaphore);
        joins.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            // Each candidate is re-fetched by its own URL, never the base
            // it was discovered from — a prior, buggy variant re-fetched
            // the shared base for every child in the JS dictionary.
            let status = fetcher
                .fetch(node.url.as_str())
                .await
                .map(|r| r.status.to_string());
            (node, status)
        });
    }

    let mut statuses: HashMap<Arc<UrlNode>, String> = HashMap::new();
    while let Some(result) = joins.join_next().await {
        if let Ok((node, Some(status))) = result {
            statuses.insert(node, status);
        }
    }

    rewrite_statuses(&mut frontier.url_dict, &statuses);
    rewrite_statuses(&mut frontier.js_dict, &statuses);
}

fn is_numeric_status(status: &str) -> bool {
    !status.is_empty() && status.chars().all(|c| c.is_ascii_digit())
}

fn rewrite_statuses(
    dict: &mut HashMap<Arc<UrlNode>, HashSet<Arc<UrlNode>>>,
    statuses: &HashMap<Arc<UrlNode>, String>,
) {
    let mut replacements: Vec<(Arc<UrlNode>, Arc<UrlNode>, Arc<UrlNode>)> = Vec::new();
    for (base, children) in dict.iter() {
        for child in children {
            if let Some(status) = statuses.get(child) {
                let mut updated = (**child).clone();
                updated.response_status = status.clone();
                replacements.push((Arc::clone(base), Arc::clone(child), Arc::new(updated)));
            }
        }
    }
    for (base, old_child, new_child) in replacements {
        if let Some(children) = dict.get_mut(&base) {
            children.remove(&old_child);
            children.insert(new_child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn node(raw: &str, status: &str) -> Arc<UrlNode> {
        let mut n = UrlNode::seed(raw, Url::parse(raw).unwrap());
        n.response_status = status.to_string();
        Arc::new(n)
    }

    #[test]
    fn numeric_status_detection() {
        assert!(is_numeric_status("200"));
        assert!(is_numeric_status("404"));
        assert!(!is_numeric_status("Unknown"));
        assert!(!is_numeric_status(""));
    }

    #[test]
    fn rewrite_replaces_only_matched_children() {
        let base = node("http://x.com/", "200");
        let stale = node("http://x.com/a", "Unknown");
        let fresh = node("http://x.com/b", "200");

        let mut dict = HashMap::new();
        dict.insert(
            Arc::clone(&base),
            HashSet::from([Arc::clone(&stale), Arc::clone(&fresh)]),
        );

        let mut statuses = HashMap::new();
        statuses.insert(Arc::clone(&stale), "404".to_string());

        rewrite_statuses(&mut dict, &statuses);

        let children = dict.get(&base).unwrap();
        let updated_stale = children.iter().find(|n| n.url == stale.url).unwrap();
        assert_eq!(updated_stale.response_status, "404");
    }
}
