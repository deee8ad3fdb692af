//! Crawl engine (C7): owns the frontier and drives the BFS main loop,
//! submitting per-node work to the worker pool (C6) and integrating results
//! back into the frontier from a single cooperative context.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use scraper::{Html, Selector};
use url::Url;

use crate::config::Options;
use crate::entity::{Secret, UrlNode};
use crate::error;
use crate::extractor::Extractor;
use crate::fetch::Fetcher;
use crate::filter::{ChainedFilter, UrlFilter};
use crate::matcher::Handler;
use crate::pool::{Collector, PoolError, DEFAULT_SHUTDOWN_TIMEOUT};
use crate::sanitize::{classify, UrlKind};

/// Everything the run discovers: the frontier (visited set, link-hierarchy
/// dictionaries, per-node secrets) plus the processed-page counter.
#[derive(Default)]
pub struct Frontier {
    pub visited: HashSet<Arc<UrlNode>>,
    pub found: HashSet<Arc<UrlNode>>,
    pub url_dict: HashMap<Arc<UrlNode>, HashSet<Arc<UrlNode>>>,
    pub js_dict: HashMap<Arc<UrlNode>, HashSet<Arc<UrlNode>>>,
    pub url_secrets: HashMap<Arc<UrlNode>, HashSet<Secret>>,
    pub total_page: i64,
}

enum ProcessOutcome {
    /// Dangerous-path guard tripped before the page counter was incremented.
    Skipped,
    Counted {
        node: Arc<UrlNode>,
        secrets: HashSet<Secret>,
        children: HashSet<Arc<UrlNode>>,
    },
}

/// Run the crawl to completion and return the accumulated frontier.
///
/// `cancel` carries a single `true` when the caller wants the crawl stopped
/// early (an interactive Ctrl-C, normally); the main loop races it against
/// each wait for the next finished task and, once it fires, stops submitting
/// new work and shuts the pool down hard instead of draining gracefully.
pub async fn run(
    seeds: &[String],
    options: Arc<Options>,
    filter: Arc<ChainedFilter>,
    matcher: Arc<dyn Handler>,
    extractor: Arc<Extractor>,
    fetcher: Arc<Fetcher>,
    mut cancel: tokio::sync::watch::Receiver<bool>,
) -> Frontier {
    let mut frontier = Frontier::default();
    let mut queue: VecDeque<Arc<UrlNode>> = VecDeque::new();

    for seed in seeds {
        let Ok(url) = Url::parse(seed) else {
            error::warn(&format!("Failed to parse seed URL: {seed}")).await;
            continue;
        };
        let node = Arc::new(UrlNode::seed(seed.clone(), url));
        if filter.accept(&node.url) {
            frontier.visited.insert(Arc::clone(&node));
            queue.push_back(node);
        }
    }

    let collector: Collector<ProcessOutcome> = Collector::new(options.workers_num.max(1), 0);
    let mut pending = 0usize;
    let mut cancelled = false;

    loop {
        if *cancel.borrow() {
            cancelled = true;
            break;
        }
        if options.max_page_num > 0 && frontier.total_page >= options.max_page_num {
            break;
        }
        if queue.is_empty() && pending == 0 {
            break;
        }

        // `total_page` only advances once a submitted task's outcome is
        // applied, so the top-of-loop check above can't see a burst of
        // still-in-flight submissions. Count in-flight tasks toward the cap
        // here, at the only place new work is actually claimed, so a single
        // page's link fan-out can't submit past `max_page_num` before the
        // next completion is observed.
        let claimed_at_cap = options.max_page_num > 0
            && frontier.total_page + pending as i64 >= options.max_page_num;

        if !claimed_at_cap {
            if let Some(node) = queue.pop_front() {
                if options.max_depth <= 0 || (node.depth as i32) <= options.max_depth {
                    let fetcher = Arc::clone(&fetcher);
                    let matcher = Arc::clone(&matcher);
                    let extractor = Arc::clone(&extractor);
                    let options = Arc::clone(&options);
                    pending += 1;
                    collector
                        .submit(
                            async move { process_one(node, options, fetcher, matcher, extractor).await },
                        )
                        .await;
                }
                continue;
            }
        }

        tokio::select! {
            biased;
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    cancelled = true;
                    break;
                }
            }
            outcome = collector.next() => {
                match outcome {
                    Some(Ok(outcome)) => {
                        pending -= 1;
                        apply_outcome(&mut frontier, &mut queue, &filter, &options, outcome);
                    }
                    Some(Err(err)) => {
                        pending -= 1;
                        error::warn(&format!("worker task failed: {err}")).await;
                    }
                    None => break,
                }
            }
        }
    }

    if cancelled {
        error::warn("interrupted, cancelling queued and in-flight work").await;
        collector.shutdown(DEFAULT_SHUTDOWN_TIMEOUT, true, true).await;
    } else {
        collector.shutdown(DEFAULT_SHUTDOWN_TIMEOUT, false, false).await;
    }
    frontier
}

async fn process_one(
    node: Arc<UrlNode>,
    options: Arc<Options>,
    fetcher: Arc<Fetcher>,
    matcher: Arc<dyn Handler>,
    extractor: Arc<Extractor>,
) -> Result<ProcessOutcome, PoolError> {
    if is_dangerous_path(&node.url, &options.dangerous_path) {
        return Ok(ProcessOutcome::Skipped);
    }

    let Some(response) = fetcher.fetch(node.url.as_str()).await else {
        return Ok(ProcessOutcome::Counted {
            node,
            secrets: HashSet::new(),
            children: HashSet::new(),
        });
    };

    let mut updated = (*node).clone();
    updated.response_status = response.status.to_string();
    updated.title = extract_title(&response.body);
    updated.content_type = response
        .headers
        .get("content-type")
        .cloned()
        .unwrap_or_default();
    updated.content_length = response
        .headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(-1);
    let updated = Arc::new(updated);

    let secrets: HashSet<Secret> = match matcher.handle(&response.body) {
        Ok(found) => found.into_iter().collect(),
        Err(err) => {
            // A single node's secret scan failing never stops the crawl.
            error::warn(&format!("secret matcher failed for {}: {err}", updated.url)).await;
            HashSet::new()
        }
    };

    let children = if is_extendable(&updated.content_type) {
        extractor.extract(&updated, &response.body)
    } else {
        HashSet::new()
    };

    Ok(ProcessOutcome::Counted {
        node: updated,
        secrets,
        children,
    })
}

fn apply_outcome(
    frontier: &mut Frontier,
    queue: &mut VecDeque<Arc<UrlNode>>,
    filter: &ChainedFilter,
    options: &Options,
    outcome: ProcessOutcome,
) {
    let ProcessOutcome::Counted {
        node,
        secrets,
        children,
    } = outcome
    else {
        return;
    };

    frontier.total_page += 1;
    if !secrets.is_empty() {
        frontier.url_secrets.insert(Arc::clone(&node), secrets);
    }

    let expanding = options.max_depth <= 0 || (node.depth as i32 + 1) <= options.max_depth;

    for child in children {
        if frontier.visited.contains(&child) {
            continue;
        }
        frontier.found.insert(Arc::clone(&child));

        if expanding && filter.accept(&child.url) {
            frontier.visited.insert(Arc::clone(&child));
            queue.push_back(Arc::clone(&child));
        }

        match classify(&child.url) {
            UrlKind::Js => {
                frontier
                    .js_dict
                    .entry(Arc::clone(&node))
                    .or_default()
                    .insert(child);
            }
            UrlKind::Page => {
                frontier
                    .url_dict
                    .entry(Arc::clone(&node))
                    .or_default()
                    .insert(child);
            }
        }
    }
}

/// Case-insensitive substring match against a set of configured path
/// fragments, independent of a leading slash.
fn is_dangerous_path(url: &Url, dangerous: &[String]) -> bool {
    if dangerous.is_empty() {
        return false;
    }
    let path = url.path().to_lowercase();
    dangerous.iter().any(|p| {
        let needle = p.trim_start_matches('/').to_lowercase();
        !needle.is_empty() && path.contains(&needle)
    })
}

/// A response is extendable (its body is worth extracting links from)
/// unless it is binary: missing content-type is treated as extendable,
/// `text/*` always is, `application/*` is unless it's an octet-stream or PDF.
fn is_extendable(content_type: &str) -> bool {
    if content_type.is_empty() {
        return true;
    }
    let ct = content_type.to_lowercase();
    let ct = ct.split(';').next().unwrap_or("").trim().to_string();
    if ct.starts_with("text/") {
        return true;
    }
    if ct.starts_with("application/") {
        return !(ct.ends_with("octet-stream") || ct.ends_with("pdf"));
    }
    false
}

fn extract_title(body: &str) -> String {
    let doc = Html::parse_document(body);
    let selector = Selector::parse("title").expect("static selector");
    doc.select(&selector)
        .map(|el| el.text().collect::<Vec<_>>().join(""))
        .map(|t| t.replace('\n', " ").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("|")
}
