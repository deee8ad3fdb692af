//! End-to-end crawl engine test against a minimal in-process HTTP server.
//!
//! The server is a hand-rolled `tokio::net::TcpListener` loop returning
//! fixed responses for a tiny static site — standing in for the Python
//! suite's local test-server fixture without pulling in an HTTP server
//! crate the corpus never depends on.

use std::collections::HashMap;
use std::sync::Arc;

use secretscraper::config::Options;
use secretscraper::crawler;
use secretscraper::extractor::Extractor;
use secretscraper::fetch::{FetchOptions, Fetcher};
use secretscraper::filter::{self, ChainedFilter};
use secretscraper::matcher::{Backend, Handler, SecretMatcher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn routes() -> HashMap<&'static str, (&'static str, &'static str)> {
    HashMap::from([
        (
            "/",
            (
                "text/html",
                r#"<html><head><title>Home</title></head><body>
                    <a href="/about">About</a>
                    <a href="/contact">Contact</a>
                    <script src="/app.js"></script>
                </body></html>"#,
            ),
        ),
        (
            "/about",
            (
                "text/html",
                r#"<html><head><title>About</title></head><body>
                    contact us at leaked@example.org
                    <a href="/">Home</a>
                </body></html>"#,
            ),
        ),
        (
            "/contact",
            (
                "text/html",
                r#"<html><head><title>Contact</title></head><body>No links here.</body></html>"#,
            ),
        ),
        (
            "/app.js",
            ("application/javascript", r#"const token = "irrelevant";"#),
        ),
    ])
}

async fn start_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = routes();

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let Ok(n) = socket.read(&mut buf).await else {
                    return;
                };
                let request = String::from_utf8_lossy(&buf[..n]);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let (status_line, content_type, body) = match routes.get(path.as_str()) {
                    Some((ct, body)) => ("HTTP/1.1 200 OK", *ct, *body),
                    None => ("HTTP/1.1 404 Not Found", "text/plain", "not found"),
                };

                let response = format!(
                    "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), handle)
}

fn url_finder() -> Box<dyn Handler> {
    let rules: Vec<(&str, &str)> = vec![(
        "urlFinder_0",
        r#"["']\s{0,6}(https?:[-a-zA-Z0-9()@:%_+.~#?&//={}]{2,100}?)\s{0,6}["']"#,
    )];
    let matcher = SecretMatcher::new(rules, Backend::Fallback).unwrap();
    matcher.init().unwrap();
    Box::new(matcher)
}

#[tokio::test]
async fn crawls_static_site_and_finds_secret() {
    let (base_url, server) = start_server().await;

    let mut options = Options::default();
    options.max_depth = 2;
    options.max_page_num = 0;
    options.workers_num = 4;
    let options = Arc::new(options);

    let filter: Arc<ChainedFilter> = Arc::new(filter::build_chain(Vec::new(), Vec::new()));

    let secret_rules = vec![(
        "Email",
        r"\b([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})\b",
    )];
    let secret_matcher: Arc<dyn Handler> =
        Arc::new(SecretMatcher::new_auto(secret_rules).unwrap());

    let extractor = Arc::new(Extractor::new(url_finder()));

    let fetch_options = FetchOptions {
        headers: HashMap::new(),
        proxy: None,
        timeout: std::time::Duration::from_secs(5),
        follow_redirects: false,
    };
    let fetcher = Arc::new(Fetcher::new(&fetch_options).unwrap());

    let (_cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    let frontier = crawler::run(
        &[base_url.clone()],
        Arc::clone(&options),
        Arc::clone(&filter),
        Arc::clone(&secret_matcher),
        Arc::clone(&extractor),
        Arc::clone(&fetcher),
        cancel_rx,
    )
    .await;

    server.abort();

    assert!(frontier.total_page >= 3, "expected home/about/contact to be fetched");
    assert!(frontier
        .url_secrets
        .values()
        .any(|secrets| secrets.iter().any(|s| s.data.contains("leaked@example.org"))));
    assert!(frontier
        .found
        .iter()
        .any(|n| n.url.path() == "/app.js"));
    for node in &frontier.visited {
        assert!((node.depth as i32) <= options.max_depth);
    }
}

#[tokio::test]
async fn max_page_num_caps_total_page_despite_link_fan_out() {
    // The home route links to 3 children (about, contact, app.js) in one
    // response, so a scheduler that submits every ready queue entry before
    // any fetch completes would burst well past a small `max_page_num`.
    let (base_url, server) = start_server().await;

    let mut options = Options::default();
    options.max_depth = 2;
    options.max_page_num = 2;
    options.workers_num = 4;
    let options = Arc::new(options);

    let filter: Arc<ChainedFilter> = Arc::new(filter::build_chain(Vec::new(), Vec::new()));
    let secret_matcher: Arc<dyn Handler> = Arc::new(SecretMatcher::new_auto(Vec::<(&str, &str)>::new()).unwrap());
    let extractor = Arc::new(Extractor::new(url_finder()));

    let fetch_options = FetchOptions {
        headers: HashMap::new(),
        proxy: None,
        timeout: std::time::Duration::from_secs(5),
        follow_redirects: false,
    };
    let fetcher = Arc::new(Fetcher::new(&fetch_options).unwrap());

    let (_cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    let frontier = crawler::run(
        &[base_url.clone()],
        Arc::clone(&options),
        Arc::clone(&filter),
        Arc::clone(&secret_matcher),
        Arc::clone(&extractor),
        Arc::clone(&fetcher),
        cancel_rx,
    )
    .await;

    server.abort();

    assert!(
        frontier.total_page <= options.max_page_num,
        "total_page {} exceeded max_page_num {}",
        frontier.total_page,
        options.max_page_num
    );
}
