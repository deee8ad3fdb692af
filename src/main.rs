/*!
**A concurrent web crawler and secret scanner**

## Usage

- Crawl a site:
```sh
secretscraper -u https://example.com -o report.log
```

- Crawl from a list of seed URLs:
```sh
secretscraper -f urls.txt -o report.log
```

- Scan local files instead of crawling:
```sh
secretscraper -l ./dist -o scanner.log
```

- Limit depth and page count, follow redirects, use a proxy:
```sh
secretscraper -u https://example.com --max-depth 3 --max-page 200 -F -x http://127.0.0.1:7890
```

---

## How It Works

1. BFS crawl from one or more seed URLs, bounded by `--max-depth` / `--max-page`.
2. Every response body is scanned against a configurable rule set for leaked secrets.
3. Links are harvested from HTML and from a regex ruleset over the raw response text.
4. A post-pass re-validates any node whose response status wasn't recorded.
5. Results are rendered to a plain-text report, plus an optional CSV.

---

## Configuration

Settings layer in this order, later wins: built-in defaults, an optional `-i config.yml` file,
`SECRETSCRAPER_*` environment variables, then CLI flags.

## License

secretscraper is licensed under the **MIT** license.
*/

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use owo_colors::OwoColorize;

use secretscraper::cli::Args;
use secretscraper::config::{self, Options};
use secretscraper::crawler;
use secretscraper::entity::Rule;
use secretscraper::error::{self, ConfigError, Res, ScraperError};
use secretscraper::extractor::Extractor;
use secretscraper::fetch::{FetchOptions, Fetcher};
use secretscraper::filter::{self, ChainedFilter};
use secretscraper::matcher::{Handler, SecretMatcher};
use secretscraper::output::{self, Formatter};
use secretscraper::scanner;
use secretscraper::validator;

fn build_options(args: &Args) -> Res<Options> {
    let mut options = Options::default();
    let file_config = config::load_file_config(args.config.as_deref())?;
    options.merge_file(file_config);
    options.merge_env();

    if let Some(proxy) = &args.proxy {
        options.proxy = Some(proxy.clone());
    }
    if let Some(cookie) = &args.cookie {
        options.headers.insert("Cookie".to_string(), cookie.clone());
    }
    if let Some(ua) = &args.user_agent {
        options.headers.insert("User-Agent".to_string(), ua.clone());
    }
    if let Some(max_page) = args.max_page {
        options.max_page_num = max_page;
    }
    if let Some(max_depth) = args.resolved_max_depth() {
        options.max_depth = max_depth;
    }
    if args.follow_redirects {
        options.follow_redirects = true;
    }
    if let Some(status) = &args.status {
        options.status_filter = config::parse_status_filter(status)?;
    }
    if let Some(allow) = &args.allow_domains {
        options.allow_domains = config::parse_glob_list(allow);
    }
    if let Some(deny) = &args.deny_domains {
        options.deny_domains = config::parse_glob_list(deny);
    }
    if args.hide_regex_output {
        options.hide_regex_output = true;
    }
    if args.detail {
        options.detail = true;
    }
    if let Some(output) = &args.output {
        options.out_file = output.clone();
    }
    if args.debug {
        options.debug = true;
    }

    Ok(options)
}

fn build_seed_matcher(rules: &[Rule]) -> Result<SecretMatcher, ScraperError> {
    let active: Vec<(String, String)> = rules
        .iter()
        .filter(|r| r.loaded)
        .map(|r| (r.name.clone(), r.regex.clone()))
        .collect();
    let matcher = SecretMatcher::new_auto(active)?;
    Ok(matcher)
}

fn build_url_finder(options: &Options) -> Result<SecretMatcher, ScraperError> {
    let mut rules = Vec::new();
    for (i, pattern) in options.url_find.iter().enumerate() {
        rules.push((format!("urlFinder_{i}"), pattern.clone()));
    }
    for (i, pattern) in options.js_find.iter().enumerate() {
        rules.push((format!("jsFinder_{i}"), pattern.clone()));
    }
    let matcher = SecretMatcher::new_auto(rules)?;
    Ok(matcher)
}

fn read_seed_file(path: &PathBuf) -> Res<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

async fn run() -> Res<()> {
    let args = Args::parse();

    if let Some(local) = &args.local {
        return run_local_scan(&args, local).await;
    }

    let options = build_options(&args)?;
    error::configure(options.log_path.clone(), options.debug);

    let seeds: Vec<String> = if let Some(url) = &args.url {
        vec![url.clone()]
    } else if let Some(file) = &args.url_file {
        read_seed_file(file)?
    } else {
        return Err(ConfigError::NoSeedSource.into());
    };

    let filter: Arc<ChainedFilter> = Arc::new(filter::build_chain(
        options.allow_domains.clone(),
        options.deny_domains.clone(),
    ));

    let secret_matcher: Arc<dyn Handler> = Arc::new(build_seed_matcher(&options.rules)?);
    let url_finder = Box::new(build_url_finder(&options)?);
    let extractor = Arc::new(Extractor::new(url_finder));

    let fetch_options = FetchOptions {
        headers: options.headers.clone(),
        proxy: options.proxy.clone(),
        timeout: options.timeout,
        follow_redirects: options.follow_redirects,
    };
    let fetcher = Arc::new(Fetcher::new(&fetch_options)?);

    let options = Arc::new(options);

    error::info(&format!(
        "Starting crawl from {} seed(s), max_depth={}, max_page_num={}",
        seeds.len(),
        options.max_depth,
        options.max_page_num
    ))
    .await;

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let mut frontier = crawler::run(
        &seeds,
        Arc::clone(&options),
        Arc::clone(&filter),
        Arc::clone(&secret_matcher),
        Arc::clone(&extractor),
        Arc::clone(&fetcher),
        cancel_rx,
    )
    .await;

    validator::validate(&mut frontier, Arc::clone(&fetcher), options.workers_num).await;

    error::info(&format!(
        "Crawl finished: {} pages fetched, {} nodes found",
        frontier.total_page,
        frontier.found.len()
    ))
    .await;

    let report = Formatter::new(&frontier, options.detail, &options.status_filter)
        .hide_regex_output(options.hide_regex_output)
        .render();
    output::write_report(&options.out_file, &report).await?;

    if let Some(csv_path) = &args.csv {
        output::write_csv(csv_path, &frontier).await?;
    }

    Ok(())
}

async fn run_local_scan(args: &Args, path: &PathBuf) -> Res<()> {
    let options = build_options(args)?;
    error::configure(options.log_path.clone(), options.debug);

    let matcher = build_seed_matcher(&options.rules)?;
    let results = scanner::scan(path, &matcher)?;

    let out_file = if args.output.is_some() {
        options.out_file.clone()
    } else {
        PathBuf::from("scanner.log")
    };

    let report = output::render_local_scan(&results);
    output::write_report(&out_file, &report).await?;

    error::info(&format!(
        "Local scan finished: {} file(s) with secrets",
        results.len()
    ))
    .await;

    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "FATAL:".red().bold(), err);
            std::process::ExitCode::FAILURE
        }
    }
}
