use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use regex::Regex;
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use indicatif::ProgressBar;
use tokio::sync::mpsc::Receiver;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Settings;
use crate::normalize::heading::split_heading;
use crate::normalize::votes::parse_votes;
use crate::normalize::{fields, RawRecord};
use crate::progress::progress_bar;

pub const BASE_URL: &str = "https://www.imdb.com";
/// Placeholder the scraper writes for values it could not find.
pub const NA: &str = "N/A";

const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// `regex` has no lookbehind; `(?:^|\D)` stands in for "not preceded by a digit".
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)((?:19|20)\d{2})").unwrap());
static RUNTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d+h\s*\d+m|\d+h|\d+m)").unwrap());
static RATING_VOTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d)\s*\(([\d.,KM]+)\)").unwrap());

static ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.ipc-metadata-list-summary-item").unwrap());
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3.ipc-title__text").unwrap());
static H3_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.ipc-title-link-wrapper[href]").unwrap());
static ANY_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static META_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".dli-title-metadata").unwrap());
static RATING_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[data-testid="ratingGroup--imdb-rating"], .ratingGroup--imdb-rating"#)
        .unwrap()
});

// ── Text extractors ──

/// First 19xx/20xx not preceded by a digit.
pub fn extract_year(text: &str) -> &str {
    YEAR_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(NA, |m| m.as_str())
}

/// First "2h 30m", "2h" or "45m" not preceded by a digit.
pub fn extract_runtime(text: &str) -> &str {
    RUNTIME_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(NA, |m| m.as_str())
}

/// "8.5 (1.2M)" → ("8.5", "1.2M").
pub fn extract_rating_votes(block: Option<&str>) -> (&str, &str) {
    block
        .and_then(|b| RATING_VOTES_RE.captures(b))
        .and_then(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .unwrap_or((NA, NA))
}

// ── HTML ──

/// Text nodes trimmed and joined by newlines, so values from sibling
/// elements never run together.
fn block_text(el: ElementRef) -> String {
    el.text().map(str::trim).filter(|s| !s.is_empty()).join("\n")
}

fn first_text(item: ElementRef, selectors: &[&Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|sel| item.select(sel).next())
        .map(block_text)
        .filter(|s| !s.is_empty())
}

fn first_href(item: ElementRef, selectors: &[&Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|sel| item.select(sel).next())
        .and_then(|a| a.value().attr("href"))
        .map(absolute_url)
        .filter(|s| !s.is_empty())
}

/// Absolute URL without the query string; listing links carry a per-position
/// `ref_` parameter that would defeat deduplication.
pub fn absolute_url(href: &str) -> String {
    let href = href.trim();
    let path = href.split(['?', '#']).next().unwrap_or(href);
    if path.starts_with('/') {
        format!("{}{}", BASE_URL, path)
    } else {
        path.to_string()
    }
}

fn parse_item(item: ElementRef) -> Option<RawRecord> {
    let heading = first_text(item, &[&*TITLE_SEL, &*H3_SEL]);
    let (rank, title) = split_heading(heading.as_deref());
    let title = Some(title).filter(|t| !t.is_empty() && t != NA);
    let href = first_href(item, &[&*LINK_SEL, &*ANY_LINK_SEL]);
    if title.is_none() && href.is_none() {
        return None;
    }

    // Prefer the metadata row; the full item text also holds the title,
    // and a title like "1917" would read as a year.
    let meta = first_text(item, &[&*META_SEL]).unwrap_or_else(|| block_text(item));
    // Rating text nodes are concatenated: "8.5", "\u{a0}(", "1.2M", ")".
    let rating_block = item
        .select(&RATING_SEL)
        .next()
        .map(|el| el.text().collect::<String>());
    let (rating, votes) = extract_rating_votes(rating_block.as_deref());

    let mut rec = RawRecord::new()
        .with(fields::TITLE, title.as_deref().unwrap_or(NA))
        .with(fields::YEAR, extract_year(&meta))
        .with(fields::RUNTIME, extract_runtime(&meta))
        .with(fields::RATING, rating)
        .with(fields::VOTES, votes)
        .with(fields::URL, href.as_deref().unwrap_or(NA));
    if let Some(rank) = rank {
        rec = rec.with(fields::RANK, rank.to_string());
    }
    if let Ok(n) = parse_votes(Some(votes)) {
        rec = rec.with(fields::VOTES_NUMERIC, n.to_string());
    }
    Some(rec)
}

/// Parse one listing page into raw records, in page order, deduplicated.
pub fn parse_listing(html: &str) -> Vec<RawRecord> {
    let doc = Html::parse_document(html);
    let records: Vec<RawRecord> = doc.select(&ITEM_SEL).filter_map(parse_item).collect();
    dedupe(records)
}

fn dedupe_key(rec: &RawRecord) -> String {
    match rec.get(fields::URL).filter(|u| *u != NA) {
        Some(url) => url.to_string(),
        None => format!(
            "{}_{}",
            rec.get(fields::TITLE).unwrap_or(NA),
            rec.get(fields::RANK).unwrap_or("")
        ),
    }
}

/// Keep the first record per URL (or per title and rank when there is no URL).
pub fn dedupe(records: Vec<RawRecord>) -> Vec<RawRecord> {
    records.into_iter().unique_by(dedupe_key).collect()
}

/// Stable sort by rank, unranked last.
pub fn sort_by_rank(records: &mut [RawRecord]) {
    records.sort_by_key(|r| {
        r.get(fields::RANK)
            .and_then(|s| s.parse::<u32>().ok())
            .map_or((1, 0), |n| (0, n))
    });
}

// ── Fetching ──

pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub pages_ok: usize,
    pub pages_failed: usize,
}

/// Fetch listing pages concurrently and parse each as it arrives. Stops once
/// `settings.target_rows` unique rows are collected.
pub async fn fetch_listings(urls: &[String], settings: &Settings) -> Result<FetchOutcome> {
    let client = reqwest::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let pb = progress_bar(urls.len() as u64);

    let (tx, mut rx) = tokio::sync::mpsc::channel::<(String, Result<String>)>(
        settings.concurrency.max(1) * 2,
    );

    let mut handles = Vec::with_capacity(urls.len());
    for url in urls {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let url = url.clone();
        let max_retries = settings.max_retries;

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let body = fetch_with_retry(&client, &url, max_retries).await;
            let _ = tx.send((url, body)).await;
        }));
    }
    // rx closes once every task has sent its page
    drop(tx);

    let outcome = collect_pages(&mut rx, settings.target_rows, &pb).await;
    for h in &handles {
        h.abort();
    }
    pb.finish_and_clear();

    info!(
        "Fetched {} rows from {} pages ({} failed)",
        outcome.records.len(),
        outcome.pages_ok,
        outcome.pages_failed
    );
    Ok(outcome)
}

/// Parse pages as they arrive until the channel closes or `target_rows`
/// unique rows are in hand. Output is rank-sorted and cut to the target.
async fn collect_pages(
    rx: &mut Receiver<(String, Result<String>)>,
    target_rows: usize,
    pb: &ProgressBar,
) -> FetchOutcome {
    let mut records = Vec::new();
    let mut pages_ok = 0usize;
    let mut pages_failed = 0usize;

    while let Some((url, body)) = rx.recv().await {
        pb.inc(1);
        match body {
            Ok(html) => {
                pages_ok += 1;
                let page = parse_listing(&html);
                info!("{}: {} items", url, page.len());
                records.extend(page);
                records = dedupe(records);
                if records.len() >= target_rows {
                    info!("Reached target of {} rows", target_rows);
                    break;
                }
            }
            Err(e) => {
                pages_failed += 1;
                warn!("Failed to fetch {}: {:#}", url, e);
            }
        }
    }

    sort_by_rank(&mut records);
    records.truncate(target_rows);
    FetchOutcome {
        records,
        pages_ok,
        pages_failed,
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Exponential backoff from `BASE_BACKOFF_MS`, saturating instead of overflowing.
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor))
}

async fn fetch_with_retry(client: &reqwest::Client, url: &str, max_retries: u32) -> Result<String> {
    let mut attempt = 0;
    loop {
        let resp = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        let status = resp.status();
        if status.is_success() {
            return resp
                .text()
                .await
                .with_context(|| format!("Failed to read body of {}", url));
        }
        if !should_retry(status) || attempt >= max_retries {
            bail!("{} returned {}", url, status);
        }

        let backoff = backoff_delay(attempt);
        warn!(
            "{} on {} (attempt {}/{}), backing off {:.1}s",
            status,
            url,
            attempt + 1,
            max_retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}
