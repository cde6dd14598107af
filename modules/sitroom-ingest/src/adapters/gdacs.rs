//! GDACS disaster feed adapter.
//!
//! Pulls the RSS feed, parses it with feed-rs, classifies each item, and
//! persists the result. feed-rs synthesizes an entry id when the feed omits
//! `<guid>` and drops unknown namespaces, so a supplemental raw-XML pass
//! recovers the real guid and the `geo:lat`/`geo:long` tags. The dedup key
//! prefers the feed's own stable identifiers (guid, then link) and only falls
//! back to a content-derived key when the feed supplies neither.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use sitroom_common::{normalize_text, CandidateReport, EvidenceReport, SitRoomError};

use crate::engine::DedupEngine;
use crate::stats::SourceStats;
use crate::traits::{FeedFetcher, IncidentClassifier};

const FETCH_TIMEOUT_SECS: u64 = 15;
const USER_AGENT: &str = "sitroom-ingest/0.1";
const EVIDENCE_SOURCE: &str = "GDACS-RSS";

/// One parsed `<item>` from the feed.
#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl FeedItem {
    /// Key priority: guid, then link, then normalized content, each under a
    /// source namespace so feed keys cannot collide with keys from other
    /// adapters. The content fallback folds title whitespace/case and
    /// truncates the timestamp to the date so re-fetches of the same event
    /// collapse.
    pub fn dedup_key(&self) -> String {
        if let Some(guid) = self.guid.as_deref().filter(|g| !g.trim().is_empty()) {
            return format!("gdacs:guid:{}", guid.trim());
        }
        if let Some(link) = self.link.as_deref().filter(|l| !l.trim().is_empty()) {
            return format!("gdacs:link:{}", link.trim());
        }
        let title = normalize_text(self.title.as_deref().unwrap_or(""));
        let date = self
            .pub_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "nodate".to_string());
        format!("gdacs:content:{title}:{date}")
    }
}

// ---------------------------------------------------------------------------
// Feed parsing
// ---------------------------------------------------------------------------

/// Fields feed-rs cannot report faithfully: the literal `<guid>` (feed-rs
/// fabricates an id when it is absent) and the geo extension tags (unknown
/// namespaces are dropped).
#[derive(Debug, Clone, Default)]
struct RawItemFacts {
    guid: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

struct ItemPatterns {
    item: Regex,
    guid: Regex,
    lat: Regex,
    lon: Regex,
}

impl ItemPatterns {
    fn new() -> Self {
        // Literal patterns; compilation cannot fail at runtime.
        Self {
            item: Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>").expect("item pattern"),
            guid: Regex::new(r"(?s)<guid[^>]*>(.*?)</guid>").expect("guid pattern"),
            lat: Regex::new(r"(?s)<geo:lat[^>]*>(.*?)</geo:lat>").expect("lat pattern"),
            lon: Regex::new(r"(?s)<geo:long[^>]*>(.*?)</geo:long>").expect("lon pattern"),
        }
    }

    fn field(&self, pattern: &Regex, block: &str) -> Option<String> {
        pattern
            .captures(block)
            .map(|c| clean_xml_text(&c[1]))
            .filter(|s| !s.is_empty())
    }
}

/// Parse the raw RSS body into feed items. Raw facts are matched to feed-rs
/// entries by document order.
pub fn parse_items(body: &str) -> Result<Vec<FeedItem>> {
    let feed = feed_rs::parser::parse(body.as_bytes()).context("unparsable feed")?;
    let facts = raw_item_facts(body);

    Ok(feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let fact = facts.get(i).cloned().unwrap_or_default();
            FeedItem {
                title: entry
                    .title
                    .map(|t| t.content.trim().to_string())
                    .filter(|t| !t.is_empty()),
                description: entry
                    .summary
                    .map(|s| s.content.trim().to_string())
                    .filter(|s| !s.is_empty()),
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.trim().to_string())
                    .filter(|l| !l.is_empty()),
                guid: fact.guid,
                pub_date: entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&Utc)),
                lat: fact.lat,
                lon: fact.lon,
            }
        })
        .collect())
}

fn raw_item_facts(body: &str) -> Vec<RawItemFacts> {
    let patterns = ItemPatterns::new();
    patterns
        .item
        .captures_iter(body)
        .map(|item| {
            let block = &item[1];
            RawItemFacts {
                guid: patterns.field(&patterns.guid, block),
                lat: patterns
                    .field(&patterns.lat, block)
                    .and_then(|s| s.parse().ok()),
                lon: patterns
                    .field(&patterns.lon, block)
                    .and_then(|s| s.parse().ok()),
            }
        })
        .collect()
}

/// Minimal text cleanup for raw-pass fields. `&amp;` decodes last so an
/// escaped entity like `&amp;lt;` resolves to the literal `&lt;`, not `<`.
fn clean_xml_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(trimmed);
    inner
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

pub struct HttpFeedFetcher {
    http: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await.context("feed request")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("feed returned HTTP {status}");
        }
        response.text().await.context("feed body")
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct GdacsAdapter {
    fetcher: Arc<dyn FeedFetcher>,
    classifier: Arc<dyn IncidentClassifier>,
    engine: Arc<DedupEngine>,
    feed_url: String,
    max_items: usize,
}

impl GdacsAdapter {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        classifier: Arc<dyn IncidentClassifier>,
        engine: Arc<DedupEngine>,
        feed_url: impl Into<String>,
        max_items: usize,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            engine,
            feed_url: feed_url.into(),
            max_items,
        }
    }

    /// One full feed pass. A fetch or parse failure fails the whole pass;
    /// per-item classification and persistence failures are counted and
    /// skipped.
    pub async fn run(&self) -> Result<SourceStats, SitRoomError> {
        let body = self
            .fetcher
            .fetch(&self.feed_url)
            .await
            .map_err(|e| SitRoomError::Upstream(format!("GDACS fetch failed: {e}")))?;

        let items = parse_items(&body)
            .map_err(|e| SitRoomError::Upstream(format!("GDACS feed unparsable: {e}")))?;
        info!(total = items.len(), max = self.max_items, "GDACS feed fetched");

        let mut stats = SourceStats::default();
        for item in items.into_iter().take(self.max_items) {
            let (Some(title), Some(description)) = (item.title.clone(), item.description.clone())
            else {
                stats.record_skipped();
                continue;
            };

            let analysis = match self
                .classifier
                .classify(&format!("TITLE: {title}\nDESCRIPTION: {description}"))
                .await
            {
                Ok(a) => a,
                Err(e) => {
                    warn!(title = title.as_str(), error = %e, "GDACS classification failed");
                    stats.record_error();
                    continue;
                }
            };

            let candidate = CandidateReport {
                title: analysis.headline,
                description: analysis.summary,
                severity: analysis.severity,
                category: analysis.category.to_string(),
                lat: item.lat,
                lon: item.lon,
                confidence: Some(analysis.confidence),
                dedup_key: item.dedup_key(),
                tags: Default::default(),
            };
            let evidence = EvidenceReport::new(EVIDENCE_SOURCE, description.clone()).with_metadata(
                json!({
                    "gdacs_link": item.link,
                    "gdacs_guid": item.guid,
                    "original_title": title,
                    "pub_date": item.pub_date.map(|d| d.to_rfc3339()),
                }),
            );

            match self.engine.persist(candidate, &[evidence]).await {
                Ok(outcome) if outcome.is_duplicate => stats.record_duplicate(),
                Ok(_) => stats.record_inserted(),
                Err(e @ SitRoomError::Storage(_)) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "GDACS item rejected");
                    stats.record_error();
                }
            }
        }

        info!(
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            skipped = stats.skipped,
            errors = stats.errors,
            "GDACS pass complete"
        );
        Ok(stats)
    }
}
