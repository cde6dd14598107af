//! In-memory fakes for deterministic pipeline tests. No network, no
//! database. Compiled only for tests and the `test-support` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use grok_client::{Category, IncidentAnalysis, LiveIncident, LiveSearchReport, SourcePost};
use sitroom_common::{
    truncate_chars, CandidateReport, EvidenceReport, Incident, IncidentStatus, IngestionStatus,
    Mission, MissionStatus,
};
use sitroom_store::UpsertedIncident;

use crate::traits::{FeedFetcher, IncidentClassifier, IncidentStore, LiveIntelSearcher};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    incidents: HashMap<String, Incident>,
    evidence: HashMap<Uuid, Vec<EvidenceReport>>,
    missions: Vec<Mission>,
    status: IngestionStatus,
}

/// Map-backed [`IncidentStore`] with the same upsert semantics as the real
/// thing: at most one incident per dedup key, insert-vs-update reported
/// truthfully, mutations serialized through one lock.
pub struct MemoryStore {
    state: Mutex<StoreState>,
    pub fail_evidence: AtomicBool,
    pub fail_tag_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                status: IngestionStatus {
                    enabled: true,
                    last_run_at: None,
                },
                ..Default::default()
            }),
            fail_evidence: AtomicBool::new(false),
            fail_tag_reads: AtomicBool::new(false),
        }
    }

    pub fn disabled() -> Self {
        let store = Self::new();
        store.state.lock().unwrap().status.enabled = false;
        store
    }

    pub fn with_missions(missions: Vec<Mission>) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().missions = missions;
        store
    }

    pub fn incident_count(&self) -> usize {
        self.state.lock().unwrap().incidents.len()
    }

    pub fn incident_by_key(&self, dedup_key: &str) -> Option<Incident> {
        self.state.lock().unwrap().incidents.get(dedup_key).cloned()
    }

    pub fn evidence_count(&self, incident_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .evidence
            .get(&incident_id)
            .map_or(0, Vec::len)
    }

    pub fn evidence_sources(&self, incident_id: Uuid) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .evidence
            .get(&incident_id)
            .map_or_else(Vec::new, |reports| {
                reports.iter().map(|r| r.source.clone()).collect()
            })
    }

    pub fn last_run_at_set(&self) -> bool {
        self.state.lock().unwrap().status.last_run_at.is_some()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn upsert_incident(&self, candidate: &CandidateReport) -> Result<UpsertedIncident> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.incidents.get_mut(&candidate.dedup_key) {
            existing.updated_at = Utc::now();
            return Ok(UpsertedIncident {
                incident: existing.clone(),
                inserted: false,
            });
        }
        let now = Utc::now();
        let incident = Incident {
            id: Uuid::new_v4(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            severity: candidate.severity,
            category: candidate.category.clone(),
            status: IncidentStatus::Active,
            lat: candidate.lat,
            lon: candidate.lon,
            confidence: candidate.confidence.unwrap_or(1.0),
            dedup_key: candidate.dedup_key.clone(),
            tags: candidate.tags.iter().cloned().collect(),
            created_at: now,
            updated_at: now,
        };
        state
            .incidents
            .insert(candidate.dedup_key.clone(), incident.clone());
        Ok(UpsertedIncident {
            incident,
            inserted: true,
        })
    }

    async fn insert_evidence(&self, incident_id: Uuid, reports: &[EvidenceReport]) -> Result<u32> {
        if self.fail_evidence.load(Ordering::SeqCst) {
            bail!("evidence table unavailable");
        }
        let mut state = self.state.lock().unwrap();
        state
            .evidence
            .entry(incident_id)
            .or_default()
            .extend(reports.iter().cloned());
        Ok(reports.len() as u32)
    }

    async fn read_tags(&self, incident_id: Uuid) -> Result<Vec<String>> {
        if self.fail_tag_reads.load(Ordering::SeqCst) {
            bail!("tag read unavailable");
        }
        let state = self.state.lock().unwrap();
        state
            .incidents
            .values()
            .find(|i| i.id == incident_id)
            .map(|i| i.tags.clone())
            .ok_or_else(|| anyhow::anyhow!("no incident {incident_id}"))
    }

    async fn write_tags(&self, incident_id: Uuid, tags: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let incident = state
            .incidents
            .values_mut()
            .find(|i| i.id == incident_id)
            .ok_or_else(|| anyhow::anyhow!("no incident {incident_id}"))?;
        incident.tags = tags.to_vec();
        Ok(())
    }

    async fn active_missions(&self) -> Result<Vec<Mission>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .missions
            .iter()
            .filter(|m| m.status == MissionStatus::Active)
            .cloned()
            .collect())
    }

    async fn ingestion_status(&self) -> Result<IngestionStatus> {
        Ok(self.state.lock().unwrap().status.clone())
    }

    async fn try_claim_run(&self, cooldown_secs: u64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let elapsed = match state.status.last_run_at {
            None => true,
            Some(last) => Utc::now() - last >= Duration::seconds(cooldown_secs as i64),
        };
        if elapsed {
            state.status.last_run_at = Some(Utc::now());
        }
        Ok(elapsed)
    }

    async fn touch_last_run(&self) -> Result<()> {
        self.state.lock().unwrap().status.last_run_at = Some(Utc::now());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock Grok and feed
// ---------------------------------------------------------------------------

/// Deterministic classifier: headline is the first line of the input with any
/// `TITLE:` prefix stripped, so tests can predict the persisted title.
pub struct MockClassifier {
    pub calls: AtomicU32,
    fail: bool,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IncidentClassifier for MockClassifier {
    async fn classify(&self, text: &str) -> Result<IncidentAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("classifier offline");
        }
        let first_line = text.lines().next().unwrap_or("").trim();
        let headline = first_line.strip_prefix("TITLE:").unwrap_or(first_line).trim();
        Ok(IncidentAnalysis {
            headline: truncate_chars(headline, 60),
            category: Category::NaturalDisaster,
            severity: 3,
            summary: text.to_string(),
            confidence: 0.8,
        })
    }
}

pub struct MockSearcher {
    pub calls: AtomicU32,
    report: Mutex<LiveSearchReport>,
    fail: bool,
}

impl MockSearcher {
    pub fn with_report(report: LiveSearchReport) -> Self {
        Self {
            calls: AtomicU32::new(0),
            report: Mutex::new(report),
            fail: false,
        }
    }

    pub fn with_incidents(incidents: Vec<LiveIncident>) -> Self {
        Self::with_report(LiveSearchReport {
            incidents,
            ..Default::default()
        })
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            report: Mutex::new(LiveSearchReport::default()),
            fail: true,
        }
    }
}

#[async_trait]
impl LiveIntelSearcher for MockSearcher {
    async fn search(&self, _keywords: &[String], _window_hours: u32) -> Result<LiveSearchReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("search backend offline");
        }
        Ok(self.report.lock().unwrap().clone())
    }
}

pub struct MockFeed {
    pub calls: AtomicU32,
    body: Option<String>,
}

impl MockFeed {
    pub fn with_body(body: &str) -> Self {
        Self {
            calls: AtomicU32::new(0),
            body: Some(body.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            body: None,
        }
    }
}

#[async_trait]
impl FeedFetcher for MockFeed {
    async fn fetch(&self, _url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => bail!("connection refused"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Four items: full identifiers, link-only, content-only, and one missing its
/// description (which adapters must skip).
pub const GDACS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:geo="http://www.w3.org/2003/01/geo/wgs84_pos#">
<channel>
<title>GDACS</title>
<item>
  <title>Green earthquake alert (Magnitude 5.2M)</title>
  <description><![CDATA[An earthquake occurred 40 km from the coast.]]></description>
  <link>https://gdacs.example/report/EQ-1442341</link>
  <guid>EQ-1442341</guid>
  <pubDate>Sat, 01 Mar 2025 06:14:00 GMT</pubDate>
  <geo:lat>38.42</geo:lat>
  <geo:long>142.37</geo:long>
</item>
<item>
  <title>Tropical cyclone ALPHA-25</title>
  <description>Cyclone approaching the eastern seaboard.</description>
  <link>https://gdacs.example/report/TC-900</link>
  <pubDate>Sat, 01 Mar 2025 08:00:00 GMT</pubDate>
</item>
<item>
  <title>Flood Warning in River Delta</title>
  <description>Severe flooding expected within 24 hours.</description>
  <pubDate>Sat, 01 Mar 2025 09:30:00 GMT</pubDate>
</item>
<item>
  <title>Orphan headline with no body</title>
  <guid>X-000</guid>
</item>
</channel>
</rss>
"#;

pub fn candidate(dedup_key: &str) -> CandidateReport {
    CandidateReport {
        title: "Test incident".to_string(),
        description: "Something happened".to_string(),
        severity: 3,
        category: "Infrastructure".to_string(),
        lat: None,
        lon: None,
        confidence: Some(0.9),
        dedup_key: dedup_key.to_string(),
        tags: Default::default(),
    }
}

pub fn live_incident(title: &str) -> LiveIncident {
    LiveIncident {
        title: title.to_string(),
        description: format!("{title} reported by multiple accounts"),
        severity: 4,
        category: "Military".to_string(),
        confidence: 0.85,
        lat: None,
        lon: None,
        source_posts: vec![
            SourcePost {
                author: "frontline_obs".to_string(),
                content: "Seeing it happen now".to_string(),
                timestamp: "2025-03-01T10:00:00Z".to_string(),
                url: Some("https://x.com/frontline_obs/status/1".to_string()),
            },
            SourcePost {
                author: "local_monitor".to_string(),
                content: "Confirmed from second position".to_string(),
                timestamp: "2025-03-01T10:03:00Z".to_string(),
                url: None,
            },
        ],
        dedup_key: None,
    }
}

pub fn mission(name: &str, keywords: &[&str]) -> Mission {
    let now = Utc::now();
    Mission {
        id: Uuid::new_v4(),
        name: name.to_string(),
        goal: format!("Track {name}"),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        status: MissionStatus::Active,
        created_at: now,
        updated_at: now,
    }
}
