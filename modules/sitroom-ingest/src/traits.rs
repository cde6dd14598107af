// Trait abstractions for the ingestion pipeline's external collaborators.
//
// IncidentStore — storage operations the engine and cycle runner consume.
// IncidentClassifier / LiveIntelSearcher — the two Grok calls.
// FeedFetcher — raw feed retrieval for the GDACS adapter.
//
// These enable deterministic testing with the mocks in `testing`:
// no network, no database, no Docker.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use grok_client::{GrokClient, IncidentAnalysis, LiveSearchReport};
use sitroom_common::{CandidateReport, EvidenceReport, IngestionStatus, Mission};
use sitroom_store::{PgStore, UpsertedIncident};

// ---------------------------------------------------------------------------
// IncidentStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Atomic insert-or-refresh keyed on `dedup_key`. Must report
    /// insert-vs-update via `UpsertedIncident::inserted`.
    async fn upsert_incident(&self, candidate: &CandidateReport) -> Result<UpsertedIncident>;

    /// Insert evidence rows for an incident, returning how many were written.
    async fn insert_evidence(&self, incident_id: Uuid, reports: &[EvidenceReport]) -> Result<u32>;

    async fn read_tags(&self, incident_id: Uuid) -> Result<Vec<String>>;

    async fn write_tags(&self, incident_id: Uuid, tags: &[String]) -> Result<()>;

    /// Snapshot of currently active missions.
    async fn active_missions(&self) -> Result<Vec<Mission>>;

    /// Read the persisted ingestion switch.
    async fn ingestion_status(&self) -> Result<IngestionStatus>;

    /// Atomically claim the next run slot if the cooldown has elapsed.
    async fn try_claim_run(&self, cooldown_secs: u64) -> Result<bool>;

    /// Unconditionally stamp `last_run_at` (forced runs).
    async fn touch_last_run(&self) -> Result<()>;
}

#[async_trait]
impl IncidentStore for PgStore {
    async fn upsert_incident(&self, candidate: &CandidateReport) -> Result<UpsertedIncident> {
        self.upsert_incident(candidate).await
    }

    async fn insert_evidence(&self, incident_id: Uuid, reports: &[EvidenceReport]) -> Result<u32> {
        self.insert_evidence(incident_id, reports).await
    }

    async fn read_tags(&self, incident_id: Uuid) -> Result<Vec<String>> {
        self.read_tags(incident_id).await
    }

    async fn write_tags(&self, incident_id: Uuid, tags: &[String]) -> Result<()> {
        self.write_tags(incident_id, tags).await
    }

    async fn active_missions(&self) -> Result<Vec<Mission>> {
        self.active_missions().await
    }

    async fn ingestion_status(&self) -> Result<IngestionStatus> {
        self.ingestion_status().await
    }

    async fn try_claim_run(&self, cooldown_secs: u64) -> Result<bool> {
        self.try_claim_run(cooldown_secs).await
    }

    async fn touch_last_run(&self) -> Result<()> {
        self.touch_last_run().await
    }
}

// ---------------------------------------------------------------------------
// Classifier and live search
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IncidentClassifier: Send + Sync {
    /// Classify free text into a structured incident analysis.
    async fn classify(&self, text: &str) -> Result<IncidentAnalysis>;
}

#[async_trait]
impl IncidentClassifier for GrokClient {
    async fn classify(&self, text: &str) -> Result<IncidentAnalysis> {
        Ok(GrokClient::classify(self, text).await?)
    }
}

#[async_trait]
pub trait LiveIntelSearcher: Send + Sync {
    /// One live search over the recency window. Empty results are Ok.
    async fn search(&self, keywords: &[String], window_hours: u32) -> Result<LiveSearchReport>;
}

#[async_trait]
impl LiveIntelSearcher for GrokClient {
    async fn search(&self, keywords: &[String], window_hours: u32) -> Result<LiveSearchReport> {
        Ok(GrokClient::live_search(self, keywords, window_hours).await?)
    }
}

// ---------------------------------------------------------------------------
// Feed fetching
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the raw body of a feed URL.
    async fn fetch(&self, url: &str) -> Result<String>;
}
