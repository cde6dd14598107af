//! Deduplication & upsert engine.
//!
//! One entrypoint: [`DedupEngine::persist`]. The storage layer's UNIQUE
//! constraint on `dedup_key` is what makes this race-safe — two concurrent
//! callers submitting the same key both succeed, but exactly one creates the
//! incident and the other lands on the duplicate path.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use sitroom_common::{
    truncate_chars, CandidateReport, EvidenceReport, Incident, SitRoomError,
};

use crate::traits::IncidentStore;

const MAX_TITLE_CHARS: usize = 200;

/// What happens to evidence submitted alongside a duplicate candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvidencePolicy {
    /// Evidence accumulates only when the incident is first created;
    /// duplicate-path evidence is discarded. This is the canonical policy —
    /// a deliberate scope limit, not an oversight.
    #[default]
    CreateOnly,
    /// Duplicates also append their evidence, for richer provenance history.
    AppendOnDuplicate,
}

/// Result of one persist call. `partial_fault` records best-effort work that
/// failed (evidence insert, tag merge) without invalidating the incident.
#[derive(Debug, Clone, Serialize)]
pub struct PersistOutcome {
    pub incident: Incident,
    pub is_duplicate: bool,
    pub reports_written: u32,
    pub partial_fault: Option<String>,
}

pub struct DedupEngine {
    store: Arc<dyn IncidentStore>,
    policy: EvidencePolicy,
}

impl DedupEngine {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self {
            store,
            policy: EvidencePolicy::default(),
        }
    }

    pub fn with_policy(store: Arc<dyn IncidentStore>, policy: EvidencePolicy) -> Self {
        Self { store, policy }
    }

    /// Persist a candidate and its supporting evidence.
    ///
    /// Never errors on ordinary duplicate detection. `Storage` faults abort
    /// the call; evidence and tag-merge failures are swallowed into
    /// `partial_fault` because the incident row is the primary deliverable.
    pub async fn persist(
        &self,
        candidate: CandidateReport,
        evidence: &[EvidenceReport],
    ) -> Result<PersistOutcome, SitRoomError> {
        let candidate = normalize(candidate)?;

        let upserted = self
            .store
            .upsert_incident(&candidate)
            .await
            .map_err(|e| SitRoomError::Storage(e.to_string()))?;

        let mut incident = upserted.incident;
        let mut reports_written = 0u32;
        let mut partial_fault = None;

        if upserted.inserted {
            (reports_written, partial_fault) = self.attach_evidence(&incident, evidence).await;
            info!(
                incident_id = %incident.id,
                dedup_key = incident.dedup_key.as_str(),
                reports_written,
                "Incident created"
            );
            return Ok(PersistOutcome {
                incident,
                is_duplicate: false,
                reports_written,
                partial_fault,
            });
        }

        // Duplicate: fold the candidate's tags into the existing record.
        match self.merge_tags(&incident, &candidate.tags).await {
            Ok(merged) => incident.tags = merged,
            Err(e) => {
                warn!(incident_id = %incident.id, error = %e, "Tag merge failed on duplicate");
                partial_fault = Some(format!("tag merge failed: {e}"));
            }
        }

        if self.policy == EvidencePolicy::AppendOnDuplicate && !evidence.is_empty() {
            let (written, fault) = self.attach_evidence(&incident, evidence).await;
            reports_written = written;
            partial_fault = partial_fault.or(fault);
        }

        info!(
            incident_id = %incident.id,
            dedup_key = incident.dedup_key.as_str(),
            "Duplicate incident folded"
        );
        Ok(PersistOutcome {
            incident,
            is_duplicate: true,
            reports_written,
            partial_fault,
        })
    }

    async fn attach_evidence(
        &self,
        incident: &Incident,
        evidence: &[EvidenceReport],
    ) -> (u32, Option<String>) {
        if evidence.is_empty() {
            return (0, None);
        }
        match self.store.insert_evidence(incident.id, evidence).await {
            Ok(written) if (written as usize) < evidence.len() => {
                warn!(
                    incident_id = %incident.id,
                    written,
                    expected = evidence.len(),
                    "Some evidence reports were not written"
                );
                (
                    written,
                    Some(format!(
                        "wrote {written} of {} evidence reports",
                        evidence.len()
                    )),
                )
            }
            Ok(written) => (written, None),
            Err(e) => {
                warn!(incident_id = %incident.id, error = %e, "Evidence insert failed");
                (0, Some(format!("evidence insert failed: {e}")))
            }
        }
    }

    async fn merge_tags(
        &self,
        incident: &Incident,
        incoming: &BTreeSet<String>,
    ) -> anyhow::Result<Vec<String>> {
        // Re-read rather than trusting the upsert's returned row: a
        // concurrent duplicate may have merged its own tags in between.
        let existing = self.store.read_tags(incident.id).await?;
        let merged = merge_tag_sets(&existing, incoming);
        if merged != existing {
            self.store.write_tags(incident.id, &merged).await?;
        }
        Ok(merged)
    }
}

/// Set union of existing and incoming tags, deterministically ordered.
pub fn merge_tag_sets(existing: &[String], incoming: &BTreeSet<String>) -> Vec<String> {
    let mut set: BTreeSet<String> = existing.iter().cloned().collect();
    set.extend(incoming.iter().cloned());
    set.into_iter().collect()
}

/// Clamp and shape the candidate before it touches storage.
fn normalize(mut candidate: CandidateReport) -> Result<CandidateReport, SitRoomError> {
    candidate.title = truncate_chars(candidate.title.trim(), MAX_TITLE_CHARS);
    if candidate.title.is_empty() {
        return Err(SitRoomError::Validation("candidate title is empty".into()));
    }
    if candidate.dedup_key.trim().is_empty() {
        return Err(SitRoomError::Validation("candidate dedup_key is empty".into()));
    }
    candidate.severity = candidate.severity.clamp(1, 5);
    candidate.confidence = Some(candidate.confidence.unwrap_or(1.0));
    Ok(candidate)
}
