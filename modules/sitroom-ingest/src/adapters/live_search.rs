//! Live social search adapter.
//!
//! One search call per invocation; each returned incident is already
//! structured, so no second classification pass is needed. Source posts
//! become evidence reports, and an optional mission tag threads provenance
//! back to the mission that asked for the search.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use grok_client::LiveIncident;
use sitroom_common::{hash16, normalize_text, CandidateReport, EvidenceReport, SitRoomError};

use crate::engine::DedupEngine;
use crate::stats::SourceStats;
use crate::traits::LiveIntelSearcher;

pub struct LiveSearchAdapter {
    searcher: Arc<dyn LiveIntelSearcher>,
    engine: Arc<DedupEngine>,
    window_hours: u32,
}

impl LiveSearchAdapter {
    pub fn new(
        searcher: Arc<dyn LiveIntelSearcher>,
        engine: Arc<DedupEngine>,
        window_hours: u32,
    ) -> Self {
        Self {
            searcher,
            engine,
            window_hours,
        }
    }

    /// One search pass for the given keywords. `mission_id` tags every
    /// persisted incident with the mission that requested it.
    pub async fn run(
        &self,
        keywords: &[String],
        mission_id: Option<Uuid>,
    ) -> Result<SourceStats, SitRoomError> {
        let report = self
            .searcher
            .search(keywords, self.window_hours)
            .await
            .map_err(|e| SitRoomError::Upstream(format!("live search failed: {e}")))?;

        info!(
            incidents = report.incidents.len(),
            posts_analyzed = report.search_metadata.posts_analyzed,
            "Live search returned"
        );

        let mut stats = SourceStats::default();
        for incident in report.incidents {
            if incident.title.trim().is_empty() {
                stats.record_skipped();
                continue;
            }

            let candidate = to_candidate(&incident, mission_id);
            let evidence: Vec<EvidenceReport> = incident
                .source_posts
                .iter()
                .map(|post| {
                    EvidenceReport::new(format!("X.com/@{}", post.author), post.content.clone())
                        .with_metadata(json!({
                            "platform": "x.com",
                            "timestamp": post.timestamp,
                            "url": post.url,
                        }))
                })
                .collect();

            match self.engine.persist(candidate, &evidence).await {
                Ok(outcome) if outcome.is_duplicate => stats.record_duplicate(),
                Ok(_) => stats.record_inserted(),
                Err(e @ SitRoomError::Storage(_)) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Live incident rejected");
                    stats.record_error();
                }
            }
        }
        Ok(stats)
    }
}

fn to_candidate(incident: &LiveIncident, mission_id: Option<Uuid>) -> CandidateReport {
    let dedup_key = incident
        .dedup_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| live_search_key(incident));

    let mut tags = std::collections::BTreeSet::new();
    if let Some(id) = mission_id {
        tags.insert(format!("mission:{id}"));
    }

    CandidateReport {
        title: incident.title.clone(),
        description: incident.description.clone(),
        severity: incident.severity,
        category: incident.category.clone(),
        lat: incident.lat,
        lon: incident.lon,
        confidence: Some(incident.confidence),
        dedup_key,
        tags,
    }
}

/// Content-derived key for incidents the upstream did not key itself.
/// Coordinates are rounded to two decimals (~1km) so jittery geo estimates
/// of the same event still collapse.
pub fn live_search_key(incident: &LiveIncident) -> String {
    let location = match (incident.lat, incident.lon) {
        (Some(lat), Some(lon)) => format!("{lat:.2},{lon:.2}"),
        _ => "unknown".to_string(),
    };
    let basis = format!(
        "{}:{}:{}",
        normalize_text(&incident.category),
        normalize_text(&incident.title),
        location
    );
    format!("grok:{}", hash16(&basis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{live_incident, MemoryStore, MockSearcher};
    use grok_client::LiveSearchReport;

    fn adapter(searcher: Arc<MockSearcher>, store: Arc<MemoryStore>) -> LiveSearchAdapter {
        LiveSearchAdapter::new(searcher, Arc::new(DedupEngine::new(store)), 2)
    }

    #[test]
    fn derived_key_ignores_case_whitespace_and_geo_jitter() {
        let mut a = live_incident("Bridge Collapse Downtown");
        a.category = "Infrastructure".to_string();
        a.lat = Some(40.7128);
        a.lon = Some(-74.0060);

        let mut b = live_incident("  bridge   collapse downtown ");
        b.category = "infrastructure".to_string();
        b.lat = Some(40.7131);
        b.lon = Some(-74.0058);

        assert_eq!(live_search_key(&a), live_search_key(&b));
        assert!(live_search_key(&a).starts_with("grok:"));
        assert_eq!(live_search_key(&a).len(), "grok:".len() + 16);
    }

    #[test]
    fn missing_geo_reads_unknown_not_zero() {
        let no_geo = live_incident("Explosion at depot");
        let zero_geo = {
            let mut i = live_incident("Explosion at depot");
            i.lat = Some(0.0);
            i.lon = Some(0.0);
            i
        };
        assert_ne!(live_search_key(&no_geo), live_search_key(&zero_geo));
    }

    #[tokio::test]
    async fn upstream_key_wins_over_derived() {
        let mut incident = live_incident("Port fire");
        incident.dedup_key = Some("upstream-key-1".to_string());
        let searcher = Arc::new(MockSearcher::with_incidents(vec![incident]));
        let store = Arc::new(MemoryStore::new());
        adapter(searcher, store.clone())
            .run(&["fire".to_string()], None)
            .await
            .unwrap();
        assert!(store.incident_by_key("upstream-key-1").is_some());
    }

    #[tokio::test]
    async fn blank_upstream_key_falls_back_to_derived() {
        let mut incident = live_incident("Port fire");
        incident.dedup_key = Some("   ".to_string());
        let expected = live_search_key(&incident);
        let searcher = Arc::new(MockSearcher::with_incidents(vec![incident]));
        let store = Arc::new(MemoryStore::new());
        adapter(searcher, store.clone())
            .run(&["fire".to_string()], None)
            .await
            .unwrap();
        assert!(store.incident_by_key(&expected).is_some());
    }

    #[tokio::test]
    async fn mission_tag_lands_on_persisted_incident() {
        let incident = live_incident("Convoy ambush");
        let expected_key = live_search_key(&incident);
        let searcher = Arc::new(MockSearcher::with_incidents(vec![incident]));
        let store = Arc::new(MemoryStore::new());
        let mission_id = Uuid::new_v4();

        adapter(searcher, store.clone())
            .run(&["ambush".to_string()], Some(mission_id))
            .await
            .unwrap();

        let persisted = store.incident_by_key(&expected_key).unwrap();
        assert_eq!(persisted.tags, vec![format!("mission:{mission_id}")]);
    }

    #[tokio::test]
    async fn posts_become_evidence_reports() {
        let incident = live_incident("Convoy ambush");
        let key = live_search_key(&incident);
        let searcher = Arc::new(MockSearcher::with_incidents(vec![incident]));
        let store = Arc::new(MemoryStore::new());

        let stats = adapter(searcher, store.clone())
            .run(&["ambush".to_string()], None)
            .await
            .unwrap();

        assert_eq!(stats.inserted, 1);
        let persisted = store.incident_by_key(&key).unwrap();
        assert_eq!(store.evidence_count(persisted.id), 2);
        let sources = store.evidence_sources(persisted.id);
        assert!(sources.iter().all(|s| s.starts_with("X.com/@")));
    }

    #[tokio::test]
    async fn empty_result_is_success_with_zero_counts() {
        let searcher = Arc::new(MockSearcher::with_report(LiveSearchReport::default()));
        let store = Arc::new(MemoryStore::new());
        let stats = adapter(searcher, store)
            .run(&["quiet".to_string()], None)
            .await
            .unwrap();
        assert_eq!(stats, SourceStats::default());
    }

    #[tokio::test]
    async fn search_failure_is_upstream_error() {
        let searcher = Arc::new(MockSearcher::failing());
        let store = Arc::new(MemoryStore::new());
        let err = adapter(searcher, store)
            .run(&["x".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, SitRoomError::Upstream(_)));
    }
}
