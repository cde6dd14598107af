//! Operator-submitted reports.
//!
//! Free text from a trusted operator goes through the same classifier and
//! engine as automated sources, keyed on a content hash so the same report
//! pasted twice folds into one incident.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use sitroom_common::{hash16, CandidateReport, EvidenceReport, SitRoomError};

use crate::engine::{DedupEngine, PersistOutcome};
use crate::traits::IncidentClassifier;

const MAX_CONTENT_CHARS: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct ManualSubmission {
    /// Free-form attribution, e.g. an operator callsign or desk name.
    pub source: String,
    pub content: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

pub struct ManualAdapter {
    classifier: Arc<dyn IncidentClassifier>,
    engine: Arc<DedupEngine>,
}

impl ManualAdapter {
    pub fn new(classifier: Arc<dyn IncidentClassifier>, engine: Arc<DedupEngine>) -> Self {
        Self { classifier, engine }
    }

    pub async fn submit(
        &self,
        submission: ManualSubmission,
    ) -> Result<PersistOutcome, SitRoomError> {
        let content = submission.content.trim();
        if content.is_empty() {
            return Err(SitRoomError::Validation("content is empty".into()));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(SitRoomError::Validation(format!(
                "content exceeds {MAX_CONTENT_CHARS} characters"
            )));
        }
        let source = submission.source.trim();
        if source.is_empty() {
            return Err(SitRoomError::Validation("source is empty".into()));
        }

        let analysis = self
            .classifier
            .classify(content)
            .await
            .map_err(|e| SitRoomError::Upstream(format!("classification failed: {e}")))?;

        let candidate = CandidateReport {
            title: analysis.headline,
            description: analysis.summary,
            severity: analysis.severity,
            category: analysis.category.to_string(),
            lat: submission.lat,
            lon: submission.lon,
            confidence: Some(analysis.confidence),
            dedup_key: manual_key(source, content),
            tags: Default::default(),
        };
        let evidence = EvidenceReport::new(source, content).with_metadata(json!({
            "channel": "manual",
        }));

        let outcome = self.engine.persist(candidate, &[evidence]).await?;
        info!(
            incident_id = %outcome.incident.id,
            is_duplicate = outcome.is_duplicate,
            "Manual submission persisted"
        );
        Ok(outcome)
    }
}

/// Content hash key. Case and surrounding whitespace are folded so trivial
/// re-pastes of the same report collapse; interior edits do not.
pub fn manual_key(source: &str, content: &str) -> String {
    let basis = format!("{}:{}", source.trim(), content.trim().to_lowercase());
    format!("manual:{}", hash16(&basis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, MockClassifier};
    use std::sync::atomic::Ordering;

    fn adapter(classifier: Arc<MockClassifier>, store: Arc<MemoryStore>) -> ManualAdapter {
        ManualAdapter::new(classifier, Arc::new(DedupEngine::new(store)))
    }

    fn submission(content: &str) -> ManualSubmission {
        ManualSubmission {
            source: "desk-3".to_string(),
            content: content.to_string(),
            lat: None,
            lon: None,
        }
    }

    #[test]
    fn key_folds_case_and_outer_whitespace() {
        assert_eq!(
            manual_key("desk-3", "  Explosion near BASE  "),
            manual_key("desk-3", "explosion near base")
        );
        assert_ne!(
            manual_key("desk-3", "explosion near base"),
            manual_key("desk-4", "explosion near base")
        );
        assert!(manual_key("a", "b").starts_with("manual:"));
        assert_eq!(manual_key("a", "b").len(), "manual:".len() + 16);
    }

    #[tokio::test]
    async fn empty_content_rejected_before_classification() {
        let classifier = Arc::new(MockClassifier::new());
        let store = Arc::new(MemoryStore::new());
        let err = adapter(classifier.clone(), store)
            .submit(submission("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, SitRoomError::Validation(_)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_content_rejected() {
        let classifier = Arc::new(MockClassifier::new());
        let store = Arc::new(MemoryStore::new());
        let err = adapter(classifier, store)
            .submit(submission(&"x".repeat(10_001)))
            .await
            .unwrap_err();
        assert!(matches!(err, SitRoomError::Validation(_)));
    }

    #[tokio::test]
    async fn resubmission_folds_into_one_incident() {
        let classifier = Arc::new(MockClassifier::new());
        let store = Arc::new(MemoryStore::new());
        let adapter = adapter(classifier, store.clone());

        let first = adapter
            .submit(submission("Explosion near base perimeter"))
            .await
            .unwrap();
        assert!(!first.is_duplicate);

        let second = adapter
            .submit(submission("  explosion NEAR base perimeter "))
            .await
            .unwrap();
        assert!(second.is_duplicate);
        assert_eq!(second.incident.id, first.incident.id);
        assert_eq!(store.incident_count(), 1);
    }

    #[tokio::test]
    async fn classifier_failure_is_upstream() {
        let classifier = Arc::new(MockClassifier::failing());
        let store = Arc::new(MemoryStore::new());
        let err = adapter(classifier, store.clone())
            .submit(submission("something happened"))
            .await
            .unwrap_err();
        assert!(matches!(err, SitRoomError::Upstream(_)));
        assert_eq!(store.incident_count(), 0);
    }

    #[tokio::test]
    async fn evidence_carries_operator_source() {
        let classifier = Arc::new(MockClassifier::new());
        let store = Arc::new(MemoryStore::new());
        let outcome = adapter(classifier, store.clone())
            .submit(submission("Roadblock reported on supply route"))
            .await
            .unwrap();
        assert_eq!(store.evidence_sources(outcome.incident.id), vec!["desk-3"]);
    }
}
