use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Incident lifecycle ---

/// Lifecycle status of a persisted incident. The ingestion pipeline only ever
/// creates incidents in `Active`; the remaining transitions belong to the
/// analyst-action subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Active,
    Claimed,
    Escalated,
    Resolved,
    Dismissed,
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentStatus::Active => write!(f, "active"),
            IncidentStatus::Claimed => write!(f, "claimed"),
            IncidentStatus::Escalated => write!(f, "escalated"),
            IncidentStatus::Resolved => write!(f, "resolved"),
            IncidentStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

impl IncidentStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "claimed" => IncidentStatus::Claimed,
            "escalated" => IncidentStatus::Escalated,
            "resolved" => IncidentStatus::Resolved,
            "dismissed" => IncidentStatus::Dismissed,
            _ => IncidentStatus::Active,
        }
    }
}

// --- Candidate report (pre-persistence) ---

/// A normalized observation from one intelligence source, awaiting
/// dedup/write. `dedup_key` must be a pure function of content (plus a stable
/// external identifier where the feed supplies one) — never of wall-clock
/// time, so two observations of the same real-world event collapse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    pub title: String,
    pub description: String,
    /// Clamped into [1, 5] before persistence.
    pub severity: i32,
    pub category: String,
    /// `None` means "unknown location", never (0, 0).
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Defaults to 1.0 at persist time.
    pub confidence: Option<f64>,
    pub dedup_key: String,
    pub tags: BTreeSet<String>,
}

/// Raw supporting material attached to an incident at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceReport {
    pub source: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

impl EvidenceReport {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// --- Persisted incident ---

/// The durable, deduplicated incident record. At most one row exists per
/// `dedup_key` at any time, enforced by a UNIQUE constraint in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: i32,
    pub category: String,
    pub status: IncidentStatus,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub confidence: f64,
    pub dedup_key: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Missions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Active,
    Paused,
    Complete,
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionStatus::Active => write!(f, "active"),
            MissionStatus::Paused => write!(f, "paused"),
            MissionStatus::Complete => write!(f, "complete"),
        }
    }
}

impl MissionStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "paused" => MissionStatus::Paused,
            "complete" => MissionStatus::Complete,
            _ => MissionStatus::Active,
        }
    }
}

/// A named, keyword-driven search directive. Created by operators, consumed
/// repeatedly by the cycle runner while active, never deleted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: Uuid,
    pub name: String,
    pub goal: String,
    pub keywords: Vec<String>,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    /// Tag applied to incidents surfaced while working this mission.
    pub fn tag(&self) -> String {
        format!("mission:{}", self.id)
    }
}

// --- System config ---

/// Singleton ingestion switch, persisted as a config row so that cycles
/// running in separate processes see the same state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionStatus {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_status_roundtrip() {
        for s in ["active", "claimed", "escalated", "resolved", "dismissed"] {
            assert_eq!(IncidentStatus::from_str_loose(s).to_string(), s);
        }
        assert_eq!(
            IncidentStatus::from_str_loose("garbage"),
            IncidentStatus::Active
        );
    }

    #[test]
    fn mission_tag_format() {
        let m = Mission {
            id: Uuid::nil(),
            name: "Test".to_string(),
            goal: String::new(),
            keywords: vec![],
            status: MissionStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(m.tag(), format!("mission:{}", Uuid::nil()));
    }

    #[test]
    fn ingestion_status_defaults_disabled() {
        let status: IngestionStatus = serde_json::from_str("{}").unwrap();
        assert!(!status.enabled);
        assert!(status.last_run_at.is_none());
    }
}
