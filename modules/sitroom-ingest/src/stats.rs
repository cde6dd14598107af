//! Per-source counters and the cycle-level report returned to callers.

use serde::Serialize;

/// Counters for one source pass. `processed` counts every item the source
/// yielded, including ones that were later skipped or errored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub processed: u32,
    pub inserted: u32,
    pub duplicates: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl SourceStats {
    pub fn record_inserted(&mut self) {
        self.processed += 1;
        self.inserted += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.processed += 1;
        self.duplicates += 1;
    }

    pub fn record_skipped(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub fn record_error(&mut self) {
        self.processed += 1;
        self.errors += 1;
    }
}

/// Why a cycle did no work at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    Cooldown,
}

/// Outcome of one source pass within a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub ok: bool,
    pub stats: SourceStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    pub fn success(source: impl Into<String>, stats: SourceStats) -> Self {
        Self {
            source: source.into(),
            ok: true,
            stats,
            error: None,
        }
    }

    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ok: false,
            stats: SourceStats::default(),
            error: Some(error.into()),
        }
    }
}

/// Summary of one full ingestion cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    pub sources: Vec<SourceReport>,
    /// True when at least one source pass succeeded. A skipped cycle is not
    /// a success.
    pub success: bool,
}

impl CycleReport {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: true,
            reason: Some(reason),
            sources: Vec::new(),
            success: false,
        }
    }

    pub fn completed(sources: Vec<SourceReport>) -> Self {
        let success = sources.iter().any(|s| s.ok);
        Self {
            skipped: false,
            reason: None,
            sources,
            success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_processed_total() {
        let mut stats = SourceStats::default();
        stats.record_inserted();
        stats.record_duplicate();
        stats.record_duplicate();
        stats.record_skipped();
        stats.record_error();
        assert_eq!(stats.processed, 5);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn cycle_success_requires_one_ok_source() {
        let all_failed = CycleReport::completed(vec![
            SourceReport::failed("live_search", "timeout"),
            SourceReport::failed("gdacs", "http 503"),
        ]);
        assert!(!all_failed.success);

        let one_ok = CycleReport::completed(vec![
            SourceReport::failed("live_search", "timeout"),
            SourceReport::success("gdacs", SourceStats::default()),
        ]);
        assert!(one_ok.success);
    }

    #[test]
    fn skip_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SkipReason::Disabled).unwrap(),
            "\"disabled\""
        );
        assert_eq!(
            serde_json::to_string(&SkipReason::Cooldown).unwrap(),
            "\"cooldown\""
        );
        let report = CycleReport::skipped(SkipReason::Cooldown);
        assert!(report.skipped);
        assert!(!report.success);
    }
}
