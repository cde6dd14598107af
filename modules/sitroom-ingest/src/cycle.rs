//! Cycle runner. One cycle: claim the run slot, sweep every active mission
//! through live search (or a default watchlist when no missions exist), then
//! take a GDACS pass. Sources run sequentially so one slow upstream cannot
//! starve the database pool, and every source is fenced with a timeout so the
//! cycle always terminates.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{sleep, timeout, Instant};
use tracing::{info, warn};

use sitroom_common::Mission;

use crate::adapters::{GdacsAdapter, LiveSearchAdapter};
use crate::stats::{CycleReport, SkipReason, SourceReport};
use crate::traits::IncidentStore;

/// Watchlist used when no missions are active, so a freshly provisioned
/// system still surfaces breaking incidents.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "breaking military",
    "explosion attack",
    "infrastructure failure",
    "cyber attack",
    "protest riot",
];

pub struct CycleRunner {
    store: Arc<dyn IncidentStore>,
    live_search: Arc<LiveSearchAdapter>,
    gdacs: Arc<GdacsAdapter>,
    cooldown_secs: u64,
    pacing: Duration,
    mission_timeout: Duration,
    deadline: Duration,
}

impl CycleRunner {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        live_search: Arc<LiveSearchAdapter>,
        gdacs: Arc<GdacsAdapter>,
        cooldown_secs: u64,
        pacing: Duration,
        mission_timeout: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            live_search,
            gdacs,
            cooldown_secs,
            pacing,
            mission_timeout,
            deadline,
        }
    }

    /// Run one ingestion cycle. `force` bypasses the enabled switch and the
    /// cooldown, but still stamps `last_run_at` so the next scheduled cycle
    /// respects its cooldown against this run.
    pub async fn run_cycle(&self, force: bool) -> Result<CycleReport> {
        let status = self.store.ingestion_status().await?;
        if !status.enabled && !force {
            info!("Ingestion disabled, skipping cycle");
            return Ok(CycleReport::skipped(SkipReason::Disabled));
        }

        if force {
            self.store.touch_last_run().await?;
        } else if !self.store.try_claim_run(self.cooldown_secs).await? {
            info!(cooldown_secs = self.cooldown_secs, "Cooldown active, skipping cycle");
            return Ok(CycleReport::skipped(SkipReason::Cooldown));
        }

        let started = Instant::now();
        let missions = self.store.active_missions().await?;
        info!(missions = missions.len(), force, "Cycle started");

        let mut sources = Vec::new();
        if missions.is_empty() {
            sources.push(self.default_watchlist_pass().await);
        } else {
            self.mission_passes(&missions, started, &mut sources).await;
        }

        // The feed pass runs even when mission sweeps exhausted the deadline;
        // it is cheap and bounded by its own timeout.
        sources.push(self.gdacs_pass().await);

        let report = CycleReport::completed(sources);
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            sources = report.sources.len(),
            success = report.success,
            "Cycle finished"
        );
        Ok(report)
    }

    async fn mission_passes(
        &self,
        missions: &[Mission],
        started: Instant,
        sources: &mut Vec<SourceReport>,
    ) {
        for (i, mission) in missions.iter().enumerate() {
            if started.elapsed() >= self.deadline {
                warn!(
                    remaining = missions.len() - i,
                    "Cycle deadline reached, deferring remaining missions"
                );
                break;
            }
            if i > 0 {
                sleep(self.pacing).await;
            }

            let name = format!("live_search:{}", mission.name);
            let pass = timeout(
                self.mission_timeout,
                self.live_search.run(&mission.keywords, Some(mission.id)),
            )
            .await;
            sources.push(match pass {
                Ok(Ok(stats)) => SourceReport::success(&name, stats),
                Ok(Err(e)) => {
                    warn!(mission = mission.name.as_str(), error = %e, "Mission pass failed");
                    SourceReport::failed(&name, e.to_string())
                }
                Err(_) => {
                    warn!(mission = mission.name.as_str(), "Mission pass timed out");
                    SourceReport::failed(&name, "timed out")
                }
            });
        }
    }

    async fn default_watchlist_pass(&self) -> SourceReport {
        let keywords: Vec<String> = DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect();
        let name = "live_search:default";
        match timeout(self.mission_timeout, self.live_search.run(&keywords, None)).await {
            Ok(Ok(stats)) => SourceReport::success(name, stats),
            Ok(Err(e)) => {
                warn!(error = %e, "Default watchlist pass failed");
                SourceReport::failed(name, e.to_string())
            }
            Err(_) => SourceReport::failed(name, "timed out"),
        }
    }

    async fn gdacs_pass(&self) -> SourceReport {
        match timeout(self.mission_timeout, self.gdacs.run()).await {
            Ok(Ok(stats)) => SourceReport::success("gdacs", stats),
            Ok(Err(e)) => {
                warn!(error = %e, "GDACS pass failed");
                SourceReport::failed("gdacs", e.to_string())
            }
            Err(_) => SourceReport::failed("gdacs", "timed out"),
        }
    }
}
