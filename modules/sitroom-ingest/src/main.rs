//! Cycle trigger binary. Invoked by an external scheduler (cron, systemd
//! timer); all cross-invocation state lives in Postgres, so overlapping
//! triggers degrade to cooldown skips rather than duplicate work.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sitroom_common::Config;
use sitroom_ingest::adapters::{GdacsAdapter, HttpFeedFetcher, LiveSearchAdapter};
use sitroom_ingest::engine::{DedupEngine, EvidencePolicy};
use sitroom_ingest::CycleRunner;
use sitroom_store::{migrate, PgStore};

#[derive(Parser, Debug)]
#[command(name = "sitroom-ingest", about = "Run one incident ingestion cycle")]
struct Args {
    /// Bypass the enabled switch and cooldown for this run.
    #[arg(long)]
    force: bool,

    /// Turn scheduled ingestion on and exit without running a cycle.
    #[arg(long, conflicts_with_all = ["disable", "force"])]
    enable: bool,

    /// Turn scheduled ingestion off and exit without running a cycle.
    #[arg(long, conflicts_with = "enable")]
    disable: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sitroom=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let store = PgStore::connect(&config.database_url).await?;
    migrate(store.pool()).await?;

    if args.enable || args.disable {
        store.set_enabled(args.enable).await?;
        info!(enabled = args.enable, "Ingestion switch updated");
        return Ok(());
    }

    let grok = Arc::new(grok_client::GrokClient::new(&config.xai_api_key));
    let policy = if config.append_duplicate_evidence {
        EvidencePolicy::AppendOnDuplicate
    } else {
        EvidencePolicy::CreateOnly
    };
    let engine = Arc::new(DedupEngine::with_policy(Arc::new(store.clone()), policy));

    let live_search = Arc::new(LiveSearchAdapter::new(
        grok.clone(),
        engine.clone(),
        config.search_window_hours,
    ));
    let gdacs = Arc::new(GdacsAdapter::new(
        Arc::new(HttpFeedFetcher::new()?),
        grok,
        engine,
        config.gdacs_feed_url.clone(),
        config.gdacs_max_items,
    ));

    let runner = CycleRunner::new(
        Arc::new(store),
        live_search,
        gdacs,
        config.cooldown_secs,
        Duration::from_secs(config.mission_pacing_secs),
        Duration::from_secs(config.mission_timeout_secs),
        Duration::from_secs(config.cycle_deadline_secs),
    );

    let report = runner.run_cycle(args.force).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.skipped && !report.success {
        anyhow::bail!("all sources failed");
    }
    Ok(())
}
