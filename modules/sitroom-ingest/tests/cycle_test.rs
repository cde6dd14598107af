//! End-to-end cycle tests over in-memory fakes: switch and cooldown gating,
//! mission sweeps, the default watchlist, and failure accounting.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use sitroom_ingest::adapters::{GdacsAdapter, LiveSearchAdapter};
use sitroom_ingest::engine::DedupEngine;
use sitroom_ingest::stats::SkipReason;
use sitroom_ingest::testing::{
    live_incident, mission, MemoryStore, MockClassifier, MockFeed, MockSearcher, GDACS_FIXTURE,
};
use sitroom_ingest::CycleRunner;

struct Fixture {
    store: Arc<MemoryStore>,
    searcher: Arc<MockSearcher>,
    classifier: Arc<MockClassifier>,
    feed: Arc<MockFeed>,
}

impl Fixture {
    fn new(store: MemoryStore) -> Self {
        Self {
            store: Arc::new(store),
            searcher: Arc::new(MockSearcher::with_incidents(vec![live_incident(
                "Convoy ambush on highway",
            )])),
            classifier: Arc::new(MockClassifier::new()),
            feed: Arc::new(MockFeed::with_body(GDACS_FIXTURE)),
        }
    }

    fn with_searcher(mut self, searcher: MockSearcher) -> Self {
        self.searcher = Arc::new(searcher);
        self
    }

    fn with_feed(mut self, feed: MockFeed) -> Self {
        self.feed = Arc::new(feed);
        self
    }

    fn runner(&self) -> CycleRunner {
        self.runner_with_deadline(Duration::from_secs(300))
    }

    fn runner_with_deadline(&self, deadline: Duration) -> CycleRunner {
        let engine = Arc::new(DedupEngine::new(self.store.clone()));
        let live_search = Arc::new(LiveSearchAdapter::new(self.searcher.clone(), engine.clone(), 2));
        let gdacs = Arc::new(GdacsAdapter::new(
            self.feed.clone(),
            self.classifier.clone(),
            engine,
            "https://gdacs.example/rss.xml",
            10,
        ));
        CycleRunner::new(
            self.store.clone(),
            live_search,
            gdacs,
            60,
            Duration::ZERO,
            Duration::from_secs(5),
            deadline,
        )
    }
}

#[tokio::test]
async fn disabled_switch_skips_without_touching_sources() {
    let fx = Fixture::new(MemoryStore::disabled());
    let report = fx.runner().run_cycle(false).await.unwrap();

    assert!(report.skipped);
    assert_eq!(report.reason, Some(SkipReason::Disabled));
    assert!(!report.success);
    assert!(report.sources.is_empty());
    assert_eq!(fx.searcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.feed.calls.load(Ordering::SeqCst), 0);
    assert!(!fx.store.last_run_at_set());
}

#[tokio::test]
async fn force_overrides_disabled_switch_and_stamps_last_run() {
    let fx = Fixture::new(MemoryStore::disabled());
    let report = fx.runner().run_cycle(true).await.unwrap();

    assert!(!report.skipped);
    assert!(report.success);
    // No missions: one default watchlist pass plus the feed pass.
    assert_eq!(report.sources.len(), 2);
    assert!(fx.store.last_run_at_set());
}

#[tokio::test]
async fn second_cycle_within_cooldown_is_skipped() {
    let fx = Fixture::new(MemoryStore::new());

    let first = fx.runner().run_cycle(false).await.unwrap();
    assert!(!first.skipped);

    let second = fx.runner().run_cycle(false).await.unwrap();
    assert!(second.skipped);
    assert_eq!(second.reason, Some(SkipReason::Cooldown));

    // Sources ran exactly once.
    assert_eq!(fx.searcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.feed.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_missions_falls_back_to_default_watchlist() {
    let fx = Fixture::new(MemoryStore::new());
    let report = fx.runner().run_cycle(false).await.unwrap();

    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.sources[0].source, "live_search:default");
    assert_eq!(report.sources[1].source, "gdacs");
    assert_eq!(fx.searcher.calls.load(Ordering::SeqCst), 1);

    // The watchlist pass is untagged.
    let key_incident = fx
        .store
        .incident_by_key(&sitroom_ingest::adapters::live_search::live_search_key(
            &live_incident("Convoy ambush on highway"),
        ))
        .unwrap();
    assert!(key_incident.tags.is_empty());
}

#[tokio::test]
async fn each_active_mission_gets_a_tagged_pass() {
    let m1 = mission("border-watch", &["border crossing", "checkpoint"]);
    let m2 = mission("port-security", &["port", "harbor"]);
    let m1_id = m1.id;
    let fx = Fixture::new(MemoryStore::with_missions(vec![m1, m2]));

    let report = fx.runner().run_cycle(false).await.unwrap();

    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.sources[0].source, "live_search:border-watch");
    assert_eq!(report.sources[1].source, "live_search:port-security");
    assert_eq!(report.sources[2].source, "gdacs");
    assert_eq!(fx.searcher.calls.load(Ordering::SeqCst), 2);

    // Both missions surfaced the same incident; tags accumulated across
    // the duplicate fold.
    let incident = fx
        .store
        .incident_by_key(&sitroom_ingest::adapters::live_search::live_search_key(
            &live_incident("Convoy ambush on highway"),
        ))
        .unwrap();
    assert_eq!(incident.tags.len(), 2);
    assert!(incident.tags.contains(&format!("mission:{m1_id}")));
    assert_eq!(report.sources[0].stats.inserted, 1);
    assert_eq!(report.sources[1].stats.duplicates, 1);
}

#[tokio::test]
async fn exhausted_deadline_defers_missions_but_still_runs_feed() {
    let fx = Fixture::new(MemoryStore::with_missions(vec![mission(
        "border-watch",
        &["border"],
    )]));

    let report = fx
        .runner_with_deadline(Duration::ZERO)
        .run_cycle(false)
        .await
        .unwrap();

    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].source, "gdacs");
    assert_eq!(fx.searcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.feed.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn one_failing_source_does_not_fail_the_cycle() {
    let fx = Fixture::new(MemoryStore::new()).with_searcher(MockSearcher::failing());
    let report = fx.runner().run_cycle(false).await.unwrap();

    assert!(report.success);
    assert!(!report.sources[0].ok);
    assert!(report.sources[1].ok);
}

#[tokio::test]
async fn all_sources_failing_fails_the_cycle() {
    let fx = Fixture::new(MemoryStore::new())
        .with_searcher(MockSearcher::failing())
        .with_feed(MockFeed::failing());
    let report = fx.runner().run_cycle(false).await.unwrap();

    assert!(!report.skipped);
    assert!(!report.success);
    assert!(report.sources.iter().all(|s| !s.ok));
    assert!(report.sources.iter().all(|s| s.error.is_some()));
}

#[tokio::test]
async fn feed_items_persist_through_full_cycle() {
    let fx = Fixture::new(MemoryStore::new());
    let report = fx.runner().run_cycle(false).await.unwrap();

    let gdacs = report.sources.iter().find(|s| s.source == "gdacs").unwrap();
    assert_eq!(gdacs.stats.inserted, 3);
    assert_eq!(gdacs.stats.skipped, 1);
    assert!(fx.store.incident_by_key("gdacs:guid:EQ-1442341").is_some());
}
