//! Source adapters. Each adapter turns one intelligence source into
//! `CandidateReport`s and drives them through the dedup engine, accumulating
//! per-source counters as it goes.

pub mod gdacs;
pub mod live_search;
pub mod manual;

pub use gdacs::{GdacsAdapter, HttpFeedFetcher};
pub use live_search::LiveSearchAdapter;
pub use manual::{ManualAdapter, ManualSubmission};
