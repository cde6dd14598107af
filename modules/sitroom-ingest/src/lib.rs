pub mod adapters;
pub mod cycle;
pub mod engine;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use cycle::CycleRunner;
pub use engine::{DedupEngine, EvidencePolicy, PersistOutcome};
pub use stats::{CycleReport, SkipReason, SourceReport, SourceStats};
