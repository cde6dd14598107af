mod client;
mod types;

pub use client::{GrokClient, GrokError};
pub use types::{
    Category, IncidentAnalysis, LiveIncident, LiveSearchReport, SearchMetadata, SourcePost,
};
