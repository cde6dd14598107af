use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Classification ---

/// Fixed incident taxonomy used by the classifier's structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Category {
    #[serde(rename = "Force Protection")]
    ForceProtection,
    #[serde(rename = "Diplomatic Security")]
    DiplomaticSecurity,
    Infrastructure,
    #[serde(rename = "Natural Disaster")]
    NaturalDisaster,
    #[serde(rename = "Law Enforcement")]
    LawEnforcement,
    #[serde(rename = "Civil Unrest")]
    CivilUnrest,
    Cyber,
    Military,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::ForceProtection => write!(f, "Force Protection"),
            Category::DiplomaticSecurity => write!(f, "Diplomatic Security"),
            Category::Infrastructure => write!(f, "Infrastructure"),
            Category::NaturalDisaster => write!(f, "Natural Disaster"),
            Category::LawEnforcement => write!(f, "Law Enforcement"),
            Category::CivilUnrest => write!(f, "Civil Unrest"),
            Category::Cyber => write!(f, "Cyber"),
            Category::Military => write!(f, "Military"),
        }
    }
}

/// Structured classification of one free-text report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct IncidentAnalysis {
    /// Concise, high-impact headline (max 60 chars intent).
    pub headline: String,
    pub category: Category,
    #[schemars(range(min = 1, max = 5))]
    pub severity: i32,
    /// Tactical summary suitable as the incident description.
    pub summary: String,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
}

// --- Live search ---

/// One social post backing a live-search incident.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourcePost {
    pub author: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// One self-describing incident from the live-search response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LiveIncident {
    pub title: String,
    pub description: String,
    #[schemars(range(min = 1, max = 5))]
    pub severity: i32,
    pub category: String,
    pub confidence: f64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    pub source_posts: Vec<SourcePost>,
    /// Upstream-supplied dedup key. The adapter derives one from content when
    /// this is absent or empty.
    #[serde(default)]
    pub dedup_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchMetadata {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub posts_analyzed: Option<u32>,
}

/// Full live-search result. An empty `incidents` list is a valid,
/// non-error outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LiveSearchReport {
    #[serde(default)]
    pub incidents: Vec<LiveIncident>,
    #[serde(default)]
    pub search_metadata: SearchMetadata,
}

// --- Wire types (chat completions) ---

#[derive(Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub response_format: serde_json::Value,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponseMessage {
    pub content: String,
}

// --- Wire types (responses API, used for x_search) ---

#[derive(Serialize)]
pub(crate) struct ResponsesRequest {
    pub model: String,
    pub tools: Vec<serde_json::Value>,
    pub input: Vec<ChatMessage>,
    pub text: serde_json::Value,
}

#[derive(Deserialize)]
pub(crate) struct ResponsesOutput {
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Deserialize)]
pub(crate) struct OutputItem {
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

#[derive(Deserialize)]
pub(crate) struct OutputContent {
    #[serde(default)]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_with_spaces() {
        let json = serde_json::to_string(&Category::ForceProtection).unwrap();
        assert_eq!(json, "\"Force Protection\"");
        let back: Category = serde_json::from_str("\"Natural Disaster\"").unwrap();
        assert_eq!(back, Category::NaturalDisaster);
    }

    #[test]
    fn live_report_tolerates_missing_optionals() {
        let raw = r#"{
            "incidents": [{
                "title": "Bridge collapse",
                "description": "Major bridge down",
                "severity": 4,
                "category": "Infrastructure",
                "confidence": 0.9,
                "source_posts": [{"author": "w", "content": "saw it", "timestamp": "now"}]
            }]
        }"#;
        let report: LiveSearchReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.incidents.len(), 1);
        let inc = &report.incidents[0];
        assert!(inc.lat.is_none());
        assert!(inc.dedup_key.is_none());
        assert!(inc.source_posts[0].url.is_none());
    }

    #[test]
    fn empty_incident_list_is_valid() {
        let report: LiveSearchReport = serde_json::from_str(r#"{"incidents": []}"#).unwrap();
        assert!(report.incidents.is_empty());
    }
}
