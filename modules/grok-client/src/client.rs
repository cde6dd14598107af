use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::types::*;

const XAI_API_URL: &str = "https://api.x.ai/v1";
const XAI_MODEL: &str = "grok-4-1-fast-non-reasoning";
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum GrokError {
    #[error("Grok API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("Grok returned malformed structured output: {0}")]
    Malformed(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Client for the xAI API. Covers the two calls the pipeline consumes:
/// free-text incident classification and X.com live search. Both use strict
/// JSON-schema structured outputs; both carry a bounded request timeout.
#[derive(Clone)]
pub struct GrokClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl GrokClient {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build Grok HTTP client");
        Self {
            api_key: api_key.to_string(),
            http,
            base_url: XAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, GrokError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| GrokError::Malformed(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Classify a free-text report into a structured incident analysis.
    /// Fails loudly on non-2xx and on schema-violating payloads; the caller
    /// owns retry/fallback policy.
    pub async fn classify(&self, text: &str) -> Result<IncidentAnalysis, GrokError> {
        let schema = serde_json::to_value(schemars::schema_for!(IncidentAnalysis))
            .map_err(|e| GrokError::Malformed(e.to_string()))?;

        let request = ChatRequest {
            model: XAI_MODEL.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a tactical intelligence analyst. Extract incident data \
                              from the provided report. Create a concise, high-impact headline \
                              (max 60 chars)."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: text.to_string(),
                },
            ],
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "incident_analysis",
                    "strict": true,
                    "schema": schema,
                }
            }),
        };

        debug!(chars = text.len(), "Grok classify request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GrokError::Api { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| GrokError::Malformed("empty choices array".to_string()))?;

        serde_json::from_str(strip_fences(content))
            .map_err(|e| GrokError::Malformed(format!("{e}: {content}")))
    }

    /// Run one live search over X.com for recent incidents matching the
    /// keywords. Empty `incidents` is a valid non-error result.
    pub async fn live_search(
        &self,
        keywords: &[String],
        window_hours: u32,
    ) -> Result<LiveSearchReport, GrokError> {
        let schema = serde_json::to_value(schemars::schema_for!(LiveSearchReport))
            .map_err(|e| GrokError::Malformed(e.to_string()))?;

        let prompt = format!(
            "MISSION: Search X.com for the 5 most significant REAL-WORLD tactical breaking \
             news events related to: {} from the last {} hours. Return pure JSON.",
            keywords.join(", "),
            window_hours
        );

        let request = ResponsesRequest {
            model: XAI_MODEL.to_string(),
            tools: vec![json!({"type": "x_search"})],
            input: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            text: json!({
                "format": {
                    "type": "json_schema",
                    "name": "intel_report",
                    "schema": schema,
                    "strict": true,
                }
            }),
        };

        debug!(keywords = keywords.len(), window_hours, "Grok live search request");

        let response = self
            .http
            .post(format!("{}/responses", self.base_url))
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GrokError::Api { status, body });
        }

        let parsed: ResponsesOutput = response.json().await?;
        let text = parsed
            .output
            .last()
            .and_then(|o| o.content.first())
            .and_then(|c| c.text.as_deref());

        match text {
            Some(raw) => serde_json::from_str(strip_fences(raw))
                .map_err(|e| GrokError::Malformed(format!("{e}: {raw}"))),
            // No text block at all — treat as an empty result, not an error.
            None => Ok(LiveSearchReport::default()),
        }
    }
}

/// Models occasionally wrap structured output in markdown code fences
/// despite the schema contract.
fn strip_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
