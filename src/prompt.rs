use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PilotConfig;

// --- Request/Response types ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    pub threshold: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTypeEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metrics: Vec<MetricEntry>,
}

/// AI-suggested performance test plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    pub test_types: Vec<TestTypeEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestPlanRequest {
    pub specification: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateScriptRequest {
    pub specification: String,
    pub test_plan: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub script: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt service is not configured: {0}")]
    NotConfigured(String),

    #[error("Prompt request failed: {0}")]
    Transport(reqwest::Error),

    #[error("Prompt service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Prompt service returned malformed output: {0}")]
    MalformedOutput(String),
}

impl From<reqwest::Error> for PromptError {
    /// The request URL is dropped so it never reaches logs.
    fn from(e: reqwest::Error) -> Self {
        PromptError::Transport(e.without_url())
    }
}

/// The two prompt flows the wizard drives.
#[async_trait]
pub trait PromptService: Send + Sync {
    async fn suggest_test_plan(&self, request: SuggestPlanRequest) -> Result<TestPlan, PromptError>;

    async fn generate_script(
        &self,
        request: GenerateScriptRequest,
    ) -> Result<GeneratedScript, PromptError>;
}

// --- Prompt templates ---

pub fn build_suggest_plan_prompt(request: &SuggestPlanRequest) -> String {
    format!(
        r#"You are a senior performance testing consultant.

Read the Swagger/OpenAPI document below and propose a performance test plan for it.
Pick the test types that fit this API (for example load, stress, spike, soak) and give
each one SLI/SLO metrics with concrete thresholds.

## API Specification
{specification}

Respond with ONLY valid JSON (no markdown fences, no extra text):
{{"test_types": [{{"name": "...", "description": "...", "metrics": [{{"name": "...", "threshold": "...", "description": "..."}}]}}]}}"#,
        specification = request.specification,
    )
}

pub fn build_generate_script_prompt(request: &GenerateScriptRequest) -> String {
    format!(
        r#"You are a performance engineer who writes k6 test scripts.

Write a complete k6 script that automates the test plan below against the API it
describes. Include options, setup/teardown where useful, checks, and thresholds that
encode the plan's metrics.

## API Definition
```
{specification}
```

## Test Plan
```
{test_plan}
```

Respond with ONLY valid JSON (no markdown fences, no extra text):
{{"script": "<the k6 script source>"}}"#,
        specification = request.specification,
        test_plan = request.test_plan,
    )
}

/// Parse the model's JSON output, tolerating prose or fences around it.
pub fn parse_structured_output<T: DeserializeOwned>(raw: &str) -> Result<T, PromptError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<T>(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    warn!(
        "Failed to parse prompt output: {}",
        &trimmed[..floor_char_boundary(trimmed, 200)]
    );
    Err(PromptError::MalformedOutput(format!(
        "response starts with: {}",
        &trimmed[..floor_char_boundary(trimmed, 100)]
    )))
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

// --- Gemini-backed implementation ---

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GenerateContentBody {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Calls a Gemini `generateContent` endpoint with JSON output enabled.
pub struct GeminiPromptService {
    client: reqwest::Client,
    api_base: String,
    model_id: String,
    api_key: Option<String>,
}

impl GeminiPromptService {
    pub fn new(config: &PilotConfig) -> Result<Self, PromptError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            model_id: config.model_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model_id)
    }

    async fn complete(&self, prompt: String) -> Result<String, PromptError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PromptError::NotConfigured("no API key set".to_string()))?;

        let body = GenerateContentBody {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!("Calling prompt service model {}", self.model_id);
        let resp = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PromptError::Status { status, body });
        }

        let parsed: GenerateContentResponse = resp.json().await?;
        extract_candidate_text(parsed)
    }
}

fn extract_candidate_text(resp: GenerateContentResponse) -> Result<String, PromptError> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(PromptError::MalformedOutput("empty candidate".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl PromptService for GeminiPromptService {
    async fn suggest_test_plan(&self, request: SuggestPlanRequest) -> Result<TestPlan, PromptError> {
        info!(
            "Requesting test plan suggestion ({} chars of specification)",
            request.specification.len()
        );
        let raw = self.complete(build_suggest_plan_prompt(&request)).await?;
        parse_structured_output(&raw)
    }

    async fn generate_script(
        &self,
        request: GenerateScriptRequest,
    ) -> Result<GeneratedScript, PromptError> {
        info!(
            "Requesting k6 script generation ({} chars of plan)",
            request.test_plan.len()
        );
        let raw = self.complete(build_generate_script_prompt(&request)).await?;
        parse_structured_output(&raw)
    }
}
