use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Everything the summarizer needs to know about one finished batch
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest {
    pub session_id: String,
    pub agent_label: String,
    pub prompt_text: String,
    pub is_session_end: bool,
    pub activities: Vec<SummaryActivity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryActivity {
    pub tool_name: String,
    pub file_path: Option<String>,
    pub output_excerpt: String,
    pub success: bool,
}

/// Structured response contract. The prompt instructs the model to answer
/// with exactly this shape; anything else is a malformed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub classification: String,
    #[serde(default)]
    pub observations: Vec<ExtractedObservation>,
    #[serde(default)]
    pub response_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedObservation {
    pub memory_type: String,
    pub observation_text: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: f64,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<BatchSummary>;
}

/// HTTP client for an Ollama-compatible generation endpoint
/// (`POST <base>/api/generate` with `format: "json"`).
pub struct HttpSummarizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl HttpSummarizer {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn build_prompt(request: &SummaryRequest) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "You observe an AI coding agent working in a project. Summarize what it did \
             while answering one user prompt, and extract durable project knowledge.\n\n",
        );
        prompt.push_str(&format!("User prompt: {}\n", request.prompt_text));
        prompt.push_str(&format!("Agent: {}\n", request.agent_label));
        prompt.push_str("Tool activity:\n");
        for activity in &request.activities {
            prompt.push_str(&format!(
                "- {} {} {} {}\n",
                activity.tool_name,
                activity.file_path.as_deref().unwrap_or("-"),
                if activity.success { "ok" } else { "FAILED" },
                activity.output_excerpt,
            ));
        }
        prompt.push_str(
            "\nRespond with JSON only, shaped as:\n\
             {\"classification\": \"feature|exploration|bug_fix|refactor|unknown\",\n \
             \"observations\": [{\"memory_type\": \"gotcha|bug_fix|decision|discovery|trade_off\",\n  \
             \"observation_text\": \"...\", \"file_path\": null, \"tags\": [], \"confidence\": 0.0}],\n \
             \"response_summary\": null}\n\
             Only include observations worth remembering across sessions.\n",
        );
        if request.is_session_end {
            prompt.push_str(
                "This batch ends the session: set response_summary to a short account of \
                 what the session accomplished.\n",
            );
        }
        prompt
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<BatchSummary> {
        let prompt = Self::build_prompt(request);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "format": "json",
                "stream": false,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body: oak_types::excerpt(&body, 200).to_string(),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| Error::MalformedResponse(err.to_string()))?;

        serde_json::from_str(&parsed.response)
            .map_err(|err| Error::MalformedResponse(format!("summary payload: {}", err)))
    }
}
