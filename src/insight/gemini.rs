use crate::config::GeminiConfig;
use crate::insight::InsightEngine;
use crate::insight::prompt::build_prompt;
use crate::model::{AnalysisQuery, InsightError, InsightResult, TransactionSet};
use crate::utils::truncate_chars;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const ENGINE_NAME: &str = "Gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Shape the model is asked to answer in.
#[derive(Debug, Deserialize)]
struct ModelAnswer {
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default, alias = "keyInsights")]
    key_insights: Vec<String>,
}

impl ModelAnswer {
    fn plain(text: &str) -> Self {
        Self {
            analysis: text.to_string(),
            recommendations: Vec::new(),
            key_insights: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.analysis.trim().is_empty() && self.recommendations.is_empty() && self.key_insights.is_empty()
    }
}

/// Google Gemini `generateContent` client.
pub struct GeminiEngine {
    client: Client,
    config: GeminiConfig,
    label: String,
}

impl GeminiEngine {
    pub fn new(config: GeminiConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("gpay-analyzer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        let label = format!("{} ({})", ENGINE_NAME, config.model);
        Ok(Self { client, config, label })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    async fn call(&self, prompt: String) -> Result<String, InsightError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(response.headers());
            warn!(?retry_after, "❌ Gemini rate limited the request");
            return Err(InsightError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown".into());
            warn!("❌ Gemini API responded [{}]: {}", status, truncate_chars(&body, 300));
            return Err(InsightError::Http {
                status: status.as_u16(),
                body: truncate_chars(&body, 1000),
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(map_transport_error)?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(InsightError::Blocked(reason));
        }

        let candidate = parsed.candidates.into_iter().next().ok_or(InsightError::EmptyResponse)?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_default();
            return match reason.as_str() {
                "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" => Err(InsightError::Blocked(reason.clone())),
                _ => Err(InsightError::EmptyResponse),
            };
        }

        Ok(text)
    }
}

#[async_trait::async_trait]
impl InsightEngine for GeminiEngine {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(
        &self,
        transactions: &TransactionSet,
        query: &AnalysisQuery,
    ) -> Result<InsightResult, InsightError> {
        let prompt = build_prompt(transactions, query);
        info!("📤 Sending {} transactions to {}", transactions.len(), self.label);

        let text = self.call(prompt).await?;
        let answer = decode_answer(&text);

        Ok(InsightResult {
            summary: format!(
                "Analyzed {} transactions for {} period",
                transactions.len(),
                query.timeframe
            ),
            analysis: answer.analysis,
            recommendations: answer.recommendations,
            key_insights: answer.key_insights,
            total_transactions: transactions.len(),
            ai_engine: self.label.clone(),
        })
    }
}

fn map_transport_error(e: reqwest::Error) -> InsightError {
    if e.is_timeout() {
        InsightError::Timeout
    } else if e.is_connect() {
        InsightError::Unreachable(e.to_string())
    } else {
        InsightError::Request(e.to_string())
    }
}

/// Seconds from a `Retry-After` header, capped. HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// Reads the model's JSON answer. Anything unparseable, or JSON that carries
/// none of the expected keys, is kept as plain analysis text.
fn decode_answer(text: &str) -> ModelAnswer {
    let raw = text.trim();
    match serde_json::from_str::<ModelAnswer>(strip_code_fence(raw)) {
        Ok(answer) if !answer.is_empty() => answer,
        Ok(_) => {
            warn!("Gemini answer did not follow the requested JSON shape, keeping it as text");
            ModelAnswer::plain(raw)
        }
        Err(_) => ModelAnswer::plain(raw),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
