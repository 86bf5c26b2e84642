//! Narrative generation through the Gemini `generateContent` API.
//!
//! Prompt assembly is kept in pure functions so it can be tested without a
//! live service; [`GeminiClient`] only moves text over HTTP.

use std::path::Path;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use recruitreport_shared::{GeminiConfig, ReportError, Result};

use crate::analyzer::AnalysisContext;

/// Report characters sent to the summary prompt.
pub const SUMMARY_INPUT_CHARS: usize = 4000;

/// User-Agent string for Gemini requests.
const USER_AGENT: &str = concat!("recruitreport/", env!("CARGO_PKG_VERSION"));

/// Built-in report template, used when no template file is present.
pub const DEFAULT_TEMPLATE: &str = r#"You are a data analyst for a recruitment platform.

## Terminology
- pass_cnt = number of document-screening passes (NOT hires)
- hire_cnt = number of final hires
- new_com_accept = new company sign-ups
- recruit_fee = commission revenue

## Data sources
- Hire-basis detail: "people hired in this month" -> Part A, performance analysis
- Application-basis detail: "people who applied in this month" -> Part B, pipeline forecast

## Report structure
### Part A. Performance (hire basis)
1. Executive Summary
2. Monthly KPI trend
3. Revenue structure
4. Hire analysis (by job category, company size, lead time)
5. Performance assessment

### Part B. Pipeline (application basis)
6. Application status
7. Funnel conversion analysis
8. Next-month forecast

### Shared
9. Risks & opportunities
10. Action items

## Caveats
- Job-category totals must reconcile with hire_cnt in the monthly table
- Fold categories outside the top 10 into "Other" and state what it contains
- Show null categories as "Unclassified"

Write the report in Markdown."#;

/// Sampling settings for one request. `None` fields are left to the service.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationSettings {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationSettings {
    /// Full report: long output, low temperature.
    pub const REPORT: Self = Self {
        max_output_tokens: Some(8000),
        temperature: Some(0.3),
    };
}

/// Generated markdown report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report(String);

impl Report {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self(markdown.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Read the template at `path`, falling back to [`DEFAULT_TEMPLATE`] when the
/// file does not exist.
pub fn load_template(path: &Path) -> Result<String> {
    if !path.exists() {
        debug!(path = %path.display(), "prompt template not found, using built-in template");
        return Ok(DEFAULT_TEMPLATE.to_string());
    }
    std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))
}

pub fn build_report_prompt(template: &str, context: &AnalysisContext) -> String {
    format!("{template}\n\n## Analysis Data\n{context}")
}

/// Summary prompt over the first [`SUMMARY_INPUT_CHARS`] characters of `report`.
pub fn build_summary_prompt(report: &Report) -> String {
    let excerpt: String = report.as_str().chars().take(SUMMARY_INPUT_CHARS).collect();
    format!(
        "Extract an Executive Summary for sharing in Slack from the report below.

[Format]
*Key results*
• Total sales: ₩XX.X억 (±X.X% MoM)
• Hires: XXX (±X.X% MoM)
• New companies: XXX (±X.X% MoM)

*⚠️ Alert* (1-2 items)
*📈 Opportunity* (1-2 items)

---
Report:
{excerpt}
"
    )
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl GenerationConfig {
    fn from_settings(settings: GenerationSettings) -> Option<Self> {
        if settings == GenerationSettings::default() {
            return None;
        }
        Some(Self {
            max_output_tokens: settings.max_output_tokens,
            temperature: settings.temperature,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Pull the text of the first candidate out of a response.
fn response_text(response: GenerateResponse) -> Result<String> {
    let blocked = response
        .prompt_feedback
        .and_then(|f| f.block_reason);
    if let Some(reason) = blocked {
        return Err(ReportError::GenerationFailed(format!("prompt blocked: {reason}")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ReportError::GenerationFailed("response has no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(ReportError::GenerationFailed(format!(
            "empty response (finish reason: {reason})"
        )));
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// API-key client for one model.
pub struct GeminiClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ReportError::GenerationFailed("GEMINI_API_KEY is not set".into()))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                ReportError::GenerationFailed(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.trim_start_matches("models/").to_string(),
        })
    }

    /// Send one single-turn prompt and return the response text.
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: &str, settings: GenerationSettings) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig::from_settings(settings),
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.api_base, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReportError::GenerationFailed(format!("generateContent: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "generation request rejected");
            return Err(ReportError::GenerationFailed(format!(
                "generateContent: HTTP {status}: {body}"
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ReportError::GenerationFailed(format!("generateContent: invalid response body: {e}"))
        })?;

        let text = response_text(parsed)?;
        debug!(len = text.len(), "generation complete");
        Ok(text)
    }
}

/// Report and summary generation over a loaded template.
pub struct ReportGenerator {
    gemini: GeminiClient,
    template: String,
}

impl ReportGenerator {
    pub fn new(gemini: GeminiClient, template: String) -> Self {
        Self { gemini, template }
    }

    pub async fn generate_report(&self, context: &AnalysisContext) -> Result<Report> {
        let prompt = build_report_prompt(&self.template, context);
        let text = self.gemini.generate(&prompt, GenerationSettings::REPORT).await?;
        info!(len = text.len(), "report generated");
        Ok(Report(text))
    }

    pub async fn generate_summary(&self, report: &Report) -> Result<String> {
        let prompt = build_summary_prompt(report);
        self.gemini
            .generate(&prompt, GenerationSettings::default())
            .await
    }
}
