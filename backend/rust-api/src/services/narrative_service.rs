//! Narrative analysis of survey statistics by an OpenAI-compatible chat
//! completions endpoint.

use anyhow::{anyhow, Context};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::metrics::NARRATIVE_REQUESTS_TOTAL;
use crate::models::analytics::{NarrativeRequest, NarrativeResponse, QuestionAnalytics};
use crate::models::response::format_number;

const SYSTEM_PROMPT: &str = "You are a helpful, rigorous research analyst.";
const TEMPERATURE: f32 = 0.2;

const PROMPT_HEADER: &str = "You are a senior research analyst. Analyze the following survey. \n\
Provide: (1) executive summary, (2) key insights and trends, (3) statistically notable signals, \n\
(4) potential biases/limitations, (5) recommended actions and follow-up questions. \n\
Write clearly for non-technical stakeholders.";

const PROMPT_GUIDANCE: &str = "Guidance:\n\
- Call out significant differences or clusters in the distributions.\n\
- If numeric (rating/scale/nps), interpret averages & deviations.\n\
- If categorical, highlight top/bottom choices and notable gaps.\n\
- NPS and scale questions scale from 0-10, rating questions are from 1-5.\n\
- Be specific, concise, and actionable.\n\
- Return the response in markdown format";

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("Narrative analysis is not configured")]
    MissingApiKey,

    #[error("Failed to analyze survey")]
    Upstream(#[source] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn format_stat(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_else(|| "N/A".to_string())
}

fn question_block(out: &mut String, index: usize, q: &QuestionAnalytics) {
    let _ = write!(
        out,
        "\n  {}. \"{}\" \n     - Type: {}\n     - Total responses: {}\n     - Average: {}\n     - Std Dev: {}\n     - Distribution:\n",
        index + 1,
        q.question_title,
        q.question_type.as_str(),
        q.total_responses,
        format_stat(q.average),
        format_stat(q.standard_deviation),
    );

    if q.distribution.is_empty() {
        out.push_str("      - (no data)");
    } else {
        let lines: Vec<String> = q
            .ordered_distribution()
            .into_iter()
            .map(|(k, v)| format!("      - {}: {}", k, v))
            .collect();
        out.push_str(&lines.join("\n"));
    }
}

/// User prompt: survey meta, one block per question, then guidance.
pub fn build_prompt(req: &NarrativeRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(PROMPT_HEADER);
    prompt.push_str("\n\n");

    let _ = write!(
        prompt,
        "\nSurvey:\n- Title: {}\n- Name (user-provided): {}\n- Description: {}\n- Total responses: {}\n- Created at: {}\n",
        or_na(req.survey_title.as_deref()),
        or_na(req.name.as_deref()),
        or_na(req.survey_description.as_deref()),
        req.total_responses.unwrap_or(0),
        or_na(req.created_at.as_deref()),
    );

    prompt.push_str("\n\nQuestions & Distributions:\n");
    let questions = req.question_analytics.as_deref().unwrap_or_default();
    let mut blocks = Vec::with_capacity(questions.len());
    for (index, question) in questions.iter().enumerate() {
        let mut block = String::new();
        question_block(&mut block, index, question);
        blocks.push(block);
    }
    prompt.push_str(&blocks.join("\n"));

    prompt.push_str("\n\n");
    prompt.push_str(PROMPT_GUIDANCE);
    prompt
}

pub struct NarrativeService {
    http: Client,
    config: LlmConfig,
}

impl NarrativeService {
    pub fn new(http: Client, config: LlmConfig) -> Self {
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// One completion call, no retry. Statistics in `req` are not modified.
    pub async fn analyze(&self, req: &NarrativeRequest) -> Result<NarrativeResponse, NarrativeError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            NARRATIVE_REQUESTS_TOTAL.with_label_values(&["disabled"]).inc();
            return Err(NarrativeError::MissingApiKey);
        };

        let prompt = build_prompt(req);
        let result = self.complete(api_key, &prompt).await;

        match result {
            Ok(analysis) => {
                NARRATIVE_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
                tracing::info!(
                    survey_id = %req.survey_id,
                    model = %self.config.model,
                    chars = analysis.chars().count(),
                    "Narrative analysis generated"
                );
                Ok(NarrativeResponse {
                    success: true,
                    analysis,
                    model: self.config.model.clone(),
                })
            }
            Err(e) => {
                NARRATIVE_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!(survey_id = %req.survey_id, error = ?e, "Narrative analysis failed");
                Err(NarrativeError::Upstream(e))
            }
        }
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> anyhow::Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: TEMPERATURE,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        tracing::debug!(url = %self.config.api_url, model = %self.config.model, "Calling chat completions API");

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to call chat completions API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Chat completions API returned error {}: {}",
                status,
                error_text
            ));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
