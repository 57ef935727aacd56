// src/services/translator.rs

//! Translation client.
//!
//! One capability, `translate(text, context) -> Option<String>`, backed by a
//! closed set of LLM providers. Every failure is logged and reported as
//! `None` so the caller can retry the item on a later pass.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Provider, TranslationConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Who wrote the text being translated, and how to treat its markup.
#[derive(Debug, Clone)]
pub struct TranslationContext {
    pub author_name: String,
    pub group_name: String,
    /// Translate text nodes only, leaving tags and attributes untouched
    pub preserve_markup: bool,
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text`, or `None` on any failure.
    async fn translate(&self, text: &str, context: &TranslationContext) -> Option<String>;
}

/// System instructions and user message for one translation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the prompt shared by every provider.
pub fn build_prompt(text: &str, context: &TranslationContext, target_language: &str) -> Prompt {
    let mut rules = vec![
        format!(
            "You are a professional translator of Japanese idol blogs into {target_language}."
        ),
        "Keep the writer's casual, friendly tone, including emoticons and sentence-final particles where they carry nuance.".to_string(),
        "Names written in hiragana or katakana are transcribed into romaji. Names written in kanji stay as written. Do not translate names by meaning.".to_string(),
    ];
    if context.preserve_markup {
        rules.push(
            "The input is HTML. Translate only the text nodes. Keep every tag, attribute, URL and line break exactly as given."
                .to_string(),
        );
    }
    rules.push("Output only the translation, with no preamble, notes or code fences.".to_string());

    let system = rules
        .iter()
        .map(|rule| format!("- {rule}"))
        .collect::<Vec<_>>()
        .join("\n");
    let user = format!(
        "The following blog post was written by {} of {}. Translate it into {}.\n\n{}",
        context.author_name, context.group_name, target_language, text
    );

    Prompt { system, user }
}

/// Remove a surrounding Markdown code fence, which models add despite being
/// told not to.
fn strip_code_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening line
    match body.split_once('\n') {
        Some((tag, inner)) if !tag.trim().contains(' ') => inner.trim(),
        _ => body.trim(),
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().map(|p| p.text.as_str()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeBlock>,
}

#[derive(Debug, Deserialize)]
struct ClaudeBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ClaudeResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

impl OpenAiResponse {
    fn text(&self) -> Option<String> {
        self.choices
            .first()?
            .message
            .content
            .clone()
            .filter(|text| !text.trim().is_empty())
    }
}

// =============================================================================
// Client
// =============================================================================

/// Translator backed by the configured LLM provider.
pub struct LlmTranslator {
    config: TranslationConfig,
    http: reqwest::Client,
}

impl LlmTranslator {
    pub fn new(config: TranslationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    fn api_key(&self) -> Option<&str> {
        let key = match self.config.provider {
            Provider::Gemini => &self.config.gemini_api_key,
            Provider::Claude => &self.config.claude_api_key,
            Provider::OpenAi => &self.config.openai_api_key,
        };
        key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Walk the configured models, moving to the next one after a backoff
    /// only when the current one is rate limited.
    async fn gemini(&self, api_key: &str, prompt: &Prompt) -> Result<String> {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &prompt.system,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart { text: &prompt.user }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        };
        let backoff = Duration::from_secs(self.config.rate_limit_backoff_secs);
        let attempts = self.config.max_retries.max(1);

        for (attempt, model) in self.config.gemini_models.iter().take(attempts).enumerate() {
            let url = format!(
                "{}/models/{}:generateContent",
                self.config.gemini_base_url.trim_end_matches('/'),
                model
            );
            log::debug!("[Translate] gemini request, model {}", model);

            let response = self
                .http
                .post(&url)
                .query(&[("key", api_key)])
                .json(&body)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                log::warn!(
                    "[Translate] gemini model {} rate limited (attempt {})",
                    model,
                    attempt + 1
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            let parsed: GeminiResponse = check_status("gemini", response).await?.json().await?;
            return parsed
                .text()
                .ok_or_else(|| AppError::translation(format!("gemini model {model} returned no text")));
        }

        Err(AppError::translation("gemini models exhausted"))
    }

    async fn claude(&self, api_key: &str, prompt: &Prompt) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|e| AppError::translation(e.to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = ClaudeRequest {
            model: &self.config.claude_model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: &prompt.system,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt.user,
            }],
        };
        let url = format!("{}/messages", self.config.claude_base_url.trim_end_matches('/'));
        log::debug!("[Translate] claude request, model {}", self.config.claude_model);

        let response = self.http.post(&url).headers(headers).json(&body).send().await?;
        let parsed: ClaudeResponse = check_status("claude", response).await?.json().await?;
        parsed
            .text()
            .ok_or_else(|| AppError::translation("claude returned no text"))
    }

    async fn openai(&self, api_key: &str, prompt: &Prompt) -> Result<String> {
        let body = OpenAiRequest {
            model: &self.config.openai_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let url = format!(
            "{}/chat/completions",
            self.config.openai_base_url.trim_end_matches('/')
        );
        log::debug!("[Translate] openai request, model {}", self.config.openai_model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: OpenAiResponse = check_status("openai", response).await?.json().await?;
        parsed
            .text()
            .ok_or_else(|| AppError::translation("openai returned no text"))
    }
}

async fn check_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::translation(format!(
        "{provider} API error ({status}): {body}"
    )))
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, context: &TranslationContext) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }
        let provider = self.config.provider;
        let Some(api_key) = self.api_key() else {
            log::error!("[Translate] no API key configured for {}", provider);
            return None;
        };

        let prompt = build_prompt(text, context, &self.config.target_language);
        let result = match provider {
            Provider::Gemini => self.gemini(api_key, &prompt).await,
            Provider::Claude => self.claude(api_key, &prompt).await,
            Provider::OpenAi => self.openai(api_key, &prompt).await,
        };

        match result {
            Ok(output) => Some(strip_code_fence(&output).to_string()),
            Err(e) => {
                log::error!(
                    "[Translate] {} failed for {} ({}): {}",
                    provider,
                    context.author_name,
                    context.group_name,
                    e
                );
                None
            }
        }
    }
}
