//! Minimal OpenAI client used as the journey content generator.
//!
//! We only call chat.completions and request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::generator::{ContentGenerator, GenerationError, JourneyRequest};
use crate::languages::{blank_count, complexity, level_description, pick_theme, prompt_language_name, sentence_length};
use crate::util::{fill_template, trunc_for_log};
use crate::wire::RawJourney;

const TOP_LEVEL_KEYS: [&str; 4] = ["summaryTest", "rounds", "language", "level"];

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model, prompts })
  }

  /// JSON-object chat completion; returns the raw message text.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json_text(&self, system: &str, user: &str, temperature: f32) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "lingo-journey/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| GenerationError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(GenerationError::Http { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GenerationError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .filter(|t| !t.trim().is_empty())
      .ok_or(GenerationError::Empty)
  }
}

#[async_trait]
impl ContentGenerator for OpenAI {
  #[instrument(level = "info", skip(self), fields(language = %request.language, level = request.level, model = %self.model))]
  async fn generate(&self, request: &JourneyRequest) -> Result<RawJourney, GenerationError> {
    let user = {
      let mut rng = rand::thread_rng();
      build_user_prompt(&self.prompts, request, &mut rng)
    };
    let start = Instant::now();
    let result = self.chat_json_text(&self.prompts.journey_system, &user, 0.7).await;
    let elapsed = start.elapsed();

    let text = match result {
      Ok(t) => {
        info!(?elapsed, response_len = t.len(), "Model response received successfully");
        t
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during journey generation");
        return Err(e);
      }
    };

    let cleaned = clean_generated_json(&text);
    debug!(preview = %trunc_for_log(&cleaned, 200), "Cleaned journey JSON");
    serde_json::from_str::<RawJourney>(&cleaned).map_err(|e| GenerationError::Malformed(e.to_string()))
  }

  fn name(&self) -> &'static str {
    "openai"
  }
}

/// Fill the user prompt for a request, with a randomly chosen level-appropriate theme.
pub fn build_user_prompt<R: rand::Rng + ?Sized>(prompts: &Prompts, request: &JourneyRequest, rng: &mut R) -> String {
  let level = request.level.to_string();
  let blanks = blank_count(request.level).to_string();
  let theme = pick_theme(request.level, rng);
  fill_template(
    &prompts.journey_user_template,
    &[
      ("language_name", prompt_language_name(&request.language)),
      ("language_code", &request.language),
      ("level", &level),
      ("level_description", level_description(request.level)),
      ("theme", theme),
      ("complexity", complexity(request.level)),
      ("blank_count", &blanks),
      ("sentence_length", sentence_length(request.level)),
    ],
  )
}

/// Strip stray dots the model sometimes puts before top-level property names (`".rounds"`).
pub fn clean_generated_json(text: &str) -> String {
  let mut out = text.trim().to_string();
  for key in TOP_LEVEL_KEYS {
    out = out.replace(&format!("\".{}\"", key), &format!("\"{}\"", key));
  }
  out
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
