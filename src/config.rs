//! Loading engine configuration (prompts + engine timings) from TOML.
//!
//! See `EngineConfig`, `Prompts` and `EngineSettings` for expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub engine: EngineSettings,
}

/// Prompts used by the OpenAI generator.
///
/// `journey_user_template` placeholders: {language_name}, {language_code}, {level},
/// {level_description}, {theme}, {complexity}, {blank_count}, {sentence_length}.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub journey_system: String,
  pub journey_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      journey_system: "You are a language learning curriculum designer. Respond ONLY with strict JSON of the shape {\"language\": string, \"level\": number, \"rounds\": [...], \"summaryTest\": [...]}. Property names must be exactly language, level, rounds, summaryTest.".into(),
      journey_user_template: concat!(
        "Create a {language_name} learning journey (level {level}/10: {level_description}) focused on \"{theme}\".\n",
        "- 10 varied rounds and 3 summary test rounds mixing matching, missing_word and spelling.\n",
        "- Complexity: {complexity}. Sentence length: {sentence_length} words.\n",
        "MATCHING: {\"type\":\"matching\",\"englishSentence\":\"...\",\"translatedSentence\":\"...\",\"words\":[every space-separated token of translatedSentence, in order]}\n",
        "MISSING_WORD: {\"type\":\"missing_word\",\"sentence\":\"...\",\"missingWordIndices\":[0-based token indices],\"correctWords\":[...],\"options\":[correct words plus clearly wrong distractors],\"isSingleWord\":bool}. Use {blank_count} missing word(s); with one missing word give exactly 4 options.\n",
        "SPELLING: {\"type\":\"spelling\",\"englishWord\":\"...\",\"correctSpelling\":\"...\"}\n",
        "Each missing word exercise must have exactly one correct answer; distractors come from other word classes.\n",
        "Return only JSON: {\"language\":\"{language_code}\",\"level\":{level},\"rounds\":[...],\"summaryTest\":[...]}",
      )
      .into(),
    }
  }
}

/// Timings for the controller and the session store.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
  /// Feedback window between a correct answer and the automatic advance.
  pub advance_delay_ms: u64,
  /// Upper bound on one generation attempt before falling back.
  pub generation_timeout_secs: u64,
  /// Idle sessions older than this are purged.
  pub session_ttl_secs: u64,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self { advance_delay_ms: 1500, generation_timeout_secs: 45, session_ttl_secs: 4 * 60 * 60 }
  }
}

impl EngineSettings {
  pub fn advance_delay(&self) -> Duration {
    Duration::from_millis(self.advance_delay_ms)
  }

  pub fn generation_timeout(&self) -> Duration {
    Duration::from_secs(self.generation_timeout_secs)
  }

  pub fn session_ttl(&self) -> Duration {
    Duration::from_secs(self.session_ttl_secs)
  }
}

/// Attempt to load `EngineConfig` from JOURNEY_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_engine_config_from_env() -> Option<EngineConfig> {
  let path = std::env::var("JOURNEY_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_engine_config(&s) {
      Ok(cfg) => {
        info!(target: "lingo_journey", %path, "Loaded engine config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "lingo_journey", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "lingo_journey", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_engine_config(s: &str) -> Result<EngineConfig, toml::de::Error> {
  toml::from_str::<EngineConfig>(s)
}
