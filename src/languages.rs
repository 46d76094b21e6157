//! Language names, level descriptions and theme pools used to steer generation.

use rand::seq::SliceRandom;
use rand::Rng;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 10;

const LANGUAGE_NAMES: &[(&str, &str)] = &[
  ("en", "English"),
  ("de", "German"),
  ("zh", "Chinese"),
  ("no", "Norwegian"),
  ("pt-BR", "Brazilian Portuguese"),
  ("ko", "Korean"),
  ("ar", "Arabic"),
  ("es", "Spanish"),
  ("fr", "French"),
  ("ja", "Japanese"),
  ("it", "Italian"),
  ("ru", "Russian"),
];

const LEVEL_DESCRIPTIONS: [&str; 10] = [
  "Complete beginner - knows very few words or phrases",
  "Early beginner - knows basic greetings and simple phrases",
  "Beginner - knows common words and basic sentence structures",
  "Early intermediate - can form simple sentences and understand basic conversations",
  "Intermediate - can engage in basic conversations with some errors",
  "Upper intermediate - can express more complex thoughts with occasional errors",
  "Early advanced - can communicate fluently on a variety of topics with few errors",
  "Advanced - near-native fluency with occasional specialized vocabulary gaps",
  "Expert - near native-level fluency across most contexts",
  "Native-like - indistinguishable from a native speaker in most contexts",
];

const BEGINNER_THEMES: &[&str] = &[
  "daily routines", "family and friends", "food and dining", "shopping", "weather and seasons",
  "home and living", "hobbies and free time", "transportation", "health and body", "numbers and time",
];

const INTERMEDIATE_THEMES: &[&str] = &[
  "work and career", "education and learning", "travel and tourism", "technology and media",
  "environment and nature", "culture and traditions", "sports and fitness", "arts and entertainment",
  "politics and society", "science and innovation",
];

const ADVANCED_THEMES: &[&str] = &[
  "philosophy and ethics", "business and economics", "global issues", "literature and poetry",
  "history and heritage", "psychology and human behavior", "international relations",
  "sustainability and future", "scientific research", "cultural analysis",
];

/// Display name for a language code, if we know it.
pub fn language_name(code: &str) -> Option<&'static str> {
  LANGUAGE_NAMES.iter().find(|(c, _)| *c == code).map(|(_, n)| *n)
}

/// Name used in prompts; unknown codes are treated as English.
pub fn prompt_language_name(code: &str) -> &'static str {
  language_name(code).unwrap_or("English")
}

/// Requested levels outside 1..=10 (or absent) fall back to 1.
pub fn clamp_level(level: Option<i64>) -> u8 {
  match level {
    Some(l) if (MIN_LEVEL as i64..=MAX_LEVEL as i64).contains(&l) => l as u8,
    _ => MIN_LEVEL,
  }
}

pub fn level_description(level: u8) -> &'static str {
  let idx = level.clamp(MIN_LEVEL, MAX_LEVEL) as usize - 1;
  LEVEL_DESCRIPTIONS[idx]
}

pub fn complexity(level: u8) -> &'static str {
  match level {
    0..=3 => "simple",
    4..=6 => "intermediate",
    _ => "advanced",
  }
}

/// Blanks per missing-word round the generator should use at this level.
pub fn blank_count(level: u8) -> usize {
  match level {
    0..=4 => 1,
    5..=7 => 2,
    8..=9 => 3,
    _ => 4,
  }
}

pub fn sentence_length(level: u8) -> &'static str {
  match level {
    0..=3 => "3-5",
    4..=6 => "5-8",
    _ => "8-12",
  }
}

pub fn themes_for_level(level: u8) -> Vec<&'static str> {
  match level {
    0..=3 => BEGINNER_THEMES.to_vec(),
    4..=6 => [BEGINNER_THEMES, INTERMEDIATE_THEMES].concat(),
    _ => [INTERMEDIATE_THEMES, ADVANCED_THEMES].concat(),
  }
}

pub fn pick_theme<R: Rng + ?Sized>(level: u8, rng: &mut R) -> &'static str {
  themes_for_level(level).choose(rng).copied().unwrap_or("daily routines")
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{rngs::StdRng, SeedableRng};

  #[test]
  fn level_clamping() {
    assert_eq!(clamp_level(None), 1);
    assert_eq!(clamp_level(Some(0)), 1);
    assert_eq!(clamp_level(Some(11)), 1);
    assert_eq!(clamp_level(Some(-3)), 1);
    assert_eq!(clamp_level(Some(7)), 7);
    assert_eq!(clamp_level(Some(10)), 10);
  }

  #[test]
  fn names_and_descriptions() {
    assert_eq!(language_name("pt-BR"), Some("Brazilian Portuguese"));
    assert_eq!(language_name("xx"), None);
    assert_eq!(prompt_language_name("xx"), "English");
    assert!(level_description(1).starts_with("Complete beginner"));
    assert!(level_description(10).starts_with("Native-like"));
  }

  #[test]
  fn difficulty_curves() {
    assert_eq!((blank_count(4), blank_count(5), blank_count(8), blank_count(10)), (1, 2, 3, 4));
    assert_eq!(complexity(3), "simple");
    assert_eq!(sentence_length(9), "8-12");
  }

  #[test]
  fn themes_follow_level_bands() {
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..20 {
      assert!(BEGINNER_THEMES.contains(&pick_theme(2, &mut rng)));
      assert!(!BEGINNER_THEMES.contains(&pick_theme(9, &mut rng)));
    }
    assert_eq!(themes_for_level(5).len(), BEGINNER_THEMES.len() + INTERMEDIATE_THEMES.len());
  }
}
