//! Domain models used by the engine: rounds, journeys, learner attempts and verdicts.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::scramble::scramble;
use crate::util::tokenize;

/// Upper bound on options shown for a multi-blank round.
pub const MAX_MULTI_BLANK_OPTIONS: usize = 8;
/// Lower bound on options shown for a multi-blank round.
pub const MIN_MULTI_BLANK_OPTIONS: usize = 3;
/// Options carried by the single-blank shape.
pub const SINGLE_BLANK_OPTIONS: usize = 4;

/// Which round sequence is active.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  #[default]
  Practice,
  Test,
}

/// Where did the journey content come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JourneySource {
  Generated, // content generator, structurally valid
  Fallback,  // hand-authored seeds
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
  Matching,
  MissingWord,
  Spelling,
}

/// Rebuild the target sentence from scrambled words.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchingRound {
  pub source_sentence: String,
  pub target_sentence: String,
  /// Fixed at instantiation; never re-shuffled while the round lives.
  #[serde(default)]
  pub scrambled_words: Vec<String>,
}

impl MatchingRound {
  pub fn new(source_sentence: impl Into<String>, target_sentence: impl Into<String>) -> Self {
    let target_sentence = target_sentence.into();
    let scrambled_words = tokenize(&target_sentence);
    Self { source_sentence: source_sentence.into(), target_sentence, scrambled_words }
  }

  /// Whitespace tokenization of the target sentence.
  pub fn canonical_words(&self) -> Vec<String> {
    tokenize(&self.target_sentence)
  }
}

/// Fill one or more blanks of a sentence from a set of options.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MissingWordRound {
  pub sentence: String,
  /// 0-based token indices, unique and ascending.
  pub blank_positions: Vec<usize>,
  /// Aligned 1:1 with `blank_positions`.
  pub correct_words: Vec<String>,
  /// Display order, fixed at instantiation.
  pub options: Vec<String>,
  /// Legacy shape: one blank, exactly four options.
  #[serde(default)]
  pub single_blank: bool,
}

impl MissingWordRound {
  pub fn tokens(&self) -> Vec<String> {
    tokenize(&self.sentence)
  }

  pub fn blank_count(&self) -> usize {
    self.blank_positions.len()
  }

  /// Sentence tokens with `None` where a blank sits.
  pub fn template(&self) -> Vec<Option<String>> {
    self
      .tokens()
      .into_iter()
      .enumerate()
      .map(|(i, t)| if self.blank_positions.contains(&i) { None } else { Some(t) })
      .collect()
  }

  /// Option hygiene for the multi-blank shape: de-duplicate, keep one entry per blank for
  /// the correct words (a word filling two blanks is offered twice), drop distractors
  /// already visible in the sentence, clamp to [max(3, blanks), 8].
  pub fn prepare_options(&mut self) {
    if self.single_blank {
      return;
    }

    let mut original: Vec<String> = Vec::new();
    for o in &self.options {
      if !original.contains(o) {
        original.push(o.clone());
      }
    }

    let correct: Vec<String> = self.correct_words.clone();
    let correct_keys: HashSet<String> = correct.iter().map(|w| option_key(w)).collect();

    let visible: HashSet<String> = self
      .template()
      .into_iter()
      .flatten()
      .map(|t| option_key(&t))
      .collect();

    let distractors = original
      .iter()
      .filter(|o| {
        let key = option_key(o);
        !correct_keys.contains(&key) && !visible.contains(&key)
      })
      .cloned();

    let min_options = MIN_MULTI_BLANK_OPTIONS.max(correct.len());
    let mut prepared: Vec<String> = correct.clone();
    prepared.extend(distractors);
    prepared.truncate(MAX_MULTI_BLANK_OPTIONS.max(correct.len()));

    if prepared.len() < min_options {
      for o in &original {
        if prepared.len() >= min_options {
          break;
        }
        if !prepared.contains(o) {
          prepared.push(o.clone());
        }
      }
    }

    self.options = prepared;
  }
}

/// Lowercased, trailing-punctuation-free form used to compare options with sentence tokens.
fn option_key(word: &str) -> String {
  word
    .trim()
    .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
    .trim()
    .to_lowercase()
}

/// Type the target-language spelling of a source word.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpellingRound {
  pub source_word: String,
  pub target_spelling: String,
}

/// One atomic exercise unit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Round {
  Matching(MatchingRound),
  MissingWord(MissingWordRound),
  Spelling(SpellingRound),
}

impl Round {
  pub fn kind(&self) -> RoundKind {
    match self {
      Round::Matching(_) => RoundKind::Matching,
      Round::MissingWord(_) => RoundKind::MissingWord,
      Round::Spelling(_) => RoundKind::Spelling,
    }
  }

  /// Fix the display order of words/options for the lifetime of this round.
  pub fn instantiate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    match self {
      Round::Matching(m) => {
        m.scrambled_words = scramble(&m.canonical_words(), rng);
      }
      Round::MissingWord(mw) => {
        mw.prepare_options();
        mw.options = scramble(&mw.options, rng);
      }
      Round::Spelling(_) => {}
    }
  }
}

/// Practice rounds followed by summary-test rounds for one (language, level).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Journey {
  pub language: String,
  pub level: u8,
  pub practice_rounds: Vec<Round>,
  pub test_rounds: Vec<Round>,
}

impl Journey {
  pub fn rounds(&self, phase: Phase) -> &[Round] {
    match phase {
      Phase::Practice => &self.practice_rounds,
      Phase::Test => &self.test_rounds,
    }
  }

  pub fn instantiate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    for r in self.practice_rounds.iter_mut().chain(self.test_rounds.iter_mut()) {
      r.instantiate(rng);
    }
  }
}

/// The learner's per-round interaction buffer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attempt {
  Matching {
    #[serde(default)]
    selected: Vec<String>,
  },
  MissingWord {
    #[serde(default)]
    filled: Vec<Option<String>>,
  },
  Spelling {
    #[serde(default)]
    input: String,
  },
}

impl Attempt {
  /// An empty buffer shaped for `round`.
  pub fn empty_for(round: &Round) -> Self {
    match round {
      Round::Matching(_) => Attempt::Matching { selected: Vec::new() },
      Round::MissingWord(mw) => Attempt::MissingWord { filled: vec![None; mw.blank_count()] },
      Round::Spelling(_) => Attempt::Spelling { input: String::new() },
    }
  }

  /// True if this buffer has the shape `round` expects (same kind, one slot per blank).
  pub fn fits(&self, round: &Round) -> bool {
    match (self, round) {
      (Attempt::Matching { .. }, Round::Matching(_)) | (Attempt::Spelling { .. }, Round::Spelling(_)) => true,
      (Attempt::MissingWord { filled }, Round::MissingWord(mw)) => filled.len() == mw.blank_count(),
      _ => false,
    }
  }

  pub fn kind(&self) -> RoundKind {
    match self {
      Attempt::Matching { .. } => RoundKind::Matching,
      Attempt::MissingWord { .. } => RoundKind::MissingWord,
      Attempt::Spelling { .. } => RoundKind::Spelling,
    }
  }
}

/// Canonical answer shown after an incorrect or close-enough attempt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Correction {
  Sentence(String),
  Words(Vec<String>),
  Spelling(String),
}

/// Result of checking one attempt against one round.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
  pub correct: bool,
  /// Accepted by spelling tolerance rather than exact match.
  pub close_enough: bool,
  pub correction: Option<Correction>,
}

impl Verdict {
  pub fn exact() -> Self {
    Self { correct: true, close_enough: false, correction: None }
  }

  pub fn close_enough(correction: Correction) -> Self {
    Self { correct: true, close_enough: true, correction: Some(correction) }
  }

  pub fn incorrect(correction: Option<Correction>) -> Self {
    Self { correct: false, close_enough: false, correction }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Feedback {
  #[default]
  None,
  Correct {
    close_enough: bool,
    correction: Option<Correction>,
  },
  Incorrect {
    correction: Option<Correction>,
  },
}

impl From<Verdict> for Feedback {
  fn from(v: Verdict) -> Self {
    if v.correct {
      Feedback::Correct { close_enough: v.close_enough, correction: v.correction }
    } else {
      Feedback::Incorrect { correction: v.correction }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{rngs::StdRng, SeedableRng};

  fn multi(sentence: &str, blanks: &[usize], correct: &[&str], options: &[&str]) -> MissingWordRound {
    MissingWordRound {
      sentence: sentence.into(),
      blank_positions: blanks.to_vec(),
      correct_words: correct.iter().map(|s| s.to_string()).collect(),
      options: options.iter().map(|s| s.to_string()).collect(),
      single_blank: false,
    }
  }

  #[test]
  fn template_hides_blanks() {
    let r = multi("Ich trinke gerne Kaffee", &[1, 3], &["trinke", "Kaffee"], &["trinke", "Kaffee", "rot"]);
    assert_eq!(
      r.template(),
      vec![Some("Ich".to_string()), None, Some("gerne".to_string()), None]
    );
  }

  #[test]
  fn prepare_options_drops_visible_and_duplicate_distractors() {
    let mut r = multi(
      "Ich trinke gerne Kaffee am Morgen.",
      &[1, 3],
      &["trinke", "Kaffee"],
      &["Kaffee", "trinke", "trinke", "morgen", "Tisch", "blau", "gestern"],
    );
    r.prepare_options();
    assert_eq!(r.options, vec!["trinke", "Kaffee", "Tisch", "blau", "gestern"]);
  }

  #[test]
  fn repeated_answer_is_offered_once_per_blank() {
    let mut r = multi(
      "Ich sehe die Katze und die Maus",
      &[2, 5],
      &["die", "die"],
      &["die", "das", "der", "die"],
    );
    r.prepare_options();
    assert_eq!(r.options.iter().filter(|o| *o == "die").count(), 2);
    assert_eq!(r.options, vec!["die", "die", "das", "der"]);
  }

  #[test]
  fn prepare_options_refills_to_minimum() {
    let mut r = multi("a b c", &[0], &["a"], &["a", "b", "c"]);
    r.prepare_options();
    assert_eq!(r.options.len(), MIN_MULTI_BLANK_OPTIONS);
    assert!(r.options.contains(&"a".to_string()));
  }

  #[test]
  fn prepare_options_caps_at_eight() {
    let opts: Vec<String> = (0..12).map(|i| format!("w{i}")).collect();
    let opt_refs: Vec<&str> = opts.iter().map(|s| s.as_str()).collect();
    let mut r = multi("x y z", &[0, 2], &["x", "z"], &opt_refs);
    r.prepare_options();
    assert_eq!(r.options.len(), MAX_MULTI_BLANK_OPTIONS);
    assert_eq!(&r.options[..2], &["x".to_string(), "z".to_string()]);
  }

  #[test]
  fn instantiate_scrambles_matching_words_from_target() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut round = Round::Matching(MatchingRound::new("Hello, how are you?", "Hallo, wie geht es dir?"));
    round.instantiate(&mut rng);
    let Round::Matching(m) = &round else { panic!("kind changed") };
    let canonical = m.canonical_words();
    assert_ne!(m.scrambled_words, canonical);
    let mut a = m.scrambled_words.clone();
    let mut b = canonical.clone();
    a.sort();
    b.sort();
    assert_eq!(a, b);
  }

  #[test]
  fn attempt_buffer_matches_round_shape() {
    let round = Round::MissingWord(multi("a b c", &[0, 2], &["a", "c"], &["a", "c", "d"]));
    assert_eq!(Attempt::empty_for(&round), Attempt::MissingWord { filled: vec![None, None] });
    assert!(Attempt::empty_for(&round).fits(&round));
    assert!(!Attempt::MissingWord { filled: vec![None] }.fits(&round));
    assert!(!Attempt::Spelling { input: "a".into() }.fits(&round));
  }

  #[test]
  fn round_serializes_with_kind_tag() {
    let round = Round::Spelling(SpellingRound { source_word: "book".into(), target_spelling: "Buch".into() });
    let v = serde_json::to_value(&round).expect("serialize");
    assert_eq!(v["kind"], "spelling");
    assert_eq!(v["target_spelling"], "Buch");
  }
}
