//! Generator payload (camelCase JSON) and its structural validation into a `Journey`.
//!
//! Every field is optional on the wire; `into_journey` decides whether the
//! payload is usable. Anything it rejects sends the controller to fallback content.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::{Journey, MatchingRound, MissingWordRound, Phase, Round, SpellingRound, SINGLE_BLANK_OPTIONS};
use crate::util::tokenize;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJourney {
  #[serde(default)]
  pub language: Option<String>,
  #[serde(default)]
  pub level: Option<i64>,
  #[serde(default)]
  pub rounds: Option<Vec<RawRound>>,
  #[serde(default)]
  pub summary_test: Option<Vec<RawRound>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRound {
  #[serde(default, rename = "type")]
  pub kind: Option<String>,
  // matching
  #[serde(default)] pub english_sentence: Option<String>,
  #[serde(default)] pub translated_sentence: Option<String>,
  #[serde(default)] pub words: Option<Vec<String>>,
  // missing_word (multi-blank)
  #[serde(default)] pub sentence: Option<String>,
  #[serde(default)] pub missing_word_indices: Option<Vec<i64>>,
  #[serde(default)] pub correct_words: Option<Vec<String>>,
  #[serde(default)] pub options: Option<Vec<String>>,
  #[serde(default)] pub is_single_word: Option<bool>,
  // missing_word (legacy single-blank)
  #[serde(default)] pub missing_word_index: Option<i64>,
  #[serde(default)] pub correct_word: Option<String>,
  // spelling
  #[serde(default)] pub english_word: Option<String>,
  #[serde(default)] pub correct_spelling: Option<String>,
}

/// Where in the journey a structural problem was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundAt {
  pub phase: Phase,
  pub index: usize,
}

impl fmt::Display for RoundAt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let phase = match self.phase {
      Phase::Practice => "practice",
      Phase::Test => "test",
    };
    write!(f, "{} round {}", phase, self.index)
  }
}

#[derive(Debug, Error, PartialEq)]
pub enum StructureError {
  #[error("practice rounds are missing or empty")]
  EmptyPractice,

  #[error("test rounds are missing or empty")]
  EmptyTest,

  #[error("{at}: round has no type")]
  MissingKind { at: RoundAt },

  #[error("{at}: unknown round type '{kind}'")]
  UnknownKind { at: RoundAt, kind: String },

  #[error("{at}: missing or empty field '{field}'")]
  MissingField { at: RoundAt, field: &'static str },

  #[error("{at}: blank position {position} outside sentence of {tokens} tokens")]
  BlankOutOfRange { at: RoundAt, position: i64, tokens: usize },

  #[error("{at}: duplicate blank position {position}")]
  DuplicateBlank { at: RoundAt, position: usize },

  #[error("{at}: {blanks} blanks but {answers} correct words")]
  AnswerCountMismatch { at: RoundAt, blanks: usize, answers: usize },

  #[error("{at}: options do not include correct word '{word}'")]
  OptionsMissingAnswer { at: RoundAt, word: String },

  #[error("{at}: single-blank round needs {expected} options, found {found}")]
  WrongOptionCount { at: RoundAt, expected: usize, found: usize },
}

/// Validate the payload and build a journey for the requested (language, level).
///
/// Rounds come back unscrambled; the caller instantiates them.
pub fn into_journey(raw: RawJourney, language: &str, level: u8) -> Result<Journey, StructureError> {
  if raw.language.as_deref().is_some_and(|l| l != language) || raw.level.is_some_and(|l| l != level as i64) {
    warn!(target: "journey", requested_language = %language, requested_level = level, returned_language = ?raw.language, returned_level = ?raw.level, "Generator echoed a different language/level; keeping the request");
  }

  let practice = raw.rounds.filter(|r| !r.is_empty()).ok_or(StructureError::EmptyPractice)?;
  let test = raw.summary_test.filter(|r| !r.is_empty()).ok_or(StructureError::EmptyTest)?;

  let practice_rounds = convert_all(practice, Phase::Practice)?;
  let test_rounds = convert_all(test, Phase::Test)?;

  Ok(Journey { language: language.to_string(), level, practice_rounds, test_rounds })
}

fn convert_all(rounds: Vec<RawRound>, phase: Phase) -> Result<Vec<Round>, StructureError> {
  rounds
    .into_iter()
    .enumerate()
    .map(|(index, r)| convert_round(r, RoundAt { phase, index }))
    .collect()
}

fn required(value: Option<String>, at: RoundAt, field: &'static str) -> Result<String, StructureError> {
  match value {
    Some(v) if !v.trim().is_empty() => Ok(v),
    _ => Err(StructureError::MissingField { at, field }),
  }
}

fn convert_round(r: RawRound, at: RoundAt) -> Result<Round, StructureError> {
  let kind = r.kind.clone().ok_or(StructureError::MissingKind { at })?;
  match kind.as_str() {
    "matching" => convert_matching(r, at),
    "missing_word" => convert_missing_word(r, at),
    "spelling" => Ok(Round::Spelling(SpellingRound {
      source_word: required(r.english_word, at, "englishWord")?,
      target_spelling: required(r.correct_spelling, at, "correctSpelling")?,
    })),
    _ => Err(StructureError::UnknownKind { at, kind }),
  }
}

fn convert_matching(r: RawRound, at: RoundAt) -> Result<Round, StructureError> {
  let source = required(r.english_sentence, at, "englishSentence")?;
  let target = required(r.translated_sentence, at, "translatedSentence")?;
  let round = MatchingRound::new(source, target);

  // The canonical tokens always come from the target sentence.
  if let Some(words) = r.words {
    let mut supplied = words;
    let mut canonical = round.canonical_words();
    supplied.sort();
    canonical.sort();
    if supplied != canonical {
      warn!(target: "journey", %at, expected = %round.target_sentence, "Supplied words differ from the target sentence; using the sentence tokens");
    }
  }
  Ok(Round::Matching(round))
}

fn convert_missing_word(r: RawRound, at: RoundAt) -> Result<Round, StructureError> {
  let sentence = required(r.sentence, at, "sentence")?;
  let options = r.options.ok_or(StructureError::MissingField { at, field: "options" })?;
  let token_count = tokenize(&sentence).len();

  let (raw_positions, correct_words, legacy) = match (r.missing_word_indices, r.missing_word_index) {
    (Some(indices), _) => {
      let words = r.correct_words.ok_or(StructureError::MissingField { at, field: "correctWords" })?;
      (indices, words, false)
    }
    (None, Some(index)) => {
      let word = required(r.correct_word, at, "correctWord")?;
      (vec![index], vec![word], true)
    }
    (None, None) => return Err(StructureError::MissingField { at, field: "missingWordIndices" }),
  };

  if raw_positions.is_empty() {
    return Err(StructureError::MissingField { at, field: "missingWordIndices" });
  }
  if raw_positions.len() != correct_words.len() {
    return Err(StructureError::AnswerCountMismatch { at, blanks: raw_positions.len(), answers: correct_words.len() });
  }
  if correct_words.iter().any(|w| w.trim().is_empty()) {
    return Err(StructureError::MissingField { at, field: "correctWords" });
  }

  let mut pairs = Vec::with_capacity(raw_positions.len());
  for (pos, word) in raw_positions.into_iter().zip(correct_words) {
    if pos < 0 || pos as usize >= token_count {
      return Err(StructureError::BlankOutOfRange { at, position: pos, tokens: token_count });
    }
    pairs.push((pos as usize, word));
  }
  // Blanks are ordered by sentence position; answers travel with their blank.
  pairs.sort_by_key(|(pos, _)| *pos);
  for w in pairs.windows(2) {
    if w[0].0 == w[1].0 {
      return Err(StructureError::DuplicateBlank { at, position: w[0].0 });
    }
  }

  for (_, word) in &pairs {
    if !options.contains(word) {
      return Err(StructureError::OptionsMissingAnswer { at, word: word.clone() });
    }
  }

  let single_blank = legacy
    || (r.is_single_word == Some(true) && pairs.len() == 1 && options.len() == SINGLE_BLANK_OPTIONS);
  if single_blank && options.len() != SINGLE_BLANK_OPTIONS {
    return Err(StructureError::WrongOptionCount { at, expected: SINGLE_BLANK_OPTIONS, found: options.len() });
  }

  let (blank_positions, correct_words) = pairs.into_iter().unzip();
  Ok(Round::MissingWord(MissingWordRound { sentence, blank_positions, correct_words, options, single_blank }))
}
