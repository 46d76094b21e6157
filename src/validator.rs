//! Answer validation, exhaustive over round kinds.
//!
//! Pure: returns a verdict and, for incorrect or close-enough answers, the
//! canonical answer to display. Missing round data yields an incorrect verdict
//! rather than an error, so the learner always receives feedback.

use tracing::{debug, warn};

use crate::domain::{Attempt, Correction, MatchingRound, MissingWordRound, Round, SpellingRound, Verdict};
use crate::similarity::similarity;
use crate::util::tokenize;

/// Spelling answers strictly above this similarity are accepted as close enough.
pub const CLOSE_ENOUGH_THRESHOLD: f64 = 0.8;

pub fn validate(round: &Round, attempt: &Attempt) -> Verdict {
  let verdict = match (round, attempt) {
    (Round::Matching(r), Attempt::Matching { selected }) => validate_matching(r, selected),
    (Round::MissingWord(r), Attempt::MissingWord { filled }) => validate_missing_word(r, filled),
    (Round::Spelling(r), Attempt::Spelling { input }) => validate_spelling(r, input),
    (round, attempt) => {
      warn!(target: "journey", round = ?round.kind(), attempt = ?attempt.kind(), "Attempt kind does not match round kind");
      Verdict::incorrect(None)
    }
  };
  debug!(target: "journey", kind = ?round.kind(), correct = verdict.correct, close_enough = verdict.close_enough, "Attempt validated");
  verdict
}

fn validate_matching(round: &MatchingRound, selected: &[String]) -> Verdict {
  let expected = tokenize(&round.target_sentence);
  if expected.is_empty() {
    warn!(target: "journey", "Matching round has no target sentence");
    return Verdict::incorrect(None);
  }
  if selected.len() == expected.len() && selected.iter().zip(&expected).all(|(a, b)| a == b) {
    Verdict::exact()
  } else {
    Verdict::incorrect(Some(Correction::Sentence(round.target_sentence.clone())))
  }
}

fn validate_missing_word(round: &MissingWordRound, filled: &[Option<String>]) -> Verdict {
  if round.correct_words.is_empty() || round.correct_words.len() != round.blank_positions.len() {
    warn!(target: "journey", blanks = round.blank_positions.len(), answers = round.correct_words.len(), "Missing-word round is malformed");
    return Verdict::incorrect(None);
  }
  let correction = Some(Correction::Words(round.correct_words.clone()));

  if filled.len() != round.blank_positions.len() {
    return Verdict::incorrect(correction);
  }
  // Any empty blank fails before the filled ones are compared.
  let mut words = Vec::with_capacity(filled.len());
  for slot in filled {
    match slot.as_deref() {
      Some(w) if !w.trim().is_empty() => words.push(w),
      _ => return Verdict::incorrect(correction),
    }
  }

  if words.iter().zip(&round.correct_words).all(|(a, b)| *a == b.as_str()) {
    Verdict::exact()
  } else {
    Verdict::incorrect(correction)
  }
}

fn validate_spelling(round: &SpellingRound, input: &str) -> Verdict {
  let expected = round.target_spelling.trim().to_lowercase();
  if expected.is_empty() {
    warn!(target: "journey", source_word = %round.source_word, "Spelling round has no target spelling");
    return Verdict::incorrect(None);
  }
  let typed = input.trim().to_lowercase();
  let correction = Correction::Spelling(round.target_spelling.clone());

  if typed == expected {
    Verdict::exact()
  } else if !typed.is_empty() && similarity(&typed, &expected) > CLOSE_ENOUGH_THRESHOLD {
    Verdict::close_enough(correction)
  } else {
    Verdict::incorrect(Some(correction))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::RoundKind;

  fn words(s: &[&str]) -> Vec<String> {
    s.iter().map(|w| w.to_string()).collect()
  }

  fn german_matching() -> Round {
    Round::Matching(MatchingRound::new("Hello, how are you?", "Hallo, wie geht es dir?"))
  }

  fn spelling(target: &str) -> Round {
    Round::Spelling(SpellingRound { source_word: "book".into(), target_spelling: target.into() })
  }

  fn two_blanks() -> Round {
    Round::MissingWord(MissingWordRound {
      sentence: "Ich trinke gerne Kaffee am Morgen".into(),
      blank_positions: vec![1, 3],
      correct_words: words(&["trinke", "Kaffee"]),
      options: words(&["trinke", "Kaffee", "Tisch", "blau"]),
      single_blank: false,
    })
  }

  fn spell(round: &Round, input: &str) -> Verdict {
    validate(round, &Attempt::Spelling { input: input.into() })
  }

  #[test]
  fn matching_exact_order_is_correct() {
    let v = validate(
      &german_matching(),
      &Attempt::Matching { selected: words(&["Hallo,", "wie", "geht", "es", "dir?"]) },
    );
    assert_eq!(v, Verdict::exact());
  }

  #[test]
  fn matching_any_swap_is_incorrect() {
    let canonical = words(&["Hallo,", "wie", "geht", "es", "dir?"]);
    for i in 0..canonical.len() - 1 {
      let mut swapped = canonical.clone();
      swapped.swap(i, i + 1);
      let v = validate(&german_matching(), &Attempt::Matching { selected: swapped });
      assert!(!v.correct);
      assert_eq!(v.correction, Some(Correction::Sentence("Hallo, wie geht es dir?".into())));
    }
  }

  #[test]
  fn matching_length_mismatch_is_incorrect() {
    let v = validate(&german_matching(), &Attempt::Matching { selected: words(&["Hallo,", "wie", "geht", "es"]) });
    assert!(!v.correct);
    let v = validate(
      &german_matching(),
      &Attempt::Matching { selected: words(&["Hallo,", "wie", "geht", "es", "dir?", "dir?"]) },
    );
    assert!(!v.correct);
  }

  #[test]
  fn matching_without_target_is_incorrect_without_correction() {
    let r = Round::Matching(MatchingRound::new("Hello", "  "));
    assert_eq!(validate(&r, &Attempt::Matching { selected: vec![] }), Verdict::incorrect(None));
  }

  #[test]
  fn missing_word_positional_match_is_correct() {
    let v = validate(
      &two_blanks(),
      &Attempt::MissingWord { filled: vec![Some("trinke".into()), Some("Kaffee".into())] },
    );
    assert!(v.correct);
  }

  #[test]
  fn missing_word_swapped_blanks_are_incorrect() {
    let v = validate(
      &two_blanks(),
      &Attempt::MissingWord { filled: vec![Some("Kaffee".into()), Some("trinke".into())] },
    );
    assert!(!v.correct);
    assert_eq!(v.correction, Some(Correction::Words(words(&["trinke", "Kaffee"]))));
  }

  #[test]
  fn missing_word_null_blank_is_incorrect_regardless() {
    for filled in [
      vec![Some("trinke".into()), None],
      vec![None, Some("Kaffee".into())],
      vec![Some("trinke".into()), Some("  ".into())],
      vec![Some("trinke".into())],
    ] {
      assert!(!validate(&two_blanks(), &Attempt::MissingWord { filled }).correct);
    }
  }

  #[test]
  fn missing_word_malformed_round_is_incorrect() {
    let r = Round::MissingWord(MissingWordRound {
      sentence: "a b".into(),
      blank_positions: vec![0, 1],
      correct_words: words(&["a"]),
      options: words(&["a", "b", "c"]),
      single_blank: false,
    });
    let v = validate(&r, &Attempt::MissingWord { filled: vec![Some("a".into()), Some("b".into())] });
    assert_eq!(v, Verdict::incorrect(None));
  }

  #[test]
  fn spelling_case_fold_exact() {
    assert_eq!(spell(&spelling("Buch"), "buch"), Verdict::exact());
    assert_eq!(spell(&spelling("Buch"), "  BUCH "), Verdict::exact());
  }

  #[test]
  fn spelling_one_edit_in_four_is_below_threshold() {
    for input in ["Buh", "Buc"] {
      let v = spell(&spelling("Buch"), input);
      assert!(!v.correct, "{input} should be rejected");
      assert_eq!(v.correction, Some(Correction::Spelling("Buch".into())));
    }
  }

  #[test]
  fn spelling_close_enough_is_accepted_with_correction() {
    // 1 edit in 9 chars: similarity ~0.89
    let v = spell(&spelling("Schlüssel"), "schlussel");
    assert!(v.correct);
    assert!(v.close_enough);
    assert_eq!(v.correction, Some(Correction::Spelling("Schlüssel".into())));
  }

  #[test]
  fn spelling_exactly_at_threshold_is_rejected() {
    // 1 edit in 5 chars: similarity 0.8, not > 0.8
    assert!(!spell(&spelling("livro"), "libro").correct);
  }

  #[test]
  fn spelling_empty_input_is_never_close_enough() {
    let v = spell(&spelling("a"), "   ");
    assert!(!v.correct);
  }

  #[test]
  fn spelling_without_target_is_incorrect() {
    assert_eq!(spell(&spelling(""), "anything"), Verdict::incorrect(None));
  }

  #[test]
  fn kind_mismatch_is_incorrect_without_correction() {
    let v = validate(&spelling("Buch"), &Attempt::Matching { selected: words(&["Buch"]) });
    assert_eq!(v, Verdict::incorrect(None));
    assert_eq!(spelling("Buch").kind(), RoundKind::Spelling);
  }
}
