//! Journey Controller: owns the journey, the learner's ExerciseSession and every transition.
//!
//! Flow: Loading -> Practicing (answer / feedback per round) -> TestPhase -> Complete.
//! The only suspension point is content generation, split out as a [`JourneyLoad`]
//! so callers can run it without holding the controller. Generation failure, timeout
//! and structurally invalid payloads degrade to the fallback journey and never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{Attempt, Feedback, Journey, JourneySource, Phase, Round, RoundKind, Verdict};
use crate::generator::{ContentGenerator, GenerationError, JourneyRequest};
use crate::seeds::fallback_journey;
use crate::validator::validate;
use crate::wire::into_journey;

/// Coarse engine state exposed to callers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  Loading,
  Practicing,
  TestPhase,
  Complete,
}

/// Per-learner interaction state, mutated only by controller transitions.
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseSession {
  pub phase: Phase,
  pub round_index: usize,
  pub attempt: Attempt,
  pub feedback: Feedback,
  pub complete: bool,
}

impl ExerciseSession {
  fn at_start(journey: &Journey) -> Self {
    let attempt = journey
      .practice_rounds
      .first()
      .map(Attempt::empty_for)
      .unwrap_or(Attempt::Spelling { input: String::new() });
    Self { phase: Phase::Practice, round_index: 0, attempt, feedback: Feedback::None, complete: false }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("journey is still loading")]
  Loading,

  #[error("journey is already complete")]
  Complete,

  #[error("an accepted answer is waiting to advance")]
  AdvancePending,

  #[error("the current round has not been answered correctly")]
  NotAnswered,

  #[error("this action does not apply to a {0:?} round")]
  WrongRoundKind(RoundKind),

  #[error("round has several blanks; place words into blanks instead")]
  MultipleBlanks,

  #[error("no position {0} in this round")]
  NoSuchPosition(usize),

  #[error("every blank is already filled")]
  NoEmptyBlank,

  #[error("'{0}' is not offered in this round")]
  NotOffered(String),
}

/// Edits to the current attempt buffer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Interaction {
  SelectWord { word: String },
  RemoveSelectedWord { index: usize },
  PlaceWord { word: String, #[serde(default)] blank: Option<usize> },
  ClearBlank { index: usize },
  ChooseOption { word: String },
  SetSpellingInput { text: String },
}

/// Handle for a scheduled advance; stale once the controller has moved on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvanceTicket {
  epoch: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubmitOutcome {
  pub verdict: Verdict,
  /// Present when the answer was accepted; the caller applies it after the feedback delay.
  pub advance: Option<AdvanceTicket>,
}

/// A content request taken from the controller, run without holding it.
pub struct JourneyLoad {
  generator: Arc<dyn ContentGenerator>,
  timeout: Duration,
  request: JourneyRequest,
  epoch: u64,
}

/// Content produced by a [`JourneyLoad`], waiting for [`JourneyController::install`].
pub struct LoadedJourney {
  epoch: u64,
  request: JourneyRequest,
  journey: Journey,
  pub source: JourneySource,
}

impl JourneyLoad {
  /// One bounded generation attempt; failure, timeout or an invalid payload yields the fallback.
  #[instrument(level = "info", skip(self), fields(generator = self.generator.name(), language = %self.request.language, level = self.request.level))]
  pub async fn run(self) -> LoadedJourney {
    let JourneyLoad { generator, timeout, request, epoch } = self;
    let outcome = match tokio::time::timeout(timeout, generator.generate(&request)).await {
      Ok(result) => result,
      Err(_) => Err(GenerationError::Timeout(timeout)),
    };

    let generated = match outcome {
      Ok(raw) => match into_journey(raw, &request.language, request.level) {
        Ok(journey) => Some(journey),
        Err(e) => {
          warn!(target: "journey", language = %request.language, level = request.level, error = %e, "Generated journey failed structural validation; using fallback");
          None
        }
      },
      Err(GenerationError::Disabled) => {
        info!(target: "journey", language = %request.language, "Content generation disabled; using fallback");
        None
      }
      Err(e) => {
        error!(target: "journey", language = %request.language, level = request.level, error = %e, "Content generation failed; using fallback");
        None
      }
    };

    let (journey, source) = match generated {
      Some(journey) => (journey, JourneySource::Generated),
      None => (fallback_journey(&request.language, request.level), JourneySource::Fallback),
    };
    LoadedJourney { epoch, request, journey, source }
  }
}

pub struct JourneyController {
  generator: Arc<dyn ContentGenerator>,
  generation_timeout: Duration,
  language: String,
  level: u8,
  journey: Option<Journey>,
  source: Option<JourneySource>,
  session: Option<ExerciseSession>,
  /// Bumped whenever the round or journey changes; invalidates outstanding tickets.
  epoch: u64,
  pending: Option<AdvanceTicket>,
  rng: StdRng,
}

impl JourneyController {
  pub fn new(generator: Arc<dyn ContentGenerator>, generation_timeout: Duration) -> Self {
    Self::with_rng(generator, generation_timeout, StdRng::from_entropy())
  }

  pub fn with_rng(generator: Arc<dyn ContentGenerator>, generation_timeout: Duration, rng: StdRng) -> Self {
    Self {
      generator,
      generation_timeout,
      language: String::new(),
      level: crate::languages::MIN_LEVEL,
      journey: None,
      source: None,
      session: None,
      epoch: 0,
      pending: None,
      rng,
    }
  }

  // ---- transitions ----

  /// Load content for (language, level) and reset the session to practice round 0.
  /// Never fails: generation problems fall back to built-in content.
  pub async fn start_journey(&mut self, language: &str, level: u8) -> JourneySource {
    let load = self.begin_start(language, level);
    let loaded = load.run().await;
    let source = loaded.source;
    self.install(loaded);
    source
  }

  /// Re-request content for the same language, optionally at a new level.
  pub async fn restart(&mut self, new_level: Option<u8>) -> JourneySource {
    let load = self.begin_restart(new_level);
    let loaded = load.run().await;
    let source = loaded.source;
    self.install(loaded);
    source
  }

  /// First half of a start: drop the current journey and enter Loading.
  /// The returned load does not borrow the controller and can run while it stays available.
  pub fn begin_start(&mut self, language: &str, level: u8) -> JourneyLoad {
    self.discard();
    self.language = language.to_string();
    self.level = level;
    JourneyLoad {
      generator: self.generator.clone(),
      timeout: self.generation_timeout,
      request: JourneyRequest { language: language.to_string(), level },
      epoch: self.epoch,
    }
  }

  pub fn begin_restart(&mut self, new_level: Option<u8>) -> JourneyLoad {
    let language = self.language.clone();
    let level = new_level.unwrap_or(self.level);
    info!(target: "journey", %language, level, "Restarting journey");
    self.begin_start(&language, level)
  }

  /// Second half of a start. Content from a load that was superseded by a later
  /// start, restart or teardown is dropped; returns whether it was installed.
  pub fn install(&mut self, loaded: LoadedJourney) -> bool {
    if loaded.epoch != self.epoch {
      debug!(target: "journey", language = %loaded.request.language, "Discarding superseded journey load");
      return false;
    }
    let LoadedJourney { request, mut journey, source, .. } = loaded;
    journey.instantiate(&mut self.rng);

    info!(
      target: "journey",
      language = %request.language,
      level = request.level,
      ?source,
      practice = journey.practice_rounds.len(),
      test = journey.test_rounds.len(),
      "Journey ready"
    );
    self.session = Some(ExerciseSession::at_start(&journey));
    self.journey = Some(journey);
    self.source = Some(source);
    true
  }

  /// Drop the journey and session; any outstanding advance ticket or load becomes stale.
  pub fn teardown(&mut self) {
    debug!(target: "journey", language = %self.language, "Session torn down");
    self.discard();
  }

  fn discard(&mut self) {
    self.epoch += 1;
    self.pending = None;
    self.journey = None;
    self.source = None;
    self.session = None;
  }

  /// Validate an attempt for the current round (or the buffered one when `None`).
  ///
  /// Correct: feedback is set, the buffer cleared, and an advance ticket returned.
  /// Incorrect: feedback is set and the round stays active for retry.
  pub fn submit_answer(&mut self, attempt: Option<Attempt>) -> Result<SubmitOutcome, SessionError> {
    self.ensure_interactive()?;
    let epoch = self.epoch;
    let (journey, session) = self.parts_mut()?;
    let round = current_round_in(journey, session).ok_or(SessionError::Loading)?;

    // A supplied attempt that does not fit the round is judged but not kept,
    // so the buffer stays editable for this round.
    let verdict = match attempt {
      Some(a) if a.fits(round) => {
        session.attempt = a;
        validate(round, &session.attempt)
      }
      Some(a) => {
        debug!(target: "journey", round = session.round_index, expected = ?round.kind(), got = ?a.kind(), "Attempt does not fit round; not buffered");
        validate(round, &a)
      }
      None => validate(round, &session.attempt),
    };
    info!(
      target: "journey",
      phase = ?session.phase,
      round = session.round_index,
      kind = ?round.kind(),
      correct = verdict.correct,
      close_enough = verdict.close_enough,
      "Answer submitted"
    );
    session.feedback = Feedback::from(verdict.clone());

    if verdict.correct {
      session.attempt = Attempt::empty_for(round);
      let ticket = AdvanceTicket { epoch };
      self.pending = Some(ticket);
      Ok(SubmitOutcome { verdict, advance: Some(ticket) })
    } else {
      Ok(SubmitOutcome { verdict, advance: None })
    }
  }

  /// Clear the attempt and feedback of the current round. The round is not re-scrambled.
  pub fn retry_current_round(&mut self) -> Result<(), SessionError> {
    self.ensure_interactive()?;
    let (journey, session) = self.parts_mut()?;
    let round = current_round_in(journey, session).ok_or(SessionError::Loading)?;
    session.attempt = Attempt::empty_for(round);
    session.feedback = Feedback::None;
    Ok(())
  }

  /// Move past a correctly answered round: next round, then the test phase, then completion.
  pub fn advance(&mut self) -> Result<Status, SessionError> {
    self.ensure_ready()?;
    let (journey, session) = self.parts_mut()?;
    if !matches!(session.feedback, Feedback::Correct { .. }) {
      return Err(SessionError::NotAnswered);
    }

    let remaining = journey.rounds(session.phase).len();
    if session.round_index + 1 < remaining {
      session.round_index += 1;
    } else if session.phase == Phase::Practice {
      info!(target: "journey", practice = remaining, "Practice finished; entering test phase");
      session.phase = Phase::Test;
      session.round_index = 0;
    } else {
      info!(target: "journey", test = remaining, "Test phase finished; journey complete");
      session.complete = true;
    }

    session.feedback = Feedback::None;
    if let Some(round) = current_round_in(journey, session) {
      session.attempt = Attempt::empty_for(round);
    }
    debug!(target: "journey", phase = ?session.phase, round = session.round_index, complete = session.complete, "Advanced");

    self.pending = None;
    self.epoch += 1;
    Ok(self.status())
  }

  /// Apply a scheduled advance if its ticket is still the outstanding one.
  pub fn apply_advance(&mut self, ticket: AdvanceTicket) -> bool {
    if self.pending != Some(ticket) {
      debug!(target: "journey", "Ignoring stale advance");
      return false;
    }
    self.advance().is_ok()
  }

  pub fn interact(&mut self, interaction: Interaction) -> Result<(), SessionError> {
    match interaction {
      Interaction::SelectWord { word } => self.select_word(&word),
      Interaction::RemoveSelectedWord { index } => self.remove_selected_word(index),
      Interaction::PlaceWord { word, blank } => self.place_word(&word, blank),
      Interaction::ClearBlank { index } => self.clear_blank(index),
      Interaction::ChooseOption { word } => self.choose_option(&word),
      Interaction::SetSpellingInput { text } => self.set_spelling_input(text),
    }
  }

  /// Append a scrambled word to the selection; selecting a word with no copies left removes it.
  pub fn select_word(&mut self, word: &str) -> Result<(), SessionError> {
    self.ensure_interactive()?;
    let (journey, session) = self.parts_mut()?;
    let mismatch = wrong_kind(journey, session);
    let (Some(Round::Matching(round)), Attempt::Matching { selected }) =
      (current_round_in(journey, session), &mut session.attempt)
    else {
      return Err(mismatch);
    };

    let offered = round.scrambled_words.iter().filter(|w| *w == word).count();
    if offered == 0 {
      return Err(SessionError::NotOffered(word.to_string()));
    }
    let used = selected.iter().filter(|w| *w == word).count();
    if used < offered {
      selected.push(word.to_string());
    } else if let Some(pos) = selected.iter().rposition(|w| w == word) {
      selected.remove(pos);
    }
    Ok(())
  }

  pub fn remove_selected_word(&mut self, index: usize) -> Result<(), SessionError> {
    self.ensure_interactive()?;
    let (journey, session) = self.parts_mut()?;
    let mismatch = wrong_kind(journey, session);
    let Attempt::Matching { selected } = &mut session.attempt else {
      return Err(mismatch);
    };
    if index >= selected.len() {
      return Err(SessionError::NoSuchPosition(index));
    }
    selected.remove(index);
    Ok(())
  }

  /// Put an option into a blank (or the first empty one). Whatever was in the target
  /// blank returns to the pool. A word with every offered copy already placed moves.
  pub fn place_word(&mut self, word: &str, blank: Option<usize>) -> Result<(), SessionError> {
    self.ensure_interactive()?;
    let (journey, session) = self.parts_mut()?;
    let mismatch = wrong_kind(journey, session);
    let (Some(Round::MissingWord(round)), Attempt::MissingWord { filled }) =
      (current_round_in(journey, session), &mut session.attempt)
    else {
      return Err(mismatch);
    };

    let offered = round.options.iter().filter(|o| *o == word).count();
    if offered == 0 {
      return Err(SessionError::NotOffered(word.to_string()));
    }
    let target = match blank {
      Some(i) if i < filled.len() => i,
      Some(i) => return Err(SessionError::NoSuchPosition(i)),
      None => filled.iter().position(Option::is_none).ok_or(SessionError::NoEmptyBlank)?,
    };

    let elsewhere = |i: usize, f: &Option<String>| i != target && f.as_deref() == Some(word);
    let used = filled.iter().enumerate().filter(|(i, f)| elsewhere(*i, *f)).count();
    if used >= offered {
      if let Some(previous) = filled.iter().enumerate().position(|(i, f)| elsewhere(i, f)) {
        filled[previous] = None;
      }
    }
    filled[target] = Some(word.to_string());
    Ok(())
  }

  pub fn clear_blank(&mut self, index: usize) -> Result<(), SessionError> {
    self.ensure_interactive()?;
    let (journey, session) = self.parts_mut()?;
    let mismatch = wrong_kind(journey, session);
    let Attempt::MissingWord { filled } = &mut session.attempt else {
      return Err(mismatch);
    };
    let slot = filled.get_mut(index).ok_or(SessionError::NoSuchPosition(index))?;
    *slot = None;
    Ok(())
  }

  /// Single-blank shape: pick one of the four options.
  pub fn choose_option(&mut self, word: &str) -> Result<(), SessionError> {
    match self.current_round() {
      Some(Round::MissingWord(mw)) if !mw.single_blank => Err(SessionError::MultipleBlanks),
      _ => self.place_word(word, Some(0)),
    }
  }

  pub fn set_spelling_input(&mut self, text: String) -> Result<(), SessionError> {
    self.ensure_interactive()?;
    let (journey, session) = self.parts_mut()?;
    let mismatch = wrong_kind(journey, session);
    let Attempt::Spelling { input } = &mut session.attempt else {
      return Err(mismatch);
    };
    *input = text;
    Ok(())
  }

  // ---- read-only accessors ----

  pub fn status(&self) -> Status {
    match (&self.journey, &self.session) {
      (Some(_), Some(s)) if s.complete => Status::Complete,
      (Some(_), Some(s)) if s.phase == Phase::Test => Status::TestPhase,
      (Some(_), Some(_)) => Status::Practicing,
      _ => Status::Loading,
    }
  }

  pub fn phase(&self) -> Option<Phase> {
    self.session.as_ref().map(|s| s.phase)
  }

  pub fn round_index(&self) -> Option<usize> {
    self.session.as_ref().map(|s| s.round_index)
  }

  pub fn current_round(&self) -> Option<&Round> {
    match (&self.journey, &self.session) {
      (Some(j), Some(s)) => current_round_in(j, s),
      _ => None,
    }
  }

  pub fn feedback(&self) -> Option<&Feedback> {
    self.session.as_ref().map(|s| &s.feedback)
  }

  pub fn attempt(&self) -> Option<&Attempt> {
    self.session.as_ref().filter(|s| !s.complete).map(|s| &s.attempt)
  }

  pub fn journey(&self) -> Option<&Journey> {
    self.journey.as_ref()
  }

  pub fn source(&self) -> Option<JourneySource> {
    self.source
  }

  pub fn awaiting_advance(&self) -> bool {
    self.pending.is_some()
  }

  pub fn language(&self) -> &str {
    &self.language
  }

  pub fn level(&self) -> u8 {
    self.level
  }

  // ---- helpers ----

  fn ensure_ready(&self) -> Result<(), SessionError> {
    match self.status() {
      Status::Loading => Err(SessionError::Loading),
      Status::Complete => Err(SessionError::Complete),
      Status::Practicing | Status::TestPhase => Ok(()),
    }
  }

  fn ensure_interactive(&self) -> Result<(), SessionError> {
    self.ensure_ready()?;
    if self.pending.is_some() {
      return Err(SessionError::AdvancePending);
    }
    Ok(())
  }

  fn parts_mut(&mut self) -> Result<(&Journey, &mut ExerciseSession), SessionError> {
    match (&self.journey, &mut self.session) {
      (Some(j), Some(s)) => Ok((j, s)),
      _ => Err(SessionError::Loading),
    }
  }
}

fn current_round_in<'a>(journey: &'a Journey, session: &ExerciseSession) -> Option<&'a Round> {
  if session.complete {
    return None;
  }
  journey.rounds(session.phase).get(session.round_index)
}

fn wrong_kind(journey: &Journey, session: &ExerciseSession) -> SessionError {
  match current_round_in(journey, session) {
    Some(r) => SessionError::WrongRoundKind(r.kind()),
    None => SessionError::Loading,
  }
}
