//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Views never carry the answer of the round being played.

use serde::{Deserialize, Serialize};

use crate::controller::{Interaction, JourneyController, Status};
use crate::domain::{Attempt, Feedback, JourneySource, Phase, Round, Verdict};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartJourney {
        language: String,
        #[serde(default)]
        level: Option<i64>,
    },
    SubmitAnswer {
        #[serde(default)]
        attempt: Option<Attempt>,
    },
    Interact {
        #[serde(flatten)]
        interaction: Interaction,
    },
    Retry,
    Restart {
        #[serde(default)]
        level: Option<i64>,
    },
    State,
    End,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Journey {
        journey: JourneyView,
    },
    AnswerResult {
        #[serde(flatten)]
        result: AnswerOut,
    },
    Ended,
    Error {
        error: String,
        message: String,
    },
}

/// Snapshot of one session, shared by WS and HTTP.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JourneyView {
    pub session_id: String,
    pub status: Status,
    pub language: String,
    pub level: u8,
    pub phase: Option<Phase>,
    pub round_index: Option<usize>,
    pub practice_rounds: usize,
    pub test_rounds: usize,
    pub awaiting_advance: bool,
    pub source: Option<JourneySource>,
    pub round: Option<RoundView>,
    pub attempt: Option<Attempt>,
    pub feedback: Feedback,
}

/// What the learner sees of the current round.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundView {
    Matching {
        #[serde(rename = "sourceSentence")]
        source_sentence: String,
        words: Vec<String>,
    },
    MissingWord {
        /// Sentence tokens; `null` where a blank sits.
        template: Vec<Option<String>>,
        options: Vec<String>,
        /// Options not currently placed in a blank.
        available: Vec<String>,
        #[serde(rename = "singleBlank")]
        single_blank: bool,
    },
    Spelling {
        #[serde(rename = "sourceWord")]
        source_word: String,
    },
}

impl JourneyView {
    pub fn from_controller(session_id: &str, c: &JourneyController) -> Self {
        let (practice_rounds, test_rounds) = c
            .journey()
            .map(|j| (j.practice_rounds.len(), j.test_rounds.len()))
            .unwrap_or((0, 0));
        let attempt = c.attempt().cloned();
        Self {
            session_id: session_id.to_string(),
            status: c.status(),
            language: c.language().to_string(),
            level: c.level(),
            phase: c.phase(),
            round_index: c.round_index(),
            practice_rounds,
            test_rounds,
            awaiting_advance: c.awaiting_advance(),
            source: c.source(),
            round: c.current_round().map(|r| round_view(r, attempt.as_ref())),
            attempt,
            feedback: c.feedback().cloned().unwrap_or_default(),
        }
    }
}

fn round_view(round: &Round, attempt: Option<&Attempt>) -> RoundView {
    match round {
        Round::Matching(m) => RoundView::Matching {
            source_sentence: m.source_sentence.clone(),
            words: m.scrambled_words.clone(),
        },
        Round::MissingWord(mw) => {
            let mut placed: Vec<&str> = match attempt {
                Some(Attempt::MissingWord { filled }) => filled.iter().flatten().map(String::as_str).collect(),
                _ => Vec::new(),
            };
            // Each placed word consumes one offered copy.
            let mut available = Vec::with_capacity(mw.options.len());
            for o in &mw.options {
                match placed.iter().position(|p| *p == o.as_str()) {
                    Some(i) => {
                        placed.swap_remove(i);
                    }
                    None => available.push(o.clone()),
                }
            }
            RoundView::MissingWord {
                template: mw.template(),
                options: mw.options.clone(),
                available,
                single_blank: mw.single_blank,
            }
        }
        Round::Spelling(s) => RoundView::Spelling { source_word: s.source_word.clone() },
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct StartJourneyIn {
    pub language: String,
    #[serde(default)]
    pub level: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnswerIn {
    #[serde(default)]
    pub attempt: Option<Attempt>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub journey: JourneyView,
}

#[derive(Debug, Default, Deserialize)]
pub struct RestartIn {
    #[serde(default)]
    pub level: Option<i64>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generator: &'static str,
    pub sessions: usize,
}
