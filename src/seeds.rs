//! Built-in journeys that keep the engine usable without a content generator.
//!
//! A small per-language phrase table fills a fixed round template. Languages
//! missing from the table get the English template with placeholder target strings.

use tracing::{info, warn};

use crate::domain::{Journey, MatchingRound, MissingWordRound, Round, SpellingRound};
use crate::languages::language_name;
use crate::util::tokenize;

/// Levels from which the fallback also carries a two-blank round.
const MULTI_BLANK_FROM_LEVEL: u8 = 5;

const GREETING_EN: &str = "Hello, how are you?";
const THANKS_EN: &str = "Thank you very much";

/// Hand-authored phrases for one language.
struct Phrases {
  code: &'static str,
  greeting: &'static str,
  morning: &'static str,
  /// Token index blanked in the single-blank round.
  blank: usize,
  /// Second token blanked in the two-blank round.
  second_blank: usize,
  distractors: [&'static str; 3],
  book: &'static str,
  thanks: &'static str,
  water: &'static str,
}

const PHRASES: &[Phrases] = &[
  Phrases {
    code: "en",
    greeting: "Hello, how are you?",
    morning: "I like to drink coffee in the morning",
    blank: 4,
    second_blank: 3,
    distractors: ["table", "window", "blue"],
    book: "book",
    thanks: "Thank you very much",
    water: "water",
  },
  Phrases {
    code: "de",
    greeting: "Hallo, wie geht es dir?",
    morning: "Ich trinke gerne Kaffee am Morgen",
    blank: 2,
    second_blank: 3,
    distractors: ["Schlüssel", "Fenster", "rot"],
    book: "Buch",
    thanks: "Vielen Dank",
    water: "Wasser",
  },
  Phrases {
    code: "es",
    greeting: "¡Hola! ¿Cómo estás?",
    morning: "Me gusta tomar café por la mañana",
    blank: 2,
    second_blank: 3,
    distractors: ["puerta", "casa", "verde"],
    book: "libro",
    thanks: "Muchas gracias",
    water: "agua",
  },
  Phrases {
    code: "fr",
    greeting: "Bonjour, comment ça va?",
    morning: "J'aime boire du café le matin",
    blank: 1,
    second_blank: 3,
    distractors: ["fenêtre", "chaise", "jaune"],
    book: "livre",
    thanks: "Merci beaucoup",
    water: "eau",
  },
  Phrases {
    code: "pt-BR",
    greeting: "Olá, como você está?",
    morning: "Eu gosto de tomar café de manhã",
    blank: 3,
    second_blank: 4,
    distractors: ["mesa", "janela", "azul"],
    book: "livro",
    thanks: "Muito obrigado",
    water: "água",
  },
  Phrases {
    code: "zh",
    greeting: "你好， 你 好吗？",
    morning: "我 喜欢 早上 喝 咖啡",
    blank: 2,
    second_blank: 4,
    distractors: ["桌子", "窗户", "蓝色"],
    book: "书",
    thanks: "非常 感谢",
    water: "水",
  },
  Phrases {
    code: "ko",
    greeting: "안녕하세요, 어떻게 지내세요?",
    morning: "저는 아침에 커피 마시는 것을 좋아해요",
    blank: 2,
    second_blank: 3,
    distractors: ["테이블", "창문", "파란색"],
    book: "책",
    thanks: "정말 감사합니다",
    water: "물",
  },
  Phrases {
    code: "no",
    greeting: "Hei, hvordan har du det?",
    morning: "Jeg liker å drikke kaffe om morgenen",
    blank: 3,
    second_blank: 4,
    distractors: ["bord", "vindu", "blå"],
    book: "bok",
    thanks: "Tusen takk",
    water: "vann",
  },
  Phrases {
    code: "ar",
    greeting: "مرحبا، كيف حالك؟",
    morning: "أحب شرب القهوة في الصباح",
    blank: 1,
    second_blank: 2,
    distractors: ["طاولة", "نافذة", "أزرق"],
    book: "كتاب",
    thanks: "شكرا جزيلا",
    water: "ماء",
  },
];

/// Deterministic journey for (language, level). Rounds are not scrambled yet.
pub fn fallback_journey(language: &str, level: u8) -> Journey {
  match PHRASES.iter().find(|p| p.code == language) {
    Some(p) => {
      info!(target: "journey", %language, level, "Using hand-authored fallback journey");
      build_from_phrases(language, level, p)
    }
    None => {
      warn!(target: "journey", %language, level, "No fallback phrases for language; adapting English template");
      english_template(language, level)
    }
  }
}

fn build_from_phrases(language: &str, level: u8, p: &Phrases) -> Journey {
  let mut practice_rounds = vec![
    Round::Matching(MatchingRound::new(GREETING_EN, p.greeting)),
    single_blank_round(p.morning, p.blank, &p.distractors),
    spelling("book", p.book),
  ];
  if level >= MULTI_BLANK_FROM_LEVEL {
    practice_rounds.push(multi_blank_round(p.morning, &[p.blank, p.second_blank], &p.distractors));
  }

  Journey {
    language: language.to_string(),
    level,
    practice_rounds,
    test_rounds: vec![
      Round::Matching(MatchingRound::new(THANKS_EN, p.thanks)),
      spelling("water", p.water),
    ],
  }
}

/// English rounds with the target strings replaced by placeholders naming the language.
fn english_template(language: &str, level: u8) -> Journey {
  let name = language_name(language).unwrap_or(language);
  let mut journey = match PHRASES.iter().find(|p| p.code == "en") {
    Some(en) => build_from_phrases(language, level, en),
    None => Journey {
      language: language.to_string(),
      level,
      practice_rounds: vec![spelling("book", "book")],
      test_rounds: vec![spelling("water", "water")],
    },
  };

  if let Some(Round::Matching(m)) = journey.practice_rounds.first_mut() {
    *m = MatchingRound::new(GREETING_EN, format!("Hello in {}", name));
  }
  if let Some(Round::Matching(m)) = journey.test_rounds.first_mut() {
    *m = MatchingRound::new(THANKS_EN, format!("Thank you in {}", name));
  }
  journey
}

fn spelling(source: &str, target: &str) -> Round {
  Round::Spelling(SpellingRound { source_word: source.into(), target_spelling: target.into() })
}

fn single_blank_round(sentence: &str, blank: usize, distractors: &[&str; 3]) -> Round {
  let correct = word_at(sentence, blank);
  let mut options = vec![correct.clone()];
  options.extend(distractors.iter().map(|d| d.to_string()));
  Round::MissingWord(MissingWordRound {
    sentence: sentence.into(),
    blank_positions: vec![blank],
    correct_words: vec![correct],
    options,
    single_blank: true,
  })
}

fn multi_blank_round(sentence: &str, blanks: &[usize], distractors: &[&str; 3]) -> Round {
  let mut blank_positions = blanks.to_vec();
  blank_positions.sort_unstable();
  blank_positions.dedup();
  let correct_words: Vec<String> = blank_positions.iter().map(|b| word_at(sentence, *b)).collect();
  let mut options = correct_words.clone();
  options.extend(distractors.iter().map(|d| d.to_string()));
  Round::MissingWord(MissingWordRound {
    sentence: sentence.into(),
    blank_positions,
    correct_words,
    options,
    single_blank: false,
  })
}

fn word_at(sentence: &str, index: usize) -> String {
  tokenize(sentence).get(index).cloned().unwrap_or_default()
}
