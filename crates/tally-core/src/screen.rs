//! Local misuse screening of user text, applied before any prompt is built.

use serde::{Deserialize, Serialize};

/// Words that flag a request as misuse when they appear as whole words.
pub const DEFAULT_MISUSE_WORDS: &[&str] = &[
  "rob", "hack", "steal", "terrorist", "attack", "kill", "murder", "drugs",
  "bomb", "scam", "fraud",
];

/// Whole-word, case-insensitive keyword screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputScreen {
  words: Vec<String>,
}

impl Default for InputScreen {
  fn default() -> Self {
    Self::new(DEFAULT_MISUSE_WORDS.iter().copied())
  }
}

impl InputScreen {
  pub fn new<I, S>(words: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self {
      words: words
        .into_iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect(),
    }
  }

  /// An empty screen that lets everything through.
  pub fn disabled() -> Self {
    Self { words: Vec::new() }
  }

  /// Returns the first configured word found in `text`, if any.
  pub fn flagged_word(&self, text: &str) -> Option<&str> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
      .split(|c: char| !c.is_alphanumeric())
      .filter(|t| !t.is_empty())
      .collect();
    self
      .words
      .iter()
      .find(|w| tokens.iter().any(|t| t == w))
      .map(String::as_str)
  }
}
