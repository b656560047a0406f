//! A small SQLite-flavoured lexer. It only knows enough structure for the
//! guard to tell literals, identifiers, comments and separators apart.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
  /// Bare identifier or keyword.
  Word,
  /// `"ident"`, `` `ident` `` or `[ident]`.
  QuotedIdent,
  /// `'text'`, with `''` as the escaped quote.
  Str,
  Number,
  /// `-- …` or `/* … */`.
  Comment,
  Semicolon,
  /// Any other single character.
  Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token<'a> {
  pub kind: TokenKind,
  pub text: &'a str,
  pub span: Range<usize>,
}

impl Token<'_> {
  pub fn is_word(&self, keyword: &str) -> bool {
    self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
  }

  pub fn is_symbol(&self, c: char) -> bool {
    self.kind == TokenKind::Symbol && self.text.starts_with(c)
  }

  pub fn is_identifier(&self) -> bool {
    matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
  }

  /// Identifier name with quoting removed.
  pub fn identifier(&self) -> Option<String> {
    match self.kind {
      TokenKind::Word => Some(self.text.to_owned()),
      TokenKind::QuotedIdent => {
        let inner = &self.text[1..self.text.len() - 1];
        Some(match self.text.as_bytes()[0] {
          b'"' => inner.replace("\"\"", "\""),
          b'`' => inner.replace("``", "`"),
          _ => inner.to_owned(),
        })
      }
      _ => None,
    }
  }

  /// Content of a string literal with `''` unescaped.
  pub fn string_value(&self) -> Option<String> {
    (self.kind == TokenKind::Str)
      .then(|| self.text[1..self.text.len() - 1].replace("''", "'"))
  }
}

/// Why the input could not be tokenised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LexError {
  UnterminatedString(usize),
  UnterminatedIdentifier(usize),
}

impl std::fmt::Display for LexError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::UnterminatedString(at) => {
        write!(f, "unterminated string literal at offset {at}")
      }
      Self::UnterminatedIdentifier(at) => {
        write!(f, "unterminated quoted identifier at offset {at}")
      }
    }
  }
}

/// Tokenise `input`. Whitespace is dropped; comments are kept as tokens.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
  let bytes = input.as_bytes();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < bytes.len() {
    let b = bytes[i];
    let start = i;

    let kind = match b {
      b if b.is_ascii_whitespace() => {
        i += 1;
        continue;
      }
      b'\'' => {
        i = scan_quoted(bytes, i, b'\'', true)
          .ok_or(LexError::UnterminatedString(start))?;
        TokenKind::Str
      }
      b'"' | b'`' => {
        i = scan_quoted(bytes, i, b, true)
          .ok_or(LexError::UnterminatedIdentifier(start))?;
        TokenKind::QuotedIdent
      }
      b'[' => {
        i = scan_quoted(bytes, i, b']', false)
          .ok_or(LexError::UnterminatedIdentifier(start))?;
        TokenKind::QuotedIdent
      }
      b'-' if bytes.get(i + 1) == Some(&b'-') => {
        i = bytes[i..]
          .iter()
          .position(|&c| c == b'\n')
          .map_or(bytes.len(), |p| i + p);
        TokenKind::Comment
      }
      b'/' if bytes.get(i + 1) == Some(&b'*') => {
        // SQLite accepts an unterminated block comment at end of input.
        i = input[i + 2..]
          .find("*/")
          .map_or(bytes.len(), |p| i + 2 + p + 2);
        TokenKind::Comment
      }
      b';' => {
        i += 1;
        TokenKind::Semicolon
      }
      b'0'..=b'9' => {
        i = scan_number(bytes, i);
        TokenKind::Number
      }
      b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
        i = scan_number(bytes, i);
        TokenKind::Number
      }
      b if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 => {
        while i < bytes.len()
          && (bytes[i].is_ascii_alphanumeric()
            || bytes[i] == b'_'
            || bytes[i] == b'$'
            || bytes[i] >= 0x80)
        {
          i += 1;
        }
        TokenKind::Word
      }
      _ => {
        i += 1;
        TokenKind::Symbol
      }
    };

    tokens.push(Token { kind, text: &input[start..i], span: start..i });
  }

  Ok(tokens)
}

/// Returns the index just past the closing quote, or `None` if unterminated.
fn scan_quoted(bytes: &[u8], open: usize, close: u8, doubled: bool) -> Option<usize> {
  let mut i = open + 1;
  while i < bytes.len() {
    if bytes[i] == close {
      if doubled && bytes.get(i + 1) == Some(&close) {
        i += 2;
        continue;
      }
      return Some(i + 1);
    }
    i += 1;
  }
  None
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
  while i < bytes.len() {
    let c = bytes[i];
    let exponent_sign = (c == b'+' || c == b'-')
      && i > 0
      && matches!(bytes[i - 1], b'e' | b'E')
      && bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
    if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign {
      i += 1;
    } else {
      break;
    }
  }
  i
}
