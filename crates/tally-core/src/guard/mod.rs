//! The statement guard: a pure, fail-closed gate between completion output
//! and execution.
//!
//! [`Guard::inspect`] runs six ordered checks and the first failure wins:
//!
//! 1. strip formatting artifacts (code fences, surrounding backticks);
//! 2. exactly one statement (a `;` may only end the text);
//! 3. the statement kind is on the allow-list (`INSERT INTO`, `SELECT`);
//! 4. every table reference names the contracted table, and nothing names a
//!    system object;
//! 5. no configured blocked token appears outside string literals;
//! 6. INSERTs match the column contract and carry valid values.
//!
//! An [`ApprovedStatement`] can only be produced here, so the executor never
//! sees text that skipped a check.

mod insert;
mod lexer;

use serde::{Deserialize, Serialize};

use self::lexer::{Token, TokenKind};
use crate::schema::TABLE;

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Blocked by default: comment sequences and compound/side-effecting
/// keywords.
pub const DEFAULT_BLOCKED_TOKENS: &[&str] = &[
  "--", "/*", "*/", "UNION", "ATTACH", "DETACH", "PRAGMA", "LOAD_EXTENSION",
  "VACUUM",
];

/// What to do with an INSERT whose category literal is out of vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPolicy {
  /// Reject the statement.
  #[default]
  Reject,
  /// Rewrite the literal to `Other`.
  CoerceToOther,
}

/// Configurable parts of the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardPolicy {
  /// Word-like entries match whole keywords; anything else matches as a
  /// substring. Both only outside string literals and quoted identifiers.
  pub blocked_tokens:  Vec<String>,
  pub category_policy: CategoryPolicy,
}

impl Default for GuardPolicy {
  fn default() -> Self {
    Self {
      blocked_tokens:  DEFAULT_BLOCKED_TOKENS.iter().map(|t| (*t).to_owned()).collect(),
      category_policy: CategoryPolicy::default(),
    }
  }
}

// ─── Verdicts ────────────────────────────────────────────────────────────────

/// The allowed statement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
  Insert,
  Select,
}

/// A statement that passed every guard check. Not constructible outside this
/// module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovedStatement {
  text: String,
  kind: StatementKind,
}

impl ApprovedStatement {
  /// The exact text to execute.
  pub fn text(&self) -> &str { &self.text }

  pub fn kind(&self) -> StatementKind { self.kind }
}

/// Which check rejected a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardRule {
  Empty,
  Malformed,
  MultipleStatements,
  KindNotAllowed,
  TableNotAllowed,
  BlockedToken,
  ColumnMismatch,
  InvalidValue,
}

impl GuardRule {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Empty => "empty",
      Self::Malformed => "malformed",
      Self::MultipleStatements => "multiple_statements",
      Self::KindNotAllowed => "kind_not_allowed",
      Self::TableNotAllowed => "table_not_allowed",
      Self::BlockedToken => "blocked_token",
      Self::ColumnMismatch => "column_mismatch",
      Self::InvalidValue => "invalid_value",
    }
  }
}

impl std::fmt::Display for GuardRule {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A failed check with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{rule}: {detail}")]
pub struct Rejection {
  pub rule:   GuardRule,
  pub detail: String,
}

impl Rejection {
  pub(crate) fn new(rule: GuardRule, detail: impl Into<String>) -> Self {
    Self { rule, detail: detail.into() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  Approved(ApprovedStatement),
  Rejected(Rejection),
}

impl Verdict {
  pub fn is_approved(&self) -> bool { matches!(self, Self::Approved(_)) }

  pub fn into_result(self) -> Result<ApprovedStatement, Rejection> {
    match self {
      Self::Approved(s) => Ok(s),
      Self::Rejected(r) => Err(r),
    }
  }
}

/// Raw completion text together with the guard's verdict on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateStatement {
  pub raw:     String,
  pub verdict: Verdict,
}

// ─── Guard ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Guard {
  policy: GuardPolicy,
}

impl Guard {
  pub fn new(policy: GuardPolicy) -> Self { Self { policy } }

  pub fn policy(&self) -> &GuardPolicy { &self.policy }

  /// Inspect completion text and keep it alongside the verdict.
  pub fn candidate(&self, raw: impl Into<String>) -> CandidateStatement {
    let raw = raw.into();
    let verdict = self.inspect(&raw);
    CandidateStatement { raw, verdict }
  }

  /// Run all checks against `raw`. Pure: the same text always yields the
  /// same verdict.
  pub fn inspect(&self, raw: &str) -> Verdict {
    match self.check(raw) {
      Ok(statement) => Verdict::Approved(statement),
      Err(rejection) => Verdict::Rejected(rejection),
    }
  }

  fn check(&self, raw: &str) -> Result<ApprovedStatement, Rejection> {
    // 1. Formatting artifacts.
    let text = strip_formatting(raw);
    if text.is_empty() {
      return Err(Rejection::new(GuardRule::Empty, "no statement in completion"));
    }

    // 2. Exactly one statement.
    let tokens = lexer::tokenize(text)
      .map_err(|e| Rejection::new(GuardRule::Malformed, e.to_string()))?;
    let (body, tokens) = single_statement(text, tokens)?;
    let significant: Vec<Token<'_>> = tokens
      .iter()
      .filter(|t| t.kind != TokenKind::Comment)
      .cloned()
      .collect();

    // 3. Allow-listed kind.
    let kind = statement_kind(&significant)?;

    // 4. Table references.
    check_tables(&significant, kind)?;

    // 5. Blocked tokens.
    self.check_blocked(body, &tokens)?;

    // 6. INSERT shape.
    let mut text = body.to_owned();
    if kind == StatementKind::Insert
      && let Some(rewrite) = insert::check_insert(&significant, self.policy.category_policy)?
    {
      text.replace_range(rewrite.span, &rewrite.replacement);
    }

    Ok(ApprovedStatement { text, kind })
  }

  fn check_blocked(&self, text: &str, tokens: &[Token<'_>]) -> Result<(), Rejection> {
    // Source text with literals and quoted identifiers blanked out.
    let mut code = String::with_capacity(text.len());
    let mut last = 0;
    for token in tokens
      .iter()
      .filter(|t| matches!(t.kind, TokenKind::Str | TokenKind::QuotedIdent))
    {
      code.push_str(&text[last..token.span.start]);
      code.push(' ');
      last = token.span.end;
    }
    code.push_str(&text[last..]);

    for blocked in &self.policy.blocked_tokens {
      let blocked = blocked.trim();
      if blocked.is_empty() {
        continue;
      }
      let word_like = blocked.chars().all(|c| c.is_alphanumeric() || c == '_');
      let hit = if word_like {
        tokens.iter().any(|t| t.is_word(blocked))
      } else {
        code.contains(blocked)
      };
      if hit {
        return Err(Rejection::new(
          GuardRule::BlockedToken,
          format!("statement contains blocked token {blocked:?}"),
        ));
      }
    }
    Ok(())
  }
}

/// Trim whitespace, fenced code blocks (with an optional language tag) and
/// a pair of surrounding backticks.
fn strip_formatting(raw: &str) -> &str {
  let mut text = raw.trim();

  if let Some(rest) = text.strip_prefix("```") {
    // Drop the info string (e.g. `sql`) on the opening fence line.
    let rest = match rest.find('\n') {
      Some(nl) if rest[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
        &rest[nl + 1..]
      }
      _ => rest,
    };
    text = rest.strip_suffix("```").unwrap_or(rest).trim();
  } else if text.len() >= 2
    && text.starts_with('`')
    && text.ends_with('`')
    && !text[1..text.len() - 1].contains('`')
  {
    text = text[1..text.len() - 1].trim();
  }

  text
}

/// Split off at most one trailing separator; anything after a separator
/// (including comments) means more than one statement.
fn single_statement<'a>(
  text: &'a str,
  mut tokens: Vec<Token<'a>>,
) -> Result<(&'a str, Vec<Token<'a>>), Rejection> {
  let Some(at) = tokens.iter().position(|t| t.kind == TokenKind::Semicolon) else {
    return Ok((text, tokens));
  };
  if at + 1 < tokens.len() {
    return Err(Rejection::new(
      GuardRule::MultipleStatements,
      format!("content follows the separator at offset {}", tokens[at].span.start),
    ));
  }
  let body = text[..tokens[at].span.start].trim_end();
  tokens.truncate(at);
  if tokens.is_empty() {
    return Err(Rejection::new(GuardRule::Empty, "no statement before the separator"));
  }
  Ok((body, tokens))
}

fn statement_kind(tokens: &[Token<'_>]) -> Result<StatementKind, Rejection> {
  let first = tokens.first().ok_or_else(|| {
    Rejection::new(GuardRule::Empty, "statement contains only comments")
  })?;

  if first.is_word("SELECT") {
    Ok(StatementKind::Select)
  } else if first.is_word("INSERT") && tokens.get(1).is_some_and(|t| t.is_word("INTO")) {
    Ok(StatementKind::Insert)
  } else {
    Err(Rejection::new(
      GuardRule::KindNotAllowed,
      format!(
        "statement kind {:?} is not allowed; only INSERT INTO and SELECT are",
        first.text
      ),
    ))
  }
}

/// Keywords that end a FROM item, so they are never read as an alias.
const CLAUSE_KEYWORDS: &[&str] = &[
  "WHERE", "GROUP", "ORDER", "LIMIT", "OFFSET", "HAVING", "WINDOW", "JOIN",
  "LEFT", "RIGHT", "FULL", "INNER", "OUTER", "CROSS", "NATURAL", "ON", "USING",
  "UNION", "EXCEPT", "INTERSECT", "VALUES", "SELECT", "INDEXED", "NOT",
];

fn is_system_name(name: &str) -> bool {
  let lowered = name.to_ascii_lowercase();
  lowered.starts_with("sqlite_") || lowered.starts_with("pragma_")
}

fn check_tables(tokens: &[Token<'_>], kind: StatementKind) -> Result<(), Rejection> {
  if let Some(name) = tokens
    .iter()
    .filter_map(Token::identifier)
    .find(|name| is_system_name(name))
  {
    return Err(Rejection::new(
      GuardRule::TableNotAllowed,
      format!("reference to system object {name:?}"),
    ));
  }

  for (i, token) in tokens.iter().enumerate() {
    if token.is_word("FROM") || token.is_word("JOIN") {
      from_item(tokens, i + 1)?;
    } else if token.is_word("INTO") {
      if kind == StatementKind::Select {
        return Err(Rejection::new(GuardRule::TableNotAllowed, "SELECT INTO is not allowed"));
      }
      table_name(tokens, i + 1)?;
    } else if token.is_word("IN") && !tokens.get(i + 1).is_some_and(|t| t.is_symbol('(')) {
      // `expr IN table-name`
      table_name(tokens, i + 1)?;
      reject_call(tokens, i + 2)?;
    }
  }
  Ok(())
}

/// Check the FROM item starting at `pos`, then any further items of a
/// comma-separated list.
fn from_item(tokens: &[Token<'_>], pos: usize) -> Result<(), Rejection> {
  let Some(token) = tokens.get(pos) else {
    return Err(Rejection::new(GuardRule::TableNotAllowed, "missing table name"));
  };

  let mut next = if token.is_symbol('(') {
    let close = closing_paren(tokens, pos).ok_or_else(|| {
      Rejection::new(GuardRule::Malformed, "unbalanced parenthesis in FROM clause")
    })?;
    // A subquery's own FROM is checked when the scan reaches it; anything
    // else in parentheses is a nested item list.
    if !tokens.get(pos + 1).is_some_and(|t| t.is_word("SELECT")) {
      from_item(&tokens[..close], pos + 1)?;
    }
    close + 1
  } else {
    table_name(tokens, pos)?;
    reject_call(tokens, pos + 1)?;
    pos + 1
  };

  // Optional alias.
  if tokens.get(next).is_some_and(|t| t.is_word("AS")) {
    next += 1;
  }
  if tokens
    .get(next)
    .is_some_and(|t| t.is_identifier() && !CLAUSE_KEYWORDS.iter().any(|k| t.is_word(k)))
  {
    next += 1;
  }

  if tokens.get(next).is_some_and(|t| t.is_symbol(',')) {
    return from_item(tokens, next + 1);
  }
  Ok(())
}

/// The identifier at `pos` must name the contracted table, unqualified.
fn table_name(tokens: &[Token<'_>], pos: usize) -> Result<(), Rejection> {
  let Some(token) = tokens.get(pos) else {
    return Err(Rejection::new(GuardRule::TableNotAllowed, "missing table name"));
  };

  let name = token.identifier().ok_or_else(|| {
    Rejection::new(GuardRule::TableNotAllowed, format!("{:?} is not a table name", token.text))
  })?;
  if !name.eq_ignore_ascii_case(TABLE) {
    return Err(Rejection::new(
      GuardRule::TableNotAllowed,
      format!("table {name:?} is not allowed; only {TABLE} may be referenced"),
    ));
  }
  if tokens.get(pos + 1).is_some_and(|t| t.is_symbol('.')) {
    return Err(Rejection::new(
      GuardRule::TableNotAllowed,
      "schema-qualified table names are not allowed",
    ));
  }
  Ok(())
}

fn reject_call(tokens: &[Token<'_>], pos: usize) -> Result<(), Rejection> {
  if tokens.get(pos).is_some_and(|t| t.is_symbol('(')) {
    return Err(Rejection::new(
      GuardRule::TableNotAllowed,
      "table-valued functions are not allowed",
    ));
  }
  Ok(())
}

/// Index of the `)` matching the `(` at `open`.
fn closing_paren(tokens: &[Token<'_>], open: usize) -> Option<usize> {
  let mut depth = 0usize;
  for (i, token) in tokens.iter().enumerate().skip(open) {
    if token.is_symbol('(') {
      depth += 1;
    } else if token.is_symbol(')') {
      depth = depth.checked_sub(1)?;
      if depth == 0 {
        return Some(i);
      }
    }
  }
  None
}
