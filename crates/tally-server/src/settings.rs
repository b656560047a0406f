//! Server configuration.
//!
//! Layered from an optional TOML file under `TALLY_*` environment variables
//! (nested keys use `__`, e.g. `TALLY_RATE_LIMIT__MAX_REQUESTS=20`). The
//! completion credential may also come from `GROQ_API_KEY`.

use std::{fmt, path::{Path, PathBuf}};

use serde::Deserialize;
use tally_core::{guard::GuardPolicy, screen::DEFAULT_MISUSE_WORDS};

use crate::Result;

pub const ENV_PREFIX: &str = "TALLY";

/// Fallback source for [`CompletionConfig::api_key`].
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

// ─── Credential ──────────────────────────────────────────────────────────────

/// A bearer credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
  pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

  pub fn expose(&self) -> &str { &self.0 }
}

impl fmt::Debug for ApiKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("ApiKey([redacted])") }
}

// ─── Sections ────────────────────────────────────────────────────────────────

/// Settings for the OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
  pub api_key:      Option<ApiKey>,
  pub base_url:     String,
  pub model:        String,
  pub temperature:  f32,
  pub max_tokens:   u32,
  pub top_p:        f32,
  pub timeout_secs: u64,
}

impl Default for CompletionConfig {
  fn default() -> Self {
    Self {
      api_key:      None,
      base_url:     "https://api.groq.com/openai/v1".to_owned(),
      model:        "llama-3.3-70b-versatile".to_owned(),
      temperature:  0.0,
      max_tokens:   200,
      top_p:        1.0,
      timeout_secs: 30,
    }
  }
}

/// Fixed-window thresholds. `max_requests = 0` disables limiting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
  pub max_requests: u32,
  pub window_secs:  u64,
}

impl Default for RateLimitConfig {
  fn default() -> Self { Self { max_requests: 10, window_secs: 60 } }
}

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  pub busy_timeout_ms: u64,
  pub completion:      CompletionConfig,
  pub guard:           GuardPolicy,
  pub misuse_words:    Vec<String>,
  pub rate_limit:      RateLimitConfig,
  /// Identify callers by `x-caller-id` / `x-forwarded-for` instead of the
  /// peer address. Enable only behind a proxy that sets these headers.
  pub trust_forwarded_headers: bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".to_owned(),
      port:            8000,
      store_path:      PathBuf::from("finance.db"),
      busy_timeout_ms: 5_000,
      completion:      CompletionConfig::default(),
      guard:           GuardPolicy::default(),
      misuse_words:    DEFAULT_MISUSE_WORDS.iter().map(|w| (*w).to_owned()).collect(),
      rate_limit:      RateLimitConfig::default(),
      trust_forwarded_headers: false,
    }
  }
}

impl ServerConfig {
  /// Load from `path` (if it exists) and the process environment.
  pub fn load(path: &Path) -> Result<Self> {
    let builder = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      );
    let fallback_key = std::env::var(API_KEY_ENV).ok();
    Self::from_builder(builder, fallback_key)
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    fallback_key: Option<String>,
  ) -> Result<Self> {
    let mut cfg: Self = builder.build()?.try_deserialize()?;

    if cfg.completion.api_key.as_ref().is_none_or(|k| k.expose().trim().is_empty()) {
      cfg.completion.api_key = fallback_key
        .filter(|k| !k.trim().is_empty())
        .map(ApiKey::new);
    }
    Ok(cfg)
  }
}
