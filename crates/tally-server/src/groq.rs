//! [`GroqClient`]: a [`CompletionClient`] over the OpenAI-compatible
//! `/chat/completions` API that Groq serves.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tally_core::completion::{CompletionClient, ServiceError};

use crate::{Result, settings::CompletionConfig};

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model:       &'a str,
  messages:    [ChatMessage<'a>; 1],
  temperature: f32,
  max_tokens:  u32,
  top_p:       f32,
  stream:      bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role:    &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
  content: Option<String>,
}

/// Extract the first choice's text from a chat completions response body.
pub fn parse_completion(body: &str) -> Result<String, ServiceError> {
  let response: ChatResponse =
    serde_json::from_str(body).map_err(|e| ServiceError::Malformed(e.to_string()))?;

  let content = response
    .choices
    .into_iter()
    .next()
    .and_then(|c| c.message.content)
    .ok_or_else(|| ServiceError::Malformed("response has no choices".to_owned()))?;

  let content = content.trim();
  if content.is_empty() {
    return Err(ServiceError::Malformed("empty completion".to_owned()));
  }
  Ok(content.to_owned())
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct GroqClient {
  client: Client,
  config: CompletionConfig,
}

impl GroqClient {
  pub fn new(config: CompletionConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
  }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
  if e.is_timeout() {
    ServiceError::Timeout
  } else {
    ServiceError::Unavailable(e.to_string())
  }
}

impl CompletionClient for GroqClient {
  async fn complete<'a>(&'a self, prompt: &'a str) -> Result<String, ServiceError> {
    let key = self.config.api_key.as_ref().ok_or_else(|| {
      ServiceError::NotConfigured(format!(
        "no API key; set completion.api_key or {}",
        crate::settings::API_KEY_ENV
      ))
    })?;

    let request = ChatRequest {
      model:       &self.config.model,
      messages:    [ChatMessage { role: "user", content: prompt }],
      temperature: self.config.temperature,
      max_tokens:  self.config.max_tokens,
      top_p:       self.config.top_p,
      stream:      false,
    };

    tracing::debug!(model = %self.config.model, "requesting completion");
    let response = self
      .client
      .post(self.url())
      .bearer_auth(key.expose())
      .json(&request)
      .send()
      .await
      .map_err(transport_error)?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
      return Err(ServiceError::QuotaExhausted);
    }
    if !status.is_success() {
      return Err(ServiceError::Unavailable(format!("completion endpoint returned {status}")));
    }

    let body = response.text().await.map_err(transport_error)?;
    parse_completion(&body)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode as AxumStatus},
    routing::post,
  };
  use serde_json::{Value, json};
  use tokio::net::TcpListener;

  use super::*;
  use crate::settings::ApiKey;

  #[derive(Clone, Default)]
  struct Seen {
    body:   Arc<Mutex<Option<Value>>>,
    bearer: Arc<Mutex<Option<String>>>,
  }

  /// Serve `router` on an ephemeral local port and return its base URL.
  async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
  }

  fn client(base_url: String, key: Option<&str>) -> GroqClient {
    GroqClient::new(CompletionConfig {
      api_key: key.map(ApiKey::new),
      base_url,
      timeout_secs: 1,
      ..CompletionConfig::default()
    })
    .unwrap()
  }

  fn reply(content: &str) -> Value {
    json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }] })
  }

  #[tokio::test]
  async fn sends_configured_parameters_and_returns_trimmed_text() {
    let seen = Seen::default();
    let recorder = seen.clone();
    let router = Router::new().route(
      "/chat/completions",
      post(move |headers: HeaderMap, Json(body): Json<Value>| {
        let recorder = recorder.clone();
        async move {
          *recorder.body.lock().unwrap() = Some(body);
          *recorder.bearer.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
          Json(reply("  SELECT * FROM Finance\n"))
        }
      }),
    );
    let base = serve(router).await;

    let text = client(base, Some("gsk_test")).complete("the prompt").await.unwrap();
    assert_eq!(text, "SELECT * FROM Finance");

    let body = seen.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "llama-3.3-70b-versatile");
    assert_eq!(body["temperature"], 0.0);
    assert_eq!(body["max_tokens"], 200);
    assert_eq!(body["top_p"], 1.0);
    assert_eq!(body["messages"][0]["content"], "the prompt");
    assert_eq!(seen.bearer.lock().unwrap().as_deref(), Some("Bearer gsk_test"));
  }

  #[tokio::test]
  async fn missing_key_fails_without_a_request() {
    let err = client("http://127.0.0.1:9".into(), None).complete("p").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotConfigured(_)));
  }

  #[tokio::test]
  async fn too_many_requests_is_quota_exhaustion() {
    let router = Router::new()
      .route("/chat/completions", post(|| async { AxumStatus::TOO_MANY_REQUESTS }));
    let base = serve(router).await;

    let err = client(base, Some("k")).complete("p").await.unwrap_err();
    assert_eq!(err, ServiceError::QuotaExhausted);
  }

  #[tokio::test]
  async fn server_errors_are_unavailable() {
    let router = Router::new()
      .route("/chat/completions", post(|| async { AxumStatus::BAD_GATEWAY }));
    let base = serve(router).await;

    let err = client(base, Some("k")).complete("p").await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
  }

  #[tokio::test]
  async fn slow_endpoint_times_out() {
    let router = Router::new().route(
      "/chat/completions",
      post(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Json(reply("SELECT 1"))
      }),
    );
    let base = serve(router).await;

    let err = client(base, Some("k")).complete("p").await.unwrap_err();
    assert_eq!(err, ServiceError::Timeout);
  }

  #[test]
  fn parse_rejects_bodies_without_text() {
    for body in [
      "not json",
      r#"{"choices": []}"#,
      r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#,
      r#"{"choices": [{"message": {"role": "assistant", "content": "   "}}]}"#,
    ] {
      assert!(matches!(parse_completion(body), Err(ServiceError::Malformed(_))), "{body}");
    }
  }
}
