// src/analyze/llm.rs
//! Contextual LLM adapter.
//!
//! Sends a fixed prompt asking for a single -1..1 impact rating, parses
//! the first numeric literal out of the reply and clamps it. Rate-limit
//! and client errors are retried with exponential backoff; when one
//! credential is exhausted the next one in the configured order is
//! tried. Exhausting everything degrades to "score absent", never to a
//! failed analysis.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::analyze::ensemble::ModelAdapter;
use crate::error::ModelAdapterError;

pub const ENV_API_KEY: &str = "LLM_API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "LLM_API_KEY_FALLBACK";
pub const ENV_ENDPOINT: &str = "LLM_ENDPOINT";
pub const ENV_MODEL: &str = "LLM_MODEL";

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROMPT_TEXT_CAP: usize = 4000;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Ordered credential list; later entries are failover keys.
    pub api_keys: Vec<String>,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Minimum spacing between calls, enforced process-wide.
    pub min_call_interval: Duration,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_keys: Vec::new(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            min_call_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

impl LlmConfig {
    /// Credentials and overrides from the environment. Missing keys just
    /// mean the adapter reports itself absent.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(ep) = std::env::var(ENV_ENDPOINT) {
            if !ep.trim().is_empty() {
                cfg.endpoint = ep;
            }
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            if !model.trim().is_empty() {
                cfg.model = model;
            }
        }
        for var in [ENV_API_KEY, ENV_API_KEY_FALLBACK] {
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    cfg.api_keys.push(key);
                }
            }
        }
        cfg
    }
}

pub struct LlmAdapter {
    http: reqwest::Client,
    config: LlmConfig,
    last_call: Mutex<Option<Instant>>,
}

impl LlmAdapter {
    pub fn new(config: LlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("nse-news-sentiment/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(config.timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            config,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(LlmConfig::from_env())
    }

    async fn respect_rate_limit(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.config.min_call_interval {
                tokio::time::sleep(self.config.min_call_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn call_once(&self, api_key: &str, text: &str) -> Result<Option<f64>, ModelAdapterError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        self.respect_rate_limit().await;

        let prompt = build_prompt(text);
        let req = Req {
            model: &self.config.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.0,
            max_tokens: 10,
        };

        let resp = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelAdapterError::Unavailable("llm request timed out".into())
                } else {
                    ModelAdapterError::Unavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ModelAdapterError::RateLimited);
        }
        if status.is_client_error() {
            return Err(ModelAdapterError::Client(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(ModelAdapterError::Unexpected(format!("status {status}")));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ModelAdapterError::Unexpected(e.to_string()))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");
        Ok(parse_rating(content))
    }
}

#[async_trait]
impl ModelAdapter for LlmAdapter {
    async fn score(&self, text: &str) -> Result<Option<f64>, ModelAdapterError> {
        if self.config.api_keys.is_empty() {
            return Ok(None);
        }

        for (key_idx, key) in self.config.api_keys.iter().enumerate() {
            let mut attempt = 0u32;
            loop {
                match self.call_once(key, text).await {
                    Ok(score) => return Ok(score),
                    Err(e @ (ModelAdapterError::RateLimited | ModelAdapterError::Client(_))) => {
                        attempt += 1;
                        if attempt >= self.config.max_attempts {
                            tracing::warn!(
                                credential = key_idx,
                                error = %e,
                                "llm credential exhausted, failing over"
                            );
                            break;
                        }
                        let delay = self.config.backoff_base * 2u32.pow(attempt - 1);
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "llm adapter absent for this call");
                        return Ok(None);
                    }
                }
            }
        }

        // All credentials exhausted: downgrade to absent.
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Fixed prompt: 9-point described scale with financial-impact criteria.
pub fn build_prompt(text: &str) -> String {
    let capped: String = text.chars().take(PROMPT_TEXT_CAP).collect();
    format!(
        "You are an expert financial analyst. Analyze the potential impact of the \
following news on the Indian stock market.\n\n\
Consider:\n\
- Investor sentiment\n\
- Industry/sector dynamics\n\
- Macroeconomic indicators\n\
- Market reaction likelihood\n\n\
Rate the impact on a scale from -1 to 1:\n\
-1: Severely negative impact\n\
-0.75: Highly negative impact\n\
-0.5: Moderately negative impact\n\
-0.25: Slightly negative impact\n\
0: No effect\n\
0.25: Slightly positive impact\n\
0.5: Moderately positive impact\n\
0.75: Highly positive impact\n\
1: Extremely positive impact\n\n\
Provide ONLY a single numerical rating between -1 and 1 as your response, nothing else.\n\n\
News:\n{capped}\n"
    )
}

/// First numeric literal in the reply, clamped to [-1, 1].
pub fn parse_rating(response: &str) -> Option<f64> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"-?\d+\.?\d*").unwrap());
    let m = re.find(response)?;
    let value: f64 = m.as_str().parse().ok()?;
    Some(value.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rating_takes_first_number_and_clamps() {
        assert_eq!(parse_rating("0.75"), Some(0.75));
        assert_eq!(parse_rating("-0.5 because of weak demand"), Some(-0.5));
        assert_eq!(parse_rating("Rating: 42"), Some(1.0));
        assert_eq!(parse_rating("-3.5"), Some(-1.0));
        assert_eq!(parse_rating("no number here"), None);
    }

    #[test]
    fn prompt_caps_text_length() {
        let long = "x".repeat(10_000);
        let prompt = build_prompt(&long);
        assert!(prompt.len() < 6_000);
        assert!(prompt.contains("Indian stock market"));
    }

    #[tokio::test]
    async fn adapter_without_keys_is_absent_not_an_error() {
        let adapter = LlmAdapter::new(LlmConfig::default());
        let out = adapter.score("anything").await.unwrap();
        assert_eq!(out, None);
    }
}
