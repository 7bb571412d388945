// src/analyze/classifier.rs
//! Finance-specific classifier adapter.
//!
//! Talks to an inference service that returns a 3-class probability
//! distribution (positive/negative/neutral) and maps it to a scalar
//! `P(positive) - P(negative)`. Without a configured endpoint the
//! adapter reports itself absent.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analyze::ensemble::ModelAdapter;
use crate::error::ModelAdapterError;

pub const ENV_ENDPOINT: &str = "FINANCE_CLASSIFIER_URL";
const TEXT_CAP: usize = 512;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    positive: f64,
    negative: f64,
    #[allow(dead_code)]
    neutral: f64,
}

pub struct ClassifierAdapter {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl ClassifierAdapter {
    pub fn new(endpoint: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("nse-news-sentiment/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(ENV_ENDPOINT).ok())
    }
}

#[async_trait]
impl ModelAdapter for ClassifierAdapter {
    async fn score(&self, text: &str) -> Result<Option<f64>, ModelAdapterError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(None);
        };

        let capped: String = text.chars().take(TEXT_CAP).collect();
        let resp = self
            .http
            .post(endpoint)
            .json(&ClassifyRequest { text: &capped })
            .send()
            .await
            .map_err(|e| ModelAdapterError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ModelAdapterError::RateLimited);
        }
        if !status.is_success() {
            return Err(ModelAdapterError::Unexpected(format!("status {status}")));
        }

        let dist: ClassifyResponse = resp
            .json()
            .await
            .map_err(|e| ModelAdapterError::Unexpected(e.to_string()))?;
        Ok(Some((dist.positive - dist.negative).clamp(-1.0, 1.0)))
    }

    fn name(&self) -> &'static str {
        "classifier"
    }
}
