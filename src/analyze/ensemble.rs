// src/analyze/ensemble.rs
//! Multi-model sentiment ensemble.
//!
//! Four independent adapters are invoked concurrently; each returns a
//! score in [-1, 1] or an explicit absence. The composite is a weighted
//! mean over whatever subset is present, confidence rewards agreement
//! between models, and the discrete label follows fixed breakpoints.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ModelAdapterError;
use crate::model::SentimentLabel;

/// Capability boundary for one sentiment model.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// `Ok(None)` means "unavailable for this call", which the ensemble
    /// treats the same as a configured-out adapter.
    async fn score(&self, text: &str) -> Result<Option<f64>, ModelAdapterError>;
    fn name(&self) -> &'static str;
}

/// Always absent; used to wire an unconfigured slot.
pub struct DisabledAdapter(pub &'static str);

#[async_trait]
impl ModelAdapter for DisabledAdapter {
    async fn score(&self, _text: &str) -> Result<Option<f64>, ModelAdapterError> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        self.0
    }
}

/// Raw per-model results for one analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ModelScores {
    pub llm: Option<f64>,
    pub classifier: Option<f64>,
    pub lexicon: Option<f64>,
    pub polarity: Option<f64>,
}

impl ModelScores {
    pub fn present(&self) -> Vec<f64> {
        [self.llm, self.classifier, self.lexicon, self.polarity]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn present_count(&self) -> usize {
        self.present().len()
    }
}

/// Fixed fusion weights, renormalized over the adapters that answered.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleWeights {
    pub llm: f64,
    pub classifier: f64,
    pub lexicon: f64,
    pub polarity: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            llm: 0.4,
            classifier: 0.3,
            lexicon: 0.2,
            polarity: 0.1,
        }
    }
}

/// Weighted mean over present scores; 0.0 when nothing answered.
pub fn composite_score(scores: &ModelScores, weights: &EnsembleWeights) -> f64 {
    let pairs = [
        (scores.llm, weights.llm),
        (scores.classifier, weights.classifier),
        (scores.lexicon, weights.lexicon),
        (scores.polarity, weights.polarity),
    ];

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for (score, weight) in pairs {
        if let Some(s) = score {
            weighted_sum += s * weight;
            total_weight += weight;
        }
    }
    if total_weight > 0.0 {
        (weighted_sum / total_weight).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Agreement-based confidence: `1 - min(variance, 1)` over present
/// scores; 0.5 with a single score, 0.0 with none.
pub fn confidence(scores: &ModelScores) -> f64 {
    let present = scores.present();
    match present.len() {
        0 => 0.0,
        1 => 0.5,
        n => {
            let mean = present.iter().sum::<f64>() / n as f64;
            let variance = present.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
            1.0 - variance.min(1.0)
        }
    }
}

/// Full result of one ensemble run.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentAnalysis {
    pub scores: ModelScores,
    pub composite: f64,
    pub confidence: f64,
    pub label: SentimentLabel,
    pub model_set: String,
}

pub struct SentimentEnsemble {
    llm: Arc<dyn ModelAdapter>,
    classifier: Arc<dyn ModelAdapter>,
    lexicon: Arc<dyn ModelAdapter>,
    polarity: Arc<dyn ModelAdapter>,
    weights: EnsembleWeights,
}

impl SentimentEnsemble {
    pub fn new(
        llm: Arc<dyn ModelAdapter>,
        classifier: Arc<dyn ModelAdapter>,
        lexicon: Arc<dyn ModelAdapter>,
        polarity: Arc<dyn ModelAdapter>,
    ) -> Self {
        Self {
            llm,
            classifier,
            lexicon,
            polarity,
            weights: EnsembleWeights::default(),
        }
    }

    /// Production wiring: remote adapters configured from the
    /// environment, local scorers always on.
    pub fn from_env() -> Self {
        Self::new(
            Arc::new(crate::analyze::llm::LlmAdapter::from_env()),
            Arc::new(crate::analyze::classifier::ClassifierAdapter::from_env()),
            Arc::new(crate::analyze::lexicon::LexiconAdapter::new()),
            Arc::new(crate::analyze::polarity::PolarityAdapter::new()),
        )
    }

    pub fn with_weights(mut self, weights: EnsembleWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Run all four adapters concurrently and fuse whatever came back.
    /// Adapter errors are absorbed into absence.
    pub async fn analyze(&self, title: &str, body: &str) -> SentimentAnalysis {
        let full_text = if title.is_empty() {
            body.to_string()
        } else {
            format!("{title}. {body}")
        };

        let (llm, classifier, lexicon, polarity) = tokio::join!(
            run_adapter(&self.llm, &full_text),
            run_adapter(&self.classifier, &full_text),
            run_adapter(&self.lexicon, &full_text),
            run_adapter(&self.polarity, &full_text),
        );

        let scores = ModelScores {
            llm,
            classifier,
            lexicon,
            polarity,
        };
        let composite = composite_score(&scores, &self.weights);

        SentimentAnalysis {
            scores,
            composite,
            confidence: confidence(&scores),
            label: SentimentLabel::from_score(composite),
            model_set: "ensemble".to_string(),
        }
    }
}

async fn run_adapter(adapter: &Arc<dyn ModelAdapter>, text: &str) -> Option<f64> {
    match adapter.score(text).await {
        Ok(score) => score,
        Err(e) => {
            tracing::warn!(adapter = adapter.name(), error = %e, "adapter failed, treating as absent");
            None
        }
    }
}
