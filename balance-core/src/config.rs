//! Tunable parameters for the insight engine

use serde::{Deserialize, Serialize};

/// Configuration for both insight components
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightConfig {
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
}

/// Configuration for the similarity ranker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerConfig {
    /// Maximum number of stored candidates loaded for one search
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            candidate_cap: default_candidate_cap(),
        }
    }
}

/// Configuration for the purchase interval predictor
///
/// Confidence is `min(max_confidence, base_confidence + confidence_per_sample * samples)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,
    #[serde(default = "default_confidence_per_sample")]
    pub confidence_per_sample: f64,
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,
    /// Minimum purchases at a merchant before an interval is estimated
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

impl PredictorConfig {
    /// Saturating confidence for a merchant with `samples` purchases
    pub fn confidence(&self, samples: usize) -> f64 {
        (self.base_confidence + self.confidence_per_sample * samples as f64).min(self.max_confidence)
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            base_confidence: default_base_confidence(),
            confidence_per_sample: default_confidence_per_sample(),
            max_confidence: default_max_confidence(),
            min_samples: default_min_samples(),
        }
    }
}

fn default_candidate_cap() -> usize {
    200
}

fn default_base_confidence() -> f64 {
    0.3
}

fn default_confidence_per_sample() -> f64 {
    0.15
}

fn default_max_confidence() -> f64 {
    1.0
}

fn default_min_samples() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_confidence_curve() {
        let config = PredictorConfig::default();

        assert!((config.confidence(2) - 0.6).abs() < 1e-9);
        assert!((config.confidence(3) - 0.75).abs() < 1e-9);
        assert_eq!(config.confidence(5), 1.0);
        assert_eq!(config.confidence(10), 1.0);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "predictor": { "confidence_per_sample": 0.1 } }"#;
        let config: InsightConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.ranker.candidate_cap, 200);
        assert_eq!(config.predictor.base_confidence, 0.3);
        assert!((config.predictor.confidence(2) - 0.5).abs() < 1e-9);
    }
}
