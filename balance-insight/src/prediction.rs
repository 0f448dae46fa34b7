//! Next-purchase prediction from repeat purchase intervals

use balance_core::{
    InsightError, InsightResult, PredictorConfig, PurchasePrediction, TransactionRecord,
};
use chrono::Duration;
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Fewer purchases than this can never produce an interval
const MIN_INTERVAL_SAMPLES: usize = 2;

/// Predicts the next purchase per merchant from the mean gap between
/// previous purchases there
#[derive(Debug, Clone, Default)]
pub struct PurchaseIntervalPredictor {
    config: PredictorConfig,
}

impl PurchaseIntervalPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Predict upcoming purchases for one user's transactions
    ///
    /// Input order does not matter; records are ordered by `occurred_at`,
    /// then `id`, before grouping. Merchants with fewer than two purchases, or whose
    /// purchases all share one instant, produce no prediction.
    ///
    /// # Returns
    /// At most `top_k` predictions, soonest first
    pub fn predict(
        &self,
        transactions: &[TransactionRecord],
        top_k: usize,
    ) -> InsightResult<Vec<PurchasePrediction>> {
        if top_k == 0 {
            return Err(InsightError::InvalidLimit(top_k));
        }

        if transactions.len() < MIN_INTERVAL_SAMPLES {
            debug!(
                "Not enough history to predict ({} transactions)",
                transactions.len()
            );
            return Ok(Vec::new());
        }

        let min_samples = self.config.min_samples.max(MIN_INTERVAL_SAMPLES);

        let mut chronological: Vec<&TransactionRecord> = transactions.iter().collect();
        chronological.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut by_merchant: IndexMap<&str, Vec<&TransactionRecord>> = IndexMap::new();
        for record in chronological {
            by_merchant
                .entry(record.merchant.as_str())
                .or_default()
                .push(record);
        }

        let mut predictions: Vec<PurchasePrediction> = by_merchant
            .iter()
            .filter(|(_, purchases)| purchases.len() >= min_samples)
            .filter_map(|(merchant, purchases)| self.predict_merchant(merchant, purchases))
            .collect();

        debug!(
            "Predicted {} of {} merchants",
            predictions.len(),
            by_merchant.len()
        );

        // Equal times order by merchant name
        predictions.sort_by(|a, b| {
            a.predicted_time
                .cmp(&b.predicted_time)
                .then_with(|| a.merchant.cmp(&b.merchant))
        });
        predictions.truncate(top_k);

        Ok(predictions)
    }

    /// `purchases` is non-empty and sorted by `occurred_at`
    fn predict_merchant(
        &self,
        merchant: &str,
        purchases: &[&TransactionRecord],
    ) -> Option<PurchasePrediction> {
        let gaps: Vec<f64> = purchases
            .windows(2)
            .filter_map(|pair| (pair[1].occurred_at - pair[0].occurred_at).num_microseconds())
            .filter(|micros| *micros > 0)
            .map(|micros| micros as f64 / 1_000_000.0)
            .collect();

        if gaps.is_empty() {
            debug!("Skipping {}: no positive purchase interval", merchant);
            return None;
        }

        let avg_interval_secs = gaps.iter().sum::<f64>() / gaps.len() as f64;
        let last = purchases.last()?;

        let offset = Duration::microseconds((avg_interval_secs * 1_000_000.0).round() as i64);
        let Some(predicted_time) = last.occurred_at.checked_add_signed(offset) else {
            warn!("Skipping {}: predicted time out of range", merchant);
            return None;
        };

        let samples = purchases.len();

        Some(PurchasePrediction {
            merchant: merchant.to_string(),
            item: last.item_text.clone(),
            category: last.category.clone(),
            predicted_time,
            confidence: self.config.confidence(samples),
            samples,
            avg_interval_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn purchase(id: &str, merchant: &str, secs: i64) -> TransactionRecord {
        TransactionRecord::new(id, "user_1", merchant, at(secs))
    }

    #[test]
    fn test_predict_rejects_zero_top_k() {
        let predictor = PurchaseIntervalPredictor::default();
        let err = predictor.predict(&[], 0).unwrap_err();
        assert_eq!(err, InsightError::InvalidLimit(0));
    }

    #[test]
    fn test_predict_needs_two_transactions() {
        let predictor = PurchaseIntervalPredictor::default();
        assert!(predictor.predict(&[], 3).unwrap().is_empty());
        assert!(predictor
            .predict(&[purchase("1", "Acme", 0)], 3)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_predict_skips_single_purchase_merchants() {
        let predictor = PurchaseIntervalPredictor::default();
        let txns = vec![
            purchase("1", "Acme", 0),
            purchase("2", "Corner Deli", 100),
            purchase("3", "Acme", 3600),
        ];

        let predictions = predictor.predict(&txns, 5).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].merchant, "Acme");
        assert_eq!(predictions[0].samples, 2);
        assert_eq!(predictions[0].predicted_time, at(7200));
    }

    #[test]
    fn test_predict_excludes_non_positive_gaps() {
        let predictor = PurchaseIntervalPredictor::default();
        // Gaps: 0 (duplicate), 100, 300 -> mean of positive gaps is 200
        let txns = vec![
            purchase("1", "Acme", 0),
            purchase("2", "Acme", 0),
            purchase("3", "Acme", 100),
            purchase("4", "Acme", 400),
        ];

        let predictions = predictor.predict(&txns, 1).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].avg_interval_secs, 200.0);
        assert_eq!(predictions[0].predicted_time, at(600));
        assert_eq!(predictions[0].samples, 4);
        assert!((predictions[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_predict_uses_latest_metadata() {
        let predictor = PurchaseIntervalPredictor::default();
        let txns = vec![
            purchase("2", "Acme", 500)
                .with_item_text("Oat milk")
                .with_category("Groceries"),
            purchase("1", "Acme", 0)
                .with_item_text("Whole milk")
                .with_category("Dairy"),
        ];

        let predictions = predictor.predict(&txns, 1).unwrap();
        assert_eq!(predictions[0].item, "Oat milk");
        assert_eq!(predictions[0].category.as_deref(), Some("Groceries"));
    }

    #[test]
    fn test_predict_sorts_soonest_first_and_truncates() {
        let predictor = PurchaseIntervalPredictor::default();
        let txns = vec![
            purchase("1", "Slow", 0),
            purchase("2", "Fast", 0),
            purchase("3", "Medium", 0),
            purchase("4", "Fast", 10),
            purchase("5", "Medium", 100),
            purchase("6", "Slow", 1000),
        ];

        let predictions = predictor.predict(&txns, 2).unwrap();
        let merchants: Vec<&str> = predictions.iter().map(|p| p.merchant.as_str()).collect();
        assert_eq!(merchants, vec!["Fast", "Medium"]);
    }

    #[test]
    fn test_predict_ties_break_on_merchant() {
        let predictor = PurchaseIntervalPredictor::default();
        let txns = vec![
            purchase("1", "Bodega", 0),
            purchase("2", "Acme", 0),
            purchase("3", "Bodega", 10),
            purchase("4", "Acme", 10),
        ];
        let mut swapped = txns.clone();
        swapped.swap(0, 1);

        for input in [&txns, &swapped] {
            let merchants: Vec<String> = predictor
                .predict(input, 5)
                .unwrap()
                .into_iter()
                .map(|p| p.merchant)
                .collect();
            assert_eq!(merchants, vec!["Acme", "Bodega"]);
        }
    }

    #[test]
    fn test_predict_same_instant_metadata_ignores_input_order() {
        let predictor = PurchaseIntervalPredictor::default();
        let txns = vec![
            purchase("1", "Acme", 0),
            purchase("3", "Acme", 50).with_item_text("Soap"),
            purchase("2", "Acme", 50).with_item_text("Bread"),
        ];
        let mut reversed = txns.clone();
        reversed.reverse();

        let a = predictor.predict(&txns, 1).unwrap();
        let b = predictor.predict(&reversed, 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].item, "Soap");
    }

    #[test]
    fn test_predict_subsecond_interval() {
        let predictor = PurchaseIntervalPredictor::default();
        let base = at(0);
        let txns = vec![
            TransactionRecord::new("1", "u", "Vending", base),
            TransactionRecord::new("2", "u", "Vending", base + Duration::milliseconds(1500)),
        ];

        let predictions = predictor.predict(&txns, 1).unwrap();
        assert_eq!(predictions[0].avg_interval_secs, 1.5);
        assert_eq!(predictions[0].predicted_time, base + Duration::milliseconds(3000));
    }

    #[test]
    fn test_predict_with_alternate_confidence_parameters() {
        let predictor = PurchaseIntervalPredictor::new(PredictorConfig {
            base_confidence: 0.0,
            confidence_per_sample: 0.1,
            max_confidence: 0.25,
            min_samples: 3,
        });
        let txns = vec![
            purchase("1", "Twice", 0),
            purchase("2", "Twice", 10),
            purchase("3", "Thrice", 0),
            purchase("4", "Thrice", 10),
            purchase("5", "Thrice", 20),
        ];

        let predictions = predictor.predict(&txns, 5).unwrap();
        assert_eq!(predictions.len(), 1, "min_samples=3 should drop Twice");
        assert_eq!(predictions[0].merchant, "Thrice");
        assert_eq!(predictions[0].confidence, 0.25);
    }
}
