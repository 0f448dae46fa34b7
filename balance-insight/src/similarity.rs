//! Cosine similarity ranking

use balance_core::{InsightError, InsightResult, RankCandidate, RankerConfig, SimilarityResult};
use ndarray::{Array1, ArrayView1};
use tracing::debug;

/// Calculate cosine similarity between two vectors
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical direction).
/// A zero-norm vector on either side yields 0.0 so degenerate embeddings
/// stay sortable.
///
/// Formula: cos(θ) = (A · B) / (||A|| ||B||)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> InsightResult<f64> {
    if a.len() != b.len() {
        return Err(InsightError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let query = NormalizedQuery::new(a);
    Ok(query.score(b))
}

/// Query vector widened to f64 with its squared norm precomputed
struct NormalizedQuery {
    values: Array1<f64>,
    norm_sq: f64,
}

impl NormalizedQuery {
    fn new(query: &[f32]) -> Self {
        let values = ArrayView1::from(query).mapv(f64::from);
        let norm_sq = values.dot(&values);
        Self { values, norm_sq }
    }

    fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Caller guarantees `candidate` has the query's dimension
    fn score(&self, candidate: &[f32]) -> f64 {
        let candidate = ArrayView1::from(candidate).mapv(f64::from);

        let dot_product = self.values.dot(&candidate);
        let candidate_norm_sq = candidate.dot(&candidate);

        if self.norm_sq == 0.0 || candidate_norm_sq == 0.0 {
            return 0.0;
        }

        // sqrt of the product keeps cos(a, a) at exactly 1.0
        (dot_product / (self.norm_sq * candidate_norm_sq).sqrt()).clamp(-1.0, 1.0)
    }
}

/// Brute-force top-K ranker over a bounded candidate set
#[derive(Debug, Clone, Default)]
pub struct SimilarityRanker {
    config: RankerConfig,
}

impl SimilarityRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Rank candidates by cosine similarity to `query`
    ///
    /// # Arguments
    /// * `query` - Query embedding, must be non-empty
    /// * `candidates` - Candidate items, each with an embedding of the query's dimension
    /// * `limit` - Maximum number of results to return, must be positive
    ///
    /// Every candidate is scored. Bounding the set to `candidate_cap` is
    /// the caller's job when it loads candidates.
    ///
    /// # Returns
    /// Results sorted by similarity (highest first). Equal scores keep the
    /// relative order of `candidates`.
    pub fn rank(
        &self,
        query: &[f32],
        candidates: &[RankCandidate],
        limit: usize,
    ) -> InsightResult<Vec<SimilarityResult>> {
        if query.is_empty() {
            return Err(InsightError::EmptyQuery);
        }
        if limit == 0 {
            return Err(InsightError::InvalidLimit(limit));
        }

        let query = NormalizedQuery::new(query);

        // Validate every candidate before scoring any of them
        if let Some(bad) = candidates
            .iter()
            .find(|c| c.embedding.len() != query.dimension())
        {
            return Err(InsightError::dimension_mismatch(
                bad.id.clone(),
                query.dimension(),
                bad.embedding.len(),
            ));
        }

        debug!(
            "Ranking {} candidates, dimension={}, limit={}",
            candidates.len(),
            query.dimension(),
            limit
        );

        let mut results: Vec<SimilarityResult> = candidates
            .iter()
            .map(|candidate| SimilarityResult {
                id: candidate.id.clone(),
                item_text: candidate.item_text.clone(),
                similarity: query.score(&candidate.embedding),
            })
            .collect();

        // Stable sort: ties keep input order
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        results.truncate(limit);

        if let Some(top) = results.first() {
            debug!("Top match: id={}, similarity={:.3}", top.id, top.similarity);
        }

        Ok(results)
    }
}
