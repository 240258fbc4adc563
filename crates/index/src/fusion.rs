use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::query::Hit;
use crate::IndexError;

/// Weighted linear fusion of several ranked hit lists.
///
/// The fused score of a candidate is `Σ weight[i] * score_in_list[i]`, where
/// a list the candidate is missing from contributes 0. Candidates from every
/// list are kept (union). Exact score ties are broken by the earliest list
/// the candidate appears in, then by its rank there, so the first list wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedRanker {
    weights: Vec<f32>,
}

struct Candidate<'a> {
    hit: &'a Hit,
    score: f32,
    list: usize,
    rank: usize,
}

impl WeightedRanker {
    pub fn new(weights: Vec<f32>) -> Result<Self, IndexError> {
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(IndexError::Query(format!(
                "fusion weight {w} must be finite and non-negative"
            )));
        }
        Ok(Self { weights })
    }

    /// Dense list first, sparse list second.
    pub fn hybrid(dense_weight: f32, sparse_weight: f32) -> Result<Self, IndexError> {
        Self::new(vec![dense_weight, sparse_weight])
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn fuse(&self, lists: &[Vec<Hit>], limit: usize) -> Result<Vec<Hit>, IndexError> {
        if lists.len() != self.weights.len() {
            return Err(IndexError::Query(format!(
                "ranker has {} weights but received {} result lists",
                self.weights.len(),
                lists.len()
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut positions: hashbrown::HashMap<&str, usize> = hashbrown::HashMap::new();
        let mut candidates: Vec<Candidate<'_>> = Vec::new();

        for (list, (hits, weight)) in lists.iter().zip(&self.weights).enumerate() {
            for (rank, hit) in hits.iter().enumerate() {
                let contribution = weight * hit.score;
                match positions.get(hit.id.as_str()) {
                    Some(&pos) => candidates[pos].score += contribution,
                    None => {
                        positions.insert(hit.id.as_str(), candidates.len());
                        candidates.push(Candidate {
                            hit,
                            score: contribution,
                            list,
                            rank,
                        });
                    }
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| (a.list, a.rank).cmp(&(b.list, b.rank)))
        });
        candidates.truncate(limit);

        Ok(candidates
            .into_iter()
            .map(|c| Hit {
                id: c.hit.id.clone(),
                text: c.hit.text.clone(),
                score: c.score,
            })
            .collect())
    }
}
