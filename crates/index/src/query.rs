use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Filter, IndexError, SparseVector, StoredRecord, VectorIndex};

/// Which vector field a request searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorField {
    Dense,
    Sparse,
}

impl VectorField {
    pub fn name(&self) -> &'static str {
        match self {
            VectorField::Dense => "dense_vector",
            VectorField::Sparse => "sparse_vector",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryVector {
    Dense(Vec<f32>),
    Sparse(SparseVector),
}

impl QueryVector {
    pub fn field(&self) -> VectorField {
        match self {
            QueryVector::Dense(_) => VectorField::Dense,
            QueryVector::Sparse(_) => VectorField::Sparse,
        }
    }
}

/// One nearest-neighbour request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnRequest {
    pub vector: QueryVector,
    pub field: VectorField,
    pub limit: usize,
    pub filter: Option<Filter>,
}

impl AnnRequest {
    pub fn dense(vector: Vec<f32>, limit: usize) -> Self {
        Self {
            vector: QueryVector::Dense(vector),
            field: VectorField::Dense,
            limit,
            filter: None,
        }
    }

    pub fn sparse(weights: SparseVector, limit: usize) -> Self {
        Self {
            vector: QueryVector::Sparse(weights),
            field: VectorField::Sparse,
            limit,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }
}

/// A scored match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub text: String,
    pub score: f32,
}

impl VectorIndex {
    /// Exact inner-product search over one field.
    ///
    /// Dense requests score every record that passes the filter. Sparse
    /// requests only score records sharing at least one term with the query.
    /// Hits are ordered by score, then by insertion order.
    pub fn search(&self, request: &AnnRequest) -> Result<Vec<Hit>, IndexError> {
        if request.vector.field() != request.field {
            return Err(IndexError::Query(format!(
                "{:?} query vector cannot search field `{}`",
                request.vector.field(),
                request.field.name()
            )));
        }
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let state = self.read_state()?;
        let filter = request.filter.as_ref();
        let passes = |record: &StoredRecord| filter.is_none_or(|f| f.matches(record));

        let mut scored: Vec<(usize, f32)> = match &request.vector {
            QueryVector::Dense(query) => {
                self.cfg.schema.check_dense(query)?;
                let metric = self.cfg.schema.metric;
                state
                    .records
                    .par_iter()
                    .enumerate()
                    .filter(|&(_, record)| passes(record))
                    .map(|(slot, record)| (slot, metric.dense(query, &record.dense_vector)))
                    .collect()
            }
            QueryVector::Sparse(query) => {
                self.cfg.schema.check_sparse(query)?;
                let mut acc: hashbrown::HashMap<usize, f32> = hashbrown::HashMap::new();
                for (term, q_weight) in query {
                    let Some(postings) = state.postings.get(term) else {
                        continue;
                    };
                    for &(slot, d_weight) in postings {
                        if passes(&state.records[slot]) {
                            *acc.entry(slot).or_insert(0.0) += q_weight * d_weight;
                        }
                    }
                }
                acc.into_iter().collect()
            }
        };

        scored.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(request.limit);

        let hits: Vec<Hit> = scored
            .into_iter()
            .map(|(slot, score)| {
                let record = &state.records[slot];
                Hit {
                    id: record.id.clone(),
                    text: record.text.clone(),
                    score,
                }
            })
            .collect();

        tracing::debug!(
            collection = %self.cfg.schema.name,
            field = request.field.name(),
            filtered = filter.is_some(),
            hits = hits.len(),
            "ann search"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectionSchema, IndexConfig, NewRecord};

    fn index() -> VectorIndex {
        VectorIndex::new(IndexConfig::new().with_schema(CollectionSchema::global(2))).unwrap()
    }

    fn record(text: &str, tenant: Option<&str>, dense: [f32; 2], sparse: &[(u32, f32)]) -> NewRecord {
        NewRecord {
            text: text.into(),
            tenant_id: tenant.map(str::to_string),
            sparse_vector: sparse.iter().copied().collect(),
            dense_vector: dense.to_vec(),
        }
    }

    fn seed(index: &VectorIndex) {
        index
            .insert(vec![
                record("north", None, [1.0, 0.0], &[(1, 1.0)]),
                record("east", Some("A"), [0.0, 1.0], &[(2, 1.0)]),
                record("north-east", Some("B"), [0.7, 0.7], &[(1, 0.5), (2, 0.5)]),
            ])
            .unwrap();
    }

    fn texts(hits: &[Hit]) -> Vec<&str> {
        hits.iter().map(|h| h.text.as_str()).collect()
    }

    #[test]
    fn dense_search_ranks_by_inner_product() {
        let index = index();
        seed(&index);
        let hits = index.search(&AnnRequest::dense(vec![1.0, 0.1], 10)).unwrap();
        assert_eq!(texts(&hits), vec!["north", "north-east", "east"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sparse_search_skips_records_without_shared_terms() {
        let index = index();
        seed(&index);
        let query: SparseVector = [(2, 2.0)].into_iter().collect();
        let hits = index.search(&AnnRequest::sparse(query, 10)).unwrap();
        assert_eq!(texts(&hits), vec!["east", "north-east"]);
        assert!((hits[0].score - 2.0).abs() < 1e-6);
        assert!((hits[1].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn filters_restrict_to_one_tenant() {
        let index = index();
        seed(&index);
        let request = AnnRequest::dense(vec![1.0, 0.0], 10).with_filter(Some(Filter::tenant("B")));
        assert_eq!(texts(&index.search(&request).unwrap()), vec!["north-east"]);

        let nobody = AnnRequest::sparse([(1, 1.0)].into_iter().collect(), 10)
            .with_filter(Some(Filter::tenant("C")));
        assert!(index.search(&nobody).unwrap().is_empty());
    }

    #[test]
    fn limit_truncates_and_ties_follow_insertion() {
        let index = index();
        index
            .insert(vec![
                record("first", None, [1.0, 0.0], &[]),
                record("second", None, [1.0, 0.0], &[]),
                record("third", None, [1.0, 0.0], &[]),
            ])
            .unwrap();
        let hits = index.search(&AnnRequest::dense(vec![1.0, 0.0], 2)).unwrap();
        assert_eq!(texts(&hits), vec!["first", "second"]);
        assert!(index.search(&AnnRequest::dense(vec![1.0, 0.0], 0)).unwrap().is_empty());
    }

    #[test]
    fn malformed_requests_are_rejected() {
        let index = index();
        seed(&index);
        let mut mismatched = AnnRequest::dense(vec![1.0, 0.0], 1);
        mismatched.field = VectorField::Sparse;
        assert!(matches!(index.search(&mismatched), Err(IndexError::Query(_))));

        assert!(matches!(
            index.search(&AnnRequest::dense(vec![1.0], 1)),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }
}
