use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AlignmentError;

/// Term id to lexical weight. Absent ids weigh zero.
pub type SparseVector = BTreeMap<u32, f32>;

/// One document's dual representation.
///
/// Serialized with the field names the ingest endpoint has always returned:
/// `{"dense_vecs": [...], "sparse_vecs": {"<term id>": weight}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmbeddingData {
    #[serde(rename = "dense_vecs")]
    pub dense_vector: Vec<f32>,
    #[serde(rename = "sparse_vecs", default)]
    pub sparse_weights: SparseVector,
}

impl EmbeddingData {
    pub fn new(dense_vector: Vec<f32>, sparse_weights: SparseVector) -> Self {
        Self {
            dense_vector,
            sparse_weights,
        }
    }

    /// Entry from a model with no lexical signal.
    pub fn dense_only(dense_vector: Vec<f32>) -> Self {
        Self::new(dense_vector, SparseVector::new())
    }

    pub fn dimension(&self) -> usize {
        self.dense_vector.len()
    }

    /// Scale the dense vector to unit L2 norm. Zero vectors are left as is.
    pub fn normalize_dense(&mut self) {
        let norm = self
            .dense_vector
            .iter()
            .map(|v| v * v)
            .sum::<f32>()
            .sqrt();
        if norm > f32::EPSILON {
            for v in &mut self.dense_vector {
                *v /= norm;
            }
        }
    }

    /// First sparse weight that is negative or not finite, if any.
    pub fn invalid_sparse_weight(&self) -> Option<(u32, f32)> {
        self.sparse_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
            .map(|(id, w)| (*id, *w))
    }
}

/// Embeddings index-aligned with the texts that produced them:
/// `embeddings[i]` belongs to `texts[i]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub embeddings: Vec<EmbeddingData>,
}

impl EmbeddingResult {
    pub fn new(embeddings: Vec<EmbeddingData>) -> Self {
        Self { embeddings }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EmbeddingData> {
        self.embeddings.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EmbeddingData> {
        self.embeddings.iter()
    }

    pub fn into_inner(self) -> Vec<EmbeddingData> {
        self.embeddings
    }

    /// Fail unless this result has exactly `expected` rows.
    pub fn ensure_len(&self, context: &'static str, expected: usize) -> Result<(), AlignmentError> {
        AlignmentError::check(context, expected, self.len())
    }

    /// Dense rows from `dense_source`, sparse rows from `sparse_source`.
    /// See [`fuse`].
    pub fn fuse(
        dense_source: EmbeddingResult,
        sparse_source: EmbeddingResult,
    ) -> Result<EmbeddingResult, AlignmentError> {
        fuse(dense_source, sparse_source)
    }
}

impl IntoIterator for EmbeddingResult {
    type Item = EmbeddingData;
    type IntoIter = std::vec::IntoIter<EmbeddingData>;

    fn into_iter(self) -> Self::IntoIter {
        self.embeddings.into_iter()
    }
}

impl<'a> IntoIterator for &'a EmbeddingResult {
    type Item = &'a EmbeddingData;
    type IntoIter = std::slice::Iter<'a, EmbeddingData>;

    fn into_iter(self) -> Self::IntoIter {
        self.embeddings.iter()
    }
}

impl FromIterator<EmbeddingData> for EmbeddingResult {
    fn from_iter<I: IntoIterator<Item = EmbeddingData>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Combine two results computed over the same texts: entry `i` takes its
/// dense vector from `dense_source[i]` and its sparse weights from
/// `sparse_source[i]`. The other halves are dropped.
pub fn fuse(
    dense_source: EmbeddingResult,
    sparse_source: EmbeddingResult,
) -> Result<EmbeddingResult, AlignmentError> {
    AlignmentError::check("fuse", dense_source.len(), sparse_source.len())?;
    Ok(dense_source
        .into_iter()
        .zip(sparse_source)
        .map(|(dense, sparse)| EmbeddingData::new(dense.dense_vector, sparse.sparse_weights))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dense: &[f32], sparse: &[(u32, f32)]) -> EmbeddingData {
        EmbeddingData::new(dense.to_vec(), sparse.iter().copied().collect())
    }

    #[test]
    fn fuse_takes_dense_and_sparse_from_their_sources() {
        let dense = EmbeddingResult::new(vec![
            row(&[1.0, 0.0], &[(1, 9.0)]),
            row(&[0.0, 1.0], &[(2, 9.0)]),
        ]);
        let sparse = EmbeddingResult::new(vec![
            row(&[9.0, 9.0], &[(10, 0.5)]),
            row(&[9.0, 9.0], &[]),
        ]);

        let fused = fuse(dense, sparse).unwrap();
        assert_eq!(fused.len(), 2);
        assert_eq!(fused.embeddings[0], row(&[1.0, 0.0], &[(10, 0.5)]));
        assert_eq!(fused.embeddings[1], row(&[0.0, 1.0], &[]));
    }

    #[test]
    fn fuse_rejects_misaligned_inputs() {
        let dense = EmbeddingResult::new(vec![row(&[1.0], &[])]);
        let sparse = EmbeddingResult::default();
        let err = EmbeddingResult::fuse(dense, sparse).unwrap_err();
        assert_eq!(err, AlignmentError::new("fuse", 1, 0));
    }

    #[test]
    fn wire_format_uses_service_field_names() {
        let result = EmbeddingResult::new(vec![row(&[0.5, 0.25], &[(7, 0.3)])]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["embeddings"][0]["dense_vecs"][1], 0.25);
        assert!(json["embeddings"][0]["sparse_vecs"]["7"].is_number());

        let back: EmbeddingResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn missing_sparse_field_means_dense_only() {
        let data: EmbeddingData = serde_json::from_str(r#"{"dense_vecs":[1.0]}"#).unwrap();
        assert!(data.sparse_weights.is_empty());
    }

    #[test]
    fn normalize_dense_produces_unit_norm() {
        let mut data = EmbeddingData::dense_only(vec![3.0, 4.0]);
        data.normalize_dense();
        assert!((data.dense_vector[0] - 0.6).abs() < 1e-6);
        assert!((data.dense_vector[1] - 0.8).abs() < 1e-6);

        let mut zero = EmbeddingData::dense_only(vec![0.0; 3]);
        zero.normalize_dense();
        assert_eq!(zero.dense_vector, vec![0.0; 3]);
    }

    #[test]
    fn invalid_sparse_weights_are_detected() {
        assert!(row(&[], &[(1, 0.0), (2, 1.5)]).invalid_sparse_weight().is_none());
        assert_eq!(row(&[], &[(3, -0.1)]).invalid_sparse_weight(), Some((3, -0.1)));
        assert!(row(&[], &[(4, f32::NAN)]).invalid_sparse_weight().is_some());
    }
}
