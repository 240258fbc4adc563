use serde::{Deserialize, Serialize};

use crate::{IndexError, NewRecord};

/// Collection for records stored without a tenant.
pub const DEFAULT_COLLECTION: &str = "bge_m3_hybrid_search";
/// Collection for tenant-scoped records.
pub const TENANT_COLLECTION: &str = "user_bge_m3_hybrid_search";

pub const DEFAULT_DIMENSION: usize = 1024;
pub const MAX_TEXT_LENGTH: usize = 20_000;
pub const MAX_TENANT_LENGTH: usize = 100;

/// Similarity used by both vector fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    InnerProduct,
}

impl Metric {
    #[inline]
    pub fn dense(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        }
    }
}

/// Field layout and limits for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: usize,
    /// In characters.
    pub max_text_length: usize,
    /// In characters.
    pub max_tenant_length: usize,
    pub metric: Metric,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            max_text_length: MAX_TEXT_LENGTH,
            max_tenant_length: MAX_TENANT_LENGTH,
            metric: Metric::InnerProduct,
        }
    }

    pub fn global(dimension: usize) -> Self {
        Self::new(DEFAULT_COLLECTION, dimension)
    }

    pub fn tenant_scoped(dimension: usize) -> Self {
        Self::new(TENANT_COLLECTION, dimension)
    }

    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    pub fn with_max_tenant_length(mut self, max: usize) -> Self {
        self.max_tenant_length = max;
        self
    }

    pub fn check_dense(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::Schema("dense vector contains non-finite values".into()));
        }
        Ok(())
    }

    pub fn check_sparse<'a>(
        &self,
        weights: impl IntoIterator<Item = (&'a u32, &'a f32)>,
    ) -> Result<(), IndexError> {
        for (term, weight) in weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(IndexError::Schema(format!(
                    "sparse weight {weight} for term {term} must be finite and non-negative"
                )));
            }
        }
        Ok(())
    }

    /// Reject a record that does not fit this collection.
    pub fn check_record(&self, record: &NewRecord) -> Result<(), IndexError> {
        self.check_dense(&record.dense_vector)?;
        self.check_sparse(&record.sparse_vector)?;

        let text_len = record.text.chars().count();
        if text_len > self.max_text_length {
            return Err(IndexError::Schema(format!(
                "text has {text_len} characters, {} allows at most {}",
                self.name, self.max_text_length
            )));
        }
        if let Some(tenant) = &record.tenant_id {
            let tenant_len = tenant.chars().count();
            if tenant_len > self.max_tenant_length {
                return Err(IndexError::Schema(format!(
                    "tenant id has {tenant_len} characters, at most {} allowed",
                    self.max_tenant_length
                )));
            }
        }
        Ok(())
    }
}

impl Default for CollectionSchema {
    fn default() -> Self {
        Self::global(DEFAULT_DIMENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SparseVector;

    fn record(dim: usize, text: &str, tenant: Option<&str>) -> NewRecord {
        NewRecord {
            text: text.to_string(),
            tenant_id: tenant.map(str::to_string),
            sparse_vector: SparseVector::new(),
            dense_vector: vec![0.5; dim],
        }
    }

    #[test]
    fn defaults_match_reference_collection() {
        let schema = CollectionSchema::default();
        assert_eq!(schema.name, DEFAULT_COLLECTION);
        assert_eq!(schema.dimension, 1024);
        assert_eq!(schema.max_text_length, 20_000);
        assert_eq!(schema.max_tenant_length, 100);
        assert_eq!(CollectionSchema::tenant_scoped(8).name, TENANT_COLLECTION);
    }

    #[test]
    fn dimension_is_enforced() {
        let schema = CollectionSchema::global(4);
        assert!(schema.check_record(&record(4, "ok", None)).is_ok());
        assert!(matches!(
            schema.check_record(&record(3, "short", None)),
            Err(IndexError::DimensionMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn text_and_tenant_lengths_count_characters() {
        let schema = CollectionSchema::global(2)
            .with_max_text_length(3)
            .with_max_tenant_length(2);
        assert!(schema.check_record(&record(2, "日本語", Some("租户"))).is_ok());
        assert!(schema.check_record(&record(2, "日本語!", None)).is_err());
        assert!(schema.check_record(&record(2, "ok", Some("abc"))).is_err());
    }

    #[test]
    fn negative_and_nan_values_are_rejected() {
        let schema = CollectionSchema::global(2);
        let mut bad_sparse = record(2, "x", None);
        bad_sparse.sparse_vector.insert(9, -0.5);
        assert!(matches!(schema.check_record(&bad_sparse), Err(IndexError::Schema(_))));

        let mut bad_dense = record(2, "x", None);
        bad_dense.dense_vector[1] = f32::NAN;
        assert!(schema.check_record(&bad_dense).is_err());
    }

    #[test]
    fn inner_product() {
        assert_eq!(Metric::InnerProduct.dense(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
    }
}
