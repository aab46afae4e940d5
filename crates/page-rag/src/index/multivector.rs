//! Patch-level embedding set of one page (or token-level set of one query)

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Row-major `[len][dim]` matrix of vectors
///
/// Always holds at least one vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiVector {
    dim: usize,
    data: Vec<f32>,
}

impl MultiVector {
    /// Build from per-vector rows; rows must be non-empty and of equal width
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        if dim == 0 {
            return Err(Error::encoding("multi-vector embedding is empty"));
        }

        let mut data = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(Error::encoding(format!(
                    "multi-vector row {} has {} dimensions, expected {}",
                    i,
                    row.len(),
                    dim
                )));
            }
            data.extend(row);
        }

        if data.iter().any(|x| !x.is_finite()) {
            return Err(Error::encoding("multi-vector embedding has non-finite values"));
        }

        Ok(Self { dim, data })
    }

    /// Number of vectors
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of each vector
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Borrow as an `[len, dim]` matrix
    pub fn view(&self) -> Result<ArrayView2<'_, f32>> {
        ArrayView2::from_shape((self.len(), self.dim), &self.data)
            .map_err(|e| Error::corruption("visual", format!("malformed embedding set: {}", e)))
    }

    /// Check shape after deserialization, where `from_rows` was bypassed
    pub(crate) fn validate(&self) -> Result<()> {
        if self.dim == 0 || self.data.is_empty() || self.data.len() % self.dim != 0 {
            return Err(Error::corruption(
                "visual",
                format!(
                    "embedding set of {} values does not divide into rows of {}",
                    self.data.len(),
                    self.dim
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let mv = MultiVector::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(mv.len(), 3);
        assert_eq!(mv.dim(), 2);

        let view = mv.view().unwrap();
        assert_eq!(view[[2, 1]], 6.0);
        assert!(mv.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_and_ragged() {
        assert!(matches!(MultiVector::from_rows(vec![]), Err(Error::Encoding(_))));
        assert!(matches!(MultiVector::from_rows(vec![vec![]]), Err(Error::Encoding(_))));
        assert!(matches!(
            MultiVector::from_rows(vec![vec![1.0, 2.0], vec![3.0]]),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_validate_catches_torn_data() {
        let torn = MultiVector {
            dim: 3,
            data: vec![1.0, 2.0, 3.0, 4.0],
        };
        assert!(matches!(torn.validate(), Err(Error::IndexCorruption { .. })));
    }

    #[test]
    fn test_non_finite_rows_rejected() {
        let rows = vec![vec![0.5, 0.5], vec![f32::NAN, 1.0]];
        assert!(matches!(MultiVector::from_rows(rows), Err(Error::Encoding(_))));
        let rows = vec![vec![f32::INFINITY, 0.0]];
        assert!(matches!(MultiVector::from_rows(rows), Err(Error::Encoding(_))));
    }
}
