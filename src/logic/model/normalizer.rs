//! Normalizer - zero-mean / unit-variance feature scaling
//!
//! Fitted on the training matrix only and persisted with the model, so the
//! scorer applies exactly the scaling the discriminator was trained under.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::logic::features::{FeatureVector, FEATURE_COUNT};

/// Standard deviations at or below this are treated as constant columns.
const MIN_SCALE: f64 = 1e-12;

/// Stack feature vectors into an `n x FEATURE_COUNT` matrix.
pub fn to_matrix(vectors: &[FeatureVector]) -> Array2<f64> {
    Array2::from_shape_fn((vectors.len(), FEATURE_COUNT), |(i, j)| vectors[i].values[j])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Normalizer {
    /// Fit column means and population standard deviations.
    /// Zero-variance columns get scale 1.
    pub fn fit(x: &Array2<f64>) -> Result<Self, ModelError> {
        if x.nrows() == 0 {
            return Err(ModelError::NotEnoughSamples {
                model: "Normalizer",
                available: 0,
            });
        }

        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());

        for column in x.axis_iter(Axis(1)) {
            let m = column.sum() / n;
            let var = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            mean.push(m);
            scale.push(if std > MIN_SCALE { std } else { 1.0 });
        }

        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite { model: "Normalizer" });
        }

        Ok(Self { mean, scale })
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    fn check_width(&self, actual: usize) -> Result<(), ModelError> {
        if actual != self.width() {
            return Err(ModelError::Dimension {
                expected: self.width(),
                actual,
            });
        }
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, ModelError> {
        self.check_width(row.len())?;
        Ok(Array1::from_iter(
            row.iter()
                .zip(self.mean.iter().zip(self.scale.iter()))
                .map(|(v, (m, s))| (v - m) / s),
        ))
    }

    pub fn transform_vector(&self, vector: &FeatureVector) -> Result<Array1<f64>, ModelError> {
        self.transform_row(ArrayView1::from(vector.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let normalizer = Normalizer::fit(&x).unwrap();

        assert!((normalizer.mean[0] - 3.0).abs() < 1e-12);
        // constant column keeps scale 1
        assert_eq!(normalizer.scale[1], 1.0);

        let scaled = normalizer.transform(&x).unwrap();
        let col0 = scaled.column(0);
        assert!(col0.sum().abs() < 1e-12);
        let var = col0.iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert!((var - 1.0).abs() < 1e-12);
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_width_mismatch() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let normalizer = Normalizer::fit(&x).unwrap();
        let row = array![1.0, 2.0, 3.0];
        match normalizer.transform_row(row.view()) {
            Err(ModelError::Dimension { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_fit_empty_fails() {
        let x = Array2::<f64>::zeros((0, FEATURE_COUNT));
        assert!(Normalizer::fit(&x).is_err());
    }

    #[test]
    fn test_to_matrix_shape() {
        let vectors = vec![FeatureVector::new(); 4];
        let m = to_matrix(&vectors);
        assert_eq!(m.dim(), (4, FEATURE_COUNT));
    }
}
