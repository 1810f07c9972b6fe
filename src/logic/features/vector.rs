//! Feature Vector - Core data structure for model input
//!
//! **Versioned feature vector**
//!
//! Uses centralized layout from `layout.rs` for:
//! - Consistent feature ordering
//! - Version tracking
//! - Layout hash carried into logs and bundle metadata

use serde::{Deserialize, Serialize};

use super::layout::{layout_hash, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
use crate::error::BioAuthError;

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Versioned keystroke feature vector.
///
/// The width is fixed by the type; every model is trained and scored
/// against exactly `FEATURE_COUNT` dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout
    pub layout_hash: u32,
    /// Feature values in order defined by FEATURE_LAYOUT
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create a new zeroed feature vector with current version
    pub fn new() -> Self {
        Self::from_values([0.0; FEATURE_COUNT])
    }

    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    /// Build from a slice that must have exactly `FEATURE_COUNT` values.
    pub fn from_slice(values: &[f64]) -> Result<Self, BioAuthError> {
        let array: [f64; FEATURE_COUNT] =
            values
                .try_into()
                .map_err(|_| BioAuthError::FeatureDimensionMismatch {
                    expected: FEATURE_COUNT,
                    actual: values.len(),
                })?;
        Ok(Self::from_values(array))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    #[cfg(test)]
    pub(crate) fn get_by_name(&self, name: &str) -> Option<f64> {
        super::layout::feature_index(name).and_then(|i| self.values.get(i).copied())
    }

    pub fn set(&mut self, index: usize, value: f64) {
        if index < FEATURE_COUNT {
            self.values[index] = value;
        }
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "feature_version": self.version,
            "layout_hash": self.layout_hash,
            "named_values": FEATURE_LAYOUT.iter()
                .zip(self.values.iter())
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<std::collections::BTreeMap<_, _>>(),
        })
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self::from_values(values)
    }
}

// ============================================================================
// TESTS
// ============================================================================
