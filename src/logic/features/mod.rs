//! Features Module - Keystroke Feature Extraction Engine
//!
//! Converts raw timing captures into the fixed-width feature vector that
//! both training and scoring consume.

pub mod layout;
pub mod vector;
pub mod stats;
pub mod extractor;
pub mod collector;


// Re-export common types
pub use layout::{FEATURE_COUNT, FEATURE_LAYOUT, LayoutInfo};
pub use vector::FeatureVector;
pub use extractor::{extract, extract_all};
pub use collector::KeystrokeCollector;
