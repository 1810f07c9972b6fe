//! Logic Module - Keystroke biometrics engines
//!
//! - `features/` - raw capture -> 21-float feature vector
//! - `dataset/` - capture records, split labels, JSONL files
//! - `model/` - discriminators, normalizer, bundles, thresholds
//! - `evaluation/` - genuine vs impostor metrics
//! - `training/` - per-user model selection
//! - `auth/` - scoring and account lockout
//! - `store/` - collaborator traits and in-process stores
//! - `monitoring` - live decision feed

pub mod features;
pub mod dataset;
pub mod model;
pub mod evaluation;
pub mod training;
pub mod auth;
pub mod store;
pub mod monitoring;
