//! Evaluation Module - genuine vs cross-user impostor protocol
//!
//! Every trained variant is scored on the user's held-out genuine test rows
//! plus an impostor set drawn from other users' test captures.

pub mod metrics;
pub mod impostor;

pub use metrics::{evaluate, ConfusionCounts, EvaluationMetrics};
pub use impostor::{evaluation_impostor_count, simulate_impostors, ImpostorSampler, ImpostorSet};
