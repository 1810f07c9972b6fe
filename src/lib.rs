//! Keystroke Biometrics - Modeling & Decision Core
//!
//! Raw typing captures become 21-float feature vectors; per-user models are
//! trained and selected against cross-user impostors; live captures are
//! scored into accept / flag / deny decisions that drive account lockout.

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod logic;

pub use api::{BioAuthEngine, EngineStores, LoginRequest, LoginResult, LoginStatus};
pub use config::EngineConfig;
pub use error::{BioAuthError, ModelError, Result};
