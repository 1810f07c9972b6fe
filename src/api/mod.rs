//! API Module
//!
//! - engine.rs: `BioAuthEngine`, the facade hosts call into
//! - engine_status.rs: status and login result types

pub mod engine;
pub mod engine_status;

pub use engine::{BioAuthEngine, EngineStores, LoginRequest};
pub use engine_status::{EngineStatus, LoginResult, LoginStatus, UserStatus};
