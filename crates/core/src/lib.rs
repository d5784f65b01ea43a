//! Regula Core Library
//!
//! This crate provides the foundational utilities shared by every Regula crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Global configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
