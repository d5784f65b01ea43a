//! Logging infrastructure for Regula.
//!
//! This module initializes the tracing subscriber for structured logging.
//! All logs are emitted to stderr to keep stdout clean for answers and JSON.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Default filter when neither the caller nor `RUST_LOG` provide one.
const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing subscriber with stderr output.
///
/// # Arguments
/// * `log_level` - Optional filter override (e.g., "debug", "regula_knowledge=trace")
/// * `no_color` - Disable colored output
///
/// # Example
/// ```no_run
/// use regula_core::logging::init_logging;
///
/// init_logging(None, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let filter_str = resolve_filter(log_level, std::env::var("RUST_LOG").ok());

    let env_filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", filter_str, e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && supports_color());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Pick the effective filter: explicit level, then `RUST_LOG`, then the default.
fn resolve_filter(log_level: Option<&str>, env_level: Option<String>) -> String {
    match log_level {
        Some(level) if !level.trim().is_empty() => level.to_string(),
        _ => env_level
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
    }
}

fn supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_level_wins() {
        assert_eq!(
            resolve_filter(Some("debug"), Some("warn".to_string())),
            "debug"
        );
    }

    #[test]
    fn test_env_level_used_when_no_override() {
        assert_eq!(resolve_filter(None, Some("warn".to_string())), "warn");
    }

    #[test]
    fn test_default_level() {
        assert_eq!(resolve_filter(None, None), "info");
        assert_eq!(resolve_filter(Some("  "), Some(String::new())), "info");
    }
}
