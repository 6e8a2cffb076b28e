//! Structured logging setup
//!
//! The library only emits `tracing` events. Hosts that want them printed
//! call [`init`] or [`init_with_config`] once at startup.

use crate::config::LoggingConfig;
use crate::error::{Error, ErrorCode, Result};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global subscriber with the default configuration
pub fn init() -> Result<()> {
    init_with_config(&LoggingConfig::default())
}

/// Install a global subscriber; `RUST_LOG` wins over `config.level`
pub fn init_with_config(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(config.show_target)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number)
            .compact(),
    );

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        Error::new(ErrorCode::Internal, format!("Failed to set tracing subscriber: {}", e))
    })?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Logging initialized");
    Ok(())
}

/// Measures an operation and logs its duration when stopped or dropped
pub struct OpTimer {
    name: &'static str,
    start: Instant,
    stopped: bool,
}

impl OpTimer {
    /// Start a new timer
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            stopped: false,
        }
    }

    /// Stop the timer and log the duration
    pub fn stop(mut self) -> Duration {
        self.stopped = true;
        self.record()
    }

    fn record(&self) -> Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer() {
        let timer = OpTimer::start("test_operation");
        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration.as_millis() >= 10);
    }

    #[test]
    fn test_init_twice_fails() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            ..LoggingConfig::default()
        };
        let _ = init_with_config(&config);
        assert!(init().is_err());
    }
}
