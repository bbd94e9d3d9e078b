//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Default filter directive for a configured level
pub fn filter_directive(level: &str) -> String {
    format!("{level},tower_http={level}", level = level.trim().to_lowercase())
}

/// Run `f` under a temporary stderr subscriber
///
/// Covers startup work that happens before the configured subscriber can be
/// installed, such as loading the config itself. Level comes from `RUST_LOG`,
/// else `info`.
pub fn with_bootstrap_logging<T>(f: impl FnOnce() -> T) -> T {
    with_scoped_writer(std::io::stderr, f)
}

fn with_scoped_writer<W, T>(writer: W, f: impl FnOnce() -> T) -> T
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive("info")));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer));

    tracing::subscriber::with_default(subscriber, f)
}

/// Install the global subscriber
///
/// Writes to the configured log file (appending) or to stderr.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directive(&config.level)).map_err(|e| {
            Error::Config(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    let (file_layer, stderr_layer) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer().with_ansi(false).with_writer(Arc::new(file));
            (Some(layer), None)
        }
        None => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_filter_directive_normalizes_level() {
        assert_eq!(filter_directive(" INFO "), "info,tower_http=info");
    }

    #[test]
    fn test_filter_directive_parses() {
        assert!(EnvFilter::try_new(filter_directive("debug")).is_ok());
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_scoped_writer_captures_startup_warnings() {
        let capture = Capture::default();
        let writer = capture.clone();

        let value = with_scoped_writer(move || writer.clone(), || {
            tracing::warn!("No config file found, using built-in defaults");
            7
        });

        assert_eq!(value, 7);
        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("No config file found"), "{}", output);
    }

    #[test]
    fn test_bootstrap_logging_returns_closure_value() {
        assert_eq!(with_bootstrap_logging(|| "loaded"), "loaded");
    }
}
