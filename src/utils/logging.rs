//! # Logging
//!
//! Structured logging setup for the binaries.
//!
//! `RUST_LOG` wins over the configured level when present. File output appends
//! to `log_file_path`; console output goes to stderr so it never interleaves
//! with the interactive client's stdout. Every event recorded on the calling
//! thread is nested under an `app{name=...}` span carrying `app_name`.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::span::EnteredSpan;
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber described by `config` and enter the root span.
///
/// Keep the returned guard alive for as long as the thread logs. Fails if a
/// subscriber is already installed or the log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<EnteredSpan> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.log_to_console {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        layers.push(if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            ProtocolError::ConfigError("log_file_path must be set for file logging".to_string())
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open log file {path}: {e}")))?;
        let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
        layers.push(if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;

    Ok(root_span(config).entered())
}

/// Span naming the application in every nested event
pub fn root_span(config: &LoggingConfig) -> Span {
    tracing::info_span!("app", name = %config.app_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_root_span_names_the_application() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(move || writer.clone())
                .with_ansi(false),
        );
        let config = LoggingConfig {
            app_name: "authwire-test".to_string(),
            ..LoggingConfig::default()
        };

        tracing::subscriber::with_default(subscriber, || {
            let _root = root_span(&config).entered();
            tracing::info!("Listening");
        });

        let output = String::from_utf8(capture.0.lock().expect("capture lock").clone())
            .expect("utf8 log output");
        assert!(output.contains("app{name=authwire-test}"), "{output}");
        assert!(output.contains("Listening"), "{output}");
    }
}
