//! Logging setup and span helpers
//!
//! Structured logging with one span per step invocation so every line a
//! chain emits carries the step kind, invocation id and account.

use crate::types::{InvocationId, StepKind};
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs
    Json,
    /// Pretty-printed logs
    #[default]
    Pretty,
}

/// Initialize the logging subsystem
///
/// Safe to call more than once; later calls are no-ops. `RUST_LOG`
/// overrides the default `info` level.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Span covering one entry into a step's chain
#[must_use]
pub fn invocation_span(step: StepKind, invocation: InvocationId, account: &str) -> Span {
    tracing::info_span!(
        "tas_step",
        step = %step,
        invocation = %invocation,
        account = account,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn invocation_span_enters() {
        let span = invocation_span(StepKind::Resize, InvocationId::new(), "acct");
        let _guard = span.enter();
        tracing::info!("inside invocation span");
    }
}
