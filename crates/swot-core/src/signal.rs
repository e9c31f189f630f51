//! Observability hook
//!
//! The engine reports notable transitions through a [`SignalFn`]. Signals are
//! purely informational and never influence control flow.

use crate::types::Severity;
use std::sync::Arc;
use std::time::Duration;

/// Callback receiving `(message, severity, display duration)`
pub type SignalFn = Arc<dyn Fn(&str, Severity, Duration) + Send + Sync>;

/// Default display duration for signals
pub const DEFAULT_SIGNAL_DURATION: Duration = Duration::from_secs(3);

/// Signal sink that only traces
#[must_use]
pub fn tracing_signal() -> SignalFn {
    Arc::new(|message: &str, severity: Severity, _duration: Duration| match severity {
        Severity::Error => tracing::error!("{}", message),
        Severity::Warning => tracing::warn!("{}", message),
        Severity::Info | Severity::Success => tracing::info!("{}", message),
    })
}
