//! Observability hooks for provider calls, tool runs and the chat loop.
//!
//! ```rust
//! use pobserve::{MetricsObservabilityHooks, PanicGuard, TracingObservabilityHooks};
//!
//! let _logged = PanicGuard::new(TracingObservabilityHooks);
//! let _metrics = PanicGuard::new(MetricsObservabilityHooks);
//! ```

mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::PanicGuard;
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{MetricsObservabilityHooks, PanicGuard, TracingObservabilityHooks};
}

pub(crate) fn outcome_label(result: &ptooling::ToolInvocationResult) -> &'static str {
    if result.is_failure() {
        "failed"
    } else if result.continue_processing() {
        "continue"
    } else {
        "complete"
    }
}
