//! Orchestrator settings.

use std::time::Duration;

/// Time budgets for the stages that run after the order is shipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Sub-deadline for emptying the cart and for the confirmation email.
    pub best_effort_timeout: Duration,

    /// Sub-deadline for publishing the order event.
    pub publish_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            best_effort_timeout: Duration::from_secs(2),
            publish_timeout: Duration::from_secs(5),
        }
    }
}
