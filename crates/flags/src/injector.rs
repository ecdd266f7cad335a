//! Infallible read access to fault injection flags.

use std::sync::Arc;

use crate::memory::InMemoryFlags;
use crate::provider::FlagProvider;

/// Routes the payment charge to an unreachable destination when on.
pub const PAYMENT_UNREACHABLE: &str = "paymentUnreachable";

/// Number of extra, unacknowledged copies to push at the message bus after
/// each order event.
pub const KAFKA_QUEUE_PROBLEMS: &str = "kafkaQueueProblems";

/// Reads flags without ever failing.
///
/// Evaluation errors (missing flag, disabled flag, broken provider) yield
/// `false` / `0`, so a flag problem never fails a request. Cheap to clone.
#[derive(Clone)]
pub struct FaultInjector {
    provider: Arc<dyn FlagProvider>,
}

impl FaultInjector {
    pub fn new(provider: Arc<dyn FlagProvider>) -> Self {
        Self { provider }
    }

    /// An injector where every flag is off.
    pub fn disabled() -> Self {
        Self::new(Arc::new(InMemoryFlags::new()))
    }

    pub async fn boolean(&self, flag: &str) -> bool {
        match self.provider.boolean(flag).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(flag, error = %e, "flag evaluation failed, using default");
                false
            }
        }
    }

    pub async fn int(&self, flag: &str) -> i64 {
        match self.provider.int(flag).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(flag, error = %e, "flag evaluation failed, using default");
                0
            }
        }
    }
}

impl std::fmt::Debug for FaultInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjector").finish_non_exhaustive()
    }
}
