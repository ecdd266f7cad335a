//! Checkout error types.

use common::{CancelReason, ProductId, UserId};
use domain::MoneyError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::CheckoutStage;

/// Errors returned by collaborator services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The requested entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The request was rejected as malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The collaborator refused the operation (e.g. a declined card).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The collaborator could not be reached or is failing.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Money arithmetic inside the collaborator failed.
    #[error("money error: {0}")]
    Money(#[from] MoneyError),
}

/// Coarse classification of a failed checkout, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Internal,
    Unavailable,
    Cancelled,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Internal => "internal",
            ErrorClass::Unavailable => "unavailable",
            ErrorClass::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A required stage failed; the order was not placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("failed to generate order id")]
    OrderIdGenerationFailed {
        #[source]
        source: ServiceError,
    },

    #[error("failed to get cart of user {user_id}")]
    CartUnavailable {
        user_id: UserId,
        #[source]
        source: ServiceError,
    },

    #[error("failed to get product {product_id}")]
    ProductLookupFailed {
        product_id: ProductId,
        #[source]
        source: ServiceError,
    },

    #[error("failed to convert {from} to {to}")]
    PricingConversionFailed {
        from: String,
        to: String,
        #[source]
        source: ServiceError,
    },

    #[error("failed to get shipping quote")]
    ShippingQuoteFailed {
        #[source]
        source: ServiceError,
    },

    #[error("failed to compute order total")]
    MoneyArithmetic {
        #[source]
        source: MoneyError,
    },

    #[error("failed to charge card")]
    PaymentFailed {
        #[source]
        source: ServiceError,
    },

    #[error("failed to ship order")]
    ShippingBookingFailed {
        #[source]
        source: ServiceError,
    },

    #[error("{stage} interrupted: {reason}")]
    Cancelled {
        stage: CheckoutStage,
        #[source]
        reason: CancelReason,
    },
}

impl CheckoutError {
    /// The stage that failed.
    pub fn stage(&self) -> CheckoutStage {
        match self {
            CheckoutError::OrderIdGenerationFailed { .. } => CheckoutStage::GenerateOrderId,
            CheckoutError::CartUnavailable { .. }
            | CheckoutError::ProductLookupFailed { .. }
            | CheckoutError::PricingConversionFailed { .. }
            | CheckoutError::ShippingQuoteFailed { .. } => CheckoutStage::PrepareItems,
            CheckoutError::MoneyArithmetic { .. } => CheckoutStage::ComputeTotal,
            CheckoutError::PaymentFailed { .. } => CheckoutStage::ChargePayment,
            CheckoutError::ShippingBookingFailed { .. } => CheckoutStage::ShipOrder,
            CheckoutError::Cancelled { stage, .. } => *stage,
        }
    }

    /// The collaborator whose call failed, if any.
    pub fn collaborator(&self) -> Option<&'static str> {
        match self {
            CheckoutError::OrderIdGenerationFailed { .. } => Some("order_ids"),
            CheckoutError::CartUnavailable { .. } => Some("cart"),
            CheckoutError::ProductLookupFailed { .. } => Some("catalog"),
            CheckoutError::PricingConversionFailed { .. } => Some("currency"),
            CheckoutError::ShippingQuoteFailed { .. }
            | CheckoutError::ShippingBookingFailed { .. } => Some("shipping"),
            CheckoutError::PaymentFailed { .. } => Some("payment"),
            CheckoutError::MoneyArithmetic { .. } | CheckoutError::Cancelled { .. } => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            CheckoutError::ShippingBookingFailed { .. } => ErrorClass::Unavailable,
            CheckoutError::Cancelled { .. } => ErrorClass::Cancelled,
            _ => ErrorClass::Internal,
        }
    }
}

/// A best-effort stage failed. The order still succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BestEffortFailure {
    #[error("failed to empty cart: {reason}")]
    CartClearFailed { reason: String },

    #[error("failed to send order confirmation: {reason}")]
    ConfirmationFailed { reason: String },

    #[error("failed to publish order event: {reason}")]
    PublishFailed { reason: String },
}

impl BestEffortFailure {
    pub fn stage(&self) -> CheckoutStage {
        match self {
            BestEffortFailure::CartClearFailed { .. } => CheckoutStage::EmptyCart,
            BestEffortFailure::ConfirmationFailed { .. } => CheckoutStage::SendConfirmation,
            BestEffortFailure::PublishFailed { .. } => CheckoutStage::PublishEvent,
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
