//! Checkout stages.

use serde::{Deserialize, Serialize};

/// One stage of a checkout, in execution order.
///
/// ```text
/// GenerateOrderId ─► PrepareItems ─► ComputeTotal ─► ChargePayment ─► ShipOrder   (required)
///   ─► EmptyCart ─► AssembleResult ─► SendConfirmation ─► PublishEvent            (after shipping)
/// ```
///
/// A failing required stage ends the checkout. `EmptyCart`,
/// `SendConfirmation` and `PublishEvent` are best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    GenerateOrderId,
    PrepareItems,
    ComputeTotal,
    ChargePayment,
    ShipOrder,
    EmptyCart,
    AssembleResult,
    SendConfirmation,
    PublishEvent,
}

impl CheckoutStage {
    /// Every stage, in execution order.
    pub const ALL: [CheckoutStage; 9] = [
        CheckoutStage::GenerateOrderId,
        CheckoutStage::PrepareItems,
        CheckoutStage::ComputeTotal,
        CheckoutStage::ChargePayment,
        CheckoutStage::ShipOrder,
        CheckoutStage::EmptyCart,
        CheckoutStage::AssembleResult,
        CheckoutStage::SendConfirmation,
        CheckoutStage::PublishEvent,
    ];

    /// Returns true if a failure of this stage fails the order.
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            CheckoutStage::GenerateOrderId
                | CheckoutStage::PrepareItems
                | CheckoutStage::ComputeTotal
                | CheckoutStage::ChargePayment
                | CheckoutStage::ShipOrder
        )
    }

    /// Returns true if failures of this stage are only logged.
    pub fn is_best_effort(&self) -> bool {
        matches!(
            self,
            CheckoutStage::EmptyCart
                | CheckoutStage::SendConfirmation
                | CheckoutStage::PublishEvent
        )
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStage::GenerateOrderId => "generate_order_id",
            CheckoutStage::PrepareItems => "prepare_items",
            CheckoutStage::ComputeTotal => "compute_total",
            CheckoutStage::ChargePayment => "charge_payment",
            CheckoutStage::ShipOrder => "ship_order",
            CheckoutStage::EmptyCart => "empty_cart",
            CheckoutStage::AssembleResult => "assemble_result",
            CheckoutStage::SendConfirmation => "send_confirmation",
            CheckoutStage::PublishEvent => "publish_event",
        }
    }
}

impl std::fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
