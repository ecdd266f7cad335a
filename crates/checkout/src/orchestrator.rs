//! Checkout orchestrator for placing a single order.

use std::error::Error as _;
use std::sync::Arc;
use std::time::Instant;

use common::{CancelReason, OrderId, RequestContext, UserId};
use domain::{Address, CartItem, CreditCardInfo, Money, OrderItem, OrderPreparation, OrderResult};
use event_bus::{EventPublisher, PublishReport};
use flags::{FaultInjector, PAYMENT_UNREACHABLE};
use serde::{Deserialize, Serialize};

use crate::config::CheckoutConfig;
use crate::error::{BestEffortFailure, CheckoutError, Result};
use crate::services::{Collaborators, PaymentService, UnreachablePaymentService};
use crate::stage::CheckoutStage;

/// Everything needed to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: UserId,
    pub user_currency: String,
    pub address: Address,
    pub email: String,
    pub credit_card: CreditCardInfo,
}

/// A successfully placed order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderResult,

    /// Amount charged, in the user's currency.
    pub total: Money,
    pub transaction_id: String,

    /// Best-effort stages that failed.
    pub skipped: Vec<BestEffortFailure>,

    /// Outcome of the order event, when event publishing is configured.
    pub publish: Option<PublishReport>,
}

/// Places orders by calling the collaborators in a fixed stage order.
///
/// Stages up to and including shipping are required: the first failure
/// ends the checkout and nothing after it runs. A charge that succeeded
/// before a later failure is not refunded. Emptying the cart, the
/// confirmation email and the order event run under their own
/// sub-deadlines and never turn a placed order into a failure.
pub struct CheckoutOrchestrator {
    services: Collaborators,
    faults: FaultInjector,
    publisher: Option<EventPublisher>,
    unreachable_payment: Arc<dyn PaymentService>,
    config: CheckoutConfig,
}

impl CheckoutOrchestrator {
    /// Creates an orchestrator. Without a publisher, no order events are sent.
    pub fn new(
        services: Collaborators,
        faults: FaultInjector,
        publisher: Option<EventPublisher>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            services,
            faults,
            publisher,
            unreachable_payment: Arc::new(UnreachablePaymentService::default()),
            config,
        }
    }

    pub fn publishes_events(&self) -> bool {
        self.publisher.is_some()
    }

    /// Places one order.
    ///
    /// Every collaborator call is bounded by `ctx`; if it ends during a
    /// required stage the checkout fails with [`CheckoutError::Cancelled`].
    #[tracing::instrument(
        skip_all,
        fields(
            user_id = %request.user_id,
            user_currency = %request.user_currency,
            trace_id = %ctx.trace_id()
        )
    )]
    pub async fn place_order(
        &self,
        ctx: &RequestContext,
        request: PlaceOrderRequest,
    ) -> Result<PlacedOrder> {
        metrics::counter!("checkout_orders_total").increment(1);
        let started = Instant::now();
        tracing::info!("placing order");

        let result = self.run(ctx, &request).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            let stage = e.stage();
            let class = e.class();
            metrics::counter!(
                "checkout_orders_failed_total",
                "stage" => stage.as_str(),
                "class" => class.as_str()
            )
            .increment(1);
            tracing::error!(
                stage = %stage,
                class = %class,
                collaborator = e.collaborator().unwrap_or("none"),
                cause = e.source().map(ToString::to_string).unwrap_or_default(),
                error = %e,
                "order failed"
            );
        }
        result
    }

    async fn run(&self, ctx: &RequestContext, request: &PlaceOrderRequest) -> Result<PlacedOrder> {
        let order_id = self.generate_order_id(ctx)?;
        let prep = self.prepare_items(ctx, request).await?;
        let total = compute_total(&prep, &request.user_currency)?;

        let transaction_id = self
            .charge_payment(ctx, &total, &request.credit_card)
            .await?;
        tracing::info!(transaction_id = %transaction_id, "payment went through");

        let tracking_id = self
            .ship_order(ctx, &request.address, &prep.cart_items)
            .await?;
        tracing::info!(tracking_id = %tracking_id, "order shipped");

        let mut skipped = Vec::new();
        if let Err(failure) = self.empty_cart(ctx, &request.user_id).await {
            skipped.push(record_skipped(failure));
        }

        let order = assemble_result(order_id, tracking_id, request.address.clone(), prep);
        tracing::info!(
            order_id = %order.order_id,
            shipping_amount = order.shipping_cost.as_f64(),
            order_amount = total.as_f64(),
            items_count = order.items.len(),
            tracking_id = %order.shipping_tracking_id,
            "order placed"
        );

        if let Err(failure) = self.send_confirmation(ctx, &request.email, &order).await {
            skipped.push(record_skipped(failure));
        }

        let publish = match &self.publisher {
            Some(publisher) => {
                let (report, failure) = self.publish_event(ctx, publisher, &order).await;
                skipped.extend(failure.map(record_skipped));
                report
            }
            None => None,
        };

        Ok(PlacedOrder {
            order,
            total,
            transaction_id,
            skipped,
            publish,
        })
    }

    fn generate_order_id(&self, ctx: &RequestContext) -> Result<OrderId> {
        ctx.check().map_err(interrupted(CheckoutStage::GenerateOrderId))?;
        self.services
            .order_ids
            .next_order_id()
            .map_err(|source| CheckoutError::OrderIdGenerationFailed { source })
    }

    /// Fetches the cart, prices every item in the user's currency and
    /// quotes shipping.
    #[tracing::instrument(skip_all, fields(stage = "prepare_items"))]
    async fn prepare_items(
        &self,
        ctx: &RequestContext,
        request: &PlaceOrderRequest,
    ) -> Result<OrderPreparation> {
        let stage = CheckoutStage::PrepareItems;
        let currency = request.user_currency.as_str();

        let cart_items = ctx
            .run(self.services.cart.get_cart(&request.user_id))
            .await
            .map_err(interrupted(stage))?
            .map_err(|source| CheckoutError::CartUnavailable {
                user_id: request.user_id.clone(),
                source,
            })?;

        let mut order_items = Vec::with_capacity(cart_items.len());
        for item in &cart_items {
            let product = ctx
                .run(self.services.catalog.get_product(&item.product_id))
                .await
                .map_err(interrupted(stage))?
                .map_err(|source| CheckoutError::ProductLookupFailed {
                    product_id: item.product_id.clone(),
                    source,
                })?;
            let cost = self.convert(ctx, &product.price_usd, currency).await?;
            order_items.push(OrderItem::new(item.clone(), cost));
        }

        let shipping_usd = ctx
            .run(self.services.shipping.get_quote(&request.address, &cart_items))
            .await
            .map_err(interrupted(stage))?
            .map_err(|source| CheckoutError::ShippingQuoteFailed { source })?;
        let shipping_cost_localized = self.convert(ctx, &shipping_usd, currency).await?;

        let prep = OrderPreparation {
            order_items,
            cart_items,
            shipping_cost_localized,
        };
        tracing::debug!(
            shipping_amount = prep.shipping_cost_localized.as_f64(),
            cart_items_count = prep.unit_count(),
            order_items_count = prep.order_items.len(),
            "order prepared"
        );
        Ok(prep)
    }

    async fn convert(&self, ctx: &RequestContext, amount: &Money, to_code: &str) -> Result<Money> {
        ctx.run(self.services.currency.convert(amount, to_code))
            .await
            .map_err(interrupted(CheckoutStage::PrepareItems))?
            .map_err(|source| CheckoutError::PricingConversionFailed {
                from: amount.currency_code().to_string(),
                to: to_code.to_string(),
                source,
            })
    }

    #[tracing::instrument(skip_all, fields(stage = "charge_payment", amount = %total))]
    async fn charge_payment(
        &self,
        ctx: &RequestContext,
        total: &Money,
        card: &CreditCardInfo,
    ) -> Result<String> {
        let payment = if self.faults.boolean(PAYMENT_UNREACHABLE).await {
            tracing::warn!(flag = PAYMENT_UNREACHABLE, "routing charge to an unreachable payment service");
            &self.unreachable_payment
        } else {
            &self.services.payment
        };

        ctx.run(payment.charge(total, card))
            .await
            .map_err(interrupted(CheckoutStage::ChargePayment))?
            .map_err(|source| CheckoutError::PaymentFailed { source })
    }

    #[tracing::instrument(skip_all, fields(stage = "ship_order"))]
    async fn ship_order(
        &self,
        ctx: &RequestContext,
        address: &Address,
        items: &[CartItem],
    ) -> Result<String> {
        ctx.run(self.services.shipping.ship_order(address, items))
            .await
            .map_err(interrupted(CheckoutStage::ShipOrder))?
            .map_err(|source| CheckoutError::ShippingBookingFailed { source })
    }

    async fn empty_cart(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> std::result::Result<(), BestEffortFailure> {
        let ctx = ctx.child(self.config.best_effort_timeout);
        let reason = match ctx.run(self.services.cart.empty_cart(user_id)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(reason) => reason.to_string(),
        };
        Err(BestEffortFailure::CartClearFailed { reason })
    }

    async fn send_confirmation(
        &self,
        ctx: &RequestContext,
        email: &str,
        order: &OrderResult,
    ) -> std::result::Result<(), BestEffortFailure> {
        let ctx = ctx.child(self.config.best_effort_timeout);
        let send = self.services.email.send_order_confirmation(email, order);
        let reason = match ctx.run(send).await {
            Ok(Ok(())) => {
                tracing::info!(email, "order confirmation email sent");
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(reason) => reason.to_string(),
        };
        Err(BestEffortFailure::ConfirmationFailed { reason })
    }

    async fn publish_event(
        &self,
        ctx: &RequestContext,
        publisher: &EventPublisher,
        order: &OrderResult,
    ) -> (Option<PublishReport>, Option<BestEffortFailure>) {
        tracing::info!(topic = publisher.topic(), "sending order event");
        let ctx = ctx.child(self.config.publish_timeout);
        match publisher.publish(&ctx, order).await {
            Ok(report) => {
                let failure = report
                    .status
                    .cause()
                    .map(|cause| BestEffortFailure::PublishFailed {
                        reason: cause.to_string(),
                    });
                (Some(report), failure)
            }
            Err(e) => (
                None,
                Some(BestEffortFailure::PublishFailed {
                    reason: e.to_string(),
                }),
            ),
        }
    }
}

fn interrupted(stage: CheckoutStage) -> impl FnOnce(CancelReason) -> CheckoutError {
    move |reason| CheckoutError::Cancelled { stage, reason }
}

/// Shipping plus each unit cost times its quantity.
fn compute_total(prep: &OrderPreparation, currency_code: &str) -> Result<Money> {
    prep.total(currency_code)
        .map_err(|source| CheckoutError::MoneyArithmetic { source })
}

fn assemble_result(
    order_id: OrderId,
    shipping_tracking_id: String,
    shipping_address: Address,
    prep: OrderPreparation,
) -> OrderResult {
    OrderResult {
        order_id,
        shipping_tracking_id,
        shipping_cost: prep.shipping_cost_localized,
        shipping_address,
        items: prep.order_items,
    }
}

fn record_skipped(failure: BestEffortFailure) -> BestEffortFailure {
    let stage = failure.stage();
    metrics::counter!("checkout_best_effort_failures_total", "stage" => stage.as_str()).increment(1);
    tracing::warn!(stage = %stage, error = %failure, "best-effort stage failed");
    failure
}
