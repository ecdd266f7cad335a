//! Integration tests for order placement.

use std::sync::Arc;
use std::time::Duration;

use checkout::{
    BestEffortFailure, CheckoutConfig, CheckoutError, CheckoutOrchestrator, CheckoutStage,
    Collaborators, ErrorClass, InMemoryCartService, InMemoryCatalogService,
    InMemoryCurrencyService, InMemoryEmailService, InMemoryPaymentService,
    InMemoryShippingService, OrderIdSource, PlaceOrderRequest, RandomOrderIds, ServiceError,
};
use common::{CancelReason, OrderId, RequestContext, UserId};
use domain::{Address, CartItem, CreditCardInfo, Money};
use event_bus::{EventPublisher, InMemoryBroker, ORDERS_TOPIC, ProducerRuntime};
use flags::{FaultInjector, InMemoryFlags, KAFKA_QUEUE_PROBLEMS, PAYMENT_UNREACHABLE};
use opentelemetry::Context;
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry_sdk::trace::SdkTracerProvider;

const USER: &str = "user-1";

struct FailingOrderIds;

impl OrderIdSource for FailingOrderIds {
    fn next_order_id(&self) -> Result<OrderId, ServiceError> {
        Err(ServiceError::Unavailable("entropy source exhausted".to_string()))
    }
}

struct TestHarness {
    orchestrator: CheckoutOrchestrator,
    cart: InMemoryCartService,
    catalog: InMemoryCatalogService,
    shipping: InMemoryShippingService,
    payment: InMemoryPaymentService,
    email: InMemoryEmailService,
    flags: InMemoryFlags,
    broker: InMemoryBroker,
    _runtime: ProducerRuntime,
}

impl TestHarness {
    fn new() -> Self {
        Self::build(Arc::new(RandomOrderIds), true, CheckoutConfig::default())
    }

    fn build(order_ids: Arc<dyn OrderIdSource>, publish: bool, config: CheckoutConfig) -> Self {
        let cart = InMemoryCartService::new();
        let catalog = InMemoryCatalogService::new();
        let currency = InMemoryCurrencyService::new();
        let shipping = InMemoryShippingService::with_rate(Money::new("USD", 2, 500_000_000).unwrap());
        let payment = InMemoryPaymentService::new();
        let email = InMemoryEmailService::new();
        let flags = InMemoryFlags::new();
        let faults = FaultInjector::new(Arc::new(flags.clone()));

        catalog.add_product("A", "Sunglasses", Money::from_units("USD", 10));
        cart.add_item(USER, CartItem::new("A", 2)).unwrap();

        let broker = InMemoryBroker::new();
        let runtime = ProducerRuntime::start(Arc::new(broker.clone()), 16);
        let publisher = publish.then(|| EventPublisher::new(runtime.handle(), faults.clone()));

        let services = Collaborators {
            cart: Arc::new(cart.clone()),
            catalog: Arc::new(catalog.clone()),
            currency: Arc::new(currency),
            shipping: Arc::new(shipping.clone()),
            payment: Arc::new(payment.clone()),
            email: Arc::new(email.clone()),
            order_ids,
        };
        let orchestrator = CheckoutOrchestrator::new(services, faults, publisher, config);

        Self {
            orchestrator,
            cart,
            catalog,
            shipping,
            payment,
            email,
            flags,
            broker,
            _runtime: runtime,
        }
    }

    fn request(&self, currency: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            user_id: UserId::new(USER),
            user_currency: currency.to_string(),
            address: Address {
                street_address: "1600 Amphitheatre Parkway".to_string(),
                city: "Mountain View".to_string(),
                state: "CA".to_string(),
                country: "United States".to_string(),
                zip_code: "94043".to_string(),
            },
            email: "someone@example.com".to_string(),
            credit_card: CreditCardInfo {
                credit_card_number: "4432-8015-6152-0454".to_string(),
                credit_card_cvv: 672,
                credit_card_expiration_year: 2099,
                credit_card_expiration_month: 1,
            },
        }
    }
}

#[tokio::test]
async fn test_happy_path_places_and_publishes_order() {
    let h = TestHarness::new();

    let placed = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap();

    assert_eq!(placed.total, Money::from_units("USD", 25));
    assert_eq!(placed.order.items.len(), 1);
    assert_eq!(placed.order.items[0].item.quantity, 2);
    assert_eq!(placed.order.items[0].cost, Money::from_units("USD", 10));
    assert_eq!(placed.order.shipping_cost, Money::from_units("USD", 5));
    assert!(placed.skipped.is_empty());

    assert_eq!(h.payment.charged(&placed.transaction_id), Some(placed.total.clone()));
    let shipment = h.shipping.shipment(&placed.order.shipping_tracking_id).unwrap();
    assert_eq!(shipment.items, vec![CartItem::new("A", 2)]);
    assert_eq!(shipment.address.zip_code, "94043");
    assert!(h.cart.cart(&UserId::new(USER)).is_empty());
    assert_eq!(h.email.sent(), vec![("someone@example.com".to_string(), placed.order.order_id)]);

    let report = placed.publish.unwrap();
    assert!(report.status.success());
    let records = h.broker.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, ORDERS_TOPIC);
    assert_eq!(records[0].order().unwrap(), placed.order);
}

#[tokio::test]
async fn test_prices_are_converted_to_user_currency() {
    let h = TestHarness::new();

    let placed = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("EUR"))
        .await
        .unwrap();

    assert_eq!(placed.order.items[0].cost, Money::new("EUR", 8, 845_643_520).unwrap());
    assert_eq!(placed.order.shipping_cost, Money::new("EUR", 4, 422_821_760).unwrap());
    assert_eq!(placed.total, Money::new("EUR", 22, 114_108_800).unwrap());
}

#[tokio::test]
async fn test_shipping_failure_is_unavailable_after_charge() {
    let h = TestHarness::new();
    h.shipping.set_fail_on_ship(true);

    let err = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::ShippingBookingFailed { .. }));
    assert_eq!(err.class(), ErrorClass::Unavailable);
    assert_eq!(err.stage(), CheckoutStage::ShipOrder);

    // The charge stands; there is no refund.
    assert_eq!(h.payment.charge_count(), 1);
    assert_eq!(h.broker.attempt_count(), 0);
    assert_eq!(h.email.sent_count(), 0);
    assert_eq!(h.cart.cart(&UserId::new(USER)).len(), 1);
}

#[tokio::test]
async fn test_best_effort_failures_do_not_fail_order() {
    let h = TestHarness::new();
    h.cart.set_fail_on_empty(true);
    h.email.set_fail_on_send(true);

    let placed = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap();

    assert_eq!(placed.total, Money::from_units("USD", 25));
    let stages: Vec<_> = placed.skipped.iter().map(BestEffortFailure::stage).collect();
    assert_eq!(
        stages,
        vec![CheckoutStage::EmptyCart, CheckoutStage::SendConfirmation]
    );
    assert_eq!(h.broker.record_count(), 1);
}

#[tokio::test]
async fn test_payment_unreachable_flag_fails_charge() {
    let h = TestHarness::new();
    h.flags.set_bool(PAYMENT_UNREACHABLE, true);

    let err = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentFailed { .. }));
    assert_eq!(err.class(), ErrorClass::Internal);
    assert_eq!(h.payment.charge_count(), 0);
    assert_eq!(h.shipping.shipment_count(), 0);
    assert_eq!(h.broker.attempt_count(), 0);

    h.flags.set_bool(PAYMENT_UNREACHABLE, false);
    assert!(h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_declined_card_is_payment_failure() {
    let h = TestHarness::new();
    let mut request = h.request("USD");
    request.credit_card.credit_card_expiration_year = 2001;

    let err = h
        .orchestrator
        .place_order(&RequestContext::background(), request)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentFailed { .. }));
    assert_eq!(h.shipping.shipment_count(), 0);
}

#[tokio::test]
async fn test_queue_problems_flag_adds_detached_records() {
    let h = TestHarness::new();
    h.flags.set_int(KAFKA_QUEUE_PROBLEMS, 3);

    let placed = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap();

    assert_eq!(placed.publish.unwrap().overload_records, 3);
    tokio::time::timeout(Duration::from_secs(5), h.broker.wait_for_attempts(4))
        .await
        .unwrap();
    assert_eq!(h.broker.record_count(), 4);
}

#[tokio::test]
async fn test_request_does_not_wait_for_overload_records() {
    let h = TestHarness::new();
    h.flags.set_int(KAFKA_QUEUE_PROBLEMS, 3);
    h.broker.hold_after(1);

    let placed = tokio::time::timeout(
        Duration::from_secs(5),
        h.orchestrator
            .place_order(&RequestContext::background(), h.request("USD")),
    )
    .await
    .unwrap()
    .unwrap();

    let report = placed.publish.unwrap();
    assert!(report.status.success());
    assert_eq!(report.overload_records, 3);
    assert_eq!(h.broker.record_count(), 1);
}

#[tokio::test]
async fn test_publish_failure_is_best_effort() {
    let h = TestHarness::new();
    h.broker.set_fail_on_deliver(true);

    let placed = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap();

    assert!(!placed.publish.unwrap().status.success());
    assert!(matches!(
        placed.skipped.as_slice(),
        [BestEffortFailure::PublishFailed { .. }]
    ));
}

#[tokio::test]
async fn test_no_publisher_means_no_event() {
    let h = TestHarness::build(Arc::new(RandomOrderIds), false, CheckoutConfig::default());
    assert!(!h.orchestrator.publishes_events());

    let placed = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap();

    assert!(placed.publish.is_none());
    assert_eq!(h.broker.attempt_count(), 0);
}

#[tokio::test]
async fn test_event_carries_request_trace() {
    opentelemetry::global::set_tracer_provider(SdkTracerProvider::builder().build());
    let h = TestHarness::new();
    let parent = SpanContext::new(
        TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
        SpanId::from_hex("00f067aa0ba902b7").unwrap(),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    let ctx = RequestContext::background()
        .with_trace(Context::new().with_remote_span_context(parent.clone()));

    h.orchestrator.place_order(&ctx, h.request("USD")).await.unwrap();

    let carried = h.broker.records()[0].trace().unwrap();
    assert_eq!(carried.trace_id(), parent.trace_id());
    assert_ne!(carried.span_id(), parent.span_id());
}

#[tokio::test]
async fn test_order_id_failure_stops_before_cart() {
    let h = TestHarness::build(Arc::new(FailingOrderIds), true, CheckoutConfig::default());

    let err = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::OrderIdGenerationFailed { .. }));
    assert_eq!(err.class(), ErrorClass::Internal);
    assert_eq!(h.catalog.lookup_count(), 0);
}

#[tokio::test]
async fn test_cart_failure_is_internal() {
    let h = TestHarness::new();
    h.cart.set_fail_on_get(true);

    let err = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::CartUnavailable { .. }));
    assert_eq!(err.class(), ErrorClass::Internal);
    assert_eq!(err.collaborator(), Some("cart"));
    assert_eq!(h.payment.charge_count(), 0);
}

#[tokio::test]
async fn test_unknown_product_fails_preparation() {
    let h = TestHarness::new();
    h.cart.add_item(USER, CartItem::new("missing", 1)).unwrap();

    let err = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::ProductLookupFailed { .. }));
    assert_eq!(err.stage(), CheckoutStage::PrepareItems);
}

#[tokio::test]
async fn test_unsupported_currency_fails_pricing() {
    let h = TestHarness::new();

    let err = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("XXX"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PricingConversionFailed { .. }));
    assert_eq!(err.class(), ErrorClass::Internal);
    assert_eq!(h.payment.charge_count(), 0);
}

#[tokio::test]
async fn test_shipping_quote_failure_is_internal() {
    let h = TestHarness::new();
    h.shipping.set_fail_on_quote(true);

    let err = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::ShippingQuoteFailed { .. }));
    assert_eq!(err.class(), ErrorClass::Internal);
}

#[tokio::test]
async fn test_cancelled_request_does_nothing() {
    let h = TestHarness::new();
    let (ctx, canceller) = RequestContext::cancellable();
    canceller.cancel();

    let err = h.orchestrator.place_order(&ctx, h.request("USD")).await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Cancelled {
            stage: CheckoutStage::GenerateOrderId,
            reason: CancelReason::Cancelled
        }
    ));
    assert_eq!(err.class(), ErrorClass::Cancelled);
    assert_eq!(h.catalog.lookup_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_slow_shipping() {
    let h = TestHarness::new();
    h.shipping.set_ship_delay(Duration::from_secs(60));
    let ctx = RequestContext::background().with_timeout(Duration::from_secs(1));

    let err = h.orchestrator.place_order(&ctx, h.request("USD")).await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Cancelled {
            stage: CheckoutStage::ShipOrder,
            reason: CancelReason::DeadlineExceeded
        }
    ));
    assert_eq!(h.payment.charge_count(), 1);
    assert_eq!(h.broker.attempt_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_confirmation_is_bounded() {
    let config = CheckoutConfig {
        best_effort_timeout: Duration::from_secs(2),
        ..CheckoutConfig::default()
    };
    let h = TestHarness::build(Arc::new(RandomOrderIds), true, config);
    h.email.set_delay(Duration::from_secs(300));

    let started = tokio::time::Instant::now();
    let placed = h
        .orchestrator
        .place_order(&RequestContext::background(), h.request("USD"))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    match placed.skipped.as_slice() {
        [BestEffortFailure::ConfirmationFailed { reason }] => {
            assert_eq!(reason, "deadline exceeded");
        }
        other => panic!("unexpected skipped stages: {other:?}"),
    }
    assert!(placed.publish.unwrap().status.success());
}
