//! HTTP front end for the checkout orchestrator.
//!
//! Exposes `POST /orders`, a health check and Prometheus metrics, with
//! structured logging (tracing) on every request.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use checkout::{
    CheckoutConfig, CheckoutOrchestrator, Collaborators, InMemoryCartService,
    InMemoryCatalogService, InMemoryCurrencyService, InMemoryEmailService, InMemoryPaymentService,
    InMemoryShippingService, RandomOrderIds,
};
use domain::{CartItem, Money};
use event_bus::EventPublisher;
use flags::FaultInjector;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// User whose cart is pre-filled in the demo state.
pub const DEMO_USER: &str = "demo-user";

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: CheckoutOrchestrator,
    /// Deadline of one checkout request.
    pub request_timeout: Duration,
}

/// Handles on the in-memory collaborators behind the default state.
#[derive(Debug, Clone)]
pub struct DemoServices {
    pub cart: InMemoryCartService,
    pub catalog: InMemoryCatalogService,
    pub currency: InMemoryCurrencyService,
    pub shipping: InMemoryShippingService,
    pub payment: InMemoryPaymentService,
    pub email: InMemoryEmailService,
}

impl DemoServices {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            cart: Arc::new(self.cart.clone()),
            catalog: Arc::new(self.catalog.clone()),
            currency: Arc::new(self.currency.clone()),
            shipping: Arc::new(self.shipping.clone()),
            payment: Arc::new(self.payment.clone()),
            email: Arc::new(self.email.clone()),
            order_ids: Arc::new(RandomOrderIds),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::place))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state on in-memory collaborators
/// seeded with the demo catalog.
pub fn create_default_state(
    faults: FaultInjector,
    publisher: Option<EventPublisher>,
    checkout: CheckoutConfig,
    request_timeout: Duration,
) -> (Arc<AppState>, DemoServices) {
    let services = DemoServices {
        cart: InMemoryCartService::new(),
        catalog: InMemoryCatalogService::new(),
        currency: InMemoryCurrencyService::new(),
        shipping: InMemoryShippingService::new(),
        payment: InMemoryPaymentService::new(),
        email: InMemoryEmailService::new(),
    };
    seed_demo_data(&services);

    let orchestrator =
        CheckoutOrchestrator::new(services.collaborators(), faults, publisher, checkout);
    let state = Arc::new(AppState {
        orchestrator,
        request_timeout,
    });

    (state, services)
}

fn seed_demo_data(services: &DemoServices) {
    let products: [(&str, &str, i64, i32); 5] = [
        ("OLJCESPC7Z", "National Park Foundation Explorascope", 101, 960_000_000),
        ("66VCHSJNUP", "Starsense Explorer Refractor Telescope", 349, 950_000_000),
        ("1YMWWN1N4O", "Eclipsmart Travel Refractor Telescope", 129, 950_000_000),
        ("L9ECAV7KIM", "Lens Cleaning Kit", 21, 950_000_000),
        ("2ZYFJ3GM2N", "Roof Binoculars", 209, 950_000_000),
    ];
    for (id, name, units, nanos) in products {
        match Money::new("USD", units, nanos) {
            Ok(price) => services.catalog.add_product(id, name, price),
            Err(e) => tracing::warn!(product_id = id, error = %e, "skipping demo product"),
        }
    }

    for item in [CartItem::new("OLJCESPC7Z", 1), CartItem::new("L9ECAV7KIM", 2)] {
        if let Err(e) = services.cart.add_item(DEMO_USER, item) {
            tracing::warn!(error = %e, "skipping demo cart item");
        }
    }
}
