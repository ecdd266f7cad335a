//! Order placement endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::{BestEffortFailure, PlaceOrderRequest};
use common::{RequestContext, trace};
use domain::{Money, OrderResult};
use opentelemetry::Context;
use opentelemetry::propagation::Extractor;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order: OrderResult,
    pub total: Money,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<BestEffortFailure>,
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// The caller's span, when the request carries a valid `traceparent`.
pub fn trace_from_headers(headers: &HeaderMap) -> Context {
    trace::extract_from(&HeaderExtractor(headers))
}

fn validate(req: &PlaceOrderRequest) -> Result<(), ApiError> {
    if req.user_id.as_str().trim().is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if req.user_currency.trim().is_empty() {
        return Err(ApiError::BadRequest("user_currency is required".to_string()));
    }
    Ok(())
}

/// POST /orders: runs one checkout.
#[tracing::instrument(skip_all, fields(user_id = %req.user_id))]
pub async fn place(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<Json<PlaceOrderResponse>, ApiError> {
    validate(&req)?;

    let ctx = RequestContext::background()
        .with_trace(trace::continue_remote(trace_from_headers(&headers)))
        .with_timeout(state.request_timeout);

    let placed = state.orchestrator.place_order(&ctx, req).await?;

    Ok(Json(PlaceOrderResponse {
        order: placed.order,
        total: placed.total,
        transaction_id: placed.transaction_id,
        skipped: placed.skipped,
    }))
}
