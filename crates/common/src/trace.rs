//! W3C Trace Context propagation over OpenTelemetry.
//!
//! Carriers are string maps: record headers on the bus side, request headers
//! on the HTTP side.

use std::collections::BTreeMap;

use opentelemetry::Context;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header carrying version, trace id, parent span id and flags.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Vendor-specific trace state, forwarded untouched.
pub const TRACESTATE_HEADER: &str = "tracestate";

struct MapInjector<'a>(&'a mut BTreeMap<String, String>);

impl Injector for MapInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key.to_string(), value);
    }
}

struct MapExtractor<'a>(&'a BTreeMap<String, String>);

impl Extractor for MapExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

/// Writes the span active in `cx` into `carrier`.
///
/// Nothing is written when `cx` holds no valid span.
pub fn inject(cx: &Context, carrier: &mut BTreeMap<String, String>) {
    TraceContextPropagator::new().inject_context(cx, &mut MapInjector(carrier));
}

/// Reads a remote parent from `carrier`.
///
/// Missing or malformed headers yield a context without a span.
pub fn extract(carrier: &BTreeMap<String, String>) -> Context {
    extract_from(&MapExtractor(carrier))
}

/// Same as [`extract`], for any header carrier.
pub fn extract_from(extractor: &dyn Extractor) -> Context {
    TraceContextPropagator::new().extract_with_context(&Context::new(), extractor)
}

/// The span context active in `cx`, if it identifies a span.
pub fn span_context(cx: &Context) -> Option<SpanContext> {
    let span = cx.span();
    let span_context = span.span_context();
    span_context.is_valid().then(|| span_context.clone())
}

/// Parents the current `tracing` span on `remote` and returns the context
/// work under that span runs in.
///
/// Without an OpenTelemetry layer the `tracing` span has no context of its
/// own, and `remote` is returned as is.
pub fn continue_remote(remote: Context) -> Context {
    let span = tracing::Span::current();
    span.set_parent(remote.clone());
    let cx = span.context();
    if cx.span().span_context().is_valid() {
        cx
    } else {
        remote
    }
}
