// HTTP handlers. `/input/{id}` always answers "OK\n" with 200: what
// happened on the serial side is only visible in the log and metrics.
use crate::dispatch::{Dispatcher, Source};
use axum::{
    extract::{Extension, Path},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue},
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

pub const OK_BODY: &str = "OK\n";

pub async fn input(Extension(dispatcher): Extension<Dispatcher>, Path(id): Path<String>) -> &'static str {
    dispatcher.dispatch(Source::Http, &id).await;
    OK_BODY
}

/// Expose Prometheus text-format metrics gathered from the registry.
pub async fn metrics_handler(Extension(registry): Extension<Arc<Registry>>) -> (HeaderMap, String) {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    let body = String::from_utf8_lossy(&buffer).to_string();

    let mut headers = HeaderMap::new();
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        headers.insert(CONTENT_TYPE, content_type);
    }
    (headers, body)
}
