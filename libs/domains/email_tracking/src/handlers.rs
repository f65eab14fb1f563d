use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, value::RawValue};
use std::sync::Arc;
use tracing::debug;

use crate::error::{EmailError, EmailResult};
use crate::metrics::render_metrics;
use crate::repository::EmailRecordStore;
use crate::worker::{WebhookJob, WebhookQueue};

struct WebhookState<S> {
    queue: WebhookQueue,
    store: Arc<S>,
}

/// Webhook ingress, health, metrics and dead-letter routes
pub fn router<S: EmailRecordStore + 'static>(queue: WebhookQueue, store: Arc<S>) -> Router {
    let state = Arc::new(WebhookState { queue, store });

    Router::new()
        .route("/{provider}/event/", post(receive_event::<S>))
        .route("/{provider}/event", post(receive_event::<S>))
        .route("/health", get(health::<S>))
        .route("/metrics", get(metrics_handler))
        .route("/admin/dead-letters", get(list_dead_letters::<S>))
        .with_state(state)
}

/// Accept a provider webhook and schedule one job per event.
///
/// The body is kept as raw text so ingestion sees the provider's original
/// payload. The response does not depend on the provider name or on the
/// ingestion outcome.
async fn receive_event<S: EmailRecordStore>(
    State(state): State<Arc<WebhookState<S>>>,
    Path(provider): Path<String>,
    body: Bytes,
) -> EmailResult<StatusCode> {
    let events = split_events(&body)?;
    let count = events.len();

    for payload in events {
        state.queue.enqueue(WebhookJob::new(provider.as_str(), payload))?;
    }

    debug!(provider = %provider, events = count, "Scheduled webhook events");
    Ok(StatusCode::OK)
}

async fn health<S: EmailRecordStore>(State(state): State<Arc<WebhookState<S>>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "queued": state.queue.pending(),
    }))
}

/// Prometheus text format; 503 until the recorder is installed
async fn metrics_handler() -> Response {
    match render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Metrics recorder is not installed".to_string(),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct DeadLetterParams {
    #[serde(default = "default_dead_letter_limit")]
    limit: u64,
}

fn default_dead_letter_limit() -> u64 {
    20
}

/// `GET /admin/dead-letters?limit=20`, newest first, at most 100
async fn list_dead_letters<S: EmailRecordStore>(
    State(state): State<Arc<WebhookState<S>>>,
    Query(params): Query<DeadLetterParams>,
) -> EmailResult<impl IntoResponse> {
    let limit = params.limit.min(100);
    let dead_letters = state.store.list_dead_letters(limit).await?;

    Ok(Json(json!({
        "count": dead_letters.len(),
        "limit": limit,
        "dead_letters": dead_letters,
    })))
}

/// Split a webhook body into the raw text of each event.
///
/// Providers send either one event object or an array of them.
fn split_events(body: &[u8]) -> EmailResult<Vec<String>> {
    let text = std::str::from_utf8(body)
        .map_err(|e| EmailError::MalformedPayload(format!("body is not UTF-8: {e}")))?;

    match text.trim_start().chars().next() {
        Some('{') => {
            let _: &RawValue = serde_json::from_str(text)?;
            Ok(vec![text.trim().to_string()])
        }
        Some('[') => {
            let events: Vec<&RawValue> = serde_json::from_str(text)?;
            events
                .into_iter()
                .map(|event| {
                    let raw = event.get();
                    if raw.starts_with('{') {
                        Ok(raw.to_string())
                    } else {
                        Err(EmailError::MalformedPayload(format!(
                            "batched event is not an object: {raw}"
                        )))
                    }
                })
                .collect()
        }
        _ => Err(EmailError::MalformedPayload(
            "expected a JSON object or array".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_single_event_keeps_raw_text() {
        let body = br#"{"MessageID": 1, "event": "open", "time": 1}"#;
        assert_eq!(
            split_events(body).unwrap(),
            vec![r#"{"MessageID": 1, "event": "open", "time": 1}"#.to_string()]
        );
    }

    #[test]
    fn test_split_batch() {
        let body = br#"[{"event":"open","MessageID":1}, {"event":"click","MessageID":2}]"#;
        assert_eq!(
            split_events(body).unwrap(),
            vec![
                r#"{"event":"open","MessageID":1}"#.to_string(),
                r#"{"event":"click","MessageID":2}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_split_rejects_bad_shapes() {
        let bodies: [&[u8]; 6] = [b"not json", b"42", b"[1, 2]", b"{\"open\": ", b"", b"\xff\xfe"];
        for body in bodies {
            assert!(
                matches!(split_events(body), Err(EmailError::MalformedPayload(_))),
                "accepted {body:?}"
            );
        }
    }
}
