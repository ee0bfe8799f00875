use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

const MAX_TRACE_ID_LEN: usize = 128;

#[derive(Clone, Debug)]
pub struct RequestTraceContext {
    pub trace_id: String,
}

/// Accepts a caller-supplied id only if it is short printable ASCII.
fn incoming_trace_id(request: &Request) -> Option<String> {
    let value = request.headers().get(TRACE_ID_HEADER)?.to_str().ok()?.trim();
    let usable = !value.is_empty()
        && value.len() <= MAX_TRACE_ID_LEN
        && value.chars().all(|c| c.is_ascii_graphic());
    usable.then(|| value.to_string())
}

/// Propagates `x-trace-id` (or assigns a fresh uuid) on request and response.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = incoming_trace_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestTraceContext {
        trace_id: trace_id.clone(),
    });

    let header_value = HeaderValue::from_str(&trace_id).ok();
    if let Some(value) = header_value.clone() {
        request
            .headers_mut()
            .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
    }

    let span = tracing::debug_span!("request", trace_id = %trace_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header_value {
        response
            .headers_mut()
            .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
    }

    response
}
