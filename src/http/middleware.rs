//! Request-correlation and request-tracing layers, grounded on `cs2kz-api`'s
//! `http::middleware::{request_id, trace}`, composed once over the whole
//! router instead of a per-handler `tracing::info_span!`/`.instrument()`
//! pair — so all three routes (including `dataSourceLoader`) get a span.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::{HttpMakeClassifier, MakeSpan, OnRequest, OnResponse, TraceLayer};
use ulid::Ulid;

/// Sets an `x-request-id` header (a fresh [`Ulid`] per request) and
/// propagates it back onto the response.
pub fn request_id_layers() -> (SetRequestIdLayer<MakeUlidRequestId>, PropagateRequestIdLayer)
{
	(SetRequestIdLayer::x_request_id(MakeUlidRequestId), PropagateRequestIdLayer::x_request_id())
}

#[derive(Debug, Clone, Copy)]
pub struct MakeUlidRequestId;

impl MakeRequestId for MakeUlidRequestId
{
	fn make_request_id<B>(&mut self, _: &Request<B>) -> Option<RequestId>
	{
		Ulid::new().to_string().parse().ok().map(RequestId::new)
	}
}

/// Wraps every request in a span carrying its method, URI, and request ID.
pub fn trace_layer() -> TraceLayer<HttpMakeClassifier, impl MakeSpan<Body> + Clone, impl OnRequest<Body> + Clone, impl OnResponse<Body> + Clone>
{
	TraceLayer::new_for_http().make_span_with(make_span).on_request(on_request).on_response(on_response)
}

fn make_span(_req: &Request<Body>) -> tracing::Span
{
	tracing::info_span!(
		"request",
		req.id = tracing::field::Empty,
		req.method = tracing::field::Empty,
		req.uri = tracing::field::Empty,
	)
}

fn on_request(req: &Request<Body>, span: &tracing::Span)
{
	if let Some(request_id) = req.extensions().get::<RequestId>() {
		span.record("req.id", tracing::field::debug(request_id.header_value()));
	}
	span.record("req.method", tracing::field::debug(req.method()));
	span.record("req.uri", tracing::field::display(req.uri()));
	tracing::debug!("starting to process request");
}

fn on_response(res: &Response<Body>, latency: Duration, _span: &tracing::Span)
{
	tracing::info!(status = res.status().as_u16(), ?latency, "finished processing request");
}
