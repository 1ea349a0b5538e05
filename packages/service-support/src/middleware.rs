//! Request telemetry for every service.
//!
//! [`RequestTelemetry`] wraps the whole app. Per request it:
//! - adopts the caller's `x-trace-id` or mints a uuid v4,
//! - stores it as a [`TraceId`] extension and in the task-local context,
//! - runs the handler inside a `request` span,
//! - echoes the id back and emits one `request_completed` event levelled
//!   by status class.

use std::rc::Rc;
use std::time::Instant;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{Error, HttpMessage};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::trace_ctx;

pub const TRACE_HEADER: &str = "x-trace-id";

const MAX_INBOUND_TRACE_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    /// Adopts a propagated id when it is short printable ASCII.
    fn adopt_or_mint(inbound: Option<&HeaderValue>) -> Self {
        let adopted = inbound
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| {
                !id.is_empty()
                    && id.len() <= MAX_INBOUND_TRACE_LEN
                    && id.bytes().all(|b| b.is_ascii_graphic())
            });
        match adopted {
            Some(id) => Self(id.to_string()),
            None => Self(Uuid::new_v4().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestTelemetry {
    service: &'static str,
}

impl RequestTelemetry {
    pub fn new(service: &'static str) -> Self {
        Self { service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestTelemetry
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTelemetryMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTelemetryMiddleware {
            service: Rc::new(service),
            name: self.service,
        }))
    }
}

pub struct RequestTelemetryMiddleware<S> {
    service: Rc<S>,
    name: &'static str,
}

fn log_completion(method: &str, path: &str, status: StatusCode, start: Instant) {
    let status_code = status.as_u16();
    let duration_us = start.elapsed().as_micros() as u64;
    if status.is_server_error() {
        error!(http.method = %method, url.path = %path, http.status_code = status_code, duration_us, "request_completed");
    } else if status.is_client_error() {
        warn!(http.method = %method, url.path = %path, http.status_code = status_code, duration_us, "request_completed");
    } else {
        info!(http.method = %method, url.path = %path, http.status_code = status_code, duration_us, "request_completed");
    }
}

impl<S, B> Service<ServiceRequest> for RequestTelemetryMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let trace_id = TraceId::adopt_or_mint(req.headers().get(TRACE_HEADER));
        let method = req.method().to_string();
        let path = req.path().to_string();
        req.extensions_mut().insert(trace_id.clone());

        let span = info_span!(
            "request",
            service = self.name,
            trace_id = %trace_id.0,
            method = %method,
            path = %path,
        );
        let service = Rc::clone(&self.service);

        Box::pin(
            trace_ctx::with_trace_id(trace_id.0.clone(), async move {
                let result = service.call(req).await;
                let status = match &result {
                    Ok(res) => res.status(),
                    Err(err) => err.as_response_error().status_code(),
                };
                log_completion(&method, &path, status, start);

                let mut res = result?;
                if let Ok(value) = HeaderValue::from_str(&trace_id.0) {
                    res.headers_mut()
                        .insert(HeaderName::from_static(TRACE_HEADER), value);
                }
                Ok(res)
            })
            .instrument(span),
        )
    }
}
