//! HTTP 处理器
//!
//! 每个处理器开启一个以固定名称命名的 span，并把渠道请求计数加一。
//! 计数发生在方法校验和请求体解码之前，因此被拒绝的请求同样计入。

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{Method, header},
    response::IntoResponse,
};
use metrics_exporter_prometheus::PrometheusHandle;
use notify_shared::observability::metrics;
use tracing::{field::Empty, info, info_span, warn};

use crate::{dto::SendResponse, error::ServiceError, state::AppState};

/// / 问候语，任意方法
pub async fn hello(State(state): State<AppState>) -> String {
    info_span!("hello", otel.name = "handleHelloRequest", endpoint = "/").in_scope(|| {
        metrics::record_channel_request(&state.request_counter, "/");
        info!(service = %state.service_name, "Received request for /");
        state.channel.greeting()
    })
}

/// 模拟发送通知
///
/// 接受任意方法以便对非 POST 请求也计数并返回 405。请求体以原始字节接收，
/// 不设大小上限；解码失败时把解码器的错误文本原样作为 400 响应体。
pub async fn send_notification(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<SendResponse>, ServiceError> {
    let channel = state.channel;
    let span = info_span!(
        "send_notification",
        otel.name = channel.send_span_name(),
        endpoint = channel.send_path(),
        otel.status_code = Empty,
        error = Empty,
    );

    span.in_scope(|| {
        metrics::record_channel_request(&state.request_counter, channel.send_path());

        if method != Method::POST {
            warn!(method = %method, path = channel.send_path(), "Method not allowed");
            return Err(ServiceError::MethodNotAllowed);
        }

        let request = channel.parse_request(&body).map_err(|e| {
            let span = tracing::Span::current();
            span.record("otel.status_code", "ERROR");
            span.record("error", tracing::field::display(&e));
            warn!(error = %e, "Failed to decode request body");
            ServiceError::from(e)
        })?;

        info!(
            service = %state.service_name,
            destination = %request.destination,
            subject = request.subject.as_deref().unwrap_or_default(),
            body = %request.body,
            "Simulating {} notification send",
            channel
        );

        Ok(Json(SendResponse::accepted(channel, &request)))
    })
}

/// GET /health 存活检查，不依赖任何下游
pub async fn health() -> &'static str {
    info_span!("health", otel.name = "handleHealthCheck", endpoint = "/health").in_scope(|| "OK")
}

/// GET /metrics Prometheus 文本格式
pub async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
