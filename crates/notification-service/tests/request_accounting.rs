//! 请求计数与 span 状态测试
//!
//! 独立的测试二进制：全局 Prometheus recorder 只在这里安装，
//! 不影响其他测试进程。

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use notification_service::{Channel, routes::app_router, state::AppState};
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::{
    Registry,
    layer::{Context, Layer, SubscriberExt},
};

fn global_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("安装 Prometheus recorder 失败")
        })
        .clone()
}

async fn call(app: &Router, method: Method, uri: &str, body: &'static str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ---------------------------------------------------------------------------
// 渠道计数
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rejected_requests_are_counted() {
    let handle = global_handle();
    let app = app_router(AppState::new(Channel::Sms, "sms-service", Some(handle)));

    let rejected_method = call(&app, Method::GET, "/send", "").await;
    assert_eq!(rejected_method.status(), StatusCode::METHOD_NOT_ALLOWED);

    let rejected_body = call(&app, Method::POST, "/send", "{not json").await;
    assert_eq!(rejected_body.status(), StatusCode::BAD_REQUEST);

    let accepted = call(&app, Method::POST, "/send", r#"{"to":"1","body":"x"}"#).await;
    assert_eq!(accepted.status(), StatusCode::OK);

    let hello = call(&app, Method::GET, "/", "").await;
    assert_eq!(hello.status(), StatusCode::OK);

    let health = call(&app, Method::GET, "/health", "").await;
    assert_eq!(health.status(), StatusCode::OK);

    let metrics = call(&app, Method::GET, "/metrics", "").await;
    assert_eq!(metrics.status(), StatusCode::OK);
    let rendered = body_text(metrics).await;

    assert!(
        rendered.contains("sms_requests_total{endpoint=\"/send\"} 3"),
        "{rendered}"
    );
    assert!(
        rendered.contains("sms_requests_total{endpoint=\"/\"} 1"),
        "{rendered}"
    );
    assert!(
        !rendered.contains("sms_requests_total{endpoint=\"/health\"}"),
        "健康检查不计入渠道计数: {rendered}"
    );
    assert!(rendered.contains("http_requests_total"), "{rendered}");
}

// ---------------------------------------------------------------------------
// span 错误状态
// ---------------------------------------------------------------------------

/// 收集所有 span 在创建之后被 record 的字段
#[derive(Clone, Default)]
struct RecordedFields(Arc<Mutex<Vec<(String, String)>>>);

impl RecordedFields {
    fn get(&self, name: &str) -> Option<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
    }
}

impl<S: tracing::Subscriber> Layer<S> for RecordedFields {
    fn on_record(&self, _id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        self.0.lock().unwrap().extend(visitor.0);
    }
}

#[derive(Default)]
struct FieldVisitor(Vec<(String, String)>);

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
}

#[tokio::test]
async fn test_decode_failure_marks_span_as_error() {
    let fields = RecordedFields::default();
    let subscriber = Registry::default().with(fields.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    // Email 渠道，避免与上面的 sms 计数相互干扰
    let app = app_router(AppState::new(Channel::Email, "email-service", None));
    let response = call(&app, Method::POST, "/send-email", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(fields.get("otel.status_code").as_deref(), Some("ERROR"));
    let error = fields.get("error").expect("span 应记录错误文本");
    assert!(error.contains("line 1"), "{error}");
}

#[tokio::test]
async fn test_successful_send_leaves_span_status_unset() {
    let fields = RecordedFields::default();
    let subscriber = Registry::default().with(fields.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = app_router(AppState::new(Channel::Email, "email-service", None));
    let response = call(
        &app,
        Method::POST,
        "/send-email",
        r#"{"to":"a@b.com","subject":"Hi","body":"x"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(fields.get("otel.status_code"), None);
    assert_eq!(fields.get("error"), None);
    // http_tracing 中间件仍会回填状态码
    assert_eq!(fields.get("status").as_deref(), Some("200"));
}
