//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 渲染句柄交给服务路由，在业务端口的 `/metrics` 上供 Prometheus 抓取。

use std::sync::OnceLock;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// 全局 Prometheus handle，recorder 每个进程只能安装一次
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// 安装 Prometheus recorder 并返回渲染句柄
///
/// 重复调用返回首次安装的句柄。
pub fn init() -> Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics();

    Ok(handle)
}

/// 注册通用指标
///
/// 这些描述会出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics() {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "queue_records_consumed_total",
        "Total number of queue records consumed"
    );
    metrics::describe_counter!(
        "queue_read_errors_total",
        "Total number of failed queue reads"
    );
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 渠道请求计数器名称，如 `email_requests_total`
pub fn request_counter_name(channel: &str) -> String {
    format!("{channel}_requests_total")
}

/// 为渠道请求计数器注册 HELP 描述
pub fn describe_request_counter(counter_name: &str) {
    metrics::describe_counter!(
        counter_name.to_string(),
        "Total number of notification requests"
    );
}

/// 记录一次渠道请求，按 endpoint 打标签
#[inline]
pub fn record_channel_request(counter_name: &str, endpoint: &'static str) {
    metrics::counter!(counter_name.to_string(), "endpoint" => endpoint).increment(1);
}

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录消费到的队列消息
#[inline]
pub fn record_queue_record(topic: &str) {
    metrics::counter!("queue_records_consumed_total", "topic" => topic.to_string()).increment(1);
}

/// 记录一次队列读取失败
#[inline]
pub fn record_queue_read_error() {
    metrics::counter!("queue_read_errors_total").increment(1);
}
