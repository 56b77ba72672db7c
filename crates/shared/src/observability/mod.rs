//! 统一可观测性模块
//!
//! 提供 metrics、tracing、logging 的统一初始化和管理。
//! 三个通知服务通过单一入口点配置可观测性，确保一致的指标命名和追踪传播。

pub mod metrics;
pub mod middleware;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

/// 可观测性配置
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    /// 服务名称，用于标识追踪和指标的来源
    pub service_name: String,

    /// 部署环境，作为 resource 属性随 span 导出
    pub environment: String,

    /// OpenTelemetry OTLP gRPC 端点
    /// 为空时禁用分布式追踪导出
    pub otlp_endpoint: Option<String>,

    /// 日志级别（如 "info", "debug"）
    pub log_level: String,

    /// 是否启用 JSON 格式日志
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            environment: "development".to_string(),
            otlp_endpoint: None,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// 可观测性资源守卫
///
/// 持有各种可观测性资源的生命周期。
/// 当 Guard 被 drop 时，会优雅关闭追踪 provider 并刷新待发送数据。
pub struct ObservabilityGuard {
    metrics_handle: PrometheusHandle,
    _tracing_guard: tracing::TracingGuard,
}

impl ObservabilityGuard {
    /// Prometheus 渲染句柄，挂到服务自身的 `/metrics` 路由上
    pub fn metrics_handle(&self) -> PrometheusHandle {
        self.metrics_handle.clone()
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        // TracingGuard 随后 drop，负责刷新 span
        info!("Shutting down observability...");
    }
}

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志和追踪）
/// 2. Metrics（Prometheus recorder）
///
/// 任一步骤失败都视为启动错误，由调用方终止进程。
/// 必须在 tokio runtime 内调用，OTLP 导出器依赖当前 runtime。
///
/// # Example
///
/// ```ignore
/// use notify_shared::observability::{init, ObservabilityConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let guard = init(&ObservabilityConfig::default())?;
///     let handle = guard.metrics_handle();
///     // 应用逻辑...
///     Ok(())
/// }
/// ```
pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    // 1. 初始化 tracing
    let tracing_guard = tracing::init(config)?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        "Observability initialized"
    );

    if config.otlp_endpoint.is_none() {
        info!("OTEL_EXPORTER_OTLP_ENDPOINT is empty, span export disabled");
    }

    // 2. 初始化 metrics
    let metrics_handle = metrics::init()?;

    Ok(ObservabilityGuard {
        metrics_handle,
        _tracing_guard: tracing_guard,
    })
}
