//! 应用状态

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use notify_shared::observability::metrics;

use crate::channel::Channel;

/// 处理器共享的只读状态
#[derive(Clone)]
pub struct AppState {
    pub channel: Channel,
    pub service_name: Arc<str>,
    /// 渠道请求计数器名，如 `sms_requests_total`
    pub request_counter: Arc<str>,
    /// 未安装 Prometheus recorder 时为 None，/metrics 返回空内容
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(channel: Channel, service_name: &str, metrics: Option<PrometheusHandle>) -> Self {
        let request_counter = metrics::request_counter_name(channel.as_str());
        metrics::describe_request_counter(&request_counter);

        Self {
            channel,
            service_name: Arc::from(service_name),
            request_counter: Arc::from(request_counter),
            metrics,
        }
    }
}
