//! 配置管理模块
//!
//! 启动时一次性构造 `AppConfig` 并显式传给各组件，避免散落的环境变量读取。
//! 支持可选的 TOML 配置文件，环境变量优先级最高。

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, Map};
use serde::Deserialize;

use crate::error::NotifyError;
use crate::observability::ObservabilityConfig;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_OTLP_ENDPOINT: &str = "localhost:4317";
const DEFAULT_KAFKA_BROKER_URL: &str = "localhost:9092";
const DEFAULT_KAFKA_TOPIC: &str = "notifications";
const DEFAULT_COMMIT_INTERVAL_MS: u64 = 1_000;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 5_000;

/// Kafka 消费配置
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    /// 消费组固定为服务名，同一服务的多个实例共享消费进度
    pub consumer_group: String,
    pub auto_offset_reset: String,
    /// offset 自动提交间隔，与消息是否处理成功无关
    pub commit_interval: Duration,
    /// 读取失败后的固定等待时间
    pub retry_backoff: Duration,
    pub fetch_min_bytes: u32,
    pub fetch_max_bytes: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: DEFAULT_KAFKA_BROKER_URL.to_string(),
            topic: DEFAULT_KAFKA_TOPIC.to_string(),
            consumer_group: "sms-service".to_string(),
            auto_offset_reset: "earliest".to_string(),
            commit_interval: Duration::from_millis(DEFAULT_COMMIT_INTERVAL_MS),
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            fetch_min_bytes: 10_000,
            fetch_max_bytes: 10_000_000,
        }
    }
}

/// 服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    /// 仅消费队列的服务（SMS）且 broker 与 topic 均非空时存在
    pub kafka: Option<KafkaConfig>,
    pub observability: ObservabilityConfig,
}

/// 配置源合并后的原始键值
///
/// 键名与环境变量一一对应（SERVICE_NAME -> service_name），
/// 数值字段先按字符串读取，便于把空值解释为“使用默认值”。
#[derive(Debug, Deserialize)]
struct RawConfig {
    service_name: String,
    port: String,
    app_env: String,
    otel_exporter_otlp_endpoint: String,
    kafka_broker_url: String,
    kafka_topic: String,
    kafka_commit_interval_ms: u64,
    kafka_retry_backoff_ms: u64,
    rust_log: String,
    json_logs: String,
}

impl AppConfig {
    /// 从配置文件和进程环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. 内置默认值
    /// 2. {CONFIG_DIR}/default.toml
    /// 3. {CONFIG_DIR}/{service_name}.toml
    /// 4. 环境变量（SERVICE_NAME、PORT、OTEL_EXPORTER_OTLP_ENDPOINT、KAFKA_BROKER_URL 等）
    pub fn load(default_service_name: &str, consumes_queue: bool) -> Result<Self, NotifyError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from(
            default_service_name,
            consumes_queue,
            Path::new(&config_dir),
            None,
        )
    }

    /// 与 [`AppConfig::load`] 相同，但允许注入环境变量表（测试用）
    ///
    /// `env` 为 `None` 时读取进程环境变量。
    pub fn load_from(
        default_service_name: &str,
        consumes_queue: bool,
        config_dir: &Path,
        env: Option<Map<String, String>>,
    ) -> Result<Self, NotifyError> {
        let raw: RawConfig = Config::builder()
            .set_default("service_name", default_service_name)?
            .set_default("port", DEFAULT_PORT.to_string())?
            .set_default("app_env", DEFAULT_ENVIRONMENT)?
            .set_default("otel_exporter_otlp_endpoint", DEFAULT_OTLP_ENDPOINT)?
            .set_default("kafka_broker_url", DEFAULT_KAFKA_BROKER_URL)?
            .set_default("kafka_topic", DEFAULT_KAFKA_TOPIC)?
            .set_default("kafka_commit_interval_ms", DEFAULT_COMMIT_INTERVAL_MS as i64)?
            .set_default("kafka_retry_backoff_ms", DEFAULT_RETRY_BACKOFF_MS as i64)?
            .set_default("rust_log", "info")?
            .set_default("json_logs", "false")?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(format!("{default_service_name}.toml")))
                    .required(false),
            )
            .add_source(Environment::default().source(env))
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw, default_service_name, consumes_queue)
    }

    fn from_raw(
        raw: RawConfig,
        default_service_name: &str,
        consumes_queue: bool,
    ) -> Result<Self, NotifyError> {
        let service_name =
            non_empty(raw.service_name).unwrap_or_else(|| default_service_name.to_string());

        let port = match raw.port.trim() {
            "" => DEFAULT_PORT,
            value => value.parse().map_err(|e| NotifyError::InvalidConfig {
                field: "PORT".to_string(),
                message: format!("{value}: {e}"),
            })?,
        };

        let kafka = if consumes_queue {
            match (non_empty(raw.kafka_broker_url), non_empty(raw.kafka_topic)) {
                (Some(brokers), Some(topic)) => Some(KafkaConfig {
                    brokers,
                    topic,
                    consumer_group: service_name.clone(),
                    commit_interval: Duration::from_millis(raw.kafka_commit_interval_ms),
                    retry_backoff: Duration::from_millis(raw.kafka_retry_backoff_ms),
                    ..KafkaConfig::default()
                }),
                _ => None,
            }
        } else {
            None
        };

        let environment = non_empty(raw.app_env).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let observability = ObservabilityConfig {
            service_name: service_name.clone(),
            environment: environment.clone(),
            otlp_endpoint: non_empty(raw.otel_exporter_otlp_endpoint).map(normalize_endpoint),
            log_level: non_empty(raw.rust_log).unwrap_or_else(|| "info".to_string()),
            json_logs: matches!(raw.json_logs.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        };

        Ok(Self {
            service_name,
            environment,
            server: ServerConfig {
                port,
                ..ServerConfig::default()
            },
            kafka,
            observability,
        })
    }

    /// 获取服务监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// gRPC 导出器需要带 scheme 的地址，`localhost:4317` 补全为 `http://localhost:4317`
fn normalize_endpoint(endpoint: String) -> String {
    if endpoint.contains("://") {
        endpoint
    } else {
        format!("http://{endpoint}")
    }
}
