//! Kafka 消费基础设施
//!
//! 将 rdkafka 的底层 API 封装为 `RecordSource` 抽象，消费循环只依赖该 trait，
//! 因此可以用脚本化的数据源验证退避与关闭语义，无需真实 broker。

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::KafkaConfig;
use crate::error::NotifyError;
use crate::observability::metrics;

// ---------------------------------------------------------------------------
// QueueRecord
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递。负载不做任何 schema 校验。
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl QueueRecord {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let timestamp = msg.timestamp().to_millis();

        let mut headers = HashMap::new();
        if let Some(h) = msg.headers() {
            for idx in 0..h.count() {
                let header = h.get(idx);
                if let Some(raw) = header.value
                    && let Ok(value) = std::str::from_utf8(raw)
                {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp,
            headers,
        }
    }

    /// 负载按 UTF-8 解码用于日志，非法字节替换为 U+FFFD
    pub fn payload_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

// ---------------------------------------------------------------------------
// RecordSource
// ---------------------------------------------------------------------------

/// 消息来源
///
/// 每次调用阻塞直到拿到下一条消息或读取失败。实现需保证 future 被丢弃时
/// 不丢失已确认的进度（rdkafka 的 `recv` 满足这一点）。
#[async_trait]
pub trait RecordSource: Send {
    async fn next_record(&mut self) -> Result<QueueRecord, NotifyError>;
}

/// 基于 rdkafka `StreamConsumer` 的消息来源
///
/// offset 由 librdkafka 按固定间隔自动提交，与日志是否输出成功无关。
pub struct KafkaRecordSource {
    consumer: StreamConsumer,
}

impl KafkaRecordSource {
    /// 创建消费者并订阅配置中的 topic
    ///
    /// 创建阶段不会连接 broker，broker 不可达会在读取时以错误形式出现。
    pub fn new(config: &KafkaConfig) -> Result<Self, NotifyError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                config.commit_interval.as_millis().to_string(),
            )
            .set("fetch.min.bytes", config.fetch_min_bytes.to_string())
            .set("fetch.max.bytes", config.fetch_max_bytes.to_string())
            .create()
            .map_err(|e| NotifyError::Kafka(format!("创建消费者失败: {e}")))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| NotifyError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.consumer_group,
            "Kafka consumer initialized"
        );
        Ok(Self { consumer })
    }
}

#[async_trait]
impl RecordSource for KafkaRecordSource {
    async fn next_record(&mut self) -> Result<QueueRecord, NotifyError> {
        let msg = self.consumer.recv().await?;
        Ok(QueueRecord::from_borrowed(&msg))
    }
}

// ---------------------------------------------------------------------------
// ConsumerLoop
// ---------------------------------------------------------------------------

/// 消费循环退出时的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub records: u64,
    pub read_errors: u64,
}

/// 消费循环：逐条读取、记录日志，读取失败时固定退避后无限重试
///
/// 消息只记录日志，不做任何下游分发。循环唯一的退出途径是关闭信号。
pub struct ConsumerLoop<S> {
    service_name: String,
    source: S,
    retry_backoff: Duration,
}

impl<S: RecordSource> ConsumerLoop<S> {
    pub fn new(service_name: impl Into<String>, source: S, retry_backoff: Duration) -> Self {
        Self {
            service_name: service_name.into(),
            source,
            retry_backoff,
        }
    }

    /// 运行消费循环，直到 shutdown 变为 `true` 或发送端被丢弃
    ///
    /// 等待消息和退避休眠期间都会响应关闭信号。
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ConsumerStats {
        let mut stats = ConsumerStats::default();

        info!(
            service = %self.service_name,
            retry_backoff_ms = self.retry_backoff.as_millis() as u64,
            "Kafka consume loop started"
        );

        loop {
            let next = tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown_requested(&mut shutdown) => break,
                next = self.source.next_record() => next,
            };

            match next {
                Ok(record) => {
                    stats.records += 1;
                    metrics::record_queue_record(&record.topic);
                    info!(
                        service = %self.service_name,
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        payload = %record.payload_lossy(),
                        "KAFKA: Received notification request"
                    );
                }
                Err(e) => {
                    stats.read_errors += 1;
                    metrics::record_queue_read_error();
                    error!(
                        service = %self.service_name,
                        error = %e,
                        retry_in_ms = self.retry_backoff.as_millis() as u64,
                        "Error reading from Kafka"
                    );

                    tokio::select! {
                        biased;

                        _ = shutdown_requested(&mut shutdown) => break,
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
            }
        }

        info!(
            service = %self.service_name,
            records = stats.records,
            read_errors = stats.read_errors,
            "Kafka consume loop stopped"
        );
        stats
    }
}

/// 等待关闭信号；发送端被丢弃同样视为关闭
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
