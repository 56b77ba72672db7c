//! 后台通知队列消费
//!
//! 仅短信服务启用。消费者与 HTTP 服务并行运行，创建失败只记录错误，
//! 不影响 HTTP 服务启动。

use notify_shared::{
    config::AppConfig,
    kafka::{ConsumerLoop, ConsumerStats, KafkaRecordSource},
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use crate::channel::Channel;

/// 按渠道和配置决定是否启动消费者
///
/// 返回的句柄在关闭信号到达后结束，并给出消费统计。
pub fn spawn_queue_consumer(
    channel: Channel,
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<ConsumerStats>> {
    if !channel.consumes_queue() {
        return None;
    }

    let Some(kafka) = &config.kafka else {
        warn!("KAFKA_BROKER_URL or KAFKA_TOPIC not set. Kafka consumer will not start.");
        return None;
    };

    let source = match KafkaRecordSource::new(kafka) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, topic = %kafka.topic, "Kafka consumer will not start");
            return None;
        }
    };

    info!(
        topic = %kafka.topic,
        brokers = %kafka.brokers,
        "Starting Kafka consumer"
    );
    let consumer = ConsumerLoop::new(config.service_name.clone(), source, kafka.retry_backoff);
    Some(tokio::spawn(consumer.run(shutdown)))
}
