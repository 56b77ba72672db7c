//! 短信通知服务
//!
//! 同时在后台消费 KAFKA_TOPIC 中的通知请求并记录日志。

use notification_service::{Channel, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::run(Channel::Sms).await
}
