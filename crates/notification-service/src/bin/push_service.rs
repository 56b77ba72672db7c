//! 推送通知服务

use notification_service::{Channel, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::run(Channel::Push).await
}
