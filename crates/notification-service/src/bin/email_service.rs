//! 邮件通知服务

use notification_service::{Channel, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::run(Channel::Email).await
}
