//! 服务启动与优雅关闭

use std::future::Future;

use axum::Router;
use notify_shared::{config::AppConfig, observability};
use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info};

use crate::{channel::Channel, consumer, routes, state::AppState};

/// 运行指定渠道的通知服务，直到收到 SIGINT/SIGTERM
pub async fn run(channel: Channel) -> anyhow::Result<()> {
    let config = AppConfig::load(channel.default_service_name(), channel.consumes_queue())?;
    let guard = observability::init(&config.observability)?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        channel = %channel,
        "Starting {}",
        channel.display_name()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = consumer::spawn_queue_consumer(channel, &config, shutdown_rx);

    let state = AppState::new(channel, &config.service_name, Some(guard.metrics_handle()));
    let app = routes::app_router(state);

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        "{} Server starting on port {}",
        channel.display_name(),
        config.server.port
    );

    serve(listener, app, shutdown_signal()).await?;

    // HTTP 停止后再通知消费者，等待其退出
    let _ = shutdown_tx.send(true);
    if let Some(handle) = consumer {
        match handle.await {
            Ok(stats) => info!(
                records = stats.records,
                read_errors = stats.read_errors,
                "Kafka consumer stopped"
            ),
            Err(e) => error!(error = %e, "Kafka consumer task failed"),
        }
    }

    info!(service = %config.service_name, "Server shutdown complete");
    drop(guard);
    Ok(())
}

/// 在给定监听器上提供服务，`shutdown` 完成后停止接收新连接并等待在途请求结束
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// 等待关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
