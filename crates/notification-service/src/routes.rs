//! 路由配置

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{any, get},
};
use notify_shared::observability::middleware::{http_tracing, request_id};

use crate::{handlers, state::AppState};

/// 构建服务路由
///
/// 发送路径随渠道变化，且不限制请求体大小；`/` 接受任意方法，未注册的路径返回 404。
pub fn app_router(state: AppState) -> Router {
    let send_path = state.channel.send_path();

    Router::new()
        .route("/", any(handlers::hello))
        .route(
            send_path,
            any(handlers::send_notification).layer(DefaultBodyLimit::disable()),
        )
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::render_metrics))
        .layer(middleware::from_fn(http_tracing))
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}
