//! 通知发送服务模板
//!
//! 邮件、推送、短信三个服务共用同一套实现，差异（服务名、路径、字段名、文案）
//! 全部收敛在 [`Channel`] 上。发送为模拟行为：记录日志、生成 ID、返回成功。

pub mod channel;
pub mod consumer;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use channel::Channel;
