//! 共享库
//!
//! 包含三个通知服务共用的配置、错误处理、Kafka 消费和可观测性基础设施代码。

pub mod config;
pub mod error;
pub mod kafka;
pub mod observability;
