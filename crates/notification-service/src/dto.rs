//! 请求与响应数据结构

use serde::ser::{Serialize, SerializeMap, Serializer};
use uuid::Uuid;

use crate::channel::Channel;

/// 一次通知发送意图，只在单个请求内存在
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// 邮箱地址、设备 ID 或手机号
    pub destination: String,
    /// 邮件主题或推送标题，短信没有
    pub subject: Option<String>,
    pub body: String,
}

/// 模拟发送的响应
///
/// 序列化时 ID 字段名随渠道变化：`emailId` / `pushId` / `smsId`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    pub success: bool,
    pub message: String,
    pub generated_id: String,
    id_field: &'static str,
}

impl SendResponse {
    /// 构造成功响应，每次调用都会生成新的 UUID v4
    pub fn accepted(channel: Channel, request: &SendRequest) -> Self {
        Self {
            success: true,
            message: channel.accepted_message(request),
            generated_id: Uuid::new_v4().to_string(),
            id_field: channel.id_field(),
        }
    }

    pub fn id_field(&self) -> &'static str {
        self.id_field
    }
}

impl Serialize for SendResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("success", &self.success)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry(self.id_field, &self.generated_id)?;
        map.end()
    }
}
