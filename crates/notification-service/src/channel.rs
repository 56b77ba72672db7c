//! 通知渠道定义
//!
//! 每个渠道决定服务的默认名称、发送路径、请求字段和响应中的 ID 字段名。

use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::dto::SendRequest;

/// 通知渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Push,
    Sms,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Email, Channel::Push, Channel::Sms];

    /// 渠道短名，用作指标前缀
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
        }
    }

    /// SERVICE_NAME 未设置时使用的服务名，同时是 Kafka 消费组名
    pub fn default_service_name(&self) -> &'static str {
        match self {
            Self::Email => "email-service",
            Self::Push => "push-service",
            Self::Sms => "sms-service",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Email => "Email Service",
            Self::Push => "Push Service",
            Self::Sms => "SMS Service",
        }
    }

    pub fn send_path(&self) -> &'static str {
        match self {
            Self::Email => "/send-email",
            Self::Push => "/send-push",
            Self::Sms => "/send",
        }
    }

    /// 响应体中生成 ID 的字段名
    pub fn id_field(&self) -> &'static str {
        match self {
            Self::Email => "emailId",
            Self::Push => "pushId",
            Self::Sms => "smsId",
        }
    }

    /// 发送请求 span 在追踪后端显示的名称
    pub fn send_span_name(&self) -> &'static str {
        match self {
            Self::Email => "handleSendEmailRequest",
            Self::Push => "handleSendPushRequest",
            Self::Sms => "handleSendRequest",
        }
    }

    /// 只有短信服务在后台消费通知队列
    pub fn consumes_queue(&self) -> bool {
        matches!(self, Self::Sms)
    }

    pub fn greeting(&self) -> String {
        format!("Hello from {}!", self.display_name())
    }

    /// 按渠道的请求格式解码 JSON 请求体
    ///
    /// 只解码第一个 JSON 值，其后的内容忽略；`null` 视为空请求。
    /// 缺失字段按空值处理，未知字段忽略；字段类型不匹配或 JSON 非法时返回解码错误。
    pub fn parse_request(&self, body: &[u8]) -> Result<SendRequest, serde_json::Error> {
        match self {
            Self::Email => decode_first::<EmailRequest>(body).map(Into::into),
            Self::Push => decode_first::<PushRequest>(body).map(Into::into),
            Self::Sms => decode_first::<SmsRequest>(body).map(Into::into),
        }
    }

    /// 模拟发送成功后返回给调用方的文案
    pub fn accepted_message(&self, request: &SendRequest) -> String {
        match self {
            Self::Email => format!(
                "Email to {} sent successfully (simulated)",
                request.destination
            ),
            Self::Push => format!(
                "Push notification to DeviceID {} sent successfully (simulated)",
                request.destination
            ),
            Self::Sms => format!(
                "SMS to {} accepted for sending (simulated)",
                request.destination
            ),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// 各渠道的请求格式
// ---------------------------------------------------------------------------

fn decode_first<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, serde_json::Error> {
    match serde_json::Deserializer::from_slice(body)
        .into_iter::<Option<T>>()
        .next()
    {
        Some(first) => first.map(Option::unwrap_or_default),
        // 空请求体：按完整解码重新报错，得到 EOF 错误文本
        None => serde_json::from_slice(body),
    }
}

#[derive(Debug, Default, Deserialize)]
struct EmailRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: String,
}

impl From<EmailRequest> for SendRequest {
    fn from(req: EmailRequest) -> Self {
        Self {
            destination: req.to,
            subject: req.subject,
            body: req.body,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PushRequest {
    #[serde(default, rename = "deviceId")]
    device_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: String,
}

impl From<PushRequest> for SendRequest {
    fn from(req: PushRequest) -> Self {
        Self {
            destination: req.device_id,
            subject: req.title,
            body: req.body,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SmsRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    body: String,
}

impl From<SmsRequest> for SendRequest {
    fn from(req: SmsRequest) -> Self {
        Self {
            destination: req.to,
            subject: None,
            body: req.body,
        }
    }
}
