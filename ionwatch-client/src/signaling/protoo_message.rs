use crate::error::ChannelError;
use crate::signaling::signaling_channel::Reply;
use ionwatch_core::Rejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single protoo frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtooMessage {
    Request {
        id: u64,
        method: String,
        data: Value,
    },
    Response {
        id: u64,
        reply: Reply,
    },
    Notification {
        method: String,
        data: Value,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    #[serde(default, skip_serializing_if = "is_false")]
    request: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    response: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    notification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn missing(field: &str) -> ChannelError {
    ChannelError::Protocol(format!("frame without '{field}'"))
}

impl ProtooMessage {
    pub fn to_json(&self) -> Result<String, ChannelError> {
        let frame = match self {
            ProtooMessage::Request { id, method, data } => Frame {
                request: true,
                id: Some(*id),
                method: Some(method.clone()),
                data: Some(data.clone()),
                ..Default::default()
            },
            ProtooMessage::Response { id, reply: Ok(data) } => Frame {
                response: true,
                id: Some(*id),
                ok: Some(true),
                data: Some(data.clone()),
                ..Default::default()
            },
            ProtooMessage::Response {
                id,
                reply: Err(rejection),
            } => Frame {
                response: true,
                id: Some(*id),
                ok: Some(false),
                error_code: Some(rejection.code),
                error_reason: Some(rejection.reason.clone()),
                ..Default::default()
            },
            ProtooMessage::Notification { method, data } => Frame {
                notification: true,
                method: Some(method.clone()),
                data: Some(data.clone()),
                ..Default::default()
            },
        };

        serde_json::to_string(&frame).map_err(|e| ChannelError::Protocol(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, ChannelError> {
        let frame: Frame =
            serde_json::from_str(text).map_err(|e| ChannelError::Protocol(e.to_string()))?;
        let data = frame.data.unwrap_or(Value::Null);

        if frame.request {
            return Ok(ProtooMessage::Request {
                id: frame.id.ok_or_else(|| missing("id"))?,
                method: frame.method.ok_or_else(|| missing("method"))?,
                data,
            });
        }

        if frame.response {
            let id = frame.id.ok_or_else(|| missing("id"))?;
            let reply = match frame.ok {
                Some(true) => Ok(data),
                _ => Err(Rejection::new(
                    frame.error_code.unwrap_or_default(),
                    frame.error_reason.unwrap_or_default(),
                )),
            };
            return Ok(ProtooMessage::Response { id, reply });
        }

        if frame.notification {
            return Ok(ProtooMessage::Notification {
                method: frame.method.ok_or_else(|| missing("method"))?,
                data,
            });
        }

        Err(ChannelError::Protocol(
            "frame is neither request, response nor notification".to_owned(),
        ))
    }
}
