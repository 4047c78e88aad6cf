use crate::model::peer::{UserId, UserProfile};
use crate::model::publish::PublishOptions;
use crate::model::room::{RoomId, RoomIdentity};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => f.write_str("offer"),
            SdpType::Answer => f.write_str("answer"),
        }
    }
}

/// SDP blob plus its type, carried verbatim as the `jsep` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Failure payload of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: i32,
    pub reason: String,
}

impl Rejection {
    pub fn new(code: i32, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
}

/// Payload of the outbound `join` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(flatten)]
    pub room: RoomIdentity,
    pub info: UserInfo,
}

impl JoinRequest {
    pub fn new(room: &RoomIdentity, profile: &UserProfile) -> Self {
        Self {
            room: room.clone(),
            info: UserInfo {
                name: profile.display_name.clone(),
            },
        }
    }
}

/// Payload of the outbound `publish` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(flatten)]
    pub room: RoomIdentity,
    pub jsep: SessionDescription,
    pub options: PublishOptions,
}

/// Success payload of the `publish` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResponse {
    pub jsep: SessionDescription,
}

/// Payload of the outbound `leave` request sent while closing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    #[serde(flatten)]
    pub room: RoomIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub msg: String,
    #[serde(rename = "senderName", default)]
    pub sender_name: String,
}

/// Payload of the inbound `broadcast` notification as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastNotification {
    #[serde(default)]
    pub rid: String,
    #[serde(default)]
    pub uid: String,
    pub info: ChatInfo,
}

/// One chat line relayed to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatNotification {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub message: String,
    pub sender_name: String,
}

impl From<BroadcastNotification> for ChatNotification {
    fn from(n: BroadcastNotification) -> Self {
        Self {
            room_id: RoomId::new(n.rid),
            user_id: UserId::from(n.uid),
            message: n.info.msg,
            sender_name: n.info.sender_name,
        }
    }
}

impl ChatNotification {
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<BroadcastNotification>(payload).map(Self::from)
    }
}
