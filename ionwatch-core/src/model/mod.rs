mod command;
mod peer;
mod publish;
mod room;
mod signaling;

pub use command::{CommandError, PlaybackCommand};
pub use peer::{UserId, UserProfile};
pub use publish::PublishOptions;
pub use room::{RoomId, RoomIdentity};
pub use signaling::{
    BroadcastNotification, ChatInfo, ChatNotification, JoinRequest, LeaveRequest,
    PublishRequest, PublishResponse, Rejection, SdpType, SessionDescription, UserInfo,
};
