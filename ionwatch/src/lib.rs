pub use ionwatch_core::model::{PlaybackCommand, RoomId, UserId};

pub mod model {
    pub use ionwatch_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use ionwatch_client::*;
}
