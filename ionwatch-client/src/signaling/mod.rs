mod protoo_channel;
mod protoo_message;
mod signaling_channel;

pub use protoo_channel::*;
pub use protoo_message::*;
pub use signaling_channel::*;
