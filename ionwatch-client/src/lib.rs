mod error;
mod media;
mod playback;
mod session;
mod signaling;
mod transport;

pub use error::*;
pub use media::*;
pub use playback::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
