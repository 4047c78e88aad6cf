mod command_router;
mod keep_alive;

pub use command_router::*;
pub use keep_alive::*;
