mod session_config;
mod session_state;
mod state_machine;

pub use session_config::*;
pub use session_state::*;
pub use state_machine::*;
