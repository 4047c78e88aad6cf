mod file_source;
mod media_source;
mod sample_sink;

pub use file_source::*;
pub use media_source::*;
pub use sample_sink::*;
