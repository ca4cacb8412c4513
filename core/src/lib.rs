pub mod buffered_renderer;

pub mod sampler;

pub mod voice;

mod audio_pipe;
pub use audio_pipe::*;

mod audio_stream;
pub use audio_stream::*;

pub mod sample;

pub mod helpers;
