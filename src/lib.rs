pub mod buffer;
pub mod decoder;
pub mod encoder;
mod error;
mod frame;
mod options;
mod session;
pub mod sink;

pub use buffer::StreamBuffer;
pub use decoder::{DecoderCommand, DecoderHandle, DecoderProcess};
pub use encoder::{Encoder, PacketLimit};
pub use error::{Error, ErrorKind, Result};
pub use frame::{Frame, FrameReader};
pub use options::{EncodeOptions, MAX_FRAME_BYTES};
pub use session::Session;
pub use sink::Sink;
