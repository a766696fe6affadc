mod pcm;
#[cfg(feature = "opus")]
mod opus;

pub use pcm::Pcm;
#[cfg(feature = "opus")]
pub use self::opus::Opus;

use crate::{EncodeOptions, Frame};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Format {
    Pcm,
    Opus,
    Other(String),
}

pub trait Encoder {
    fn samplerate(&self) -> u32;
    fn channels(&self) -> u16;
    fn format(&self) -> Format;

    fn encode(&mut self, frame: &Frame, max_bytes: usize) -> anyhow::Result<&[u8]>;
}

impl Encoder for Box<dyn Encoder> {
    fn samplerate(&self) -> u32 {
        (**self).samplerate()
    }

    fn channels(&self) -> u16 {
        (**self).channels()
    }

    fn format(&self) -> Format {
        (**self).format()
    }

    fn encode(&mut self, frame: &Frame, max_bytes: usize) -> anyhow::Result<&[u8]> {
        (**self).encode(frame, max_bytes)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketLimit {
    FromOptions,
    Fixed(usize),
}

impl PacketLimit {
    /// The hardcoded bound older senders used.
    pub const LEGACY: PacketLimit = PacketLimit::Fixed(960);

    pub fn max_bytes(&self, options: &EncodeOptions) -> usize {
        match *self {
            PacketLimit::FromOptions => options.max_bytes(),
            PacketLimit::Fixed(n) => n,
        }
    }
}

impl Default for PacketLimit {
    fn default() -> Self {
        PacketLimit::FromOptions
    }
}
