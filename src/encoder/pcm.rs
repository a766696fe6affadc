use crate::{EncodeOptions, Frame};

pub struct Pcm {
    samplerate: u32,
    channels: u16,
    out: Vec<u8>,
}

impl Pcm {
    pub fn new(options: &EncodeOptions) -> anyhow::Result<Pcm> {
        if options.channels == 0 {
            anyhow::bail!("pcm encoder needs at least one channel");
        }
        Ok(Pcm {
            samplerate: options.frame_rate,
            channels: options.channels,
            out: Vec::with_capacity(options.frame_bytes()),
        })
    }
}

impl super::Encoder for Pcm {
    fn samplerate(&self) -> u32 {
        self.samplerate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn format(&self) -> super::Format {
        super::Format::Pcm
    }

    fn encode(&mut self, frame: &Frame, max_bytes: usize) -> anyhow::Result<&[u8]> {
        let size = frame.len() * 2;
        if size > max_bytes {
            anyhow::bail!("pcm packet of {} bytes exceeds limit of {}", size, max_bytes);
        }

        self.out.clear();
        self.out
            .extend(frame.samples().iter().flat_map(|s| s.to_le_bytes()));
        Ok(&self.out)
    }
}
