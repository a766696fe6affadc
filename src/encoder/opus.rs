use crate::{EncodeOptions, Frame};

pub struct Opus {
    samplerate: u32,
    channels: u16,
    encoder: opus::Encoder,
    out: Vec<u8>,
}

impl Opus {
    pub fn new(options: &EncodeOptions) -> anyhow::Result<Opus> {
        let channels = match options.channels {
            1 => opus::Channels::Mono,
            2 => opus::Channels::Stereo,
            n => anyhow::bail!("opus encoder supports 1 or 2 channels, not {}", n),
        };

        let mut encoder =
            opus::Encoder::new(options.frame_rate, channels, opus::Application::Audio)
                .map_err(|e| anyhow::anyhow!("could not create opus encoder: {}", e))?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(options.bitrate as i32))
            .map_err(|e| anyhow::anyhow!("could not set opus bitrate: {}", e))?;
        encoder
            .set_packet_loss_perc(options.packet_loss as i32)
            .map_err(|e| anyhow::anyhow!("could not set opus packet loss: {}", e))?;

        Ok(Opus {
            samplerate: options.frame_rate,
            channels: options.channels,
            encoder,
            out: Vec::new(),
        })
    }
}

impl super::Encoder for Opus {
    fn samplerate(&self) -> u32 {
        self.samplerate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn format(&self) -> super::Format {
        super::Format::Opus
    }

    fn encode(&mut self, frame: &Frame, max_bytes: usize) -> anyhow::Result<&[u8]> {
        self.out.resize(max_bytes, 0);
        let amt = self
            .encoder
            .encode(frame.samples(), &mut self.out)
            .map_err(|e| anyhow::anyhow!("opus encoding error: {}", e))?;
        Ok(&self.out[..amt])
    }
}
