use std::path::Path;

use strict_yaml_rust::{StrictYaml, StrictYamlLoader};

use crate::error::Error;

/// Largest raw PCM frame accepted, 1 MiB.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

const KEYS: &[&str] = &[
    "volume",
    "frame-rate",
    "frame-size",
    "frame-duration",
    "bitrate",
    "threads",
    "channels",
    "packet-loss",
    "compression-level",
];

/// `max_bytes` is computed when the value is constructed and never again.
/// Changing `frame_size` or `channels` afterwards leaves it stale, see
/// [`EncodeOptions::is_consistent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    pub volume: i32,
    pub frame_rate: u32,
    pub frame_size: usize,
    pub frame_duration: u32,
    pub bitrate: u32,
    pub threads: u32,
    pub channels: u16,
    pub packet_loss: u8,
    pub compression_level: u8,
    max_bytes: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::new(256, 48000, 960, 20, 96000, 0, 2, 0, 10)
    }
}

impl EncodeOptions {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        volume: i32,
        frame_rate: u32,
        frame_size: usize,
        frame_duration: u32,
        bitrate: u32,
        threads: u32,
        channels: u16,
        packet_loss: u8,
        compression_level: u8,
    ) -> Self {
        EncodeOptions {
            volume,
            frame_rate,
            frame_size,
            frame_duration,
            bitrate,
            threads,
            channels,
            packet_loss,
            compression_level,
            max_bytes: Self::max_bytes_for(frame_size, channels),
        }
    }

    fn frame_bytes_for(frame_size: usize, channels: u16) -> Option<usize> {
        frame_size.checked_mul(channels as usize)?.checked_mul(2)
    }

    // saturates, validate() rejects anything that large
    fn max_bytes_for(frame_size: usize, channels: u16) -> usize {
        Self::frame_bytes_for(frame_size, channels).unwrap_or(usize::MAX)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn is_consistent(&self) -> bool {
        self.max_bytes == Self::max_bytes_for(self.frame_size, self.channels)
    }

    pub fn frame_len(&self) -> usize {
        self.frame_size.saturating_mul(self.channels as usize)
    }

    pub fn frame_bytes(&self) -> usize {
        Self::max_bytes_for(self.frame_size, self.channels)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.frame_size == 0 {
            return Err(Error::InvalidOptions("frame size must be positive".to_owned()));
        }
        if self.channels == 0 {
            return Err(Error::InvalidOptions("channel count must be positive".to_owned()));
        }
        if self.frame_rate == 0 {
            return Err(Error::InvalidOptions("sample rate must be positive".to_owned()));
        }
        Self::check_frame(self.frame_size, self.channels).map_err(Error::InvalidOptions)
    }

    fn check_frame(frame_size: usize, channels: u16) -> Result<(), String> {
        match Self::frame_bytes_for(frame_size, channels) {
            Some(bytes) if bytes <= MAX_FRAME_BYTES => Ok(()),
            _ => Err(format!(
                "frame of {} samples x {} channels exceeds {} bytes",
                frame_size, channels, MAX_FRAME_BYTES
            )),
        }
    }

    pub fn open<P>(path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
            .map_err(|e| anyhow::anyhow!("in {:?}: {}", path.as_ref(), e))
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        let docs = StrictYamlLoader::load_from_str(contents)?;
        let defaults = Self::default();
        let data = match docs.get(0) {
            Some(data) => data,
            None => return Ok(defaults),
        };
        Self::check_keys(data)?;

        let frame_size = Self::get_num(data, "frame-size")?.unwrap_or(defaults.frame_size);
        let channels = Self::get_num(data, "channels")?.unwrap_or(defaults.channels);
        Self::check_frame(frame_size, channels).map_err(|e| anyhow::anyhow!(e))?;

        Ok(Self::new(
            Self::get_num(data, "volume")?.unwrap_or(defaults.volume),
            Self::get_num(data, "frame-rate")?.unwrap_or(defaults.frame_rate),
            frame_size,
            Self::get_num(data, "frame-duration")?.unwrap_or(defaults.frame_duration),
            Self::get_num(data, "bitrate")?.unwrap_or(defaults.bitrate),
            Self::get_num(data, "threads")?.unwrap_or(defaults.threads),
            channels,
            Self::get_num(data, "packet-loss")?.unwrap_or(defaults.packet_loss),
            Self::get_num(data, "compression-level")?.unwrap_or(defaults.compression_level),
        ))
    }

    fn get_num<T>(data: &StrictYaml, k: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
    {
        if data[k].is_badvalue() {
            return Ok(None);
        }
        let s = data[k]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("bad value for {:?}, expected number", k))?;
        s.trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("bad number for {:?}: {:?}", k, s))
    }

    fn check_keys(data: &StrictYaml) -> anyhow::Result<()> {
        let hash = data
            .as_hash()
            .ok_or_else(|| anyhow::anyhow!("expected yaml dictionary"))?;
        for k in hash.keys() {
            match k.as_str() {
                Some(k) if KEYS.contains(&k) => {}
                _ => anyhow::bail!("unknown key {:?}", k),
            }
        }
        Ok(())
    }
}
