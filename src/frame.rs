use std::io::{BufReader, ErrorKind, Read};

use tracing::trace;

use crate::error::{Error, Result};
use crate::EncodeOptions;

pub const READ_AHEAD: usize = 16 * 1024;

pub const UNITY_VOLUME: i32 = 256;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    samples: Vec<i16>,
}

impl Frame {
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();
        Frame { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn scale(&mut self, volume: i32) {
        if volume == UNITY_VOLUME {
            return;
        }
        for s in self.samples.iter_mut() {
            let v = (*s as i64 * volume as i64) / UNITY_VOLUME as i64;
            *s = v.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
        }
    }
}

impl From<Vec<i16>> for Frame {
    fn from(samples: Vec<i16>) -> Self {
        Frame { samples }
    }
}

pub struct FrameReader<R> {
    inner: BufReader<R>,
    bytes: Vec<u8>,
    volume: i32,
}

impl<R> FrameReader<R>
where
    R: Read,
{
    pub fn new(inner: R, options: &EncodeOptions) -> Self {
        Self::with_capacity(READ_AHEAD, inner, options.frame_len(), options.volume)
    }

    pub fn with_capacity(capacity: usize, inner: R, frame_len: usize, volume: i32) -> Self {
        FrameReader {
            inner: BufReader::with_capacity(capacity, inner),
            bytes: vec![0; frame_len.saturating_mul(2)],
            volume,
        }
    }

    /// A trailing partial frame counts as the end of the stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        match self.inner.read_exact(&mut self.bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                trace!("end of pcm stream");
                return Ok(None);
            }
            Err(e) => return Err(Error::Read(e)),
        }

        let mut frame = Frame::from_le_bytes(&self.bytes);
        frame.scale(self.volume);
        Ok(Some(frame))
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}
