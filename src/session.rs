use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use tracing::{debug, error, info, warn};

use crate::buffer::StreamBuffer;
use crate::decoder::{DecoderCommand, DecoderHandle, DEFAULT_DECODER};
use crate::encoder::PacketLimit;
use crate::error::{Error, Result};
use crate::{EncodeOptions, Encoder, FrameReader, Sink};

pub struct Session {
    path: PathBuf,
    name: String,
    size: u64,
    options: Option<EncodeOptions>,
    decoder: OsString,
    decoder_args: Vec<OsString>,
    running: Mutex<Option<DecoderHandle>>,
    buffer: StreamBuffer,
}

enum Pumped {
    Eof(usize),
    Closed(usize),
}

impl Session {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let info = match std::fs::metadata(path) {
            Ok(info) => info,
            Err(e) => {
                // a directory is a directory, whatever stat complained about
                if path.is_dir() {
                    return Err(Error::IsDirectory(path.to_owned()));
                }
                return Err(classify(path, e));
            }
        };
        if info.is_dir() {
            return Err(Error::IsDirectory(path.to_owned()));
        }
        // stat succeeds on files we cannot read
        if info.is_file() {
            File::open(path).map_err(|e| classify(path, e))?;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        debug!(file = %name, size = info.len(), "opened session");

        Ok(Session {
            path: path.to_owned(),
            name,
            size: info.len(),
            options: None,
            decoder: DEFAULT_DECODER.into(),
            decoder_args: Vec::new(),
            running: Mutex::new(None),
            buffer: StreamBuffer::default(),
        })
    }

    pub fn new<P>(path: P, options: EncodeOptions) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let mut session = Self::open(path)?;
        session.set_options(options);
        Ok(session)
    }

    pub fn set_options(&mut self, options: EncodeOptions) {
        if !options.is_consistent() {
            warn!(
                max_bytes = options.max_bytes(),
                frame_size = options.frame_size,
                channels = options.channels,
                "encode options were changed after construction, max_bytes is stale"
            );
        }
        self.options = Some(options);
    }

    pub fn with_decoder<S>(mut self, program: S) -> Self
    where
        S: AsRef<OsStr>,
    {
        self.decoder = program.as_ref().to_owned();
        self.decoder_args.clear();
        self
    }

    /// Run the decoder as `program leading... <decode arguments>`.
    pub fn with_decoder_args<S, I, A>(mut self, program: S, leading: I) -> Self
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        self.decoder = program.as_ref().to_owned();
        self.decoder_args = leading
            .into_iter()
            .map(|a| a.as_ref().to_owned())
            .collect();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.buffer = StreamBuffer::new(capacity);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn options(&self) -> Option<&EncodeOptions> {
        self.options.as_ref()
    }

    pub fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }

    fn require_options(&self) -> Result<&EncodeOptions> {
        self.options.as_ref().ok_or(Error::NoEncodeOptions)
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<DecoderHandle>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn command(&self) -> Result<DecoderCommand> {
        let options = self.require_options()?;
        Ok(DecoderCommand::new(&self.decoder)
            .args(&self.decoder_args)
            .decode(&self.path, options))
    }

    /// The decoder is always stopped and reaped before this returns.
    pub fn load(&self) -> Result<usize> {
        let options = self.require_options()?;
        options.validate()?;
        let command = self.command()?;

        info!(file = %self.name, size = self.size, "starting decoder");
        let mut process = command.spawn().map_err(|e| {
            error!(file = %self.name, "could not start decoder: {}", e);
            e
        })?;
        *self.lock_running() = Some(process.handle());
        let pumped = self.pump(options, &mut process);
        self.lock_running().take();

        match pumped {
            Ok(Pumped::Eof(frames)) => {
                process.finish().map_err(|e| {
                    error!(file = %self.name, frames, "{}", e);
                    e
                })?;
                info!(file = %self.name, frames, "decoding finished");
                Ok(frames)
            }
            Ok(Pumped::Closed(frames)) => {
                debug!(file = %self.name, frames, "stream buffer closed, stopping decoder");
                Ok(frames)
            }
            Err(e) => {
                error!(file = %self.name, "error reading decoder output: {}", e);
                Err(e)
            }
        }
    }

    pub fn load_from<R>(&self, reader: R) -> Result<usize>
    where
        R: Read,
    {
        let options = self.require_options()?;
        options.validate()?;
        match self.pump(options, reader) {
            Ok(Pumped::Eof(frames)) | Ok(Pumped::Closed(frames)) => Ok(frames),
            Err(e) => {
                error!(file = %self.name, "error reading pcm: {}", e);
                Err(e)
            }
        }
    }

    fn pump<R>(&self, options: &EncodeOptions, reader: R) -> Result<Pumped>
    where
        R: Read,
    {
        let mut frames = FrameReader::new(reader, options);
        let mut pushed = 0;
        while let Some(frame) = frames.read_frame()? {
            if frame.is_empty() {
                continue;
            }
            if self.buffer.push(frame).is_err() {
                return Ok(Pumped::Closed(pushed));
            }
            pushed += 1;
        }
        debug!(file = %self.name, frames = pushed, "end of pcm stream");
        Ok(Pumped::Eof(pushed))
    }

    pub fn send_pcm<E, F, S>(&self, new_encoder: F, sink: S) -> Result<usize>
    where
        E: Encoder,
        F: FnOnce(&EncodeOptions) -> anyhow::Result<E>,
        S: Sink,
    {
        self.send_pcm_with_limit(new_encoder, sink, PacketLimit::FromOptions)
    }

    pub fn send_pcm_with_limit<E, F, S>(
        &self,
        new_encoder: F,
        mut sink: S,
        limit: PacketLimit,
    ) -> Result<usize>
    where
        E: Encoder,
        F: FnOnce(&EncodeOptions) -> anyhow::Result<E>,
        S: Sink,
    {
        let options = self.require_options()?;
        options.validate()?;
        let max_bytes = limit.max_bytes(options);
        let mut encoder = new_encoder(options).map_err(|e| {
            error!(file = %self.name, "could not create encoder: {:#}", e);
            Error::EncoderInit(format!("{:#}", e))
        })?;
        debug!(
            format = ?encoder.format(),
            samplerate = encoder.samplerate(),
            channels = encoder.channels(),
            max_bytes,
            "encoder ready"
        );

        let mut sent = 0;
        while let Some(frame) = self.buffer.pop() {
            let packet = encoder.encode(&frame, max_bytes).map_err(|e| {
                error!(file = %self.name, frame = sent, "error encoding pcm: {:#}", e);
                Error::Encode(format!("{:#}", e))
            })?;
            sink.send(packet).map_err(|e| {
                error!(file = %self.name, frame = sent, "could not send packet: {:#}", e);
                Error::SinkClosed(format!("{:#}", e))
            })?;
            sent += 1;
        }

        debug!(file = %self.name, packets = sent, "pcm stream closed");
        Ok(sent)
    }

    pub fn close(&self) -> Result<()> {
        self.buffer.close().map_err(|e| {
            warn!(file = %self.name, "stream buffer closed twice");
            e
        })?;
        debug!(file = %self.name, "stream buffer closed");
        Ok(())
    }

    pub fn kill_decoder(&self) -> Result<()> {
        if let Some(handle) = self.lock_running().as_ref() {
            handle.kill()?;
            info!(file = %self.name, "decoder killed");
        }
        Ok(())
    }

    /// Returns the number of packets sent. A consumer error wins over a
    /// producer error. A session plays once; later calls fail with
    /// [`Error::AlreadyClosed`] before anything is spawned.
    pub fn play<E, F, S>(&self, new_encoder: F, sink: S) -> Result<usize>
    where
        E: Encoder,
        F: FnOnce(&EncodeOptions) -> anyhow::Result<E> + Send,
        S: Sink + Send,
    {
        self.require_options()?.validate()?;
        if self.buffer.is_closed() {
            warn!(file = %self.name, "session already played");
            return Err(Error::AlreadyClosed);
        }

        let shutdown = Once::new();
        let close = || {
            shutdown.call_once(|| {
                let _ = self.close();
            })
        };

        let (produced, sent) = std::thread::scope(|scope| {
            let consumer = scope.spawn(|| {
                let sent = self.send_pcm(new_encoder, sink);
                if sent.is_err() {
                    close();
                }
                sent
            });

            let produced = self.load();
            close();

            match consumer.join() {
                Ok(sent) => (produced, sent),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        let sent = sent?;
        produced?;
        Ok(sent)
    }
}

fn classify(path: &Path, e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::NotFound => Error::NotFound(path.to_owned()),
        ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_owned()),
        _ => Error::Io(e),
    }
}
