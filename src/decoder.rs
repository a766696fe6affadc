use std::ffi::{OsStr, OsString};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::EncodeOptions;

pub const DEFAULT_DECODER: &str = "ffmpeg";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl DecoderCommand {
    pub fn new<S>(program: S) -> Self
    where
        S: AsRef<OsStr>,
    {
        DecoderCommand {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
        }
    }

    pub fn ffmpeg(path: &Path, options: &EncodeOptions) -> Self {
        Self::new(DEFAULT_DECODER).decode(path, options)
    }

    pub fn arg<S>(mut self, arg: S) -> Self
    where
        S: AsRef<OsStr>,
    {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn decode(self, path: &Path, options: &EncodeOptions) -> Self {
        let numbers = [
            ("-b:a", options.bitrate.to_string()),
            ("-ac", options.channels.to_string()),
            ("-ar", options.frame_rate.to_string()),
            ("-threads", options.threads.to_string()),
            ("-packet_loss", options.packet_loss.to_string()),
            ("-frame_duration", options.frame_duration.to_string()),
            ("-compression_level", options.compression_level.to_string()),
        ];

        let mut cmd = self
            .arg("-i")
            .arg(path)
            .args(["-f", "s16le", "-map", "0:a"])
            .args(["-reconnect", "1", "-reconnect_at_eof", "1"]);
        for (flag, value) in numbers.iter() {
            cmd = cmd.arg(flag).arg(value);
        }
        cmd.args(["-application", "audio", "pipe:1"])
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn spawn(&self) -> Result<DecoderProcess> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    Error::DecoderNotInstalled(self.program.to_string_lossy().into_owned())
                }
                _ => Error::ProcessStart(e),
            })?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::ProcessStart(std::io::Error::new(
                    ErrorKind::Other,
                    "decoder has no stdout",
                )));
            }
        };

        debug!(program = ?self.program, pid = child.id(), "decoder started");
        Ok(DecoderProcess {
            child: Arc::new(Mutex::new(child)),
            stdout: Some(stdout),
            reaped: false,
        })
    }
}

impl std::fmt::Display for DecoderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in self.args.iter() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Dropping it closes stdout, then kills and reaps the decoder, exactly once.
pub struct DecoderProcess {
    child: Arc<Mutex<Child>>,
    stdout: Option<ChildStdout>,
    reaped: bool,
}

#[derive(Clone)]
pub struct DecoderHandle {
    child: Arc<Mutex<Child>>,
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DecoderProcess {
    pub fn id(&self) -> u32 {
        lock_child(&self.child).id()
    }

    pub fn handle(&self) -> DecoderHandle {
        DecoderHandle {
            child: self.child.clone(),
        }
    }

    /// Close the output and wait for the decoder to exit on its own.
    ///
    /// Anything but a successful exit is reported as [`Error::ProcessKilled`].
    pub fn finish(mut self) -> Result<ExitStatus> {
        self.stdout.take();
        // poll so a DecoderHandle can still get the lock to kill
        let status = loop {
            if let Some(status) = lock_child(&self.child).try_wait()? {
                break status;
            }
            std::thread::sleep(Duration::from_millis(10));
        };
        self.reaped = true;

        if status.success() {
            debug!(%status, "decoder exited");
            Ok(status)
        } else {
            Err(Error::ProcessKilled(status))
        }
    }
}

impl Read for DecoderProcess {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for DecoderProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        self.stdout.take();
        let mut child = lock_child(&self.child);
        if let Err(e) = child.kill() {
            debug!("could not kill decoder: {}", e);
        }
        match child.wait() {
            Ok(status) => debug!(%status, "decoder stopped"),
            Err(e) => warn!("could not reap decoder: {}", e),
        }
        self.reaped = true;
    }
}

impl DecoderHandle {
    pub fn kill(&self) -> std::io::Result<()> {
        lock_child(&self.child).kill()
    }
}
