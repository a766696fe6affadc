use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("needs to be a file, not a directory: {0:?}")]
    IsDirectory(PathBuf),

    #[error("permission denied: {0:?}")]
    PermissionDenied(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no encode options, please set encode options")]
    NoEncodeOptions,

    #[error("invalid encode options: {0}")]
    InvalidOptions(String),

    #[error("decoder is not installed: {0}")]
    DecoderNotInstalled(String),

    #[error("decoder failed to start: {0}")]
    ProcessStart(#[source] std::io::Error),

    #[error("decoder was killed: {0}")]
    ProcessKilled(ExitStatus),

    #[error("decoder read error: {0}")]
    Read(#[source] std::io::Error),

    #[error("could not create encoder: {0}")]
    EncoderInit(String),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("packet sink closed: {0}")]
    SinkClosed(String),

    #[error("stream buffer is already closed")]
    AlreadyClosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    IsDirectory,
    PermissionDenied,
    Io,
    NoEncodeOptions,
    InvalidOptions,
    DecoderNotInstalled,
    ProcessStart,
    ProcessKilled,
    Read,
    EncoderInit,
    Encode,
    SinkClosed,
    AlreadyClosed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::IsDirectory(_) => ErrorKind::IsDirectory,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::Io(_) => ErrorKind::Io,
            Error::NoEncodeOptions => ErrorKind::NoEncodeOptions,
            Error::InvalidOptions(_) => ErrorKind::InvalidOptions,
            Error::DecoderNotInstalled(_) => ErrorKind::DecoderNotInstalled,
            Error::ProcessStart(_) => ErrorKind::ProcessStart,
            Error::ProcessKilled(_) => ErrorKind::ProcessKilled,
            Error::Read(_) => ErrorKind::Read,
            Error::EncoderInit(_) => ErrorKind::EncoderInit,
            Error::Encode(_) => ErrorKind::Encode,
            Error::SinkClosed(_) => ErrorKind::SinkClosed,
            Error::AlreadyClosed => ErrorKind::AlreadyClosed,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
