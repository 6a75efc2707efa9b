use std::num::ParseIntError;
use thiserror::Error;

/// Errors surfaced by the RTSP/RTP transport core.
///
/// The variants mirror how failures propagate: `Protocol`, `Auth` and
/// `Timeout` are fatal to the session, `Framing` is fatal to the current
/// read, and `Parse` is recoverable per unit (the malformed unit is
/// dropped and processing continues) except in single-shot setup parses
/// such as the initial SDP parameter sets.
#[derive(Error, Debug)]
pub enum RtspError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

pub type Result<T> = std::result::Result<T, RtspError>;
