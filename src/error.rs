//! Error types for voicelog.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoicelogError {
    /// A caller handed the DSP layer audio it cannot process. This is a
    /// configuration error; the session must not continue.
    #[error("invalid audio frame: {message}")]
    InvalidFrame { message: String },

    /// The worker connection dropped. Non-fatal; the transport reconnects
    /// and pending sends are lost.
    #[error("worker transport disconnected: {message}")]
    TransportDisconnected { message: String },

    /// The worker sent a frame that does not parse against the protocol.
    /// The connection is closed and reopened; nothing is committed.
    #[error("worker protocol violation: {message}")]
    ProtocolViolation { message: String },

    /// The worker reported a per-job failure. The affected segment simply
    /// never produces a log entry.
    #[error("worker error [{code}]: {message}")]
    Worker { code: String, message: String },

    /// The session log could not be written. The log is a consistency
    /// boundary, so this aborts the session.
    #[error("session log write failed: {0}")]
    LogWrite(#[source] std::io::Error),

    /// Read-back found a malformed line that is not the trailing one.
    #[error("corrupt session log at line {line}: {message}")]
    CorruptLog { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VoicelogError>;
