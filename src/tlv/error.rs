//! Error types for TLV message decoding.

use thiserror::Error;

use super::{Tag, Version};

/// TLV decoding errors. Exactly one is reported per rejected message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TlvError {
    /// Truncated buffer, inconsistent message length or overrunning parameter.
    #[error("invalid message at offset {offset}")]
    InvalidMessage { offset: usize },

    #[error("unsupported protocol version 0x{0:02X}")]
    UnsupportedVersion(Version),

    #[error("unknown command tag 0x{0:04X}")]
    UnknownCommandTag(Tag),

    #[error("unknown parameter tag 0x{tag:04X} at offset {offset}")]
    UnknownParameterTag { tag: Tag, offset: usize },

    #[error("invalid length {length} for parameter 0x{tag:04X} at offset {offset}")]
    InvalidParameterLength { tag: Tag, length: usize, offset: usize },

    #[error("invalid count {count} for parameter 0x{tag:04X}")]
    InvalidParameterCount { tag: Tag, count: usize },

    #[error("missing parameter 0x{0:04X}")]
    MissingParameter(Tag),

    /// Schema and message types disagree, or a message cannot be encoded
    /// within its length fields. Programming error, not bad input.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl TlvError {
    /// Value sent back in `error_information`: the offending tag for parameter
    /// errors, the offending header value for header errors, the byte offset
    /// for malformed messages.
    pub fn error_information(&self) -> u16 {
        match self {
            TlvError::InvalidMessage { offset } => (*offset).min(u16::MAX as usize) as u16,
            TlvError::UnsupportedVersion(v) => *v as u16,
            TlvError::UnknownCommandTag(tag) | TlvError::MissingParameter(tag) => *tag,
            TlvError::UnknownParameterTag { tag, .. }
            | TlvError::InvalidParameterLength { tag, .. }
            | TlvError::InvalidParameterCount { tag, .. } => *tag,
            TlvError::InternalError(_) => 0,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, TlvError::InternalError(_))
    }
}
