use num_traits::FromPrimitive;
use thiserror::Error;

use crate::{data_model::ValueType, interaction_model::status::StatusCode, session::SessionState};

/// A value that can't be written to the attribute it targets.
/// These are raised before anything is framed and never reach the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected a value of type {expected:?}, got {found}")]
    TypeMismatch {
        expected: ValueType,
        found: &'static str,
    },
    #[error("value {value} is outside the allowed range {min}..={max}")]
    OutOfRange { value: i128, min: i128, max: i128 },
    #[error("unknown cluster `{0}`")]
    UnknownCluster(String),
    #[error("unknown attribute `{attribute}` in cluster `{cluster}`")]
    UnknownAttribute { cluster: String, attribute: String },
    #[error("missing argument `{0}`")]
    MissingArgument(String),
    #[error("write request has no attributes")]
    EmptyRequest,
    #[error("encoded write of {0} bytes does not fit in one message")]
    TooLarge(usize),
}

/// The outcome handed to a write callback when the write didn't succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    /// No response arrived before the deadline. The remote effect is unknown.
    #[error("no response received before the deadline")]
    Timeout,
    #[error("connection to the node was lost")]
    ConnectionLost,
    #[error("session closed")]
    SessionClosed,
    /// The node rejected the write. Codes are passed through untouched.
    #[error("node rejected the write with status {code:#04x}")]
    Failure { code: u8, cluster_code: Option<u16> },
    #[error("write was cancelled")]
    Cancelled,
}

impl WriteError {
    /// The interaction model status of a remote failure, if it is a known one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            WriteError::Failure { code, .. } => StatusCode::from_u8(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is {0:?}, writes need a ready session")]
    NotReady(SessionState),
    #[error("no session for node {0:#018x}")]
    UnknownNode(u64),
    #[error("every exchange id is in use")]
    ExchangesExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TlvError {
    #[error("unexpected end of TLV data")]
    UnexpectedEnd,
    #[error("unsupported element type {0:#04x}")]
    UnsupportedType(u8),
    #[error("unsupported tag control {0:#04x}")]
    UnsupportedTag(u8),
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("missing field with tag {0}")]
    MissingField(u8),
    #[error("unexpected element for field with tag {0}")]
    UnexpectedElement(u8),
    #[error("expected the message to start with a structure")]
    ExpectedStructure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("message truncated")]
    Truncated,
    #[error("unsupported message format version in flags {0:#04x}")]
    InvalidVersion(u8),
    #[error("invalid destination size in flags {0:#04x}")]
    InvalidDestination(u8),
    #[error("message extensions are not supported")]
    ExtensionsUnsupported,
    #[error("message without a protocol header")]
    MissingProtocolHeader,
    #[error("unknown opcode {opcode:#04x} for protocol {protocol:#06x}")]
    UnknownOpcode { protocol: u16, opcode: u8 },
    #[error("message of {0} bytes exceeds the message limit")]
    TooLarge(usize),
    #[error(transparent)]
    Tlv(#[from] TlvError),
}
