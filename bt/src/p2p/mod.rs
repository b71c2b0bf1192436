use crate::bitfield::BitfieldError;

pub mod handshake;
pub mod message;

pub use handshake::{verify_handshake, Handshake, HandshakeCodec};
pub use message::{read_message, read_message_with, validate, Message, MessageCodec, MessageKind};

pub type Result<T, E = PeerError> = std::result::Result<T, E>;

// Every variant is fatal for the connection it was raised on.
#[derive(thiserror::Error, Debug)]
pub enum PeerError {

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    // Hex encoded values of the field that did not match.
    #[error("handshake {field} mismatch: expected {expected}, found {found}")]
    Handshake {
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("invalid message ID: {0}")]
    InvalidMessageId(u8),

    #[error("invalid length {length} for {kind} message")]
    InvalidLength {
        kind: MessageKind,
        length: u32,
    },

    #[error("declared payload of {declared} bytes, found {found}")]
    PayloadMismatch {
        declared: usize,
        found: usize,
    },

    #[error("frame of {length} bytes exceeds limit of {max}")]
    FrameTooLarge {
        length: u64,
        max: u32,
    },

    #[error("expected {expected} message, got {found}")]
    UnexpectedKind {
        expected: MessageKind,
        found: MessageKind,
    },

    #[error("bitfield payload: {0}")]
    Bitfield(#[from] BitfieldError),
}
