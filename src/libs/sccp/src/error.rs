//! SCCP error types

use thiserror::Error;

/// SCCP error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SccpError {
    /// Buffer too short for encoding or decoding
    #[error("Buffer too short: needed {needed} bytes, available {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Message type octet outside the Q.713 range (1..=20)
    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    /// Message type is valid but has no codec yet
    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(u8),

    /// UDT validation: protocol class outside {0, 1}
    #[error("Invalid protocol class {0} for UDT (only 0 and 1 are valid)")]
    InvalidProtocolClass(u8),

    /// Parameter pointer is zero or escapes the buffer
    #[error("Invalid parameter pointer {value} at offset {offset}")]
    InvalidPointer { offset: usize, value: u8 },

    /// Address indicator inconsistent with the address body
    #[error("Invalid address indicator: {0:#04x}")]
    InvalidAddressIndicator(u8),

    /// Global title digit outside the BCD alphabet
    #[error("Invalid global title digit: {0:?}")]
    InvalidGlobalTitleDigit(char),

    /// Variable-length parameter exceeds the one-octet length prefix
    #[error("Parameter too long for length octet: {len} bytes")]
    ParameterTooLong { len: usize },

    /// State operation against an unregistered subsystem
    #[error("SSN entry not found: pc={pc}, ssn={ssn}")]
    EntryNotFound { pc: u16, ssn: u8 },

    /// Local-only operation attempted on a remote subsystem
    #[error("Cannot change state of remote subsystem: pc={pc}, ssn={ssn}")]
    NotLocal { pc: u16, ssn: u8 },
}

/// SCCP result type
pub type SccpResult<T> = Result<T, SccpError>;
