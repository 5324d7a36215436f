//! SCCP message types and the inbound dispatcher
//!
//! The first octet of every SCCP PDU carries the message type (Table 1/
//! Q.713). [`parse_message`] is the single entry point for inbound octets:
//! it switches on that octet, decodes the variants with a codec and rejects
//! everything else, so callers always receive a message whose wire type
//! matches the buffer.

use std::fmt;

use bytes::Bytes;

use crate::error::{SccpError, SccpResult};
use crate::udt::Udt;

/// SCCP message types (Table 1/Q.713)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SccpMessageType {
    /// Connection Request
    Cr = 1,
    /// Connection Confirm
    Cc = 2,
    /// Connection Refused
    Cref = 3,
    /// Released
    Rlsd = 4,
    /// Release Complete
    Rlc = 5,
    /// Data Form 1
    Dt1 = 6,
    /// Data Form 2
    Dt2 = 7,
    /// Data Acknowledgement
    Ak = 8,
    /// Unitdata
    Udt = 9,
    /// Unitdata Service
    Udts = 10,
    /// Expedited Data
    Ed = 11,
    /// Expedited Data Acknowledgement
    Ea = 12,
    /// Reset Request
    Rsr = 13,
    /// Reset Confirm
    Rsc = 14,
    /// Protocol Data Unit Error
    Err = 15,
    /// Inactivity Test
    It = 16,
    /// Extended Unitdata
    Xudt = 17,
    /// Extended Unitdata Service
    Xudts = 18,
    /// Long Unitdata
    Ludt = 19,
    /// Long Unitdata Service
    Ludts = 20,
}

impl SccpMessageType {
    /// Message type mnemonic
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cr => "CR",
            Self::Cc => "CC",
            Self::Cref => "CREF",
            Self::Rlsd => "RLSD",
            Self::Rlc => "RLC",
            Self::Dt1 => "DT1",
            Self::Dt2 => "DT2",
            Self::Ak => "AK",
            Self::Udt => "UDT",
            Self::Udts => "UDTS",
            Self::Ed => "ED",
            Self::Ea => "EA",
            Self::Rsr => "RSR",
            Self::Rsc => "RSC",
            Self::Err => "ERR",
            Self::It => "IT",
            Self::Xudt => "XUDT",
            Self::Xudts => "XUDTS",
            Self::Ludt => "LUDT",
            Self::Ludts => "LUDTS",
        }
    }
}

impl TryFrom<u8> for SccpMessageType {
    type Error = SccpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Cr),
            2 => Ok(Self::Cc),
            3 => Ok(Self::Cref),
            4 => Ok(Self::Rlsd),
            5 => Ok(Self::Rlc),
            6 => Ok(Self::Dt1),
            7 => Ok(Self::Dt2),
            8 => Ok(Self::Ak),
            9 => Ok(Self::Udt),
            10 => Ok(Self::Udts),
            11 => Ok(Self::Ed),
            12 => Ok(Self::Ea),
            13 => Ok(Self::Rsr),
            14 => Ok(Self::Rsc),
            15 => Ok(Self::Err),
            16 => Ok(Self::It),
            17 => Ok(Self::Xudt),
            18 => Ok(Self::Xudts),
            19 => Ok(Self::Ludt),
            20 => Ok(Self::Ludts),
            _ => Err(SccpError::InvalidMessageType(value)),
        }
    }
}

impl fmt::Display for SccpMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded SCCP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SccpMessage {
    /// Unitdata
    Udt(Udt),
}

impl SccpMessage {
    /// The wire message type of this variant
    pub fn message_type(&self) -> SccpMessageType {
        match self {
            Self::Udt(_) => SccpMessageType::Udt,
        }
    }
}

impl fmt::Display for SccpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udt(udt) => udt.fmt(f),
        }
    }
}

/// Decode an inbound SCCP PDU by its message type octet.
///
/// Connection-oriented messages and the extended/long unitdata forms are
/// recognized but have no codec yet; they yield
/// [`SccpError::UnsupportedMessageType`] so the ingress pipeline can drop
/// the PDU and count it.
pub fn parse_message(buf: &Bytes) -> SccpResult<SccpMessage> {
    if buf.is_empty() {
        return Err(SccpError::BufferTooShort { needed: 1, available: 0 });
    }

    match SccpMessageType::try_from(buf[0])? {
        SccpMessageType::Udt => Ok(SccpMessage::Udt(Udt::decode(buf)?)),
        other => Err(SccpError::UnsupportedMessageType(other as u8)),
    }
}

// ============================================================================
// Tests
// ============================================================================
