//! SCCP Management messages
//!
//! SCMG message encoding/decoding as specified in ITU-T Q.713 chapter 5.3.
//! SCMG messages travel as the Data parameter of a connectionless message
//! addressed to SSN 1 and drive the subsystem state machine in
//! [`crate::manager`].

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{SccpError, SccpResult};

/// SCMG message length without the congestion octet
pub const SCMG_LEN: usize = 5;

/// SCMG message length for SSC
pub const SCMG_SSC_LEN: usize = 6;

/// SCMG message types (Table 23/Q.713)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScmgMessageType {
    /// Subsystem Allowed
    Ssa = 1,
    /// Subsystem Prohibited
    Ssp = 2,
    /// Subsystem Test
    Sst = 3,
    /// Subsystem Out-of-service Request
    Sor = 4,
    /// Subsystem Out-of-service Grant
    Sog = 5,
    /// Subsystem Congested
    Ssc = 6,
}

impl ScmgMessageType {
    /// Message type mnemonic
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ssa => "SSA",
            Self::Ssp => "SSP",
            Self::Sst => "SST",
            Self::Sor => "SOR",
            Self::Sog => "SOG",
            Self::Ssc => "SSC",
        }
    }
}

impl TryFrom<u8> for ScmgMessageType {
    type Error = SccpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ssa),
            2 => Ok(Self::Ssp),
            3 => Ok(Self::Sst),
            4 => Ok(Self::Sor),
            5 => Ok(Self::Sog),
            6 => Ok(Self::Ssc),
            _ => Err(SccpError::InvalidMessageType(value)),
        }
    }
}

impl fmt::Display for ScmgMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SCCP Management message (Q.713 5.3)
///
/// Five octets on the wire, six for SSC which appends the SCCP congestion
/// level. The type is kept as the raw wire octet so that unknown values
/// survive the codec; filtering happens in
/// [`crate::manager::SsnStateManager::process_scmg`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scmg {
    /// Raw message type octet
    pub msg_type: u8,
    /// Affected subsystem number
    pub affected_ssn: u8,
    /// Affected point code, little-endian on the wire
    pub affected_pc: u16,
    /// Subsystem multiplicity indicator
    pub subsystem_multiplicity_indicator: u8,
    /// SCCP congestion level, carried only by SSC
    pub sccp_congestion_level: u8,
}

impl Scmg {
    /// Create a new SCMG message
    pub fn new(msg_type: ScmgMessageType, affected_ssn: u8, affected_pc: u16, smi: u8, scl: u8) -> Self {
        Self {
            msg_type: msg_type as u8,
            affected_ssn,
            affected_pc,
            subsystem_multiplicity_indicator: smi,
            sccp_congestion_level: scl,
        }
    }

    /// Decoded message type; `None` for values outside Table 23/Q.713
    pub fn scmg_type(&self) -> Option<ScmgMessageType> {
        ScmgMessageType::try_from(self.msg_type).ok()
    }

    fn is_ssc(&self) -> bool {
        self.msg_type == ScmgMessageType::Ssc as u8
    }

    /// Encoded length in octets (Table 24, Table 25/Q.713)
    pub fn encoded_len(&self) -> usize {
        if self.is_ssc() {
            SCMG_SSC_LEN
        } else {
            SCMG_LEN
        }
    }

    /// Encode to bytes; non-SSC types do not emit the congestion octet
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.msg_type);
        buf.put_u8(self.affected_ssn);
        buf.put_u16_le(self.affected_pc);
        buf.put_u8(self.subsystem_multiplicity_indicator);
        if self.is_ssc() {
            buf.put_u8(self.sccp_congestion_level);
        }
    }

    /// Encode into a freshly allocated buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode from bytes
    pub fn decode(buf: &mut Bytes) -> SccpResult<Self> {
        if buf.remaining() < SCMG_LEN {
            return Err(SccpError::BufferTooShort {
                needed: SCMG_LEN,
                available: buf.remaining(),
            });
        }

        let msg_type = buf.get_u8();
        let affected_ssn = buf.get_u8();
        let affected_pc = buf.get_u16_le();
        let subsystem_multiplicity_indicator = buf.get_u8();

        let mut scmg = Self {
            msg_type,
            affected_ssn,
            affected_pc,
            subsystem_multiplicity_indicator,
            sccp_congestion_level: 0,
        };

        if scmg.is_ssc() {
            if buf.remaining() < 1 {
                return Err(SccpError::BufferTooShort {
                    needed: SCMG_SSC_LEN,
                    available: SCMG_LEN,
                });
            }
            scmg.sccp_congestion_level = buf.get_u8();
        }

        Ok(scmg)
    }
}

impl fmt::Display for Scmg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scmg_type() {
            Some(t) => f.write_str(t.name())?,
            None => write!(f, "SCMG({})", self.msg_type)?,
        }
        write!(
            f,
            " {{affected_ssn: {}, affected_pc: {}, smi: {}, scl: {}}}",
            self.affected_ssn,
            self.affected_pc,
            self.subsystem_multiplicity_indicator,
            self.sccp_congestion_level
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssa_encode() {
        let scmg = Scmg::new(ScmgMessageType::Ssa, 8, 0x1234, 0, 0);
        assert_eq!(scmg.encoded_len(), 5);
        assert_eq!(scmg.to_bytes().as_ref(), &[0x01, 0x08, 0x34, 0x12, 0x00]);
    }

    #[test]
    fn test_ssa_roundtrip() {
        let scmg = Scmg::new(ScmgMessageType::Ssa, 8, 0x1234, 0, 0);
        let mut bytes = scmg.to_bytes();
        let decoded = Scmg::decode(&mut bytes).unwrap();
        assert_eq!(decoded, scmg);
        assert_eq!(decoded.scmg_type(), Some(ScmgMessageType::Ssa));
    }

    #[test]
    fn test_ssc_carries_congestion_level() {
        let scmg = Scmg::new(ScmgMessageType::Ssc, 8, 0x1234, 0, 5);
        assert_eq!(scmg.encoded_len(), 6);
        let bytes = scmg.to_bytes();
        assert_eq!(bytes.as_ref(), &[0x06, 0x08, 0x34, 0x12, 0x00, 0x05]);

        let mut full = bytes.clone();
        let decoded = Scmg::decode(&mut full).unwrap();
        assert_eq!(decoded.sccp_congestion_level, 5);

        // an SSC truncated to the plain five octets is rejected
        let mut short = bytes.slice(..5);
        assert!(matches!(
            Scmg::decode(&mut short),
            Err(SccpError::BufferTooShort { needed: 6, available: 5 })
        ));
    }

    #[test]
    fn test_non_ssc_omits_congestion_level() {
        let scmg = Scmg::new(ScmgMessageType::Ssp, 8, 0x1234, 0, 7);
        let mut bytes = scmg.to_bytes();
        assert_eq!(bytes.len(), 5);
        let decoded = Scmg::decode(&mut bytes).unwrap();
        assert_eq!(decoded.sccp_congestion_level, 0);
    }

    #[test]
    fn test_point_code_is_little_endian() {
        let scmg = Scmg::new(ScmgMessageType::Sst, 8, 0xABCD, 0, 0);
        let bytes = scmg.to_bytes();
        assert_eq!(bytes[2], 0xCD);
        assert_eq!(bytes[3], 0xAB);
    }

    #[test]
    fn test_unknown_type_preserved() {
        let mut bytes = Bytes::from_static(&[0x0E, 0x08, 0x34, 0x12, 0x00]);
        let decoded = Scmg::decode(&mut bytes).unwrap();
        assert_eq!(decoded.msg_type, 0x0E);
        assert_eq!(decoded.scmg_type(), None);
    }

    #[test]
    fn test_short_buffer() {
        let mut bytes = Bytes::from_static(&[0x01, 0x08]);
        assert!(matches!(
            Scmg::decode(&mut bytes),
            Err(SccpError::BufferTooShort { needed: 5, available: 2 })
        ));
    }
}
