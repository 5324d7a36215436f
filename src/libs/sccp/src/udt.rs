//! Unitdata message
//!
//! UDT encoding/decoding as specified in ITU-T Q.713 chapter 4.10. UDT is
//! the connectionless workhorse of SCCP: a fixed part of message type and
//! protocol class, a pointer area of three one-octet relative pointers, and
//! the Called Party Address, Calling Party Address and Data parameters in
//! the variable part.
//!
//! ```text
//! offset  field
//!   0     Message Type (= 9)
//!   1     Protocol Class
//!   2     pointer to Called Party Address
//!   3     pointer to Calling Party Address
//!   4     pointer to Data
//!   5..   variable parameter area
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{SccpError, SccpResult};
use crate::message::SccpMessageType;
use crate::params::{Data, PartyAddress, ProtocolClass};
use crate::pointer::{PointerTable, UDT_POINTER_AREA};

/// Length of the UDT fixed part plus the pointer area
pub const UDT_HEADER_LEN: usize = 5;

/// Unitdata message (Q.713 4.10)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Udt {
    /// Protocol class; UDT allows class 0 and 1
    pub protocol_class: ProtocolClass,
    /// Signalling Link Selection. Carried alongside the PDU for the MTP3
    /// routing label; never written to the SCCP wire.
    pub sls: u8,
    /// Called Party Address
    pub called_party_address: PartyAddress,
    /// Calling Party Address
    pub calling_party_address: PartyAddress,
    /// User payload
    pub data: Data,
}

impl Udt {
    /// Create a new UDT, validating the protocol class
    pub fn new(
        class: u8,
        return_on_error: bool,
        called_party_address: PartyAddress,
        calling_party_address: PartyAddress,
        data: Data,
    ) -> SccpResult<Self> {
        let udt = Self {
            protocol_class: ProtocolClass::new(class, return_on_error),
            sls: 0,
            called_party_address,
            calling_party_address,
            data,
        };
        udt.validate_protocol_class()?;
        Ok(udt)
    }

    /// Message type carried in the first octet
    pub fn message_type(&self) -> SccpMessageType {
        SccpMessageType::Udt
    }

    /// UDT carries connectionless classes only (Q.713 3.6)
    pub fn validate_protocol_class(&self) -> SccpResult<()> {
        let class = self.protocol_class.class();
        if class > 1 {
            return Err(SccpError::InvalidProtocolClass(class));
        }
        Ok(())
    }

    /// Encoded length in octets
    pub fn encoded_len(&self) -> usize {
        UDT_HEADER_LEN
            + self.called_party_address.encoded_len()
            + self.calling_party_address.encoded_len()
            + self.data.encoded_len()
    }

    /// Encode to bytes, deriving the pointer area from the parameter lengths
    pub fn encode(&self, buf: &mut BytesMut) -> SccpResult<()> {
        self.validate_protocol_class()?;

        let table = PointerTable::for_lengths(
            self.called_party_address.encoded_len(),
            self.calling_party_address.encoded_len(),
            self.data.encoded_len(),
        )?;

        buf.put_u8(SccpMessageType::Udt as u8);
        self.protocol_class.encode(buf);
        buf.put_u8(table.called);
        buf.put_u8(table.calling);
        buf.put_u8(table.data);

        self.called_party_address.encode(buf)?;
        self.calling_party_address.encode(buf)?;
        self.data.encode(buf)?;
        Ok(())
    }

    /// Encode into a freshly allocated buffer
    pub fn to_bytes(&self) -> SccpResult<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode from bytes, validating every pointer before dereferencing
    pub fn decode(buf: &Bytes) -> SccpResult<Self> {
        let b = buf.as_ref();
        if b.len() < UDT_HEADER_LEN {
            return Err(SccpError::BufferTooShort {
                needed: UDT_HEADER_LEN,
                available: b.len(),
            });
        }
        if b[0] != SccpMessageType::Udt as u8 {
            return Err(SccpError::InvalidMessageType(b[0]));
        }

        let protocol_class = ProtocolClass::from_octet(b[1]);
        if protocol_class.class() > 1 {
            return Err(SccpError::InvalidProtocolClass(protocol_class.class()));
        }

        let (called_start, called_end) = PointerTable::resolve(b, UDT_POINTER_AREA)?;
        let (calling_start, calling_end) = PointerTable::resolve(b, UDT_POINTER_AREA + 1)?;
        let (data_start, data_end) = PointerTable::resolve(b, UDT_POINTER_AREA + 2)?;

        let mut called_region = buf.slice(called_start..called_end);
        let called_party_address = PartyAddress::decode_called(&mut called_region)?;

        let mut calling_region = buf.slice(calling_start..calling_end);
        let calling_party_address = PartyAddress::decode_calling(&mut calling_region)?;

        let mut data_region = buf.slice(data_start..data_end);
        let data = Data::decode(&mut data_region)?;

        Ok(Self {
            protocol_class,
            sls: 0,
            called_party_address,
            calling_party_address,
            data,
        })
    }

    /// Called party digits in human readable form
    pub fn cd_address(&self) -> String {
        self.called_party_address.address()
    }

    /// Calling party digits in human readable form
    pub fn cg_address(&self) -> String {
        self.calling_party_address.address()
    }
}

impl fmt::Display for Udt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UDT {{protocol_class: {}, sls: {}, called: {}, calling: {}, data: {}}}",
            self.protocol_class,
            self.sls,
            self.called_party_address,
            self.calling_party_address,
            self.data
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GlobalTitle;

    /// An address that occupies eleven octets on the wire:
    /// AI + PC (2) + SSN + GTI 4 header (3) + four digit octets
    fn eleven_octet_address(pc: u16, ssn: u8, digits: &str) -> PartyAddress {
        PartyAddress::new(
            false,
            Some(pc),
            Some(ssn),
            Some(GlobalTitle::new(0, 1, 4, digits)),
        )
    }

    fn sample_udt() -> Udt {
        Udt::new(
            1,
            true,
            eleven_octet_address(0x0001, 8, "12345678"),
            eleven_octet_address(0x0002, 9, "87654321"),
            Data::new(vec![0xAA, 0xBB, 0xCC]),
        )
        .unwrap()
    }

    #[test]
    fn test_encode_minimal_payload() {
        let udt = sample_udt();
        assert_eq!(udt.encoded_len(), 33);

        let bytes = udt.to_bytes().unwrap();
        assert_eq!(bytes.len(), 33);
        assert_eq!(bytes[0], 0x09);
        assert_eq!(bytes[1], 0x81); // class 1, return on error
        assert_eq!(bytes[2], 3);
        assert_eq!(bytes[3], 14);
        assert_eq!(bytes[4], 25);
        assert_eq!(bytes[5], 0x0B); // called length octet
        assert_eq!(bytes[17], 0x0B); // calling length octet
        assert_eq!(bytes[29], 0x03); // data length octet
        assert_eq!(&bytes[30..33], &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_pointer_invariants_after_encode() {
        let udt = sample_udt();
        let bytes = udt.to_bytes().unwrap();

        // each pointer, measured from its own octet, lands on the length
        // octet of its parameter
        let called_at = 2 + bytes[2] as usize;
        let calling_at = 3 + bytes[3] as usize;
        let data_at = 4 + bytes[4] as usize;
        assert_eq!(bytes[called_at] as usize, udt.called_party_address.encoded_len() - 1);
        assert_eq!(bytes[calling_at] as usize, udt.calling_party_address.encoded_len() - 1);
        assert_eq!(bytes[data_at] as usize, udt.data.len());
    }

    #[test]
    fn test_roundtrip() {
        let udt = sample_udt();
        let bytes = udt.to_bytes().unwrap();
        let decoded = Udt::decode(&bytes).unwrap();
        assert_eq!(decoded, udt);
        assert_eq!(decoded.cd_address(), "12345678");
        assert_eq!(decoded.cg_address(), "87654321");
    }

    #[test]
    fn test_new_rejects_invalid_class() {
        let err = Udt::new(
            2,
            false,
            eleven_octet_address(1, 8, "12345678"),
            eleven_octet_address(2, 9, "87654321"),
            Data::new(vec![0x01]),
        )
        .unwrap_err();
        assert_eq!(err, SccpError::InvalidProtocolClass(2));
    }

    #[test]
    fn test_decode_rejects_invalid_class() {
        let udt = sample_udt();
        let mut raw = BytesMut::from(udt.to_bytes().unwrap().as_ref());
        raw[1] = 0x02;
        let err = Udt::decode(&raw.freeze()).unwrap_err();
        assert_eq!(err, SccpError::InvalidProtocolClass(2));
    }

    #[test]
    fn test_decode_short_header() {
        let bytes = Bytes::from_static(&[0x09, 0x81, 0x03]);
        assert!(matches!(
            Udt::decode(&bytes),
            Err(SccpError::BufferTooShort { needed: 5, .. })
        ));
    }

    #[test]
    fn test_decode_truncated_parameter() {
        let udt = sample_udt();
        let bytes = udt.to_bytes().unwrap();
        let truncated = bytes.slice(..bytes.len() - 2);
        assert!(matches!(
            Udt::decode(&truncated),
            Err(SccpError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_decode_zero_pointer() {
        let udt = sample_udt();
        let mut raw = BytesMut::from(udt.to_bytes().unwrap().as_ref());
        raw[3] = 0;
        assert!(matches!(
            Udt::decode(&raw.freeze()),
            Err(SccpError::InvalidPointer { offset: 3, value: 0 })
        ));
    }

    #[test]
    fn test_decode_wrong_type_octet() {
        let bytes = Bytes::from_static(&[0x11, 0x81, 0x03, 0x0E, 0x19]);
        assert!(matches!(
            Udt::decode(&bytes),
            Err(SccpError::InvalidMessageType(0x11))
        ));
    }

    #[test]
    fn test_sls_not_on_wire() {
        let mut udt = sample_udt();
        udt.sls = 7;
        let with_sls = udt.to_bytes().unwrap();
        udt.sls = 0;
        let without_sls = udt.to_bytes().unwrap();
        assert_eq!(with_sls, without_sls);
    }
}
