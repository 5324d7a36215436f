//! SCCP parameter codecs
//!
//! Parameter fields shared by SCCP messages as specified in ITU-T Q.713
//! chapter 3: Protocol Class, Called/Calling Party Address (with Global
//! Title) and the Data parameter. Variable-length parameters carry a
//! one-octet length prefix followed by the parameter body.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{SccpError, SccpResult};

// ============================================================================
// Protocol Class
// ============================================================================

/// Protocol Class parameter (Q.713 3.6)
///
/// One octet on the wire: low nibble carries the protocol class, the high
/// bit requests "return message on error" for connectionless classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtocolClass(u8);

/// Return on Error option bit
const RETURN_ON_ERROR: u8 = 0x80;

impl ProtocolClass {
    /// Wire length of the parameter
    pub const LEN: usize = 1;

    /// Create a new Protocol Class from a class value and the return option
    pub fn new(class: u8, return_on_error: bool) -> Self {
        let mut octet = class & 0x0F;
        if return_on_error {
            octet |= RETURN_ON_ERROR;
        }
        Self(octet)
    }

    /// Build from a raw wire octet
    pub fn from_octet(octet: u8) -> Self {
        Self(octet)
    }

    /// Raw wire octet
    pub fn octet(&self) -> u8 {
        self.0
    }

    /// Protocol class value (0..=15)
    pub fn class(&self) -> u8 {
        self.0 & 0x0F
    }

    /// Whether the Return on Error option is requested
    pub fn has_return_option(&self) -> bool {
        self.0 & RETURN_ON_ERROR != 0
    }

    /// Encode to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.0);
    }

    /// Decode from bytes
    pub fn decode(buf: &mut Bytes) -> SccpResult<Self> {
        if buf.remaining() < Self::LEN {
            return Err(SccpError::BufferTooShort {
                needed: Self::LEN,
                available: buf.remaining(),
            });
        }
        Ok(Self(buf.get_u8()))
    }
}

impl fmt::Display for ProtocolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.class())?;
        if self.has_return_option() {
            write!(f, " (return on error)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Global Title
// ============================================================================

/// Address indicator bit: signalling point code present
const AI_PC_INDICATOR: u8 = 0x01;
/// Address indicator bit: subsystem number present
const AI_SSN_INDICATOR: u8 = 0x02;
/// Address indicator bits 2..=5: global title indicator
const AI_GTI_MASK: u8 = 0x3C;
const AI_GTI_SHIFT: u8 = 2;
/// Address indicator bit: route on SSN (otherwise route on GT)
const AI_ROUTE_ON_SSN: u8 = 0x40;

/// Odd-number-of-digits flag in the nature-of-address octet (GTI 1)
const NAI_ODD_FLAG: u8 = 0x80;

/// Global Title (Q.713 3.4.2.3)
///
/// The shape of the GT header depends on the Global Title Indicator carried
/// in the address indicator octet:
///
/// ```text
/// GTI 1: nature-of-address (bit 7 = odd digit count), digits
/// GTI 2: translation type, digits
/// GTI 3: translation type, numbering plan | encoding scheme, digits
/// GTI 4: translation type, numbering plan | encoding scheme,
///        nature-of-address, digits
/// ```
///
/// Digits are BCD packed, low nibble first; an odd digit count leaves the
/// high nibble of the last octet zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalTitle {
    /// Global Title Indicator (1..=4), mirrored into the address indicator
    pub indicator: u8,
    /// Translation type (GTI 2..=4)
    pub translation_type: u8,
    /// Numbering plan (GTI 3..=4)
    pub numbering_plan: u8,
    /// Nature of address indicator (GTI 1 and 4)
    pub nature_of_address: u8,
    /// Address digits, one BCD character each
    pub digits: String,
}

impl GlobalTitle {
    /// Create a GTI 4 global title, the common international form
    pub fn new(translation_type: u8, numbering_plan: u8, nature_of_address: u8, digits: &str) -> Self {
        Self {
            indicator: 4,
            translation_type,
            numbering_plan,
            nature_of_address,
            digits: digits.to_string(),
        }
    }

    /// Encoding scheme derived from the digit count (1 = odd, 2 = even)
    pub fn encoding_scheme(&self) -> u8 {
        if self.digits.len() % 2 == 1 {
            1
        } else {
            2
        }
    }

    fn header_len(&self) -> usize {
        match self.indicator {
            1 | 2 => 1,
            3 => 2,
            _ => 3,
        }
    }

    /// Encoded length in octets
    pub fn encoded_len(&self) -> usize {
        self.header_len() + self.digits.len().div_ceil(2)
    }

    /// Encode to bytes
    pub fn encode(&self, buf: &mut BytesMut) -> SccpResult<()> {
        let odd = self.digits.len() % 2 == 1;
        match self.indicator {
            1 => {
                let mut nai = self.nature_of_address & !NAI_ODD_FLAG;
                if odd {
                    nai |= NAI_ODD_FLAG;
                }
                buf.put_u8(nai);
            }
            2 => {
                buf.put_u8(self.translation_type);
            }
            3 => {
                buf.put_u8(self.translation_type);
                buf.put_u8((self.numbering_plan << 4) | self.encoding_scheme());
            }
            _ => {
                buf.put_u8(self.translation_type);
                buf.put_u8((self.numbering_plan << 4) | self.encoding_scheme());
                buf.put_u8(self.nature_of_address & !NAI_ODD_FLAG);
            }
        }
        encode_bcd(&self.digits, buf)
    }

    /// Decode a global title of the given GTI from the remaining octets
    pub fn decode(indicator: u8, buf: &mut Bytes) -> SccpResult<Self> {
        let mut gt = Self {
            indicator,
            translation_type: 0,
            numbering_plan: 0,
            nature_of_address: 0,
            digits: String::new(),
        };

        let header_len = gt.header_len();
        if buf.remaining() < header_len {
            return Err(SccpError::BufferTooShort {
                needed: header_len,
                available: buf.remaining(),
            });
        }

        let odd = match indicator {
            1 => {
                let nai = buf.get_u8();
                gt.nature_of_address = nai & !NAI_ODD_FLAG;
                nai & NAI_ODD_FLAG != 0
            }
            2 => {
                gt.translation_type = buf.get_u8();
                false
            }
            3 => {
                gt.translation_type = buf.get_u8();
                let np_es = buf.get_u8();
                gt.numbering_plan = np_es >> 4;
                np_es & 0x0F == 1
            }
            _ => {
                gt.translation_type = buf.get_u8();
                let np_es = buf.get_u8();
                gt.numbering_plan = np_es >> 4;
                gt.nature_of_address = buf.get_u8() & !NAI_ODD_FLAG;
                np_es & 0x0F == 1
            }
        };

        gt.digits = decode_bcd(buf.chunk(), odd);
        buf.advance(buf.remaining());
        Ok(gt)
    }
}

/// Pack BCD digits, low nibble first
fn encode_bcd(digits: &str, buf: &mut BytesMut) -> SccpResult<()> {
    let mut nibbles = Vec::with_capacity(digits.len());
    for c in digits.chars() {
        let n = c
            .to_digit(16)
            .ok_or(SccpError::InvalidGlobalTitleDigit(c))?;
        nibbles.push(n as u8);
    }
    for pair in nibbles.chunks(2) {
        let lo = pair[0];
        let hi = pair.get(1).copied().unwrap_or(0);
        buf.put_u8((hi << 4) | lo);
    }
    Ok(())
}

/// Unpack BCD digits; `odd` drops the filler nibble of the last octet
fn decode_bcd(octets: &[u8], odd: bool) -> String {
    const ALPHABET: &[u8; 16] = b"0123456789abcdef";
    let mut digits = String::with_capacity(octets.len() * 2);
    for (i, octet) in octets.iter().enumerate() {
        digits.push(ALPHABET[(octet & 0x0F) as usize] as char);
        if !(odd && i == octets.len() - 1) {
            digits.push(ALPHABET[(octet >> 4) as usize] as char);
        }
    }
    digits
}

// ============================================================================
// Party Address
// ============================================================================

/// Called/Calling Party Address parameter (Q.713 3.4)
///
/// Wire layout: length octet, address indicator octet, then point code
/// (2 octets little-endian), subsystem number and global title, each
/// present only when the corresponding indicator bit is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyAddress {
    /// Address indicator octet
    pub address_indicator: u8,
    /// Signalling point code, little-endian on the wire
    pub signalling_point_code: Option<u16>,
    /// Subsystem number
    pub subsystem_number: Option<u8>,
    /// Global title
    pub global_title: Option<GlobalTitle>,
}

impl PartyAddress {
    /// Create a new address; the indicator octet is derived from the parts
    pub fn new(
        route_on_ssn: bool,
        signalling_point_code: Option<u16>,
        subsystem_number: Option<u8>,
        global_title: Option<GlobalTitle>,
    ) -> Self {
        let mut ai = 0u8;
        if signalling_point_code.is_some() {
            ai |= AI_PC_INDICATOR;
        }
        if subsystem_number.is_some() {
            ai |= AI_SSN_INDICATOR;
        }
        if let Some(gt) = &global_title {
            ai |= (gt.indicator << AI_GTI_SHIFT) & AI_GTI_MASK;
        }
        if route_on_ssn {
            ai |= AI_ROUTE_ON_SSN;
        }
        Self {
            address_indicator: ai,
            signalling_point_code,
            subsystem_number,
            global_title,
        }
    }

    /// Whether the routing indicator selects route-on-SSN
    pub fn route_on_ssn(&self) -> bool {
        self.address_indicator & AI_ROUTE_ON_SSN != 0
    }

    /// Global Title Indicator from the address indicator octet
    pub fn gti(&self) -> u8 {
        (self.address_indicator & AI_GTI_MASK) >> AI_GTI_SHIFT
    }

    fn body_len(&self) -> usize {
        let mut len = 1;
        if self.signalling_point_code.is_some() {
            len += 2;
        }
        if self.subsystem_number.is_some() {
            len += 1;
        }
        if let Some(gt) = &self.global_title {
            len += gt.encoded_len();
        }
        len
    }

    /// Encoded length in octets, including the length prefix
    pub fn encoded_len(&self) -> usize {
        1 + self.body_len()
    }

    /// Encode to bytes, length prefix included
    pub fn encode(&self, buf: &mut BytesMut) -> SccpResult<()> {
        let body_len = self.body_len();
        if body_len > u8::MAX as usize {
            return Err(SccpError::ParameterTooLong { len: body_len });
        }
        if (self.address_indicator & AI_PC_INDICATOR != 0) != self.signalling_point_code.is_some()
            || (self.address_indicator & AI_SSN_INDICATOR != 0) != self.subsystem_number.is_some()
            || (self.gti() != 0) != self.global_title.is_some()
        {
            return Err(SccpError::InvalidAddressIndicator(self.address_indicator));
        }

        buf.put_u8(body_len as u8);
        buf.put_u8(self.address_indicator);
        if let Some(pc) = self.signalling_point_code {
            buf.put_u16_le(pc);
        }
        if let Some(ssn) = self.subsystem_number {
            buf.put_u8(ssn);
        }
        if let Some(gt) = &self.global_title {
            gt.encode(buf)?;
        }
        Ok(())
    }

    /// Decode a Called Party Address, length prefix included
    pub fn decode_called(buf: &mut Bytes) -> SccpResult<Self> {
        Self::decode(buf)
    }

    /// Decode a Calling Party Address, length prefix included
    pub fn decode_calling(buf: &mut Bytes) -> SccpResult<Self> {
        Self::decode(buf)
    }

    /// Decode an address, length prefix included
    pub fn decode(buf: &mut Bytes) -> SccpResult<Self> {
        if buf.remaining() < 1 {
            return Err(SccpError::BufferTooShort { needed: 1, available: 0 });
        }
        let len = buf.get_u8() as usize;
        if buf.remaining() < len {
            return Err(SccpError::BufferTooShort {
                needed: len,
                available: buf.remaining(),
            });
        }
        let mut body = buf.split_to(len);

        if body.remaining() < 1 {
            return Err(SccpError::BufferTooShort { needed: 1, available: 0 });
        }
        let ai = body.get_u8();

        let signalling_point_code = if ai & AI_PC_INDICATOR != 0 {
            if body.remaining() < 2 {
                return Err(SccpError::BufferTooShort {
                    needed: 2,
                    available: body.remaining(),
                });
            }
            Some(body.get_u16_le())
        } else {
            None
        };

        let subsystem_number = if ai & AI_SSN_INDICATOR != 0 {
            if body.remaining() < 1 {
                return Err(SccpError::BufferTooShort { needed: 1, available: 0 });
            }
            Some(body.get_u8())
        } else {
            None
        };

        let gti = (ai & AI_GTI_MASK) >> AI_GTI_SHIFT;
        let global_title = if gti != 0 {
            Some(GlobalTitle::decode(gti, &mut body)?)
        } else {
            None
        };

        Ok(Self {
            address_indicator: ai,
            signalling_point_code,
            subsystem_number,
            global_title,
        })
    }

    /// Address digits in human readable form
    pub fn address(&self) -> String {
        match &self.global_title {
            Some(gt) => gt.digits.clone(),
            None => {
                let pc = self.signalling_point_code.unwrap_or(0);
                let ssn = self.subsystem_number.unwrap_or(0);
                format!("pc:{pc},ssn:{ssn}")
            }
        }
    }

    /// Address with routing details in human readable form
    pub fn address_with_details(&self) -> String {
        let mut parts = Vec::new();
        if let Some(gt) = &self.global_title {
            parts.push(format!(
                "GT={} (gti={}, tt={}, np={}, nai={})",
                gt.digits, gt.indicator, gt.translation_type, gt.numbering_plan, gt.nature_of_address
            ));
        }
        if let Some(pc) = self.signalling_point_code {
            parts.push(format!("pc={pc}"));
        }
        if let Some(ssn) = self.subsystem_number {
            parts.push(format!("ssn={ssn}"));
        }
        parts.push(format!("route-on-{}", self.routing_type().to_lowercase()));
        parts.join(", ")
    }

    /// Whether the address carries what its routing indicator needs
    pub fn is_valid_for_routing(&self) -> bool {
        if self.route_on_ssn() {
            self.subsystem_number.is_some()
        } else {
            self.global_title.is_some()
        }
    }

    /// Routing type selected by the routing indicator
    pub fn routing_type(&self) -> &'static str {
        if self.route_on_ssn() {
            "SSN"
        } else {
            "GT"
        }
    }
}

impl fmt::Display for PartyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address_with_details())
    }
}

// ============================================================================
// Data
// ============================================================================

/// Data parameter (Q.713 3.16): the user payload carried by UDT
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Data {
    payload: Bytes,
}

impl Data {
    /// Create a new Data parameter from raw octets
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into() }
    }

    /// Payload octets
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in octets
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encoded length in octets, including the length prefix
    pub fn encoded_len(&self) -> usize {
        1 + self.payload.len()
    }

    /// Encode to bytes, length prefix included
    pub fn encode(&self, buf: &mut BytesMut) -> SccpResult<()> {
        if self.payload.len() > u8::MAX as usize {
            return Err(SccpError::ParameterTooLong { len: self.payload.len() });
        }
        buf.put_u8(self.payload.len() as u8);
        buf.put_slice(&self.payload);
        Ok(())
    }

    /// Decode from bytes, length prefix included
    pub fn decode(buf: &mut Bytes) -> SccpResult<Self> {
        if buf.remaining() < 1 {
            return Err(SccpError::BufferTooShort { needed: 1, available: 0 });
        }
        let len = buf.get_u8() as usize;
        if buf.remaining() < len {
            return Err(SccpError::BufferTooShort {
                needed: len,
                available: buf.remaining(),
            });
        }
        Ok(Self { payload: buf.split_to(len) })
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for octet in self.payload.iter() {
            write!(f, "{octet:02x}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_class_bits() {
        let pc = ProtocolClass::new(1, true);
        assert_eq!(pc.octet(), 0x81);
        assert_eq!(pc.class(), 1);
        assert!(pc.has_return_option());

        let pc = ProtocolClass::new(0, false);
        assert_eq!(pc.octet(), 0x00);
        assert!(!pc.has_return_option());
    }

    #[test]
    fn test_protocol_class_roundtrip() {
        let pc = ProtocolClass::new(1, true);
        let mut buf = BytesMut::new();
        pc.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0x81]);

        let mut bytes = buf.freeze();
        let decoded = ProtocolClass::decode(&mut bytes).unwrap();
        assert_eq!(decoded, pc);
    }

    #[test]
    fn test_protocol_class_short_buffer() {
        let mut empty = Bytes::new();
        assert!(matches!(
            ProtocolClass::decode(&mut empty),
            Err(SccpError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_bcd_even_digits() {
        let mut buf = BytesMut::new();
        encode_bcd("1234", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x21, 0x43]);
        assert_eq!(decode_bcd(buf.as_ref(), false), "1234");
    }

    #[test]
    fn test_bcd_odd_digits() {
        let mut buf = BytesMut::new();
        encode_bcd("123", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x21, 0x03]);
        assert_eq!(decode_bcd(buf.as_ref(), true), "123");
    }

    #[test]
    fn test_bcd_rejects_non_digit() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_bcd("12x4", &mut buf),
            Err(SccpError::InvalidGlobalTitleDigit('x'))
        ));
    }

    #[test]
    fn test_party_address_pc_ssn_only() {
        let addr = PartyAddress::new(true, Some(0x1234), Some(8), None);
        assert_eq!(addr.address_indicator, 0x43);
        assert_eq!(addr.encoded_len(), 5);

        let mut buf = BytesMut::new();
        addr.encode(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x04, 0x43, 0x34, 0x12, 0x08]);

        let mut bytes = buf.freeze();
        let decoded = PartyAddress::decode_called(&mut bytes).unwrap();
        assert_eq!(decoded, addr);
        assert_eq!(decoded.routing_type(), "SSN");
        assert!(decoded.is_valid_for_routing());
    }

    #[test]
    fn test_party_address_with_global_title() {
        let gt = GlobalTitle::new(0, 1, 4, "12345678");
        let addr = PartyAddress::new(false, Some(0x1234), Some(8), Some(gt));
        // length octet + AI + PC(2) + SSN + TT + NP/ES + NAI + 4 digit octets
        assert_eq!(addr.encoded_len(), 12);

        let mut buf = BytesMut::new();
        addr.encode(&mut buf).unwrap();
        assert_eq!(buf[0], 11);
        assert_eq!(buf[1], 0x13); // PC + SSN + GTI 4, route on GT

        let mut bytes = buf.freeze();
        let decoded = PartyAddress::decode_calling(&mut bytes).unwrap();
        assert_eq!(decoded, addr);
        assert_eq!(decoded.address(), "12345678");
        assert_eq!(decoded.routing_type(), "GT");
    }

    #[test]
    fn test_party_address_odd_digit_gt() {
        let gt = GlobalTitle::new(0, 1, 4, "1234567");
        let addr = PartyAddress::new(false, None, None, Some(gt));

        let mut buf = BytesMut::new();
        addr.encode(&mut buf).unwrap();

        let mut bytes = buf.freeze();
        let decoded = PartyAddress::decode(&mut bytes).unwrap();
        assert_eq!(decoded.address(), "1234567");
        assert_eq!(decoded.global_title.unwrap().encoding_scheme(), 1);
    }

    #[test]
    fn test_party_address_truncated() {
        // claims 10 octets of body but provides 3
        let mut bytes = Bytes::from_static(&[0x0A, 0x43, 0x34, 0x12]);
        assert!(matches!(
            PartyAddress::decode(&mut bytes),
            Err(SccpError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_party_address_indicator_mismatch() {
        let mut addr = PartyAddress::new(true, Some(1), Some(8), None);
        addr.signalling_point_code = None;
        let mut buf = BytesMut::new();
        assert!(matches!(
            addr.encode(&mut buf),
            Err(SccpError::InvalidAddressIndicator(_))
        ));
    }

    #[test]
    fn test_data_roundtrip() {
        let data = Data::new(vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(data.encoded_len(), 4);

        let mut buf = BytesMut::new();
        data.encode(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x03, 0xAA, 0xBB, 0xCC]);

        let mut bytes = buf.freeze();
        let decoded = Data::decode(&mut bytes).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_data_too_long() {
        let data = Data::new(vec![0u8; 300]);
        let mut buf = BytesMut::new();
        assert!(matches!(
            data.encode(&mut buf),
            Err(SccpError::ParameterTooLong { len: 300 })
        ));
    }

    #[test]
    fn test_data_truncated() {
        let mut bytes = Bytes::from_static(&[0x05, 0x01, 0x02]);
        assert!(matches!(
            Data::decode(&mut bytes),
            Err(SccpError::BufferTooShort { needed: 5, available: 2 })
        ));
    }
}
