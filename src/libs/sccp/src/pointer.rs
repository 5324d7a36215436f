//! Relative pointer arithmetic for variable-length parameter areas
//!
//! SCCP messages locate each variable-length parameter through a one-octet
//! pointer whose value is the offset from the pointer's own position to the
//! parameter's length octet (Q.713 chapter 3). All offset math lives here so
//! the message codecs never touch raw indices.

use crate::error::{SccpError, SccpResult};

/// Buffer index of the first pointer octet in a UDT
pub(crate) const UDT_POINTER_AREA: usize = 2;

/// Pointer table for the three mandatory variable parameters of UDT
/// (Called Party Address, Calling Party Address, Data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PointerTable {
    pub called: u8,
    pub calling: u8,
    pub data: u8,
}

impl PointerTable {
    /// Derive the pointer values for a contiguous parameter layout.
    ///
    /// Lengths include the parameter's length prefix octet. The pointers sit
    /// at consecutive buffer indices, so each one is the previous value plus
    /// the previous parameter's length, minus one for the index shift.
    pub fn for_lengths(called_len: usize, calling_len: usize, data_len: usize) -> SccpResult<Self> {
        let called = 3usize;
        let calling = called + called_len - 1;
        let data = calling + calling_len - 1;

        // data_len only matters for the total message size, but a parameter
        // body longer than its one-octet prefix can never be addressed
        for len in [called_len, calling_len, data_len] {
            if len > u8::MAX as usize + 1 {
                return Err(SccpError::ParameterTooLong { len: len - 1 });
            }
        }
        if data > u8::MAX as usize {
            return Err(SccpError::ParameterTooLong { len: data });
        }

        Ok(Self {
            called: called as u8,
            calling: calling as u8,
            data: data as u8,
        })
    }

    /// Resolve the pointer stored at `index`, returning the bounds of the
    /// length-prefixed parameter region it addresses.
    ///
    /// Validates that the pointer is non-zero, that its target length octet
    /// lies inside `buf`, and that the full `L`-octet body does too.
    pub fn resolve(buf: &[u8], index: usize) -> SccpResult<(usize, usize)> {
        let value = buf[index];
        if value == 0 {
            return Err(SccpError::InvalidPointer { offset: index, value });
        }

        let start = index + value as usize;
        if start >= buf.len() {
            return Err(SccpError::BufferTooShort {
                needed: start + 1,
                available: buf.len(),
            });
        }

        let param_len = buf[start] as usize;
        let end = start + 1 + param_len;
        if end > buf.len() {
            return Err(SccpError::BufferTooShort {
                needed: end,
                available: buf.len(),
            });
        }

        Ok((start, end))
    }
}
