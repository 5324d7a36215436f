//! SCCP Protocol Library
//!
//! This crate provides Signalling Connection Control Part message
//! encoding/decoding and subsystem state management as specified in
//! ITU-T Q.713 and Q.714, for use above MTP3 or M3UA in an SS7/SIGTRAN
//! stack.
//!
//! # Features
//!
//! - Connectionless UDT encoding/decoding with validated relative pointers
//! - SCCP Management (SSA, SSP, SST, SOR, SOG, SSC) encoding/decoding
//! - Called/Calling Party Address, Global Title, Protocol Class and Data
//!   parameter codecs
//! - Concurrent subsystem registry with the prohibited/allowed state
//!   machine and the SST retransmission loop with exponential backoff
//!
//! # Example
//!
//! ```rust
//! use sccp::params::{Data, GlobalTitle, PartyAddress};
//! use sccp::udt::Udt;
//! use sccp::message::{parse_message, SccpMessage};
//!
//! // Build a class 1 UDT carrying three payload octets
//! let called = PartyAddress::new(
//!     false,
//!     Some(0x1234),
//!     Some(8),
//!     Some(GlobalTitle::new(0, 1, 4, "12345678")),
//! );
//! let calling = PartyAddress::new(true, Some(0x0042), Some(9), None);
//! let udt = Udt::new(1, true, called, calling, Data::new(vec![0xAA, 0xBB, 0xCC])).unwrap();
//!
//! // Encode, then feed the octets back through the dispatcher
//! let wire = udt.to_bytes().unwrap();
//! match parse_message(&wire).unwrap() {
//!     SccpMessage::Udt(decoded) => assert_eq!(decoded, udt),
//! }
//! ```

pub mod error;
pub mod manager;
pub mod message;
pub mod params;
pub mod scmg;
pub mod ssn;
pub mod udt;

mod pointer;


pub use error::{SccpError, SccpResult};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{SccpError, SccpResult};
    pub use crate::manager::{
        default_manager, ScmgTransport, SsnEventHandler, SsnManagerConfig, SsnStateManager,
        SCCP_MANAGEMENT_SSN,
    };
    pub use crate::message::{parse_message, SccpMessage, SccpMessageType};
    pub use crate::params::{Data, GlobalTitle, PartyAddress, ProtocolClass};
    pub use crate::scmg::{Scmg, ScmgMessageType};
    pub use crate::ssn::{BroadcastType, SsnEntry, SsnState, StateChangeReason};
    pub use crate::udt::Udt;
}
