//! Address-list builders and raw-data decoders.
//!
//! A read plan is built once when polling starts. It fixes the ordered
//! address list handed to the transport and is the only thing consulted when
//! the byte stream of that read is decoded.

pub mod dc;
pub mod mbsw;

pub use dc::{DcGroupCodes, DcReadPlan, DcReadout, DtcStatus};
pub use mbsw::{BlockKind, LiveValue, MbSwReadPlan, MbSwSelector};

use crate::transport::TransportError;

fn check_len(expected: usize, bytes: &[u8]) -> Result<(), TransportError> {
    if bytes.len() != expected {
        return Err(TransportError::UnexpectedLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}
