//! Session error taxonomy.

use thiserror::Error;

use crate::definitions::Capability;
use crate::state::SessionState;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum SsmError {
    #[error("Interface is not configured for an SSM2 protocol")]
    InvalidInterfaceConfig,

    #[error("Control unit type is not supported by SSM2")]
    InvalidCuType,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },

    #[error("Control unit data not available, setup required")]
    NotSetUp,

    #[error("Control unit does not support {0}")]
    Unsupported(Capability),

    #[error("Communication error: {0}")]
    Comm(#[from] TransportError),

    #[error("Data validation failed: {0}")]
    DataValidation(String),

    #[error("Actuator interlock: {0}")]
    Interlock(&'static str),
}

impl SsmError {
    /// True for errors raised by a failed exchange with the control unit.
    pub fn is_comm(&self) -> bool {
        matches!(self, SsmError::Comm(_))
    }
}
