//! SSM2 transport abstraction.
//!
//! Defines the `Ssm2Transport` trait for memory reads and writes on a control
//! unit, allowing different implementations (pass-through adapters, mock, etc.).

use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use thiserror::Error;

use crate::definitions::CuIdentity;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No response from control unit at 0x{address:X}")]
    NoResponse { address: u32 },

    #[error("Communication link lost")]
    LinkLost,

    #[error("Unexpected response length: expected {expected}, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },

    #[error("Write to 0x{address:06X} failed")]
    WriteFailed { address: u32 },

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Failed to stop repeating operation: {0}")]
    StopFailed(String),

    #[error("Operation not supported by interface: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol flavor the diagnostic interface is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Old Subaru protocol; not usable for SSM2 sessions.
    Ssm1,
    Ssm2Iso14230,
    Ssm2Iso15765,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ssm1 => write!(f, "SSM1"),
            Protocol::Ssm2Iso14230 => write!(f, "SSM2 (ISO14230)"),
            Protocol::Ssm2Iso15765 => write!(f, "SSM2 (ISO15765)"),
        }
    }
}

/// Delivery from a repeating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One cycle of a repeating read (one byte per address, in order).
    Data { bytes: Vec<u8>, elapsed: Duration },
    /// The link failed; no further deliveries follow.
    CommError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

/// Handle to a repeating read or write running on the transport.
///
/// Deliveries arrive on the handle's queue until the operation is stopped.
/// Dropping the handle unsubscribes from them.
#[derive(Debug)]
pub struct RepeatingOperation {
    id: u64,
    kind: OperationKind,
    events: Receiver<LinkEvent>,
}

impl RepeatingOperation {
    pub fn new(id: u64, kind: OperationKind, events: Receiver<LinkEvent>) -> Self {
        Self { id, kind, events }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Next pending delivery, if any. A closed queue counts as link failure.
    pub fn try_next(&self) -> Option<LinkEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(LinkEvent::CommError),
        }
    }

    /// Wait up to `timeout` for the next delivery.
    pub fn next_timeout(&self, timeout: Duration) -> Option<LinkEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(LinkEvent::CommError),
        }
    }

    /// Block until the next delivery.
    pub fn next_blocking(&self) -> LinkEvent {
        self.events.recv().unwrap_or(LinkEvent::CommError)
    }
}

/// Abstract SSM2 transport interface.
///
/// Single-shot calls block until the control unit answers or the transport's
/// retries are exhausted. At most one repeating operation runs at a time and
/// no single-shot call is issued while it runs.
pub trait Ssm2Transport: Send {
    /// Protocol flavor of the underlying interface.
    fn protocol(&self) -> Protocol;

    /// Query identity at `cu_address`. On success, later requests target it.
    fn identify(&mut self, cu_address: u32) -> Result<CuIdentity, TransportError>;

    /// Read one byte per address, in order.
    fn read_bytes(&mut self, addresses: &[u32]) -> Result<Vec<u8>, TransportError>;

    /// Write one byte. Returns the value the control unit reports as written.
    fn write_byte(&mut self, address: u32, value: u8) -> Result<u8, TransportError>;

    /// Start reading `addresses` repeatedly.
    fn start_repeating_read(
        &mut self,
        addresses: &[u32],
    ) -> Result<RepeatingOperation, TransportError>;

    /// Start writing `value` to `address` every `interval`.
    fn start_repeating_write(
        &mut self,
        address: u32,
        value: u8,
        interval: Duration,
    ) -> Result<RepeatingOperation, TransportError>;

    /// Halt a repeating operation.
    fn stop(&mut self, operation: &RepeatingOperation) -> Result<(), TransportError>;

    /// Retries per single-shot request.
    fn set_retry_count(&mut self, retries: u8);
}
