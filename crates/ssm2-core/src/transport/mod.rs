//! Transport layer module.

pub mod mock;
pub mod traits;

pub use mock::{MockTransport, StartedOperation};
pub use traits::{
    LinkEvent, OperationKind, Protocol, RepeatingOperation, Ssm2Transport, TransportError,
};
