//! SSM2-Core: Subaru SSM2 diagnostic session driver in Rust.
//!
//! This crate turns a byte-oriented SSM2 transport (memory reads, single-byte
//! writes, repeating reads and writes) into a stateful diagnostic session for
//! an engine or transmission control unit.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Addresses, diagnostic-code groups, VIN and adjustment codecs
//! - **Definitions**: Capabilities and definition tables per control unit
//! - **Transport**: SSM2 transport abstraction (mock included)
//! - **Query**: Address plans and raw-data decoders for polling
//! - **State**: Session states and control unit data
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: The state machine tying it all together
//!
//! # Example
//!
//! ```no_run
//! use ssm2_core::definitions::{CuType, DefinitionLibrary};
//! use ssm2_core::protocol::DcGroups;
//! use ssm2_core::session::{SessionConfig, Ssm2Session};
//! use ssm2_core::transport::{MockTransport, Protocol};
//!
//! let library = DefinitionLibrary::load_from_file("definitions.toml").unwrap();
//! let transport = MockTransport::new(Protocol::Ssm2Iso14230);
//!
//! let mut session = Ssm2Session::new(transport, library, SessionConfig::default());
//! session.setup(CuType::Engine, false).unwrap();
//! session.start_dc_reading(DcGroups::CURRENT_DTCS).unwrap();
//! session.process_events().unwrap();
//! ```

pub mod definitions;
pub mod error;
pub mod events;
pub mod protocol;
pub mod query;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use definitions::{
    Capabilities, Capability, CuDefinitions, CuIdentity, CuType, DefinitionLibrary,
    DefinitionProvider, ResolvedDefinitions,
};
pub use error::SsmError;
pub use events::{ChannelObserver, NullObserver, SsmEvent, SsmObserver, TracingObserver};
pub use protocol::DcGroups;
pub use query::{DcReadPlan, LiveValue, MbSwReadPlan, MbSwSelector};
pub use session::{ClearMemoryLevel, ImmobilizerLineStatus, SessionConfig, Ssm2Session};
pub use state::{ControlUnit, SessionState};
pub use transport::{MockTransport, Protocol, Ssm2Transport, TransportError};
