//! Control unit definitions.
//!
//! The tables describing what a control unit supports are configuration data.
//! A [`DefinitionProvider`] maps a CU identity to those tables; the
//! [`DefinitionLibrary`] is the TOML-backed implementation.

pub mod capabilities;
pub mod library;
pub mod model;

pub use capabilities::{Capabilities, Capability};
pub use library::{DefinitionEntry, DefinitionLibrary};
pub use model::{
    ActuatorDefinition, AdjustmentDefinition, CodeBit, CuDefinitions, CuIdentity, CuType,
    DiagnosticCode, DiagnosticCodeDefinition, MeasuringBlockDefinition, ResolvedDefinitions,
    SwitchDefinition,
};

/// Pure lookup from CU identity to definition tables.
///
/// Implementations perform no I/O and keep no state between calls.
pub trait DefinitionProvider: Send + Sync {
    fn resolve(&self, cu_type: CuType, identity: &CuIdentity) -> ResolvedDefinitions;
}
