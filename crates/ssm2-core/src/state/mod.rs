//! State machine module.

pub mod control_unit;
pub mod machine;

pub use control_unit::ControlUnit;
pub use machine::SessionState;
pub(crate) use machine::{Activity, Phase};
