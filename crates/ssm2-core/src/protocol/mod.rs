//! Protocol module - SSM2 addresses, group sets and data codecs.

pub mod adjustment;
pub mod constants;
pub mod dc_groups;
pub mod vin;

pub use adjustment::{AdjustmentRange, decode_adjustment, encode_adjustment};
pub use constants::*;
pub use dc_groups::DcGroups;
pub use vin::{validate_vin, vin_start_address};
