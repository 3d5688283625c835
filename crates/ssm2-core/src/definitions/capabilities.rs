//! Capability set of a control unit.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A single feature a control unit may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Obd2,
    Immobilizer,
    TestMode,
    ActuatorTest,
    ClearMemory,
    ClearMemory2,
    Vin,
    IntegratedCruiseControl,
    MemorizedCancelCodes,
    EngineSpeedBlock,
    IgnitionSwitch,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::Obd2,
        Capability::Immobilizer,
        Capability::TestMode,
        Capability::ActuatorTest,
        Capability::ClearMemory,
        Capability::ClearMemory2,
        Capability::Vin,
        Capability::IntegratedCruiseControl,
        Capability::MemorizedCancelCodes,
        Capability::EngineSpeedBlock,
        Capability::IgnitionSwitch,
    ];

    pub fn flag(self) -> Capabilities {
        match self {
            Capability::Obd2 => Capabilities::OBD2,
            Capability::Immobilizer => Capabilities::IMMOBILIZER,
            Capability::TestMode => Capabilities::TEST_MODE,
            Capability::ActuatorTest => Capabilities::ACTUATOR_TEST,
            Capability::ClearMemory => Capabilities::CLEAR_MEMORY,
            Capability::ClearMemory2 => Capabilities::CLEAR_MEMORY_2,
            Capability::Vin => Capabilities::VIN,
            Capability::IntegratedCruiseControl => Capabilities::INTEGRATED_CC,
            Capability::MemorizedCancelCodes => Capabilities::MEMORIZED_CANCEL_CODES,
            Capability::EngineSpeedBlock => Capabilities::MB_ENGINE_SPEED,
            Capability::IgnitionSwitch => Capabilities::SW_IGNITION,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Obd2 => write!(f, "OBD2 system"),
            Capability::Immobilizer => write!(f, "immobilizer"),
            Capability::TestMode => write!(f, "test mode"),
            Capability::ActuatorTest => write!(f, "actuator tests"),
            Capability::ClearMemory => write!(f, "clear memory"),
            Capability::ClearMemory2 => write!(f, "clear memory 2"),
            Capability::Vin => write!(f, "VIN"),
            Capability::IntegratedCruiseControl => write!(f, "integrated cruise control"),
            Capability::MemorizedCancelCodes => write!(f, "memorized cancel codes"),
            Capability::EngineSpeedBlock => write!(f, "engine speed measuring block"),
            Capability::IgnitionSwitch => write!(f, "ignition switch status"),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u16 {
        const OBD2 = 1 << 0;
        const IMMOBILIZER = 1 << 1;
        const TEST_MODE = 1 << 2;
        const ACTUATOR_TEST = 1 << 3;
        const CLEAR_MEMORY = 1 << 4;
        const CLEAR_MEMORY_2 = 1 << 5;
        const VIN = 1 << 6;
        const INTEGRATED_CC = 1 << 7;
        const MEMORIZED_CANCEL_CODES = 1 << 8;
        const MB_ENGINE_SPEED = 1 << 9;
        const SW_IGNITION = 1 << 10;
    }
}

impl Capabilities {
    pub fn has(&self, capability: Capability) -> bool {
        self.contains(capability.flag())
    }

    /// Capabilities present in this set, in declaration order.
    pub fn list(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.has(*c))
            .collect()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Capabilities::empty(), |acc, c| acc | c.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_capability_has_own_flag() {
        let all: Capabilities = Capability::ALL.into_iter().collect();
        assert_eq!(all, Capabilities::all());
        assert_eq!(all.list().len(), Capability::ALL.len());
    }

    #[test]
    fn test_presence() {
        let caps: Capabilities = [Capability::Vin, Capability::TestMode].into_iter().collect();
        assert!(caps.has(Capability::Vin));
        assert!(caps.has(Capability::TestMode));
        assert!(!caps.has(Capability::ActuatorTest));
        assert_eq!(caps.list(), vec![Capability::TestMode, Capability::Vin]);
    }
}
