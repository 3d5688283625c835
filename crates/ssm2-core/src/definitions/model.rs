//! Definition tables and identity types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::capabilities::Capabilities;

/// Control unit type.
///
/// Only engine and transmission units speak SSM2; the remaining types exist
/// for the older protocol and are rejected at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CuType {
    Engine,
    Transmission,
    CruiseControl,
    AirConditioning,
    FourWheelSteering,
    Abs,
    AirbagSystem,
    PowerSteering,
}

impl fmt::Display for CuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CuType::Engine => write!(f, "engine"),
            CuType::Transmission => write!(f, "transmission"),
            CuType::CruiseControl => write!(f, "cruise control"),
            CuType::AirConditioning => write!(f, "air conditioning"),
            CuType::FourWheelSteering => write!(f, "four wheel steering"),
            CuType::Abs => write!(f, "ABS"),
            CuType::AirbagSystem => write!(f, "airbag system"),
            CuType::PowerSteering => write!(f, "power steering"),
        }
    }
}

impl FromStr for CuType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "engine" | "ecu" => Ok(CuType::Engine),
            "transmission" | "tcu" => Ok(CuType::Transmission),
            "cruise_control" => Ok(CuType::CruiseControl),
            "air_conditioning" => Ok(CuType::AirConditioning),
            "four_wheel_steering" => Ok(CuType::FourWheelSteering),
            "abs" => Ok(CuType::Abs),
            "airbag_system" => Ok(CuType::AirbagSystem),
            "power_steering" => Ok(CuType::PowerSteering),
            other => Err(format!("unknown control unit type '{}'", other)),
        }
    }
}

/// Identification data returned by a control unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CuIdentity {
    pub system_id: Vec<u8>,
    pub rom_id: Vec<u8>,
    pub flag_bytes: Vec<u8>,
}

impl CuIdentity {
    pub fn new(system_id: &[u8], rom_id: &[u8], flag_bytes: &[u8]) -> Self {
        Self {
            system_id: system_id.to_vec(),
            rom_id: rom_id.to_vec(),
            flag_bytes: flag_bytes.to_vec(),
        }
    }

    pub fn system_id_hex(&self) -> String {
        to_hex(&self.system_id)
    }

    pub fn rom_id_hex(&self) -> String {
        to_hex(&self.rom_id)
    }
}

impl fmt::Display for CuIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SYS_ID {} / ROM_ID {}", self.system_id_hex(), self.rom_id_hex())
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// One bit of a diagnostic byte and the code it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBit {
    /// Bit position, 1 (LSB) to 8.
    pub bit: u8,
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// A decoded diagnostic or cancel code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticCode {
    pub code: String,
    pub description: String,
}

/// Diagnostic-code byte definition.
///
/// Used for DTCs and for cruise-control cancel codes alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCodeDefinition {
    /// Address of the current / temporary / latest byte.
    pub current_address: u32,
    /// Address of the historic / memorized byte.
    pub historic_address: u32,
    #[serde(default)]
    pub codes: Vec<CodeBit>,
}

impl DiagnosticCodeDefinition {
    /// Decode one raw byte read from `address`.
    ///
    /// Every set bit yields one code; bits without a definition decode to an
    /// unknown code naming the address and bit.
    pub fn decode(&self, address: u32, byte: u8) -> Vec<DiagnosticCode> {
        (1..=8u8)
            .filter(|&bit| byte & (1u8 << (bit - 1)) != 0)
            .map(|bit| match self.codes.iter().find(|c| c.bit == bit) {
                Some(def) => DiagnosticCode {
                    code: def.code.clone(),
                    description: def.description.clone(),
                },
                None => DiagnosticCode {
                    code: "???".to_string(),
                    description: format!("UNKNOWN (address 0x{:06X}, bit {})", address, bit),
                },
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasuringBlockDefinition {
    pub title: String,
    #[serde(default)]
    pub unit: String,
    pub address_low: u32,
    #[serde(default)]
    pub address_high: Option<u32>,
    /// Conversion formula, applied by presentation code.
    #[serde(default)]
    pub scaling: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchDefinition {
    pub title: String,
    #[serde(default)]
    pub unit: String,
    pub address: u32,
    /// Bit position, 1 (LSB) to 8.
    pub bit: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentDefinition {
    pub title: String,
    #[serde(default)]
    pub unit: String,
    pub address_low: u32,
    #[serde(default)]
    pub address_high: Option<u32>,
    pub raw_min: u32,
    pub raw_max: u32,
    #[serde(default)]
    pub scaling: Option<String>,
}

impl AdjustmentDefinition {
    pub fn is_two_bytes(&self) -> bool {
        self.address_high.is_some()
    }

    /// Addresses in read order: low, then high.
    pub fn addresses(&self) -> Vec<u32> {
        std::iter::once(self.address_low)
            .chain(self.address_high)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorDefinition {
    pub title: String,
    pub address: u32,
    /// Bit position, 1 (LSB) to 8.
    pub bit: u8,
}

impl ActuatorDefinition {
    /// Byte value that activates this actuator.
    pub fn pattern(&self) -> Option<u8> {
        match self.bit {
            1..=8 => Some(1 << (self.bit - 1)),
            _ => None,
        }
    }
}

/// All definition tables of a control unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuDefinitions {
    /// DTCs use the temporary/memorized (OBD2) scheme.
    #[serde(default)]
    pub dtc_format_obd2: bool,
    #[serde(default)]
    pub diagnostic_codes: Vec<DiagnosticCodeDefinition>,
    #[serde(default)]
    pub cancel_codes: Vec<DiagnosticCodeDefinition>,
    #[serde(default)]
    pub measuring_blocks: Vec<MeasuringBlockDefinition>,
    #[serde(default)]
    pub switches: Vec<SwitchDefinition>,
    #[serde(default)]
    pub adjustments: Vec<AdjustmentDefinition>,
    #[serde(default)]
    pub actuators: Vec<ActuatorDefinition>,
}

impl CuDefinitions {
    /// Distinct actuator byte addresses, in first-seen order.
    pub fn actuator_addresses(&self) -> Vec<u32> {
        let mut addrs: Vec<u32> = Vec::new();
        for actuator in &self.actuators {
            if !addrs.contains(&actuator.address) {
                addrs.push(actuator.address);
            }
        }
        addrs
    }
}

/// Result of a definition lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDefinitions {
    pub description: String,
    pub capabilities: Capabilities,
    pub definitions: CuDefinitions,
}

impl ResolvedDefinitions {
    /// Lookup result for a control unit with no known definitions.
    pub fn unknown(cu_type: CuType, identity: &CuIdentity) -> Self {
        Self {
            description: format!("unknown {} control unit ({})", cu_type, identity),
            capabilities: Capabilities::empty(),
            definitions: CuDefinitions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dtc_def() -> DiagnosticCodeDefinition {
        DiagnosticCodeDefinition {
            current_address: 0x8E,
            historic_address: 0xA4,
            codes: vec![
                CodeBit {
                    bit: 1,
                    code: "P0335".into(),
                    description: "Crankshaft position sensor".into(),
                },
                CodeBit {
                    bit: 8,
                    code: "P0340".into(),
                    description: "Camshaft position sensor".into(),
                },
            ],
        }
    }

    #[test]
    fn test_decode_bits() {
        let codes = dtc_def().decode(0x8E, 0x81);
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].code, "P0335");
        assert_eq!(codes[1].code, "P0340");
        assert!(dtc_def().decode(0x8E, 0x00).is_empty());
    }

    #[test]
    fn test_decode_unknown_bit() {
        let codes = dtc_def().decode(0xA4, 0x04);
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "???");
        assert!(codes[0].description.contains("0x0000A4"));
        assert!(codes[0].description.contains("bit 3"));
    }

    #[test]
    fn test_actuator_pattern() {
        let act = |bit| ActuatorDefinition {
            title: "Fuel pump relay".into(),
            address: 0x61,
            bit,
        };
        assert_eq!(act(1).pattern(), Some(0x01));
        assert_eq!(act(6).pattern(), Some(0x20));
        assert_eq!(act(8).pattern(), Some(0x80));
        assert_eq!(act(0).pattern(), None);
        assert_eq!(act(9).pattern(), None);
    }

    #[test]
    fn test_actuator_addresses_dedup() {
        let defs = CuDefinitions {
            actuators: vec![
                ActuatorDefinition { title: "A".into(), address: 0x61, bit: 1 },
                ActuatorDefinition { title: "B".into(), address: 0x62, bit: 2 },
                ActuatorDefinition { title: "C".into(), address: 0x61, bit: 3 },
            ],
            ..Default::default()
        };
        assert_eq!(defs.actuator_addresses(), vec![0x61, 0x62]);
    }

    #[test]
    fn test_cu_type_parse() {
        assert_eq!("engine".parse::<CuType>(), Ok(CuType::Engine));
        assert_eq!("Transmission".parse::<CuType>(), Ok(CuType::Transmission));
        assert_eq!("air-conditioning".parse::<CuType>(), Ok(CuType::AirConditioning));
        assert!("toaster".parse::<CuType>().is_err());
    }

    #[test]
    fn test_identity_hex() {
        let id = CuIdentity::new(&[0xA2, 0x10, 0x11], &[0x4A, 0x10, 0xC5, 0x00, 0x07], &[]);
        assert_eq!(id.rom_id_hex(), "4A10C50007");
        assert_eq!(id.to_string(), "SYS_ID A21011 / ROM_ID 4A10C50007");
    }
}
