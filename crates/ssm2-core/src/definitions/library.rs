//! TOML-backed definition library.
//!
//! ```toml
//! [[control_unit]]
//! cu_type = "engine"
//! rom_id = "4A10C50007"
//! description = "2.0L DOHC turbo engine"
//! capabilities = ["obd2", "test_mode", "actuator_test", "engine_speed_block"]
//! dtc_format_obd2 = true
//!
//! [[control_unit.diagnostic_codes]]
//! current_address = 0x8E
//! historic_address = 0xA4
//! codes = [{ bit = 1, code = "P0335", description = "Crankshaft position sensor" }]
//! ```

use std::path::Path;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DefinitionProvider;
use super::capabilities::{Capabilities, Capability};
use super::model::{
    ActuatorDefinition, AdjustmentDefinition, CuDefinitions, CuIdentity, CuType,
    DiagnosticCodeDefinition, MeasuringBlockDefinition, ResolvedDefinitions, SwitchDefinition,
};

/// Definitions for one control unit (or a family of them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionEntry {
    pub cu_type: CuType,
    /// System ID as hex; entries without IDs are the fallback for their type.
    #[serde(default)]
    pub system_id: Option<String>,
    /// ROM ID as hex.
    #[serde(default)]
    pub rom_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
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

impl DefinitionEntry {
    fn matches_rom(&self, identity: &CuIdentity) -> bool {
        self.rom_id
            .as_deref()
            .is_some_and(|id| same_hex(id, &identity.rom_id_hex()))
    }

    fn matches_system(&self, identity: &CuIdentity) -> bool {
        self.rom_id.is_none()
            && self
                .system_id
                .as_deref()
                .is_some_and(|id| same_hex(id, &identity.system_id_hex()))
    }

    fn is_fallback(&self) -> bool {
        self.rom_id.is_none() && self.system_id.is_none()
    }

    fn resolved(&self) -> ResolvedDefinitions {
        ResolvedDefinitions {
            description: self.description.clone(),
            capabilities: self.capabilities.iter().copied().collect::<Capabilities>(),
            definitions: CuDefinitions {
                dtc_format_obd2: self.dtc_format_obd2,
                diagnostic_codes: self.diagnostic_codes.clone(),
                cancel_codes: self.cancel_codes.clone(),
                measuring_blocks: self.measuring_blocks.clone(),
                switches: self.switches.clone(),
                adjustments: self.adjustments.clone(),
                actuators: self.actuators.clone(),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        let name = if self.description.is_empty() {
            self.cu_type.to_string()
        } else {
            self.description.clone()
        };
        let bit_ok = |bit: u8| (1..=8).contains(&bit);
        for def in self.diagnostic_codes.iter().chain(&self.cancel_codes) {
            if let Some(code) = def.codes.iter().find(|c| !bit_ok(c.bit)) {
                bail!("{}: code {} uses invalid bit {}", name, code.code, code.bit);
            }
        }
        if let Some(sw) = self.switches.iter().find(|s| !bit_ok(s.bit)) {
            bail!("{}: switch '{}' uses invalid bit {}", name, sw.title, sw.bit);
        }
        if let Some(act) = self.actuators.iter().find(|a| !bit_ok(a.bit)) {
            bail!("{}: actuator '{}' uses invalid bit {}", name, act.title, act.bit);
        }
        if let Some(adj) = self
            .adjustments
            .iter()
            .find(|a| a.address_high == Some(a.address_low))
        {
            bail!("{}: adjustment '{}' uses the same low and high address", name, adj.title);
        }
        Ok(())
    }
}

fn same_hex(a: &str, b: &str) -> bool {
    let normalize = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    };
    normalize(a) == normalize(b)
}

/// Collection of control-unit definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionLibrary {
    #[serde(default, rename = "control_unit")]
    pub entries: Vec<DefinitionEntry>,
}

impl DefinitionLibrary {
    pub fn new(entries: Vec<DefinitionEntry>) -> Self {
        Self { entries }
    }

    /// Parse and validate a library from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let library: DefinitionLibrary = toml::from_str(content)?;
        for entry in &library.entries {
            entry.validate()?;
        }
        Ok(library)
    }

    /// Load a library from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save the library to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find the best entry: ROM ID match, then system ID, then type fallback.
    pub fn find(&self, cu_type: CuType, identity: &CuIdentity) -> Option<&DefinitionEntry> {
        let candidates: Vec<&DefinitionEntry> = self
            .entries
            .iter()
            .filter(|e| e.cu_type == cu_type)
            .collect();
        let pick = |pred: &dyn Fn(&DefinitionEntry) -> bool| {
            candidates.iter().copied().find(|e| pred(*e))
        };
        pick(&|e| e.matches_rom(identity))
            .or_else(|| pick(&|e| e.matches_system(identity)))
            .or_else(|| pick(&DefinitionEntry::is_fallback))
    }
}

impl DefinitionProvider for DefinitionLibrary {
    fn resolve(&self, cu_type: CuType, identity: &CuIdentity) -> ResolvedDefinitions {
        match self.find(cu_type, identity) {
            Some(entry) => {
                debug!(cu = %cu_type, description = %entry.description, "Definitions found");
                entry.resolved()
            }
            None => {
                debug!(cu = %cu_type, identity = %identity, "No definitions for control unit");
                ResolvedDefinitions::unknown(cu_type, identity)
            }
        }
    }
}
