//! Data of the control unit a session is connected to.

use crate::definitions::{
    Capabilities, Capability, CuDefinitions, CuIdentity, CuType, ResolvedDefinitions,
};
use crate::error::SsmError;
use crate::protocol::DcGroups;

/// Identity, capabilities and definition tables of a set-up control unit.
///
/// Exists only while the session is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlUnit {
    cu_type: CuType,
    cu_address: u32,
    identity: CuIdentity,
    description: String,
    capabilities: Capabilities,
    definitions: CuDefinitions,
    /// Distinct actuator byte addresses for the all-off sweep.
    actuator_addresses: Vec<u32>,
}

impl ControlUnit {
    pub fn new(
        cu_type: CuType,
        cu_address: u32,
        identity: CuIdentity,
        resolved: ResolvedDefinitions,
    ) -> Self {
        let actuator_addresses = resolved.definitions.actuator_addresses();
        Self {
            cu_type,
            cu_address,
            identity,
            description: resolved.description,
            capabilities: resolved.capabilities,
            definitions: resolved.definitions,
            actuator_addresses,
        }
    }

    pub fn cu_type(&self) -> CuType {
        self.cu_type
    }

    /// Address the control unit answered at.
    pub fn cu_address(&self) -> u32 {
        self.cu_address
    }

    pub fn identity(&self) -> &CuIdentity {
        &self.identity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }

    pub(crate) fn require(&self, capability: Capability) -> Result<(), SsmError> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(SsmError::Unsupported(capability))
        }
    }

    pub fn definitions(&self) -> &CuDefinitions {
        &self.definitions
    }

    pub fn actuator_addresses(&self) -> &[u32] {
        &self.actuator_addresses
    }

    /// Diagnostic-code groups this control unit can deliver.
    pub fn supported_dc_groups(&self) -> DcGroups {
        let mut groups = DcGroups::empty();
        if !self.definitions.diagnostic_codes.is_empty() {
            if self.definitions.dtc_format_obd2 {
                groups |= DcGroups::TEMPORARY_DTCS | DcGroups::MEMORIZED_DTCS;
            } else {
                groups |= DcGroups::CURRENT_DTCS | DcGroups::HISTORIC_DTCS;
            }
        }
        if self.has(Capability::IntegratedCruiseControl) {
            groups |= DcGroups::LATEST_CANCEL_CODES;
            if self.has(Capability::MemorizedCancelCodes) {
                groups |= DcGroups::MEMORIZED_CANCEL_CODES;
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{ActuatorDefinition, DiagnosticCodeDefinition};

    fn resolved(obd2: bool, caps: &[Capability]) -> ResolvedDefinitions {
        ResolvedDefinitions {
            description: "test unit".into(),
            capabilities: caps.iter().copied().collect(),
            definitions: CuDefinitions {
                dtc_format_obd2: obd2,
                diagnostic_codes: vec![DiagnosticCodeDefinition {
                    current_address: 0x8E,
                    historic_address: 0xA4,
                    codes: vec![],
                }],
                actuators: vec![
                    ActuatorDefinition { title: "A".into(), address: 0x61, bit: 1 },
                    ActuatorDefinition { title: "B".into(), address: 0x61, bit: 2 },
                ],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_supported_groups() {
        let id = CuIdentity::default();
        let cu = ControlUnit::new(CuType::Engine, 0x10, id.clone(), resolved(true, &[]));
        assert_eq!(
            cu.supported_dc_groups(),
            DcGroups::TEMPORARY_DTCS | DcGroups::MEMORIZED_DTCS
        );

        let cu = ControlUnit::new(
            CuType::Engine,
            0x10,
            id,
            resolved(
                false,
                &[
                    Capability::IntegratedCruiseControl,
                    Capability::MemorizedCancelCodes,
                ],
            ),
        );
        assert_eq!(
            cu.supported_dc_groups(),
            DcGroups::CURRENT_DTCS
                | DcGroups::HISTORIC_DTCS
                | DcGroups::LATEST_CANCEL_CODES
                | DcGroups::MEMORIZED_CANCEL_CODES
        );
    }

    #[test]
    fn test_actuator_sweep_addresses() {
        let cu = ControlUnit::new(
            CuType::Engine,
            0x10,
            CuIdentity::default(),
            resolved(false, &[Capability::ActuatorTest]),
        );
        assert_eq!(cu.actuator_addresses(), &[0x61]);
        assert!(cu.require(Capability::ActuatorTest).is_ok());
        assert!(cu.require(Capability::Vin).is_err());
    }
}
