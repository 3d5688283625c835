//! Diagnostic-code read plans.

use tracing::debug;

use super::check_len;
use crate::definitions::{
    Capabilities, Capability, CuDefinitions, CuType, DiagnosticCode, DiagnosticCodeDefinition,
};
use crate::error::SsmError;
use crate::protocol::constants::{ADDR_STATUS, STATUS_D_CHECK_BIT, STATUS_TEST_MODE_BIT};
use crate::protocol::DcGroups;
use crate::transport::TransportError;

/// Engine status flags read along with current/temporary DTCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtcStatus {
    pub test_mode: bool,
    pub d_check_active: bool,
}

impl DtcStatus {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            test_mode: byte & STATUS_TEST_MODE_BIT != 0,
            d_check_active: byte & STATUS_D_CHECK_BIT != 0,
        }
    }
}

/// Codes decoded for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcGroupCodes {
    pub group: DcGroups,
    pub codes: Vec<DiagnosticCode>,
}

/// One decoded cycle of a diagnostic-code read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcReadout {
    pub status: Option<DtcStatus>,
    pub groups: Vec<DcGroupCodes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Dtc,
    CancelCodes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    group: DcGroups,
    table: Table,
    /// Current/temporary/latest byte if true, historic/memorized otherwise.
    current: bool,
    start: usize,
}

/// Frozen address plan of a diagnostic-code read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcReadPlan {
    groups: DcGroups,
    status_byte: bool,
    addresses: Vec<u32>,
    segments: Vec<Segment>,
}

impl DcReadPlan {
    /// Validate `groups` against the control unit and build the address list.
    ///
    /// Order: status byte (engine, current/temporary family), current or
    /// temporary DTCs, historic or memorized DTCs, latest cancel codes,
    /// memorized cancel codes.
    pub fn build(
        groups: DcGroups,
        cu_type: CuType,
        capabilities: Capabilities,
        definitions: &CuDefinitions,
    ) -> Result<Self, SsmError> {
        if groups.is_empty() || groups.bits() & !DcGroups::all().bits() != 0 {
            return Err(SsmError::InvalidArgument(format!(
                "diagnostic-code group mask 0x{:02X} out of range",
                groups.bits()
            )));
        }
        if groups.mixes_schemes() {
            return Err(SsmError::InvalidArgument(
                "current/historic and temporary/memorized DTC groups are exclusive".into(),
            ));
        }
        if groups.intersects(DcGroups::CANCEL_CODES)
            && !capabilities.has(Capability::IntegratedCruiseControl)
        {
            return Err(SsmError::Unsupported(Capability::IntegratedCruiseControl));
        }
        if groups.contains(DcGroups::MEMORIZED_CANCEL_CODES)
            && !capabilities.has(Capability::MemorizedCancelCodes)
        {
            return Err(SsmError::Unsupported(Capability::MemorizedCancelCodes));
        }

        let mut plan = Self {
            groups,
            status_byte: false,
            addresses: Vec::new(),
            segments: Vec::new(),
        };

        if groups.intersects(DcGroups::CURRENT_FAMILY) {
            if cu_type == CuType::Engine {
                plan.status_byte = true;
                plan.addresses.push(ADDR_STATUS);
            }
            let group = if groups.contains(DcGroups::CURRENT_DTCS) {
                DcGroups::CURRENT_DTCS
            } else {
                DcGroups::TEMPORARY_DTCS
            };
            plan.push_segment(group, Table::Dtc, true, &definitions.diagnostic_codes);
        }
        if groups.intersects(DcGroups::STORED_FAMILY) {
            let group = if groups.contains(DcGroups::HISTORIC_DTCS) {
                DcGroups::HISTORIC_DTCS
            } else {
                DcGroups::MEMORIZED_DTCS
            };
            plan.push_segment(group, Table::Dtc, false, &definitions.diagnostic_codes);
        }
        if groups.contains(DcGroups::LATEST_CANCEL_CODES) {
            plan.push_segment(
                DcGroups::LATEST_CANCEL_CODES,
                Table::CancelCodes,
                true,
                &definitions.cancel_codes,
            );
        }
        if groups.contains(DcGroups::MEMORIZED_CANCEL_CODES) {
            plan.push_segment(
                DcGroups::MEMORIZED_CANCEL_CODES,
                Table::CancelCodes,
                false,
                &definitions.cancel_codes,
            );
        }

        if plan.code_address_count() == 0 {
            return Err(SsmError::InvalidArgument(format!(
                "no diagnostic-code addresses to read for {}",
                groups
            )));
        }
        debug!(groups = %groups, addresses = plan.addresses.len(), "Diagnostic-code plan built");
        Ok(plan)
    }

    fn push_segment(
        &mut self,
        group: DcGroups,
        table: Table,
        current: bool,
        defs: &[DiagnosticCodeDefinition],
    ) {
        self.segments.push(Segment {
            group,
            table,
            current,
            start: self.addresses.len(),
        });
        self.addresses.extend(defs.iter().map(|def| {
            if current {
                def.current_address
            } else {
                def.historic_address
            }
        }));
    }

    /// The validated group selection this plan was built for.
    pub fn groups(&self) -> DcGroups {
        self.groups
    }

    /// Addresses to poll, in decode order.
    pub fn addresses(&self) -> &[u32] {
        &self.addresses
    }

    pub fn has_status_byte(&self) -> bool {
        self.status_byte
    }

    fn code_address_count(&self) -> usize {
        self.addresses.len() - usize::from(self.status_byte)
    }

    /// Decode one cycle of raw bytes, aligned with [`Self::addresses`].
    pub fn decode(
        &self,
        definitions: &CuDefinitions,
        bytes: &[u8],
    ) -> Result<DcReadout, TransportError> {
        check_len(self.addresses.len(), bytes)?;
        let status = self.status_byte.then(|| DtcStatus::from_byte(bytes[0]));
        let groups = self
            .segments
            .iter()
            .map(|segment| {
                let table = match segment.table {
                    Table::Dtc => &definitions.diagnostic_codes,
                    Table::CancelCodes => &definitions.cancel_codes,
                };
                let codes = table
                    .iter()
                    .enumerate()
                    .flat_map(|(k, def)| {
                        let address = if segment.current {
                            def.current_address
                        } else {
                            def.historic_address
                        };
                        def.decode(address, bytes[segment.start + k])
                    })
                    .collect();
                DcGroupCodes {
                    group: segment.group,
                    codes,
                }
            })
            .collect();
        Ok(DcReadout { status, groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::CodeBit;

    fn code(bit: u8, code: &str) -> CodeBit {
        CodeBit {
            bit,
            code: code.into(),
            description: format!("{} description", code),
        }
    }

    fn definitions() -> CuDefinitions {
        CuDefinitions {
            dtc_format_obd2: false,
            diagnostic_codes: vec![
                DiagnosticCodeDefinition {
                    current_address: 0x8E,
                    historic_address: 0xA4,
                    codes: vec![code(1, "P0335"), code(2, "P0340")],
                },
                DiagnosticCodeDefinition {
                    current_address: 0x8F,
                    historic_address: 0xA5,
                    codes: vec![code(1, "P0500")],
                },
            ],
            cancel_codes: vec![DiagnosticCodeDefinition {
                current_address: 0x130,
                historic_address: 0x131,
                codes: vec![code(1, "CC_BRAKE"), code(2, "CC_CLUTCH")],
            }],
            ..Default::default()
        }
    }

    fn cc_caps() -> Capabilities {
        [
            Capability::IntegratedCruiseControl,
            Capability::MemorizedCancelCodes,
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_rejects_out_of_range_masks() {
        let defs = definitions();
        for mask in [0x00, 0x40] {
            let groups = DcGroups::from_bits_retain(mask);
            let err = DcReadPlan::build(groups, CuType::Engine, cc_caps(), &defs).unwrap_err();
            assert!(matches!(err, SsmError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_rejects_mixed_schemes() {
        let groups = DcGroups::CURRENT_DTCS | DcGroups::MEMORIZED_DTCS;
        let err =
            DcReadPlan::build(groups, CuType::Engine, cc_caps(), &definitions()).unwrap_err();
        assert!(matches!(err, SsmError::InvalidArgument(_)));
    }

    #[test]
    fn test_cancel_codes_need_capabilities() {
        let defs = definitions();
        let err = DcReadPlan::build(
            DcGroups::LATEST_CANCEL_CODES,
            CuType::Engine,
            Capabilities::empty(),
            &defs,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SsmError::Unsupported(Capability::IntegratedCruiseControl)
        ));

        let cc_only: Capabilities = [Capability::IntegratedCruiseControl].into_iter().collect();
        assert!(
            DcReadPlan::build(DcGroups::LATEST_CANCEL_CODES, CuType::Engine, cc_only, &defs)
                .is_ok()
        );
        let err = DcReadPlan::build(
            DcGroups::LATEST_CANCEL_CODES | DcGroups::MEMORIZED_CANCEL_CODES,
            CuType::Engine,
            cc_only,
            &defs,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SsmError::Unsupported(Capability::MemorizedCancelCodes)
        ));
    }

    #[test]
    fn test_address_order() {
        let groups = DcGroups::CURRENT_DTCS
            | DcGroups::HISTORIC_DTCS
            | DcGroups::LATEST_CANCEL_CODES
            | DcGroups::MEMORIZED_CANCEL_CODES;
        let plan = DcReadPlan::build(groups, CuType::Engine, cc_caps(), &definitions()).unwrap();
        assert_eq!(
            plan.addresses(),
            &[0x61, 0x8E, 0x8F, 0xA4, 0xA5, 0x130, 0x131]
        );
        assert!(plan.has_status_byte());
    }

    #[test]
    fn test_no_status_byte_for_transmission_or_stored_only() {
        let defs = definitions();
        let plan =
            DcReadPlan::build(DcGroups::TEMPORARY_DTCS, CuType::Transmission, cc_caps(), &defs)
                .unwrap();
        assert_eq!(plan.addresses(), &[0x8E, 0x8F]);

        let plan =
            DcReadPlan::build(DcGroups::HISTORIC_DTCS, CuType::Engine, cc_caps(), &defs).unwrap();
        assert_eq!(plan.addresses(), &[0xA4, 0xA5]);
        assert!(!plan.has_status_byte());
    }

    #[test]
    fn test_status_byte_alone_is_rejected() {
        let defs = CuDefinitions::default();
        let err = DcReadPlan::build(DcGroups::CURRENT_DTCS, CuType::Engine, cc_caps(), &defs)
            .unwrap_err();
        assert!(matches!(err, SsmError::InvalidArgument(_)));
    }

    #[test]
    fn test_decode_follows_plan_order() {
        let defs = definitions();
        let cases: Vec<(DcGroups, Vec<u8>, Vec<(DcGroups, Vec<&str>)>)> = vec![
            (
                DcGroups::CURRENT_DTCS | DcGroups::HISTORIC_DTCS,
                vec![0xA0, 0x03, 0x00, 0x00, 0x01],
                vec![
                    (DcGroups::CURRENT_DTCS, vec!["P0335", "P0340"]),
                    (DcGroups::HISTORIC_DTCS, vec!["P0500"]),
                ],
            ),
            (
                DcGroups::MEMORIZED_DTCS | DcGroups::LATEST_CANCEL_CODES,
                vec![0x02, 0x00, 0x02],
                vec![
                    (DcGroups::MEMORIZED_DTCS, vec!["P0340"]),
                    (DcGroups::LATEST_CANCEL_CODES, vec!["CC_CLUTCH"]),
                ],
            ),
            (
                DcGroups::MEMORIZED_CANCEL_CODES,
                vec![0x05],
                vec![(DcGroups::MEMORIZED_CANCEL_CODES, vec!["CC_BRAKE", "???"])],
            ),
        ];

        for (groups, bytes, expected) in cases {
            let plan = DcReadPlan::build(groups, CuType::Engine, cc_caps(), &defs).unwrap();
            let readout = plan.decode(&defs, &bytes).unwrap();
            let got: Vec<(DcGroups, Vec<&str>)> = readout
                .groups
                .iter()
                .map(|g| (g.group, g.codes.iter().map(|c| c.code.as_str()).collect()))
                .collect();
            assert_eq!(got, expected, "groups {}", groups);
        }
    }

    #[test]
    fn test_decode_status_byte() {
        let defs = definitions();
        let plan = DcReadPlan::build(DcGroups::CURRENT_DTCS, CuType::Engine, cc_caps(), &defs)
            .unwrap();
        let readout = plan.decode(&defs, &[0xA0, 0x00, 0x00]).unwrap();
        assert_eq!(
            readout.status,
            Some(DtcStatus {
                test_mode: true,
                d_check_active: true
            })
        );
        assert!(readout.groups[0].codes.is_empty());
    }

    #[test]
    fn test_decode_length_mismatch() {
        let defs = definitions();
        let plan = DcReadPlan::build(DcGroups::CURRENT_DTCS, CuType::Engine, cc_caps(), &defs)
            .unwrap();
        let err = plan.decode(&defs, &[0x00, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            TransportError::UnexpectedLength {
                expected: 3,
                actual: 2
            }
        ));
    }
}
