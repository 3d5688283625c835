//! Measuring block / switch read plans.

use std::fmt;

use tracing::debug;

use super::check_len;
use crate::definitions::CuDefinitions;
use crate::error::SsmError;
use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    MeasuringBlock,
    Switch,
}

/// Selects one measuring block or switch by its index in the definition tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MbSwSelector {
    pub kind: BlockKind,
    pub index: usize,
}

impl MbSwSelector {
    pub fn block(index: usize) -> Self {
        Self {
            kind: BlockKind::MeasuringBlock,
            index,
        }
    }

    pub fn switch(index: usize) -> Self {
        Self {
            kind: BlockKind::Switch,
            index,
        }
    }
}

impl fmt::Display for MbSwSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BlockKind::MeasuringBlock => write!(f, "MB{}", self.index),
            BlockKind::Switch => write!(f, "SW{}", self.index),
        }
    }
}

/// Raw value of one selector. Scaling is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveValue {
    pub selector: MbSwSelector,
    pub raw: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Block { low: usize, high: Option<usize> },
    Switch { byte: usize, bit: u8 },
}

/// Frozen address plan of a live-data read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MbSwReadPlan {
    selectors: Vec<MbSwSelector>,
    addresses: Vec<u32>,
    slots: Vec<Slot>,
}

impl MbSwReadPlan {
    /// Expand selectors into a deduplicated address list.
    pub fn build(
        selectors: &[MbSwSelector],
        definitions: &CuDefinitions,
    ) -> Result<Self, SsmError> {
        if selectors.is_empty() {
            return Err(SsmError::InvalidArgument(
                "no measuring blocks or switches selected".into(),
            ));
        }
        let mut addresses: Vec<u32> = Vec::new();
        let mut slots = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let slot = match selector.kind {
                BlockKind::MeasuringBlock => {
                    let mb = definitions.measuring_blocks.get(selector.index).ok_or_else(|| {
                        SsmError::InvalidArgument(format!("unknown measuring block {}", selector))
                    })?;
                    Slot::Block {
                        low: slot_of(&mut addresses, mb.address_low),
                        high: mb.address_high.map(|a| slot_of(&mut addresses, a)),
                    }
                }
                BlockKind::Switch => {
                    let sw = definitions.switches.get(selector.index).ok_or_else(|| {
                        SsmError::InvalidArgument(format!("unknown switch {}", selector))
                    })?;
                    if !(1..=8).contains(&sw.bit) {
                        return Err(SsmError::InvalidArgument(format!(
                            "switch {} has invalid bit {}",
                            selector, sw.bit
                        )));
                    }
                    Slot::Switch {
                        byte: slot_of(&mut addresses, sw.address),
                        bit: sw.bit,
                    }
                }
            };
            slots.push(slot);
        }
        debug!(
            selectors = selectors.len(),
            addresses = addresses.len(),
            "Live-data plan built"
        );
        Ok(Self {
            selectors: selectors.to_vec(),
            addresses,
            slots,
        })
    }

    pub fn selectors(&self) -> &[MbSwSelector] {
        &self.selectors
    }

    /// Addresses to poll, in decode order.
    pub fn addresses(&self) -> &[u32] {
        &self.addresses
    }

    /// Reassemble raw values in selector order.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<LiveValue>, TransportError> {
        check_len(self.addresses.len(), bytes)?;
        Ok(self
            .selectors
            .iter()
            .zip(&self.slots)
            .map(|(selector, slot)| {
                let raw = match *slot {
                    Slot::Block { low, high } => {
                        bytes[low] as u32 + high.map_or(0, |h| 256 * bytes[h] as u32)
                    }
                    Slot::Switch { byte, bit } => ((bytes[byte] >> (bit - 1)) & 0x01) as u32,
                };
                LiveValue {
                    selector: *selector,
                    raw,
                }
            })
            .collect())
    }
}

fn slot_of(addresses: &mut Vec<u32>, address: u32) -> usize {
    match addresses.iter().position(|a| *a == address) {
        Some(pos) => pos,
        None => {
            addresses.push(address);
            addresses.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{MeasuringBlockDefinition, SwitchDefinition};

    fn definitions() -> CuDefinitions {
        let mb = |title: &str, low, high| MeasuringBlockDefinition {
            title: title.into(),
            unit: String::new(),
            address_low: low,
            address_high: high,
            scaling: None,
        };
        let sw = |title: &str, address, bit| SwitchDefinition {
            title: title.into(),
            unit: String::new(),
            address,
            bit,
        };
        CuDefinitions {
            measuring_blocks: vec![
                mb("Engine speed", 0x0F, Some(0x0E)),
                mb("Coolant temperature", 0x08, None),
                mb("Vehicle speed", 0x10, None),
            ],
            switches: vec![
                sw("Ignition switch", 0x62, 4),
                sw("Neutral switch", 0x62, 1),
                sw("Test mode", 0x61, 6),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_addresses_are_deduplicated() {
        let selectors = [
            MbSwSelector::block(0),
            MbSwSelector::switch(0),
            MbSwSelector::switch(1),
            MbSwSelector::block(1),
        ];
        let plan = MbSwReadPlan::build(&selectors, &definitions()).unwrap();
        assert_eq!(plan.addresses(), &[0x0F, 0x0E, 0x62, 0x08]);
    }

    #[test]
    fn test_decode_in_selector_order() {
        let selectors = [
            MbSwSelector::switch(2),
            MbSwSelector::block(0),
            MbSwSelector::switch(0),
            MbSwSelector::switch(1),
            MbSwSelector::block(2),
        ];
        let plan = MbSwReadPlan::build(&selectors, &definitions()).unwrap();
        // 0x61, 0x0F, 0x0E, 0x62, 0x10
        assert_eq!(plan.addresses(), &[0x61, 0x0F, 0x0E, 0x62, 0x10]);
        let values = plan.decode(&[0x20, 0x34, 0x12, 0x08, 0x50]).unwrap();
        let raws: Vec<u32> = values.iter().map(|v| v.raw).collect();
        assert_eq!(raws, vec![1, 0x1234, 1, 0, 0x50]);
        assert_eq!(values[1].selector, MbSwSelector::block(0));
    }

    #[test]
    fn test_invalid_selection() {
        let defs = definitions();
        assert!(matches!(
            MbSwReadPlan::build(&[], &defs),
            Err(SsmError::InvalidArgument(_))
        ));
        assert!(matches!(
            MbSwReadPlan::build(&[MbSwSelector::block(3)], &defs),
            Err(SsmError::InvalidArgument(_))
        ));
        assert!(matches!(
            MbSwReadPlan::build(&[MbSwSelector::switch(9)], &defs),
            Err(SsmError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let plan = MbSwReadPlan::build(&[MbSwSelector::block(1)], &definitions()).unwrap();
        assert!(plan.decode(&[0x01, 0x02]).is_err());
    }
}
