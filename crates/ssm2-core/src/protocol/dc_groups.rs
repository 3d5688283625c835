//! Diagnostic-code group selection.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Diagnostic-code groups that can be polled together.
    ///
    /// `CURRENT_DTCS`/`HISTORIC_DTCS` and `TEMPORARY_DTCS`/`MEMORIZED_DTCS` are
    /// the two DTC addressing schemes; a CU uses one or the other.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DcGroups: u8 {
        const CURRENT_DTCS = 0x01;
        const HISTORIC_DTCS = 0x02;
        const TEMPORARY_DTCS = 0x04;
        const MEMORIZED_DTCS = 0x08;
        const LATEST_CANCEL_CODES = 0x10;
        const MEMORIZED_CANCEL_CODES = 0x20;
    }
}

impl DcGroups {
    /// Current or temporary DTCs (read together with the status byte).
    pub const CURRENT_FAMILY: Self = Self::CURRENT_DTCS.union(Self::TEMPORARY_DTCS);
    /// Historic or memorized DTCs.
    pub const STORED_FAMILY: Self = Self::HISTORIC_DTCS.union(Self::MEMORIZED_DTCS);
    /// Cruise control cancel codes.
    pub const CANCEL_CODES: Self = Self::LATEST_CANCEL_CODES.union(Self::MEMORIZED_CANCEL_CODES);

    const CURRENT_SCHEME: Self = Self::CURRENT_DTCS.union(Self::HISTORIC_DTCS);
    const OBD2_SCHEME: Self = Self::TEMPORARY_DTCS.union(Self::MEMORIZED_DTCS);

    /// Parse a raw mask. Zero and masks with undefined bits are rejected.
    pub fn from_mask(mask: u8) -> Option<Self> {
        Self::from_bits(mask).filter(|groups| !groups.is_empty())
    }

    /// True if both DTC addressing schemes are requested at once.
    pub fn mixes_schemes(self) -> bool {
        self.intersects(Self::CURRENT_SCHEME) && self.intersects(Self::OBD2_SCHEME)
    }

    /// Short label for a single group.
    pub fn label(self) -> &'static str {
        GROUP_LABELS
            .iter()
            .find(|(group, _)| *group == self)
            .map(|(_, label)| *label)
            .unwrap_or("group set")
    }
}

const GROUP_LABELS: [(DcGroups, &str); 6] = [
    (DcGroups::CURRENT_DTCS, "current DTCs"),
    (DcGroups::HISTORIC_DTCS, "historic DTCs"),
    (DcGroups::TEMPORARY_DTCS, "temporary DTCs"),
    (DcGroups::MEMORIZED_DTCS, "memorized DTCs"),
    (DcGroups::LATEST_CANCEL_CODES, "latest cancel codes"),
    (DcGroups::MEMORIZED_CANCEL_CODES, "memorized cancel codes"),
];

impl fmt::Display for DcGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(DcGroups::label).collect();
        if labels.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", labels.join(", "))
        }
    }
}
