//! sdh-flash - Geometry, status and capability records

use super::config::DataWidth;
use crate::Block;

/// Flash geometry as seen by the caller.
///
/// `sector_count` stays at zero until a card has been probed, so a zero here
/// means "no medium" rather than "empty medium".
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlashInfo {
    pub sector_count: u32,
    pub sector_size: u32,
    pub page_size: u32,
    pub program_unit: u32,
    pub erased_value: u8,
}

impl FlashInfo {
    /// Geometry of a not-yet-probed card.
    pub const fn unprobed(erased_value: u8) -> FlashInfo {
        FlashInfo {
            sector_count: 0,
            sector_size: Block::LEN_U32,
            page_size: 4,
            program_unit: 4,
            erased_value,
        }
    }

    /// Total addressable bytes.
    pub fn capacity_bytes(&self) -> u64 {
        u64::from(self.sector_size) * u64::from(self.sector_count)
    }
}

bitflags::bitflags! {
    /// Driver status. All transfers are blocking, so nothing is ever in
    /// flight by the time a caller can look.
    pub struct FlashStatus: u8 {
        const BUSY = (1 << 0);
        const ERROR = (1 << 1);
    }
}

impl FlashStatus {
    pub fn is_ready(&self) -> bool {
        self.is_empty()
    }
}

/// A `major.minor` version pair.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    /// Packed as `0xMMmm`.
    pub fn packed(&self) -> u16 {
        (u16::from(self.major) << 8) | u16::from(self.minor)
    }
}

/// Versions of the flash driver interface and of this implementation.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DriverVersion {
    pub api: Version,
    pub driver: Version,
}

impl DriverVersion {
    pub const CURRENT: DriverVersion = DriverVersion {
        api: Version { major: 2, minor: 2 },
        driver: Version { major: 1, minor: 0 },
    };
}

/// What this driver can do.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Signals a ready event when a transfer completes.
    pub event_ready: bool,
    pub data_width: DataWidth,
    /// Supports erasing the whole device in one call.
    pub erase_chip: bool,
}

/// Requested power state.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PowerState {
    Off,
    Low,
    Full,
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
