//! sdh-flash - Address validation

use super::info::FlashInfo;
use crate::Block;

/// Does `[address, address + size)` lie inside the probed medium?
///
/// Sizes are widened to 64 bits so a range ending exactly at 4 GiB on a
/// large card does not wrap.
pub(crate) fn is_range_valid(info: &FlashInfo, address: u32, size: u32) -> bool {
    if info.sector_size != Block::LEN_U32 {
        return false;
    }
    u64::from(address) + u64::from(size) <= info.capacity_bytes()
}

/// Is the sector holding `address` inside the probed medium?
pub(crate) fn is_sector_valid(info: &FlashInfo, address: u32) -> bool {
    let sector_start = address - (address % Block::LEN_U32);
    is_range_valid(info, sector_start, info.sector_size)
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
