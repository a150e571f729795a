//! sdh-flash - Block Device support
//!
//! The block transport sits underneath the flash layer. It only ever moves
//! whole 512-byte blocks and reports what card it found when probed.

#[cfg(feature = "refcell-blockdevice")]
mod refcell;

mod block;
pub use block::*;

use core::convert::TryFrom;

use crate::HostConfig;

/// The different types of card a probe can report.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CardType {
    /// Standard capacity card, version 1 of the physical layer spec.
    SD1,
    /// Standard capacity card, version 2 of the physical layer spec.
    SD2,
    /// High capacity card (block addressed).
    SDHC,
    /// The host saw something but could not work out what.
    Unknown,
}

/// What a probe found in the slot.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CardInfo {
    pub card_type: CardType,
    pub total_blocks: BlockCount,
}

impl CardInfo {
    /// A card we can actually use: a known type with a non-zero capacity.
    pub fn is_usable(&self) -> bool {
        self.card_type != CardType::Unknown && self.total_blocks.0 != 0
    }
}

/// Represents a block device - a device which can read and write blocks (or
/// sectors). Only supports devices which are <= 2 TiB in size.
///
/// Every call is blocking and all-or-nothing: either every requested block
/// moved or an error comes back.
pub trait BlockDevice {
    /// The errors that the `BlockDevice` can return. Must be debug formattable.
    type Error: core::fmt::Debug;

    /// Take the host controller out of reset, clock it and open it.
    fn open(&mut self, _host: &HostConfig) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Gate the host controller clock off again.
    fn close(&mut self, _host: &HostConfig) {}

    /// Look for a card and report its type and size.
    fn probe(&mut self) -> Result<CardInfo, Self::Error>;

    /// Read one or more blocks, starting at the given block index.
    fn read(
        &mut self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        reason: &str,
    ) -> Result<(), Self::Error>;

    /// Write one or more blocks, starting at the given block index.
    fn write(&mut self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error>;
}

impl<T> BlockDevice for &mut T
where
    T: BlockDevice,
{
    type Error = T::Error;

    fn open(&mut self, host: &HostConfig) -> Result<(), Self::Error> {
        (*self).open(host)
    }

    fn close(&mut self, host: &HostConfig) {
        (*self).close(host)
    }

    fn probe(&mut self) -> Result<CardInfo, Self::Error> {
        (*self).probe()
    }

    fn read(
        &mut self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        reason: &str,
    ) -> Result<(), Self::Error> {
        (*self).read(blocks, start_block_idx, reason)
    }

    fn write(&mut self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        (*self).write(blocks, start_block_idx)
    }
}

/// A RAM-backed block device. It probes as an SDHC card holding
/// `memory.len() / 512` blocks.
#[derive(Debug)]
pub struct MemoryBlockDevice<'a> {
    memory: &'a mut [u8],
}

impl<'a> MemoryBlockDevice<'a> {
    pub fn new(memory: &'a mut [u8]) -> Self {
        Self { memory }
    }

    /// The raw backing store.
    pub fn memory(&self) -> &[u8] {
        self.memory
    }

    fn block_span(&self, block_idx: BlockIdx) -> Result<core::ops::Range<usize>, ()> {
        let start = usize::try_from(block_idx.into_bytes()).map_err(|_| ())?;
        let end = start.checked_add(Block::LEN).ok_or(())?;
        if end > self.memory.len() {
            return Err(());
        }
        Ok(start..end)
    }
}

impl<'a> BlockDevice for MemoryBlockDevice<'a> {
    type Error = ();

    fn probe(&mut self) -> Result<CardInfo, Self::Error> {
        Ok(CardInfo {
            card_type: CardType::SDHC,
            total_blocks: BlockCount((self.memory.len() / Block::LEN) as u32),
        })
    }

    fn read(
        &mut self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        _reason: &str,
    ) -> Result<(), Self::Error> {
        let indices = start_block_idx.range(BlockCount(blocks.len() as u32));
        for (block, idx) in blocks.iter_mut().zip(indices) {
            let span = self.block_span(idx)?;
            block.contents.copy_from_slice(&self.memory[span]);
        }
        Ok(())
    }

    fn write(&mut self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        let indices = start_block_idx.range(BlockCount(blocks.len() as u32));
        for (block, idx) in blocks.iter().zip(indices) {
            let span = self.block_span(idx)?;
            self.memory[span].copy_from_slice(&block.contents);
        }
        Ok(())
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
