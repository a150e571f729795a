//! sdh-flash - Chunked transfer engine
//!
//! A byte range is cut into chunks that each fit the scratch buffer from
//! the chunk's offset within its first sector to the end of the buffer.
//! Each chunk then costs one block read, plus one block write on the
//! program path.

#[cfg(feature = "log")]
use log::trace;

#[cfg(feature = "defmt-log")]
use defmt::trace;

use super::scratch::{Merge, Scratch};
use super::{Error, SdhFlash};
use crate::{Block, BlockCount, BlockDevice, BlockIdx};

/// One whole-block hardware transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Chunk {
    /// Where the caller's bytes start within the first block.
    pub offset: usize,
    /// How many caller bytes this chunk moves.
    pub len: usize,
    pub start: BlockIdx,
    pub count: BlockCount,
}

impl Chunk {
    /// Does the caller data cover every byte of every block touched?
    pub fn is_whole_blocks(&self) -> bool {
        self.offset == 0 && self.len == self.count.0 as usize * Block::LEN
    }
}

/// Splits `[address, address + len)` into [`Chunk`]s.
#[derive(Debug, Clone)]
pub(crate) struct Chunks {
    address: u32,
    remaining: usize,
    buffer_len: usize,
}

impl Chunks {
    /// `buffer_len` must be a non-zero multiple of the block size.
    pub fn new(address: u32, len: usize, buffer_len: usize) -> Chunks {
        Chunks {
            address,
            remaining: len,
            buffer_len,
        }
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.remaining == 0 {
            return None;
        }
        let block_len = u64::from(Block::LEN_U32);
        let offset = (self.address % Block::LEN_U32) as usize;
        let len = self.remaining.min(self.buffer_len - offset);
        let start = BlockIdx::containing(self.address);
        // [start, end)
        let end = (u64::from(self.address) + len as u64 + block_len - 1) / block_len;
        let count = BlockCount((end - u64::from(start.0)) as u32);

        self.address = self.address.wrapping_add(len as u32);
        self.remaining -= len;

        Some(Chunk {
            offset,
            len,
            start,
            count,
        })
    }
}

impl<BD, const N: usize> SdhFlash<BD, N>
where
    BD: BlockDevice,
{
    /// Fill `data` from the card. The range must already be validated.
    pub(crate) fn read_chunks(
        &mut self,
        address: u32,
        data: &mut [u8],
    ) -> Result<(), Error<BD::Error>> {
        let mut done = 0;
        for chunk in Chunks::new(address, data.len(), Scratch::<N>::LEN) {
            trace!(
                "read: blocks {}+{}, offset {}, len {}",
                chunk.start.0,
                chunk.count.0,
                chunk.offset,
                chunk.len
            );
            self.device
                .read(self.scratch.blocks_mut(chunk.count), chunk.start, "read_data")
                .map_err(Error::Device)?;
            self.scratch.copy_out(chunk.offset, &mut data[done..done + chunk.len]);
            done += chunk.len;
        }
        Ok(())
    }

    /// Write `data` to the card, read-modify-write one chunk at a time. The
    /// range must already be validated.
    ///
    /// On failure, chunks before the failing one have already been written.
    pub(crate) fn program_chunks(
        &mut self,
        address: u32,
        data: &[u8],
        merge: Merge,
    ) -> Result<(), Error<BD::Error>> {
        let mut done = 0;
        for chunk in Chunks::new(address, data.len(), Scratch::<N>::LEN) {
            trace!(
                "program: blocks {}+{}, offset {}, len {}",
                chunk.start.0,
                chunk.count.0,
                chunk.offset,
                chunk.len
            );
            if !self.can_skip_pre_read(&chunk, merge) {
                self.device
                    .read(
                        self.scratch.blocks_mut(chunk.count),
                        chunk.start,
                        "program_data",
                    )
                    .map_err(Error::Device)?;
            }
            self.scratch.merge_in(chunk.offset, &data[done..done + chunk.len], merge);
            self.device
                .write(self.scratch.blocks(chunk.count), chunk.start)
                .map_err(Error::Device)?;
            done += chunk.len;
        }
        Ok(())
    }

    fn can_skip_pre_read(&self, chunk: &Chunk, merge: Merge) -> bool {
        self.config.skip_aligned_pre_read && merge == Merge::Overwrite && chunk.is_whole_blocks()
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
