//! sdh-flash - The DMA scratch buffer
//!
//! Every byte moving between a caller and the card passes through here.

use crate::{Block, BlockCount};

/// How caller data lands in the scratch buffer on the write path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Merge {
    /// Plain block storage.
    Overwrite,
    /// NOR flash: a 0 bit on the card stays 0.
    And,
}

const BLANK: Block = Block::new();

/// `N` whole blocks, contiguous and word aligned.
pub(crate) struct Scratch<const N: usize> {
    blocks: [Block; N],
}

impl<const N: usize> Scratch<N> {
    pub const LEN: usize = N * Block::LEN;

    pub fn new() -> Self {
        Scratch {
            blocks: [BLANK; N],
        }
    }

    pub fn blocks(&self, count: BlockCount) -> &[Block] {
        &self.blocks[..count.0 as usize]
    }

    pub fn blocks_mut(&mut self, count: BlockCount) -> &mut [Block] {
        &mut self.blocks[..count.0 as usize]
    }

    fn bytes(&self) -> impl Iterator<Item = &u8> {
        self.blocks.iter().flat_map(|block| block.contents.iter())
    }

    fn bytes_mut(&mut self) -> impl Iterator<Item = &mut u8> {
        self.blocks.iter_mut().flat_map(|block| block.contents.iter_mut())
    }

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    pub fn copy_out(&self, offset: usize, out: &mut [u8]) {
        for (dst, src) in out.iter_mut().zip(self.bytes().skip(offset)) {
            *dst = *src;
        }
    }

    /// Combine `data` into the buffer starting at `offset`.
    pub fn merge_in(&mut self, offset: usize, data: &[u8], merge: Merge) {
        let slots = self.bytes_mut().skip(offset);
        match merge {
            Merge::Overwrite => {
                for (dst, src) in slots.zip(data) {
                    *dst = *src;
                }
            }
            Merge::And => {
                for (dst, src) in slots.zip(data) {
                    *dst &= *src;
                }
            }
        }
    }

    pub fn fill(&mut self, value: u8) {
        for byte in self.bytes_mut() {
            *byte = value;
        }
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
