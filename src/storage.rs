//! sdh-flash - `embedded-storage` support
//!
//! Lets the flash view plug into anything written against
//! [`NorFlash`](embedded_storage::nor_flash::NorFlash). Reads and writes are
//! byte granular whatever element width the driver was configured with, and
//! writes keep NOR semantics even with program attribute emulation off.

use core::convert::TryFrom;
use core::fmt::Debug;

use embedded_storage::nor_flash::{
    ErrorType, MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use crate::{Block, BlockDevice, FlashError, SdhFlash};

impl<E> NorFlashError for FlashError<E>
where
    E: Debug,
{
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            FlashError::InvalidParameter => NorFlashErrorKind::OutOfBounds,
            FlashError::MediumAbsent | FlashError::Device(_) | FlashError::Unsupported => {
                NorFlashErrorKind::Other
            }
        }
    }
}

impl<BD, const N: usize> ErrorType for SdhFlash<BD, N>
where
    BD: BlockDevice,
{
    type Error = FlashError<BD::Error>;
}

impl<BD, const N: usize> ReadNorFlash for SdhFlash<BD, N>
where
    BD: BlockDevice,
{
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.read_bytes(offset, bytes)
    }

    fn capacity(&self) -> usize {
        usize::try_from(self.info().capacity_bytes()).unwrap_or(usize::MAX)
    }
}

impl<BD, const N: usize> NorFlash for SdhFlash<BD, N>
where
    BD: BlockDevice,
{
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = Block::LEN;

    /// Erase `[from, to)`, one sector at a time. Both ends must be sector
    /// aligned.
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.erase_range(from, to)
    }

    /// Writes always AND into the card, so a second write can only clear
    /// more bits.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.program_bits(offset, bytes)
    }
}

impl<BD, const N: usize> MultiwriteNorFlash for SdhFlash<BD, N> where BD: BlockDevice {}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
