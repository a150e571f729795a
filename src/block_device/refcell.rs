use core::cell::RefCell;

use crate::{Block, BlockDevice, BlockIdx, CardInfo, HostConfig};

impl<T> BlockDevice for RefCell<T>
where
    T: BlockDevice,
{
    type Error = T::Error;

    fn open(&mut self, host: &HostConfig) -> Result<(), Self::Error> {
        self.get_mut().open(host)
    }

    fn close(&mut self, host: &HostConfig) {
        self.get_mut().close(host)
    }

    fn probe(&mut self) -> Result<CardInfo, Self::Error> {
        self.get_mut().probe()
    }

    fn read(
        &mut self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        reason: &str,
    ) -> Result<(), Self::Error> {
        self.get_mut().read(blocks, start_block_idx, reason)
    }

    fn write(&mut self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        self.get_mut().write(blocks, start_block_idx)
    }
}

/// Lets several owners share one transport, e.g. two flash views onto the
/// same card. Panics if a transfer is re-entered while another is running.
impl<T> BlockDevice for &RefCell<T>
where
    T: BlockDevice,
{
    type Error = T::Error;

    fn open(&mut self, host: &HostConfig) -> Result<(), Self::Error> {
        self.borrow_mut().open(host)
    }

    fn close(&mut self, host: &HostConfig) {
        self.borrow_mut().close(host)
    }

    fn probe(&mut self) -> Result<CardInfo, Self::Error> {
        self.borrow_mut().probe()
    }

    fn read(
        &mut self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        reason: &str,
    ) -> Result<(), Self::Error> {
        let mut underlying = self.borrow_mut();
        underlying.read(blocks, start_block_idx, reason)
    }

    fn write(&mut self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        let mut underlying = self.borrow_mut();
        underlying.write(blocks, start_block_idx)
    }
}
