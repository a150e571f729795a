//! sdh-flash - Flash emulation on top of an SD host
//!
//! Presents a block device as byte addressable NOR-style flash: reads and
//! programs at any offset and length, erase in 512-byte sectors.
//!
//! All transfers go through one scratch buffer owned by the driver, and
//! every operation takes `&mut self`, so only one transfer can be in flight.
//! Callers sharing the driver between contexts must wrap it in their own
//! lock.

pub mod config;
pub mod info;
mod range;
mod scratch;
mod transfer;

use core::convert::TryFrom;
use core::fmt::Debug;

#[cfg(feature = "log")]
use log::{debug, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, warn};

use self::config::{AbsentMediumPolicy, FlashConfig, HostConfig, PlatformReady};
use self::info::{Capabilities, DriverVersion, FlashInfo, FlashStatus, PowerState};
use self::scratch::{Merge, Scratch};
use crate::{Block, BlockCount, BlockDevice, BlockIdx, CardInfo};

/// The possible errors `SdhFlash` can generate.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error<E>
where
    E: Debug,
{
    /// No usable card was found when the driver was initialized
    MediumAbsent,
    /// The range does not fit the medium, or the buffer is not a whole
    /// number of elements
    InvalidParameter,
    /// The block device failed
    Device(E),
    /// The driver does not support this operation
    Unsupported,
}

/// Flash view onto one SD host controller.
///
/// `N` is the scratch buffer size in blocks. A bigger buffer lets one
/// hardware transfer cover several sectors.
pub struct SdhFlash<BD, const N: usize = 1>
where
    BD: BlockDevice,
{
    device: BD,
    host: HostConfig,
    config: FlashConfig,
    info: FlashInfo,
    card: Option<CardInfo>,
    status: FlashStatus,
    scratch: Scratch<N>,
}

impl<BD, const N: usize> SdhFlash<BD, N>
where
    BD: BlockDevice,
{
    /// Bind a block device to a host controller. Nothing touches the
    /// hardware until [`initialize`](Self::initialize).
    ///
    /// # Panics
    ///
    /// If `N` is zero.
    pub fn new(device: BD, host: HostConfig, config: FlashConfig, _ready: PlatformReady) -> Self {
        assert!(N > 0, "scratch buffer must hold at least one block");
        SdhFlash {
            device,
            host,
            config,
            info: FlashInfo::unprobed(config.erased_value),
            card: None,
            status: FlashStatus::empty(),
            scratch: Scratch::new(),
        }
    }

    /// Open the host controller and probe for a card.
    ///
    /// With [`AbsentMediumPolicy::Dummy`] a missing card is not an error:
    /// the driver then behaves like a blank device with no sectors.
    pub fn initialize(&mut self) -> Result<(), Error<BD::Error>> {
        debug!("initializing, policy {:?}", self.config.absent_policy);
        self.device.open(&self.host).map_err(Error::Device)?;

        let probed = match self.device.probe() {
            Ok(card) if card.is_usable() => Some(card),
            Ok(card) => {
                warn!(
                    "unusable card: {:?}, {} blocks",
                    card.card_type,
                    card.total_blocks.0
                );
                None
            }
            Err(e) => {
                #[cfg(feature = "log")]
                warn!("no card found: {:?}", e);
                #[cfg(feature = "defmt-log")]
                warn!("no card found: {:?}", defmt::Debug2Format(&e));
                None
            }
        };

        self.card = probed;
        match probed {
            Some(card) => {
                debug!(
                    "card {:?} with {} sectors",
                    card.card_type,
                    card.total_blocks.0
                );
                self.info.sector_count = card.total_blocks.0;
                Ok(())
            }
            None => {
                self.info.sector_count = 0;
                match self.config.absent_policy {
                    AbsentMediumPolicy::Strict => Err(Error::MediumAbsent),
                    AbsentMediumPolicy::Dummy => {
                        debug!("standing in a blank dummy card");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Gate the host clock off. The probed geometry is kept.
    pub fn uninitialize(&mut self) {
        self.device.close(&self.host);
    }

    /// Only full power is supported.
    pub fn power_control(&mut self, state: PowerState) -> Result<(), Error<BD::Error>> {
        match state {
            PowerState::Full => Ok(()),
            PowerState::Low | PowerState::Off => Err(Error::Unsupported),
        }
    }

    /// Read `data.len()` bytes from `address`. Returns the number of
    /// elements read, which is always all of them.
    pub fn read_data(&mut self, address: u32, data: &mut [u8]) -> Result<usize, Error<BD::Error>> {
        let width = self.element_bytes(data.len())?;
        self.read_bytes(address, data)?;
        Ok(data.len() / width)
    }

    /// Program `data` at `address`. Returns the number of elements
    /// programmed, which is always all of them.
    ///
    /// With program attribute emulation on, bits already 0 on the card stay
    /// 0 whatever `data` holds.
    pub fn program_data(&mut self, address: u32, data: &[u8]) -> Result<usize, Error<BD::Error>> {
        let width = self.element_bytes(data.len())?;
        let merge = if self.config.program_attribute {
            Merge::And
        } else {
            Merge::Overwrite
        };
        self.program_bytes(address, data, merge)?;
        Ok(data.len() / width)
    }

    /// Set every byte of the sector holding `address` to the erased value.
    pub fn erase_sector(&mut self, address: u32) -> Result<(), Error<BD::Error>> {
        self.init_guard();
        if self.medium_absent()? {
            return Ok(());
        }
        if !range::is_sector_valid(&self.info, address) {
            warn!("erase of sector at {:#x} rejected", address);
            return Err(Error::InvalidParameter);
        }

        self.scratch.fill(self.info.erased_value);
        self.device
            .write(self.scratch.blocks(BlockCount(1)), BlockIdx::containing(address))
            .map_err(Error::Device)
    }

    /// Whole-chip erase would be one slow sector write per sector. Callers
    /// that need it must loop over [`erase_sector`](Self::erase_sector).
    pub fn erase_chip(&mut self) -> Result<(), Error<BD::Error>> {
        Err(Error::Unsupported)
    }

    /// Current geometry. A zero `sector_count` means no card was probed.
    pub fn info(&self) -> &FlashInfo {
        &self.info
    }

    /// What the last successful probe found.
    pub fn card(&self) -> Option<&CardInfo> {
        self.card.as_ref()
    }

    pub fn status(&self) -> FlashStatus {
        self.status
    }

    pub fn version(&self) -> DriverVersion {
        DriverVersion::CURRENT
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            event_ready: false,
            data_width: self.config.data_width,
            erase_chip: false,
        }
    }

    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    /// Borrow the underlying block device.
    pub fn device(&self) -> &BD {
        &self.device
    }

    /// Give back the underlying block device.
    pub fn release(self) -> BD {
        self.device
    }

    /// Byte-granular read with no element bookkeeping.
    pub(crate) fn read_bytes(
        &mut self,
        address: u32,
        data: &mut [u8],
    ) -> Result<(), Error<BD::Error>> {
        self.init_guard();
        if self.medium_absent()? {
            for byte in data.iter_mut() {
                *byte = self.info.erased_value;
            }
            return Ok(());
        }
        self.check_range(address, data.len())?;
        self.read_chunks(address, data)
    }

    /// Byte-granular program that always ANDs into the card, whatever the
    /// configured program attribute.
    pub(crate) fn program_bits(
        &mut self,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error<BD::Error>> {
        self.program_bytes(address, data, Merge::And)
    }

    fn program_bytes(
        &mut self,
        address: u32,
        data: &[u8],
        merge: Merge,
    ) -> Result<(), Error<BD::Error>> {
        self.init_guard();
        if self.medium_absent()? {
            return Ok(());
        }
        self.check_range(address, data.len())?;
        self.program_chunks(address, data, merge)
    }

    /// Erase every sector in `[from, to)`. Both ends must be sector aligned.
    /// Nothing is erased unless the whole range fits the medium.
    pub(crate) fn erase_range(&mut self, from: u32, to: u32) -> Result<(), Error<BD::Error>> {
        if from > to || from % Block::LEN_U32 != 0 || to % Block::LEN_U32 != 0 {
            warn!("erase of {:#x}..{:#x} rejected", from, to);
            return Err(Error::InvalidParameter);
        }
        self.init_guard();
        if self.medium_absent()? {
            return Ok(());
        }
        self.check_range(from, (to - from) as usize)?;

        let first = BlockIdx::containing(from);
        let last = BlockIdx::containing(to);
        for sector in first.range(last - first) {
            self.erase_sector(sector.0 * Block::LEN_U32)?;
        }
        Ok(())
    }

    /// `Ok(true)` means no card but the dummy policy is on, so the caller
    /// should pretend the transfer happened.
    fn medium_absent(&self) -> Result<bool, Error<BD::Error>> {
        if self.info.sector_count != 0 {
            return Ok(false);
        }
        match self.config.absent_policy {
            AbsentMediumPolicy::Dummy => Ok(true),
            AbsentMediumPolicy::Strict => Err(Error::MediumAbsent),
        }
    }

    fn check_range(&self, address: u32, len: usize) -> Result<(), Error<BD::Error>> {
        let valid = u32::try_from(len)
            .map(|size| range::is_range_valid(&self.info, address, size))
            .unwrap_or(false);
        if valid {
            Ok(())
        } else {
            warn!("range {:#x}+{} rejected", address, len);
            Err(Error::InvalidParameter)
        }
    }

    /// Bytes per element, if `len` is a whole number of elements.
    fn element_bytes(&self, len: usize) -> Result<usize, Error<BD::Error>> {
        let width = self.config.data_width.bytes();
        if len % width == 0 {
            Ok(width)
        } else {
            Err(Error::InvalidParameter)
        }
    }

    fn init_guard(&mut self) {
        if self.config.init_guard && self.info.sector_count == 0 {
            debug!("transfer before probe, initializing");
            if self.initialize().is_err() {
                warn!("on-demand initialize failed");
            }
        }
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
