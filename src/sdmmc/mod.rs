//! sdh-flash - SD card block transport over SPI
//!
//! Implements enough of the SD/MMC protocol on a generic SPI interface to
//! probe a card and move 512-byte blocks, which is all the flash layer
//! needs from a transport.
//!
//! This is optimised for readability and debugability, not performance.

mod busy;
use busy::SdMmcSpiBusy;

use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;

#[cfg(feature = "log")]
use log::{debug, trace, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace, warn};

use crate::sdmmc_proto::*;
use crate::{Block, BlockCount, BlockDevice, BlockIdx, CardInfo, CardType, HostConfig};

const DEFAULT_DELAY_COUNT: u32 = 32_000;

/// An SD card on an SPI bus. Chip select is a separate pin so we can clock
/// out some bytes without it asserted (which puts the card into SPI mode).
pub struct SdMmcSpi<SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    spi: SPI,
    cs: CS,
    options: AcquireOpts,
    card_type: Option<CardType>,
}

/// The possible errors `SdMmcSpi` can generate.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// We got an error from the SPI peripheral
    Transport,
    /// We failed to enable CRC checking on the SD card
    CantEnableCRC,
    /// We didn't get a response when reading data from the card
    TimeoutReadBuffer,
    /// We didn't get a response when waiting for the card to not be busy
    TimeoutWaitNotBusy,
    /// We didn't get a response when executing this command
    TimeoutCommand(u8),
    /// We didn't get a response when executing this application-specific command
    TimeoutACommand(u8),
    /// We got a bad response from Command 58
    Cmd58Error,
    /// We failed to read the Card Specific Data register
    RegisterReadError,
    /// We got a CRC mismatch (card gave us, we calculated)
    CrcError(u16, u16),
    /// Error reading from the card
    ReadError,
    /// Error writing to the card
    WriteError,
    /// Block I/O was attempted before a successful probe
    BadState,
    /// Couldn't find the card
    CardNotFound,
    /// Couldn't set a GPIO pin
    GpioError,
}

/// A countdown for busy-waiting the CPU while the card sorts itself out.
struct Delay(u32);

impl Delay {
    fn new() -> Delay {
        Delay(DEFAULT_DELAY_COUNT)
    }

    fn delay(&mut self, err: Error) -> Result<(), Error> {
        if self.0 == 0 {
            return Err(err);
        }
        let dummy_var: u32 = 0;
        for _ in 0..100 {
            unsafe { core::ptr::read_volatile(&dummy_var) };
        }
        self.0 -= 1;
        Ok(())
    }
}

/// Options for acquiring the card.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone)]
pub struct AcquireOpts {
    /// Some cards don't support CRC mode. At least a 512MiB Transcend one.
    pub require_crc: bool,
}

impl Default for AcquireOpts {
    fn default() -> Self {
        AcquireOpts { require_crc: true }
    }
}

impl<SPI, CS> SdMmcSpi<SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    /// Create a new SD/MMC transport using a raw SPI interface.
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self::with_opts(spi, cs, AcquireOpts::default())
    }

    pub fn with_opts(spi: SPI, cs: CS, options: AcquireOpts) -> Self {
        SdMmcSpi {
            spi,
            cs,
            options,
            card_type: None,
        }
    }

    /// Hand back the bus and the chip select pin.
    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn discard_byte(&mut self) -> Result<u8, Error> {
        self.spi
            .transfer(&mut [0xFF])
            .map(|b| b[0])
            .map_err(|_e| Error::Transport)
    }

    fn select(&mut self) -> Result<SdMmcSpiBusy<SPI, CS>, Error> {
        SdMmcSpiBusy::select(&mut self.spi, &mut self.cs)
    }

    /// Walk the card through CMD0 / CMD8 / ACMD41 / CMD58 and work out what
    /// kind of card it is.
    fn acquire(&mut self) -> Result<CardType, Error> {
        debug!("acquiring card with opts: {:?}", self.options);
        let require_crc = self.options.require_crc;
        let mut card = self.select()?;

        trace!("Enter SPI mode");
        let mut delay = Delay::new();
        let mut attempts = 32;
        loop {
            match card.card_command(CMD0, 0) {
                Ok(R1_IDLE_STATE) => break,
                Err(Error::TimeoutCommand(0)) => {
                    warn!("Timed out, trying again..");
                }
                Err(e) => return Err(e),
                Ok(r) => {
                    warn!("Got response: {:x}, trying again..", r);
                }
            }
            attempts -= 1;
            if attempts == 0 {
                return Err(Error::CardNotFound);
            }
            delay.delay(Error::TimeoutCommand(CMD0))?;
        }

        debug!("Enable CRC: {}", require_crc);
        if card.card_command(CMD59, 1)? != R1_IDLE_STATE && require_crc {
            return Err(Error::CantEnableCRC);
        }

        let mut delay = Delay::new();
        let mut card_type = loop {
            if card.card_command(CMD8, CMD8_CHECK_PATTERN)? == (R1_ILLEGAL_COMMAND | R1_IDLE_STATE)
            {
                break CardType::SD1;
            }
            card.skip(3)?;
            if card.receive()? == (CMD8_CHECK_PATTERN & 0xFF) as u8 {
                break CardType::SD2;
            }
            delay.delay(Error::TimeoutCommand(CMD8))?;
        };
        debug!("Card version: {:?}", card_type);

        let arg = match card_type {
            CardType::SD1 => 0,
            _ => HCS_ARG,
        };
        let mut delay = Delay::new();
        while card.card_acmd(ACMD41, arg)? != R1_READY_STATE {
            delay.delay(Error::TimeoutACommand(ACMD41))?;
        }

        if card_type == CardType::SD2 {
            if card.card_command(CMD58, 0)? != R1_READY_STATE {
                return Err(Error::Cmd58Error);
            }
            if (card.receive()? & OCR_CCS_MASK) == OCR_CCS_MASK {
                card_type = CardType::SDHC;
            }
            card.skip(3)?;
        }
        Ok(card_type)
    }

    /// Read the 'card specific data' block.
    fn read_csd(&mut self, card_type: CardType) -> Result<Csd, Error> {
        let mut card = self.select()?;
        if card.card_command(CMD9, 0)? != R1_READY_STATE {
            return Err(Error::RegisterReadError);
        }
        match card_type {
            CardType::SD1 => {
                let mut csd = CsdV1::new();
                card.read_data(&mut csd.data)?;
                Ok(Csd::V1(csd))
            }
            _ => {
                let mut csd = CsdV2::new();
                card.read_data(&mut csd.data)?;
                Ok(Csd::V2(csd))
            }
        }
    }

    /// Standard capacity cards take byte addresses, SDHC takes block numbers.
    fn card_address(&self, block_idx: BlockIdx) -> Result<u32, Error> {
        match self.card_type {
            Some(CardType::SDHC) => Ok(block_idx.0),
            Some(CardType::SD1) | Some(CardType::SD2) => Ok(block_idx.0 * Block::LEN_U32),
            Some(CardType::Unknown) | None => Err(Error::BadState),
        }
    }
}

impl<SPI, CS> BlockDevice for SdMmcSpi<SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    type Error = Error;

    /// Supply at least 74 clock cycles without chip select asserted.
    fn open(&mut self, _host: &HostConfig) -> Result<(), Self::Error> {
        self.card_type = None;
        self.cs.set_high().map_err(|_| Error::GpioError)?;
        for _ in 0..10 {
            self.discard_byte()?;
        }
        Ok(())
    }

    fn probe(&mut self) -> Result<CardInfo, Self::Error> {
        let acquired = self.acquire();
        let _ = self.discard_byte();
        let card_type = acquired?;
        let csd = self.read_csd(card_type)?;
        self.card_type = Some(card_type);
        Ok(CardInfo {
            card_type,
            total_blocks: BlockCount(csd.card_capacity_blocks()),
        })
    }

    fn read(
        &mut self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        _reason: &str,
    ) -> Result<(), Self::Error> {
        let address = self.card_address(start_block_idx)?;
        let mut card = self.select()?;
        match blocks.len() {
            0 => {}
            1 => {
                card.card_command(CMD17, address)?;
                card.read_data(&mut blocks[0].contents)?;
            }
            _ => {
                card.card_command(CMD18, address)?;
                for block in blocks.iter_mut() {
                    card.read_data(&mut block.contents)?;
                }
                card.card_command(CMD12, 0)?;
            }
        }
        Ok(())
    }

    fn write(&mut self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        let address = self.card_address(start_block_idx)?;
        let mut card = self.select()?;
        match blocks.len() {
            0 => {}
            1 => {
                card.card_command(CMD24, address)?;
                card.write_data(DATA_START_BLOCK, &blocks[0].contents)?;
                card.wait_not_busy()?;
                if card.card_command(CMD13, 0)? != R1_READY_STATE {
                    return Err(Error::WriteError);
                }
                if card.receive()? != 0x00 {
                    return Err(Error::WriteError);
                }
            }
            _ => {
                card.card_command(CMD25, address)?;
                for block in blocks.iter() {
                    card.wait_not_busy()?;
                    card.write_data(WRITE_MULTIPLE_TOKEN, &block.contents)?;
                }
                card.wait_not_busy()?;
                card.send(STOP_TRAN_TOKEN)?;
            }
        }
        Ok(())
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
