use embedded_hal::{blocking::spi::Transfer, digital::v2::OutputPin};

#[cfg(feature = "log")]
use log::trace;

#[cfg(feature = "defmt-log")]
use defmt::trace;

use crate::sdmmc_proto::*;

use super::{Delay, Error};

/// A card with chip select asserted. Dropping it deasserts chip select, so
/// an early `?` return can never leave the card selected.
pub(crate) struct SdMmcSpiBusy<'spi, 'cs, SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    spi: &'spi mut SPI,
    cs: &'cs mut CS,
}

impl<'spi, 'cs, SPI, CS> Drop for SdMmcSpiBusy<'spi, 'cs, SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    fn drop(&mut self) {
        self.cs.set_high().ok();
    }
}

impl<'spi, 'cs, SPI, CS> SdMmcSpiBusy<'spi, 'cs, SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    pub fn select(spi: &'spi mut SPI, cs: &'cs mut CS) -> Result<Self, Error> {
        cs.set_low().map_err(|_| Error::GpioError)?;
        Ok(Self { spi, cs })
    }

    /// Send one byte and receive one byte.
    fn transfer(&mut self, out: u8) -> Result<u8, Error> {
        self.spi
            .transfer(&mut [out])
            .map(|b| b[0])
            .map_err(|_e| Error::Transport)
    }

    /// Receive a byte from the SD card by clocking in an 0xFF byte.
    pub fn receive(&mut self) -> Result<u8, Error> {
        self.transfer(0xFF)
    }

    pub fn send(&mut self, out: u8) -> Result<(), Error> {
        self.transfer(out).map(|_| ())
    }

    /// Skip `count` response bytes we have no use for.
    pub fn skip(&mut self, count: usize) -> Result<(), Error> {
        for _ in 0..count {
            self.receive()?;
        }
        Ok(())
    }

    /// Spin until the card releases the data line.
    pub fn wait_not_busy(&mut self) -> Result<(), Error> {
        let mut delay = Delay::new();
        while self.receive()? != 0xFF {
            delay.delay(Error::TimeoutWaitNotBusy)?;
        }
        Ok(())
    }

    /// Send a command frame and return the R1 response.
    pub fn card_command(&mut self, command: u8, arg: u32) -> Result<u8, Error> {
        self.wait_not_busy()?;
        let mut frame = [0x40 | command, 0, 0, 0, 0, 0];
        frame[1..5].copy_from_slice(&arg.to_be_bytes());
        frame[5] = crc7(&frame[0..5]);
        for b in frame.iter() {
            self.send(*b)?;
        }

        // CMD12 is followed by a stuff byte
        if command == CMD12 {
            self.receive()?;
        }

        for _ in 0..512 {
            let r1 = self.receive()?;
            if (r1 & R1_VALID_MASK) == 0 {
                trace!("CMD{} -> {:x}", command, r1);
                return Ok(r1);
            }
        }
        Err(Error::TimeoutCommand(command))
    }

    /// Send an application-specific command (CMD55 prefix).
    pub fn card_acmd(&mut self, command: u8, arg: u32) -> Result<u8, Error> {
        self.card_command(CMD55, 0)?;
        self.card_command(command, arg)
    }

    /// Read one data packet. Always fills the given buffer, so make sure it
    /// is the right size.
    pub fn read_data(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        let mut delay = Delay::new();
        let token = loop {
            let b = self.receive()?;
            if b != 0xFF {
                break b;
            }
            delay.delay(Error::TimeoutReadBuffer)?;
        };
        if token != DATA_START_BLOCK {
            return Err(Error::ReadError);
        }

        for b in buffer.iter_mut() {
            *b = self.receive()?;
        }

        let crc = u16::from_be_bytes([self.receive()?, self.receive()?]);
        let calc_crc = crc16(buffer);
        if crc != calc_crc {
            return Err(Error::CrcError(crc, calc_crc));
        }
        Ok(())
    }

    /// Write one data packet behind `token`.
    pub fn write_data(&mut self, token: u8, buffer: &[u8]) -> Result<(), Error> {
        let crc = crc16(buffer);
        self.send(token)?;
        for &b in buffer.iter() {
            self.send(b)?;
        }
        for &b in crc.to_be_bytes().iter() {
            self.send(b)?;
        }
        let status = self.receive()?;
        if (status & DATA_RES_MASK) != DATA_RES_ACCEPTED {
            return Err(Error::WriteError);
        }
        Ok(())
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
