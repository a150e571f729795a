//! # sdh-flash
//!
//! > Byte addressable flash on top of an SD card, written in Embedded Rust
//!
//! Boot loaders and secure storage services are usually written against
//! NOR flash: read and program at any offset, erase in fixed sectors, and
//! programming can only clear bits. This crate gives them exactly that on
//! top of an SD card, which only moves whole 512-byte blocks. It is
//! `#![no_std]` and does not use `alloc`; every transfer goes through one
//! word-aligned scratch buffer owned by the driver.
//!
//! ## Using the crate
//!
//! You will need something that implements the `BlockDevice` trait, which
//! can probe for a card and read and write its 512-byte blocks. We supply
//! `SdMmcSpi`, suitable for SD and SDHC cards over SPI, and
//! `MemoryBlockDevice` for testing on a host.
//!
//! ```rust
//! use sdh_flash::{FlashConfig, HostConfig, MemoryBlockDevice, PlatformReady, SdhFlash};
//!
//! let mut card = [0xFFu8; 8 * 512];
//! let host = HostConfig {
//!     base_address: 0x4000_D000,
//!     reset_index: 6,
//!     clock_index: 6,
//!     clock_source: 0,
//!     clock_divider: 2,
//! };
//! // On a host there is nothing to bring up.
//! let ready = unsafe { PlatformReady::new() };
//! let mut flash: SdhFlash<_> =
//!     SdhFlash::new(MemoryBlockDevice::new(&mut card), host, FlashConfig::default(), ready);
//! flash.initialize().unwrap();
//!
//! flash.program_data(500, &[0x12, 0x34]).unwrap();
//! let mut out = [0u8; 2];
//! flash.read_data(500, &mut out).unwrap();
//! assert_eq!(out, [0x12, 0x34]);
//! ```
//!
//! ## Features
//!
//! * `defmt-log`: By turning off the default features and enabling the `defmt-log` feature you can
//! configure this crate to log messages over defmt instead.
//! * `refcell-blockdevice`: implement `BlockDevice` for `RefCell<T>` and `&RefCell<T>`, so one
//! transport can be shared.
//!
//! Make sure that either the `log` feature or the `defmt-log` feature is enabled.

#![cfg_attr(not(test), no_std)]
// #![deny(missing_docs)]

// ****************************************************************************
//
// Imports
//
// ****************************************************************************

#[cfg(test)]
mod test;

#[macro_use]
mod structure;

pub mod block_device;
pub mod flash;
pub mod sdmmc;
pub mod sdmmc_proto;
pub mod storage;

pub use crate::block_device::{
    Block, BlockCount, BlockDevice, BlockIdx, CardInfo, CardType, MemoryBlockDevice,
};
pub use crate::flash::config::{
    AbsentMediumPolicy, DataWidth, FlashConfig, HostConfig, PlatformReady,
};
pub use crate::flash::info::{
    Capabilities, DriverVersion, FlashInfo, FlashStatus, PowerState, Version,
};
pub use crate::flash::Error as FlashError;
pub use crate::flash::SdhFlash;
pub use crate::sdmmc::Error as SdMmcError;
pub use crate::sdmmc::SdMmcSpi;

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
