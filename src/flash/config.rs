//! sdh-flash - Driver configuration
//!
//! Everything here is fixed when the driver is built. None of it can be
//! changed per call.

macro_rules! config_setter {
    ($setter:ident, $field:ident, $type:ty) => {
        doc_comment::doc_comment! {
            concat!(
                "Return this configuration with `",
                stringify!($field),
                "` replaced."
            ),
            pub const fn $setter(mut self, value: $type) -> Self {
                self.$field = value;
                self
            }
        }
    };
}

/// What to do when no usable card turns up at initialize time.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AbsentMediumPolicy {
    /// Fail initialize, and fail every later transfer with
    /// [`Error::MediumAbsent`](crate::FlashError::MediumAbsent).
    Strict,
    /// Pretend a blank card is present. Reads return the erased value,
    /// programs and erases succeed without touching the hardware.
    ///
    /// Boot loaders that treat any early read failure as fatal want this.
    Dummy,
}

/// Width of one element in the caller's buffers.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataWidth {
    Bits8,
    Bits16,
    Bits32,
}

impl DataWidth {
    /// Bytes per element.
    pub const fn bytes(self) -> usize {
        match self {
            DataWidth::Bits8 => 1,
            DataWidth::Bits16 => 2,
            DataWidth::Bits32 => 4,
        }
    }
}

/// Behavioural switches for [`SdhFlash`](crate::SdhFlash).
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlashConfig {
    /// Behaviour when the probe finds nothing.
    pub absent_policy: AbsentMediumPolicy,
    /// AND programmed data into what is already on the card, so bits can
    /// only be cleared, like real NOR flash.
    pub program_attribute: bool,
    /// Run `initialize` on demand if a transfer arrives before the medium
    /// was probed.
    pub init_guard: bool,
    /// Skip the read before a write when a chunk covers whole sectors and
    /// `program_attribute` is off.
    pub skip_aligned_pre_read: bool,
    /// Element size used for counts passed in and out of the driver.
    pub data_width: DataWidth,
    /// The byte an erased sector reads back as.
    pub erased_value: u8,
}

impl FlashConfig {
    pub const fn new() -> FlashConfig {
        FlashConfig {
            absent_policy: AbsentMediumPolicy::Strict,
            program_attribute: true,
            init_guard: false,
            skip_aligned_pre_read: false,
            data_width: DataWidth::Bits8,
            erased_value: 0xFF,
        }
    }

    config_setter!(with_absent_policy, absent_policy, AbsentMediumPolicy);
    config_setter!(with_program_attribute, program_attribute, bool);
    config_setter!(with_init_guard, init_guard, bool);
    config_setter!(with_skip_aligned_pre_read, skip_aligned_pre_read, bool);
    config_setter!(with_data_width, data_width, DataWidth);
    config_setter!(with_erased_value, erased_value, u8);
}

impl Default for FlashConfig {
    fn default() -> Self {
        FlashConfig::new()
    }
}

/// The hardware handle for one SD host controller instance.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Controller register block base address.
    pub base_address: usize,
    /// Index of the controller in the system reset register.
    pub reset_index: u32,
    /// Index of the controller in the clock gating register.
    pub clock_index: u32,
    /// Clock source selector value.
    pub clock_source: u32,
    /// Clock divider selector value.
    pub clock_divider: u32,
}

/// Proof that SoC clocks and pin multiplexing for the SD host were set up
/// before the driver was built.
#[derive(Debug)]
pub struct PlatformReady {
    _private: (),
}

impl PlatformReady {
    /// # Safety
    ///
    /// The caller must have enabled the SD host's bus clock and routed its
    /// pins. On a host machine with a simulated transport there is nothing
    /// to bring up and this is always sound.
    pub unsafe fn new() -> PlatformReady {
        PlatformReady { _private: () }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_emulate_flash() {
        let config = FlashConfig::default();
        assert_eq!(config.absent_policy, AbsentMediumPolicy::Strict);
        assert!(config.program_attribute);
        assert!(!config.init_guard);
        assert_eq!(config.data_width.bytes(), 1);
        assert_eq!(config.erased_value, 0xFF);
    }

    #[test]
    fn setters_chain() {
        const CONFIG: FlashConfig = FlashConfig::new()
            .with_absent_policy(AbsentMediumPolicy::Dummy)
            .with_program_attribute(false)
            .with_data_width(DataWidth::Bits32);
        assert_eq!(CONFIG.absent_policy, AbsentMediumPolicy::Dummy);
        assert!(!CONFIG.program_attribute);
        assert_eq!(CONFIG.data_width.bytes(), 4);
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
