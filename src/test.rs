use crate::{
    AbsentMediumPolicy, Block, BlockCount, BlockDevice, BlockIdx, CardInfo, CardType, DataWidth,
    FlashConfig, FlashError, HostConfig, PlatformReady, PowerState, SdhFlash,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Op {
    Read(u32, u32),
    Write(u32, u32),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum MockError {
    NoCard,
    Io,
    BringUp,
}

/// A card in memory that records every block transfer.
struct RecordingDevice {
    blocks: Vec<Block>,
    present: bool,
    card_type: CardType,
    fail_open: bool,
    fail_read_at: Option<u32>,
    fail_write_at: Option<u32>,
    ops: Vec<Op>,
    opens: usize,
    closes: usize,
    probes: usize,
}

impl RecordingDevice {
    fn new(num_blocks: usize) -> Self {
        RecordingDevice {
            blocks: vec![Block::filled(0xFF); num_blocks],
            present: true,
            card_type: CardType::SDHC,
            fail_open: false,
            fail_read_at: None,
            fail_write_at: None,
            ops: Vec::new(),
            opens: 0,
            closes: 0,
            probes: 0,
        }
    }

    fn absent() -> Self {
        let mut device = Self::new(0);
        device.present = false;
        device
    }
}

impl BlockDevice for RecordingDevice {
    type Error = MockError;

    fn open(&mut self, _host: &HostConfig) -> Result<(), Self::Error> {
        self.opens += 1;
        if self.fail_open {
            Err(MockError::BringUp)
        } else {
            Ok(())
        }
    }

    fn close(&mut self, _host: &HostConfig) {
        self.closes += 1;
    }

    fn probe(&mut self) -> Result<CardInfo, Self::Error> {
        self.probes += 1;
        if !self.present {
            return Err(MockError::NoCard);
        }
        Ok(CardInfo {
            card_type: self.card_type,
            total_blocks: BlockCount(self.blocks.len() as u32),
        })
    }

    fn read(
        &mut self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        _reason: &str,
    ) -> Result<(), Self::Error> {
        self.ops
            .push(Op::Read(start_block_idx.0, blocks.len() as u32));
        for (i, block) in blocks.iter_mut().enumerate() {
            let idx = start_block_idx.0 + i as u32;
            if self.fail_read_at == Some(idx) {
                return Err(MockError::Io);
            }
            let source = self.blocks.get(idx as usize).ok_or(MockError::Io)?;
            block.contents = source.contents;
        }
        Ok(())
    }

    fn write(&mut self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        self.ops
            .push(Op::Write(start_block_idx.0, blocks.len() as u32));
        for (i, block) in blocks.iter().enumerate() {
            let idx = start_block_idx.0 + i as u32;
            if self.fail_write_at == Some(idx) {
                return Err(MockError::Io);
            }
            let dest = self.blocks.get_mut(idx as usize).ok_or(MockError::Io)?;
            dest.contents = block.contents;
        }
        Ok(())
    }
}

fn host() -> HostConfig {
    HostConfig {
        base_address: 0x4000_D000,
        reset_index: 6,
        clock_index: 6,
        clock_source: 0,
        clock_divider: 2,
    }
}

fn flash_with(device: RecordingDevice, config: FlashConfig) -> SdhFlash<RecordingDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    let ready = unsafe { PlatformReady::new() };
    SdhFlash::new(device, host(), config, ready)
}

fn probed_flash(num_blocks: usize, config: FlashConfig) -> SdhFlash<RecordingDevice> {
    let mut flash = flash_with(RecordingDevice::new(num_blocks), config);
    flash.initialize().unwrap();
    flash
}

#[test]
fn initialize_reads_geometry() {
    let flash = probed_flash(16, FlashConfig::default());
    let info = flash.info();
    assert_eq!(info.sector_count, 16);
    assert_eq!(info.sector_size, 512);
    assert_eq!(info.erased_value, 0xFF);
    assert_eq!(info.capacity_bytes(), 16 * 512);
    assert_eq!(flash.card().map(|c| c.card_type), Some(CardType::SDHC));
    assert_eq!(flash.device().opens, 1);
    assert_eq!(flash.device().probes, 1);
}

#[test]
fn program_then_read_back() {
    let mut flash = probed_flash(8, FlashConfig::default());
    let data: Vec<u8> = (0..700u32).map(|i| (i * 7) as u8).collect();
    assert_eq!(flash.program_data(300, &data), Ok(700));

    let mut out = vec![0u8; 700];
    assert_eq!(flash.read_data(300, &mut out), Ok(700));
    assert_eq!(out, data);

    // Programming the same bytes again changes nothing.
    assert_eq!(flash.program_data(300, &out), Ok(700));
    let mut again = vec![0u8; 700];
    flash.read_data(300, &mut again).unwrap();
    assert_eq!(again, data);
}

#[test]
fn erase_sector_restores_erased_value() {
    let mut flash = probed_flash(4, FlashConfig::default());
    flash.program_data(1024, &[0u8; 512]).unwrap();
    flash.erase_sector(1024 + 77).unwrap();
    assert_eq!(flash.device().ops.last(), Some(&Op::Write(2, 1)));

    let mut out = [0u8; 512];
    flash.read_data(1024, &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 0xFF));
    assert_eq!(
        flash.device().ops,
        [Op::Read(2, 1), Op::Write(2, 1), Op::Write(2, 1), Op::Read(2, 1)]
    );
}

#[test]
fn erase_uses_configured_erased_value() {
    let mut flash = probed_flash(2, FlashConfig::default().with_erased_value(0x00));
    flash.erase_sector(512).unwrap();
    assert!(flash.device().blocks[1].contents.iter().all(|&b| b == 0x00));
    assert_eq!(flash.info().erased_value, 0x00);
}

#[test]
fn out_of_range_never_touches_hardware() {
    let mut flash = probed_flash(4, FlashConfig::default());
    let mut out = [0u8; 16];
    assert_eq!(
        flash.read_data(2040, &mut out),
        Err(FlashError::InvalidParameter)
    );
    assert_eq!(
        flash.program_data(2048, &[0u8; 1]),
        Err(FlashError::InvalidParameter)
    );
    assert_eq!(
        flash.erase_sector(2048),
        Err(FlashError::InvalidParameter)
    );
    assert_eq!(
        flash.read_data(u32::MAX, &mut out),
        Err(FlashError::InvalidParameter)
    );
    assert!(flash.device().ops.is_empty());
}

#[test]
fn last_byte_is_reachable() {
    let mut flash = probed_flash(4, FlashConfig::default());
    assert_eq!(flash.program_data(2047, &[0x5A]), Ok(1));
    let mut out = [0u8; 1];
    assert_eq!(flash.read_data(2047, &mut out), Ok(1));
    assert_eq!(out, [0x5A]);
}

#[test]
fn dummy_policy_pretends_blank_card() {
    let config = FlashConfig::default().with_absent_policy(AbsentMediumPolicy::Dummy);
    let mut flash = flash_with(RecordingDevice::absent(), config);
    assert_eq!(flash.initialize(), Ok(()));
    assert_eq!(flash.info().sector_count, 0);
    assert!(flash.card().is_none());

    let mut out = [0u8; 64];
    assert_eq!(flash.read_data(0x1000, &mut out), Ok(64));
    assert!(out.iter().all(|&b| b == 0xFF));
    assert_eq!(flash.program_data(0, &[0u8; 8]), Ok(8));
    assert_eq!(flash.erase_sector(0), Ok(()));
    assert!(flash.device().ops.is_empty());
}

#[test]
fn strict_policy_reports_medium_absent() {
    let mut flash = flash_with(RecordingDevice::absent(), FlashConfig::default());
    assert_eq!(flash.initialize(), Err(FlashError::MediumAbsent));
    assert_eq!(flash.info().sector_count, 0);

    let mut out = [0u8; 64];
    assert_eq!(
        flash.read_data(0, &mut out),
        Err(FlashError::MediumAbsent)
    );
    assert_eq!(
        flash.program_data(0, &out),
        Err(FlashError::MediumAbsent)
    );
    assert_eq!(flash.erase_sector(0), Err(FlashError::MediumAbsent));
    assert!(flash.device().ops.is_empty());
}

#[test]
fn unusable_cards_count_as_absent() {
    let mut unknown = RecordingDevice::new(8);
    unknown.card_type = CardType::Unknown;
    let mut flash = flash_with(unknown, FlashConfig::default());
    assert_eq!(flash.initialize(), Err(FlashError::MediumAbsent));

    let mut flash = flash_with(RecordingDevice::new(0), FlashConfig::default());
    assert_eq!(flash.initialize(), Err(FlashError::MediumAbsent));
    assert_eq!(flash.info().sector_count, 0);
}

#[test]
fn bring_up_failure_is_a_device_error() {
    let mut device = RecordingDevice::new(8);
    device.fail_open = true;
    let mut flash = flash_with(device, FlashConfig::default());
    assert_eq!(
        flash.initialize(),
        Err(FlashError::Device(MockError::BringUp))
    );
    assert_eq!(flash.device().probes, 0);
}

#[test]
fn reinitialize_after_card_removed() {
    let mut flash = probed_flash(8, FlashConfig::default());
    assert_eq!(flash.info().sector_count, 8);

    let mut device = flash.release();
    device.present = false;
    let mut flash = flash_with(device, FlashConfig::default());
    assert_eq!(flash.initialize(), Err(FlashError::MediumAbsent));
    assert_eq!(flash.info().sector_count, 0);
}

#[test]
fn and_emulation_blocks_zero_to_one() {
    let mut flash = probed_flash(2, FlashConfig::default());
    let mut out = [0u8; 4];

    flash.program_data(16, &[0x0F; 4]).unwrap();
    flash.read_data(16, &mut out).unwrap();
    assert_eq!(out, [0x0F; 4]);

    flash.program_data(16, &[0xFF; 4]).unwrap();
    flash.read_data(16, &mut out).unwrap();
    assert_eq!(out, [0x0F; 4]);

    flash.program_data(16, &[0xF3; 4]).unwrap();
    flash.read_data(16, &mut out).unwrap();
    assert_eq!(out, [0x03; 4]);
}

#[test]
fn overwrite_without_emulation() {
    let config = FlashConfig::default().with_program_attribute(false);
    let mut flash = probed_flash(2, config);
    let mut out = [0u8; 4];

    flash.program_data(16, &[0x0F; 4]).unwrap();
    flash.program_data(16, &[0xF0; 4]).unwrap();
    flash.read_data(16, &mut out).unwrap();
    assert_eq!(out, [0xF0; 4]);
    // Neighbours survive the read-modify-write.
    assert_eq!(flash.device().blocks[0].contents[15], 0xFF);
    assert_eq!(flash.device().blocks[0].contents[20], 0xFF);
}

#[test]
fn write_across_sector_boundary_touches_two_sectors() {
    let mut flash = probed_flash(4, FlashConfig::default());
    assert_eq!(flash.program_data(500, &[0u8; 24]), Ok(24));
    assert_eq!(
        flash.device().ops,
        [Op::Read(0, 1), Op::Write(0, 1), Op::Read(1, 1), Op::Write(1, 1)]
    );
    assert!(flash.device().blocks[0].contents[500..].iter().all(|&b| b == 0));
    assert!(flash.device().blocks[1].contents[..12].iter().all(|&b| b == 0));
    assert_eq!(flash.device().blocks[1].contents[12], 0xFF);
}

#[test]
fn read_across_sector_boundary() {
    let mut flash = probed_flash(4, FlashConfig::default());
    let mut out = [0u8; 24];
    assert_eq!(flash.read_data(500, &mut out), Ok(24));
    assert_eq!(flash.device().ops, [Op::Read(0, 1), Op::Read(1, 1)]);
}

#[test]
fn write_failure_aborts_remaining_chunks() {
    let mut device = RecordingDevice::new(4);
    device.fail_write_at = Some(1);
    let mut flash = flash_with(device, FlashConfig::default());
    flash.initialize().unwrap();

    assert_eq!(
        flash.program_data(500, &[0u8; 24]),
        Err(FlashError::Device(MockError::Io))
    );
    // First sector already landed, second did not.
    assert!(flash.device().blocks[0].contents[500..].iter().all(|&b| b == 0));
    assert!(flash.device().blocks[1].contents.iter().all(|&b| b == 0xFF));
    assert_eq!(
        flash.device().ops,
        [Op::Read(0, 1), Op::Write(0, 1), Op::Read(1, 1), Op::Write(1, 1)]
    );
}

#[test]
fn read_failure_is_a_device_error() {
    let mut device = RecordingDevice::new(4);
    device.fail_read_at = Some(1);
    let mut flash = flash_with(device, FlashConfig::default());
    flash.initialize().unwrap();

    let mut out = [0u8; 24];
    assert_eq!(
        flash.read_data(500, &mut out),
        Err(FlashError::Device(MockError::Io))
    );
    assert_eq!(flash.device().ops, [Op::Read(0, 1), Op::Read(1, 1)]);
}

#[test]
fn pre_read_failure_writes_nothing() {
    let mut device = RecordingDevice::new(4);
    device.fail_read_at = Some(1);
    let mut flash = flash_with(device, FlashConfig::default());
    flash.initialize().unwrap();

    assert_eq!(
        flash.program_data(600, &[0u8; 8]),
        Err(FlashError::Device(MockError::Io))
    );
    assert_eq!(flash.device().ops, [Op::Read(1, 1)]);
    assert!(flash.device().blocks[1].contents.iter().all(|&b| b == 0xFF));
}

#[test]
fn aligned_pre_read_can_be_skipped() {
    let config = FlashConfig::default()
        .with_program_attribute(false)
        .with_skip_aligned_pre_read(true);
    let mut flash = probed_flash(4, config);

    flash.program_data(512, &[0xAB; 512]).unwrap();
    assert_eq!(flash.device().ops, [Op::Write(1, 1)]);

    flash.program_data(1030, &[0xCD; 4]).unwrap();
    assert_eq!(
        flash.device().ops[1..],
        [Op::Read(2, 1), Op::Write(2, 1)]
    );
}

#[test]
fn pre_read_stays_with_emulation_on() {
    let config = FlashConfig::default().with_skip_aligned_pre_read(true);
    let mut flash = probed_flash(4, config);
    flash.program_data(512, &[0xAB; 512]).unwrap();
    assert_eq!(flash.device().ops, [Op::Read(1, 1), Op::Write(1, 1)]);
}

#[test]
fn bigger_scratch_buffer_moves_several_sectors() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ready = unsafe { PlatformReady::new() };
    let mut flash: SdhFlash<RecordingDevice, 2> =
        SdhFlash::new(RecordingDevice::new(8), host(), FlashConfig::default(), ready);
    flash.initialize().unwrap();

    let data = [0x11u8; 600];
    assert_eq!(flash.program_data(500, &data), Ok(600));
    assert_eq!(
        flash.device().ops,
        [Op::Read(0, 2), Op::Write(0, 2), Op::Read(2, 1), Op::Write(2, 1)]
    );

    let mut out = [0u8; 600];
    flash.read_data(500, &mut out).unwrap();
    assert_eq!(out[..], data[..]);
}

#[test]
fn counts_are_in_elements() {
    let config = FlashConfig::default().with_data_width(DataWidth::Bits32);
    let mut flash = probed_flash(2, config);
    let mut out = [0u8; 8];
    assert_eq!(flash.read_data(0, &mut out), Ok(2));
    assert_eq!(flash.program_data(0, &[0u8; 12]), Ok(3));
    assert_eq!(
        flash.read_data(0, &mut out[..6]),
        Err(FlashError::InvalidParameter)
    );
    assert_eq!(flash.capabilities().data_width, DataWidth::Bits32);
}

#[test]
fn init_guard_probes_on_first_transfer() {
    let config = FlashConfig::default().with_init_guard(true);
    let mut flash = flash_with(RecordingDevice::new(4), config);
    let mut out = [0u8; 4];
    assert_eq!(flash.read_data(0, &mut out), Ok(4));
    assert_eq!(flash.device().probes, 1);
    assert_eq!(flash.info().sector_count, 4);

    flash.read_data(0, &mut out).unwrap();
    assert_eq!(flash.device().probes, 1);
}

#[test]
fn without_init_guard_transfers_need_initialize() {
    let mut flash = flash_with(RecordingDevice::new(4), FlashConfig::default());
    let mut out = [0u8; 4];
    assert_eq!(
        flash.read_data(0, &mut out),
        Err(FlashError::MediumAbsent)
    );
    assert_eq!(flash.device().probes, 0);
}

#[test]
fn unsupported_operations() {
    let mut flash = probed_flash(4, FlashConfig::default());
    assert_eq!(flash.erase_chip(), Err(FlashError::Unsupported));
    assert_eq!(flash.power_control(PowerState::Full), Ok(()));
    assert_eq!(
        flash.power_control(PowerState::Low),
        Err(FlashError::Unsupported)
    );
    assert_eq!(
        flash.power_control(PowerState::Off),
        Err(FlashError::Unsupported)
    );
    assert!(flash.device().ops.is_empty());
}

#[test]
fn metadata_accessors() {
    let mut flash = flash_with(RecordingDevice::new(4), FlashConfig::default());
    assert_eq!(flash.info().sector_count, 0);
    assert!(flash.status().is_ready());

    let caps = flash.capabilities();
    assert!(!caps.event_ready);
    assert!(!caps.erase_chip);
    assert_eq!(caps.data_width, DataWidth::Bits8);

    let version = flash.version();
    assert_eq!(version.api.packed(), 0x0202);
    assert_eq!(version.driver.packed(), 0x0100);

    flash.initialize().unwrap();
    assert!(flash.status().is_ready());
    assert_eq!(flash.info().page_size, 4);
    assert_eq!(flash.info().program_unit, 4);
}

#[test]
fn uninitialize_keeps_geometry() {
    let mut flash = probed_flash(4, FlashConfig::default());
    flash.uninitialize();
    assert_eq!(flash.device().closes, 1);
    assert_eq!(flash.info().sector_count, 4);
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
