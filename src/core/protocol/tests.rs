// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use std::path::PathBuf;

use tempfile::TempDir;

use super::*;
use crate::core::atapi::tests::helpers::{cdb, pattern_byte};
use crate::core::config::IdeConfig;
use crate::core::phy::MockPhy;

/// Pattern image of `size` bytes in `dir`
fn image_file(dir: &TempDir, name: &str, size: usize) -> PathBuf {
    let path = dir.path().join(name);
    let data: Vec<u8> = (0..size).map(pattern_byte).collect();
    std::fs::write(&path, data).unwrap();
    path
}

fn protocol_with(phy: MockPhy, ide: IdeConfig, devices: Vec<DeviceConfig>) -> IdeProtocol<MockPhy> {
    let config = Config { ide, devices };
    let mut protocol = IdeProtocol::new(phy, config);
    protocol.init().unwrap();
    assert_eq!(protocol.poll(), PhyEvent::HwRst);
    protocol
}

fn protocol(devices: Vec<DeviceConfig>) -> IdeProtocol<MockPhy> {
    protocol_with(MockPhy::new(), IdeConfig::default(), devices)
}

fn command(protocol: &mut IdeProtocol<MockPhy>, regs: Registers) {
    protocol.phy_mut().issue_command(regs);
    assert_eq!(protocol.poll(), PhyEvent::Cmd);
}

fn simple(command: u8, device: u8) -> Registers {
    Registers {
        command,
        device,
        ..Registers::default()
    }
}

#[test]
fn test_init_configures_phy() {
    let dir = TempDir::new().unwrap();
    let iso = image_file(&dir, "disc.iso", 4096);
    let ide = IdeConfig {
        enable_dev1_zeros: true,
        ..IdeConfig::default()
    };
    let bus = protocol_with(
        MockPhy::new(),
        ide,
        vec![DeviceConfig::new(DeviceKind::Cdrom).with_image(iso)],
    );

    let config = *bus.phy().config();
    assert!(config.enable_dev0);
    assert!(!config.enable_dev1);
    assert!(config.enable_dev1_zeros);
    assert!(config.atapi_dev0);
    assert!(!config.atapi_dev1);
    assert!(!config.disable_iordy);
    assert_eq!(bus.phy().reset_count(), 1);
    assert_eq!(bus.device(0).unwrap().capacity(), 4096);
    assert!(bus.device(1).is_none());
}

#[test]
fn test_rigid_disables_iordy() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let bus = protocol(vec![DeviceConfig::new(DeviceKind::Rigid).with_image(hdd)]);
    assert!(bus.phy().config().disable_iordy);
    assert!(!bus.phy().config().atapi_dev0);
    // Only packet devices ask for dev1 zeros
    assert!(!bus.phy().config().enable_dev1_zeros);
}

#[test]
fn test_first_poll_loads_signature() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let mut bus = protocol(vec![DeviceConfig::new(DeviceKind::Rigid).with_image(hdd)]);

    let regs = bus.phy().regs();
    assert_eq!(regs.error, diag::DEV0_PASS);
    assert_eq!((regs.sector_count, regs.lba_low, regs.lba_mid, regs.lba_high), (1, 1, 0, 0));
    assert!(bus.phy().irqs().is_empty());

    // Nothing queued afterwards
    assert_eq!(bus.poll(), PhyEvent::None);
}

#[test]
fn test_software_reset() {
    let dir = TempDir::new().unwrap();
    let iso = image_file(&dir, "disc.iso", 4096);
    let mut bus = protocol(vec![DeviceConfig::new(DeviceKind::Cdrom).with_image(iso)]);

    bus.phy_mut().regs_mut().lba_mid = 0x55;
    bus.phy_mut().push_event(PhyEvent::SwRst);
    assert_eq!(bus.poll(), PhyEvent::SwRst);

    let regs = bus.phy().regs();
    assert_eq!((regs.lba_mid, regs.lba_high), (0x14, 0xEB));
    assert_eq!(regs.error, diag::DEV0_PASS);
    assert_eq!(regs.status, 0);
}

#[test]
fn test_command_routed_to_selected_device() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let iso = image_file(&dir, "disc.iso", 4096);
    let mut bus = protocol(vec![
        DeviceConfig::new(DeviceKind::Rigid).with_image(hdd),
        DeviceConfig::new(DeviceKind::Cdrom).with_image(iso),
    ]);

    command(&mut bus, simple(ide_cmd::IDENTIFY_DEVICE, 0));
    let ident = bus.phy_mut().take_sent();
    assert_eq!(ident.len(), 512);
    assert_eq!(ident[0], 0x40);
    assert_eq!(bus.phy().last_irq(), Some(Status::DEVRDY | Status::DSC));

    bus.phy_mut().issue_packet(device_reg::DEV, &cdb(&[0x12, 0, 0, 0, 36]), 0);
    assert_eq!(bus.poll(), PhyEvent::Cmd);
    let inquiry = bus.phy_mut().take_sent();
    assert_eq!(inquiry.len(), 36);
    assert_eq!(inquiry[0], 0x05);
}

#[test]
fn test_command_for_absent_device_is_aborted() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let mut bus = protocol(vec![DeviceConfig::new(DeviceKind::Rigid).with_image(hdd)]);

    command(&mut bus, simple(ide_cmd::IDENTIFY_DEVICE, device_reg::DEV));
    assert_eq!(bus.phy().regs().error, AtaError::ABORT.bits());
    assert_eq!(
        bus.phy().last_irq(),
        Some(Status::DEVRDY | Status::DSC | Status::ERR)
    );
    assert!(bus.phy().sent_blocks().is_empty());
}

#[test]
fn test_unhandled_command_is_aborted() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let mut bus = protocol(vec![DeviceConfig::new(DeviceKind::Rigid).with_image(hdd)]);

    command(&mut bus, simple(0x50, 0));
    assert_eq!(bus.phy().regs().error, AtaError::ABORT.bits());
    assert_eq!(
        bus.phy().last_irq(),
        Some(Status::DEVRDY | Status::DSC | Status::ERR)
    );
}

#[test]
fn test_dma_disabled_by_configuration() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let phy = MockPhy::with_capabilities(PhyCapabilities {
        max_udma_mode: Some(5),
        ..PhyCapabilities::default()
    });
    let ide = IdeConfig {
        max_udma: -1,
        ..IdeConfig::default()
    };
    let mut bus = protocol_with(phy, ide, vec![DeviceConfig::new(DeviceKind::Rigid).with_image(hdd)]);
    assert_eq!(bus.capabilities().max_udma_mode, None);

    let read_dma = Registers {
        command: ide_cmd::READ_DMA,
        device: device_reg::LBA,
        sector_count: 1,
        ..Registers::default()
    };
    command(&mut bus, read_dma);
    assert_eq!(bus.phy().regs().error, AtaError::ABORT.bits());
    assert!(bus.phy().sent_blocks().is_empty());
}

#[test]
fn test_execute_device_diagnostic() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let iso = image_file(&dir, "disc.iso", 4096);
    let mut bus = protocol(vec![
        DeviceConfig::new(DeviceKind::Rigid).with_image(hdd),
        DeviceConfig::new(DeviceKind::Cdrom).with_image(iso),
    ]);

    command(&mut bus, simple(ide_cmd::EXECUTE_DEVICE_DIAGNOSTIC, device_reg::DEV));
    let regs = bus.phy().regs();
    assert_eq!(regs.error, diag::DEV0_PASS);
    assert_eq!(regs.device & device_reg::DEV, 0);
    assert_eq!((regs.sector_count, regs.lba_low, regs.lba_mid), (1, 1, 0));
    assert_eq!(bus.phy().last_irq(), Some(Status::DEVRDY | Status::DSC));

    // The PHY may also report the diagnostic as its own event
    bus.phy_mut().push_event(PhyEvent::ExeDevDiag);
    assert_eq!(bus.poll(), PhyEvent::ExeDevDiag);
    assert_eq!(bus.phy().irqs().len(), 2);
}

#[test]
fn test_diagnostic_reports_failed_device1() {
    let dir = TempDir::new().unwrap();
    let iso = image_file(&dir, "disc.iso", 4096);
    let mut bus = protocol(vec![
        DeviceConfig::new(DeviceKind::Cdrom).with_image(iso),
        DeviceConfig::new(DeviceKind::Removable).with_image(dir.path().join("missing.img")),
    ]);
    assert_eq!(bus.device(1).unwrap().capacity(), 0);

    command(&mut bus, simple(ide_cmd::EXECUTE_DEVICE_DIAGNOSTIC, 0));
    assert_eq!(bus.phy().regs().error, diag::DEV0_PASS | diag::DEV1_FAIL);
    assert_eq!(bus.phy().regs().lba_high, 0xEB);
}

#[test]
fn test_device1_presence_signals() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let iso = image_file(&dir, "disc.iso", 4096);
    let mut bus = protocol(vec![
        DeviceConfig::new(DeviceKind::Rigid).with_image(hdd),
        DeviceConfig::new(DeviceKind::Cdrom).with_image(iso),
    ]);
    assert_eq!(bus.phy().signals(), Signals::DASP | Signals::PDIAG);

    command(&mut bus, simple(ide_cmd::GET_MEDIA_STATUS, 0));
    assert_eq!(bus.phy().signals(), Signals::PDIAG);
}

#[test]
fn test_stale_busy_cleared_when_idle() {
    let dir = TempDir::new().unwrap();
    let hdd = image_file(&dir, "hdd.img", 64 * 512);
    let mut bus = protocol(vec![DeviceConfig::new(DeviceKind::Rigid).with_image(hdd)]);

    bus.phy_mut().regs_mut().status = Status::BSY.bits();
    assert_eq!(bus.poll(), PhyEvent::None);
    assert_eq!(bus.phy().regs().status, 0x50);
}

#[test]
fn test_cue_sheet_resolves_to_binary() {
    let dir = TempDir::new().unwrap();
    let bin = image_file(&dir, "game.bin", 2352 * 4);
    std::fs::write(
        dir.path().join("game.cue"),
        "FILE \"game.bin\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\n",
    )
    .unwrap();
    let bus = protocol(vec![
        DeviceConfig::new(DeviceKind::Cdrom).with_image(dir.path().join("game.cue"))
    ]);

    let device = bus.device(0).unwrap();
    assert_eq!(device.image().unwrap().path(), bin.as_path());
    assert_eq!(device.as_cdrom().unwrap().layout().lead_out_lba(), 4);
}

#[test]
fn test_set_image() {
    let dir = TempDir::new().unwrap();
    let iso = image_file(&dir, "disc.iso", 4096);
    let mut bus = protocol(vec![DeviceConfig::new(DeviceKind::Cdrom).with_image(iso)]);

    assert!(bus.set_image(0, None));
    assert_eq!(bus.device(0).unwrap().capacity(), 0);
    assert!(!bus.set_image(1, None));

    let other = image_file(&dir, "other.iso", 8192);
    let image = ImageFile::open(other, true).unwrap();
    assert!(bus.set_image(0, Some(Box::new(image))));
    assert_eq!(bus.device(0).unwrap().capacity(), 8192);
}

#[test]
fn test_device_kinds() {
    let bus = protocol(vec![
        DeviceConfig::new(DeviceKind::Zip250),
        DeviceConfig::new(DeviceKind::Removable),
    ]);
    assert_eq!(bus.device(0).unwrap().kind(), DeviceKind::Zip250);
    assert_eq!(bus.device(1).unwrap().kind(), DeviceKind::Removable);
    assert!(bus.phy_config().disable_iordy);
    assert!(bus.phy_config().atapi_dev1);
}

#[test]
fn test_init_rejects_three_devices() {
    let config = Config {
        ide: IdeConfig::default(),
        devices: vec![DeviceConfig::new(DeviceKind::Cdrom); 3],
    };
    let mut bus = IdeProtocol::new(MockPhy::new(), config);
    assert!(bus.init().is_err());
}
