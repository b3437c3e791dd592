// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use super::*;

#[test]
fn test_derive_small_disks() {
    // 20 MB: 16 heads, 40 sectors per track
    assert_eq!(Geometry::derive(40960), Geometry::new(64, 16, 40));
    assert_eq!(Geometry::derive(20 * 1008), Geometry::new(20, 16, 63));
    assert_eq!(Geometry::derive(64), Geometry::new(1, 16, 4));
}

#[test]
fn test_derive_without_even_fit() {
    // Prime sector count, more than 1024 cylinders at 1x1
    assert_eq!(Geometry::derive(2003), Geometry::new(1, 16, 63));
}

#[test]
fn test_derive_large_disks() {
    // 1 GiB uses the 16..9 head tier
    assert_eq!(Geometry::derive(2_097_152), Geometry::new(4096, 16, 32));
    // Past 8 GB everything reports the legacy maximum
    assert_eq!(Geometry::derive(20_000_000), Geometry::new(16383, 16, 63));
}

#[test]
fn test_chs_translation() {
    let geometry = Geometry::new(64, 16, 40);
    assert_eq!(geometry.chs_to_lba(0, 0, 1), Some(0));
    assert_eq!(geometry.chs_to_lba(1, 2, 3), Some(722));
    assert_eq!(geometry.lba_to_chs(722), (1, 2, 3));
    assert_eq!(geometry.lba_to_chs(40959), (63, 15, 40));

    assert_eq!(geometry.chs_to_lba(0, 0, 0), None);
    assert_eq!(geometry.chs_to_lba(0, 16, 1), None);
    assert_eq!(geometry.chs_to_lba(0, 0, 41), None);
}

#[test]
fn test_working_geometry() {
    assert_eq!(Geometry::working(40960, 4, 17), Some(Geometry::new(602, 4, 17)));
    // Limited to what 16383/16/63 can reach
    assert_eq!(
        Geometry::working(20_000_000, 16, 63),
        Some(Geometry::new(16383, 16, 63))
    );
    assert_eq!(Geometry::working(40960, 4, 0), None);
}

#[test]
fn test_task_address_decoding() {
    let regs = Registers {
        device: 0xE0 | 0x0A,
        lba_high: 0x12,
        lba_mid: 0x34,
        lba_low: 0x56,
        ..Registers::default()
    };
    assert_eq!(TaskAddress::from_registers(&regs), TaskAddress::Lba(0x0A12_3456));

    let regs = chs_command(0, 0x0102, 5, 9, 1);
    assert_eq!(
        TaskAddress::from_registers(&regs),
        TaskAddress::Chs {
            cylinder: 0x0102,
            head: 5,
            sector: 9
        }
    );
}

#[test]
fn test_address_write_back() {
    let geometry = Geometry::new(64, 16, 40);

    let mut regs = Registers {
        device: 0xE0,
        ..Registers::default()
    };
    TaskAddress::Lba(0).write_back(&mut regs, 0x0102_0304, &geometry);
    assert_eq!(regs.device, 0xE1);
    assert_eq!((regs.lba_high, regs.lba_mid, regs.lba_low), (0x02, 0x03, 0x04));

    let address = TaskAddress::Chs {
        cylinder: 0,
        head: 0,
        sector: 1,
    };
    let mut regs = Registers {
        device: 0xA0 | 0x03,
        ..Registers::default()
    };
    address.write_back(&mut regs, 722, &geometry);
    assert_eq!(regs.device, 0xA2);
    assert_eq!((regs.lba_high, regs.lba_mid, regs.lba_low), (0, 1, 3));
}
