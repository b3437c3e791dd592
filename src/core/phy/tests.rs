// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::*;
use crate::core::constants::{ide_cmd, set_feature};

#[test]
fn test_registers_device_select_and_byte_count() {
    let mut regs = Registers {
        device: 0x10,
        ..Registers::default()
    };
    assert_eq!(regs.selected_device(), 1);

    regs.set_byte_count(0x1234);
    assert_eq!(regs.lba_mid, 0x34);
    assert_eq!(regs.lba_high, 0x12);
    assert_eq!(regs.byte_count(), 0x1234);
}

#[test]
fn test_mock_packet_without_auto_receive() {
    let mut phy = MockPhy::new();
    phy.reset(&PhyConfig::default());
    phy.issue_packet(0, &[0x12, 0, 0, 0, 36, 0, 0, 0, 0, 0, 0, 0], 0x100);

    assert_eq!(phy.get_events(), PhyEvent::Cmd);
    assert_eq!(phy.get_regs().command, ide_cmd::PACKET);
    // Device must start the command transfer itself
    assert!(!phy.can_read_block());

    phy.start_read(12, None);
    assert!(phy.can_read_block());
    let mut cdb = [0u8; 12];
    phy.read_block(&mut cdb, false);
    assert_eq!(cdb[0], 0x12);
    assert_eq!(cdb[4], 36);
    assert!(!phy.can_read_block());
}

#[test]
fn test_mock_packet_with_auto_receive() {
    let mut phy = MockPhy::new();
    phy.reset(&PhyConfig {
        atapi_dev0: true,
        ..PhyConfig::default()
    });
    phy.issue_packet(0, &[0u8; 12], 0);
    assert!(phy.can_read_block());
}

#[test]
fn test_mock_records_writes_and_irqs() {
    let mut phy = MockPhy::new();
    phy.start_write(4, Some(2));
    assert!(phy.can_write_block());
    phy.write_block(&[1, 2, 3, 4]);
    phy.assert_irq(Status::DEVRDY | Status::DSC);

    assert_eq!(phy.write_starts(), &[(4, Some(2))]);
    assert_eq!(phy.take_sent(), vec![1, 2, 3, 4]);
    assert_eq!(phy.last_irq(), Some(Status::DEVRDY | Status::DSC));
    assert_eq!(phy.get_regs().status, 0x50);
}

#[test]
fn test_mock_reset_event_interrupts_command() {
    let mut phy = MockPhy::new();
    assert!(!phy.is_command_interrupted());
    phy.push_event(PhyEvent::SwRst);
    assert!(phy.is_command_interrupted());
}

#[test]
fn test_mock_stall_and_crc_errors() {
    let mut phy = MockPhy::new();
    phy.start_write(512, None);
    phy.set_stall_writes(true);
    assert!(!phy.can_write_block());
    assert!(!phy.is_write_finished());

    phy.inject_crc_errors(3);
    assert_eq!(phy.stop_transfers(), 3);
    assert_eq!(phy.stop_transfers(), 0);
}

#[test]
fn test_transfer_mode_decoding() {
    assert_eq!(TransferMode::from_register(0x00), Some(TransferMode::PioDefault));
    assert_eq!(TransferMode::from_register(0x0C), Some(TransferMode::Pio(4)));
    assert_eq!(TransferMode::from_register(0x42), Some(TransferMode::Udma(2)));
    assert_eq!(TransferMode::from_register(0x22), None);
}

#[test]
fn test_set_features_negotiation() {
    let caps = PhyCapabilities {
        max_pio_mode: 3,
        max_udma_mode: Some(2),
        ..PhyCapabilities::default()
    };
    let mut udma = None;
    let mut regs = Registers {
        feature: set_feature::TRANSFER_MODE,
        sector_count: 0x42,
        ..Registers::default()
    };
    assert!(apply_set_features(&caps, &regs, &mut udma));
    assert_eq!(udma, Some(2));

    // UDMA 3 is above the PHY ceiling, mode unchanged
    regs.sector_count = 0x43;
    assert!(!apply_set_features(&caps, &regs, &mut udma));
    assert_eq!(udma, Some(2));

    regs.sector_count = 0x0B;
    assert!(apply_set_features(&caps, &regs, &mut udma));
    assert_eq!(udma, None);

    regs.sector_count = 0x0C;
    assert!(!apply_set_features(&caps, &regs, &mut udma));

    regs.feature = set_feature::ENABLE_REVERT_TO_POWERON;
    assert!(apply_set_features(&caps, &regs, &mut udma));
    regs.feature = 0x02;
    assert!(!apply_set_features(&caps, &regs, &mut udma));
}

#[test]
fn test_pio_only_phy_rejects_udma() {
    let caps = PhyCapabilities::default();
    assert!(!caps.supports(TransferMode::Udma(0)));
    assert!(caps.supports(TransferMode::Pio(3)));
}
