// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! DRQ block splitting and data phase bookkeeping

use std::time::Duration;

use proptest::prelude::*;

use super::super::*;
use crate::core::phy::MockPhy;

#[test]
fn test_split_block_fits_without_split() {
    assert_eq!(split_block(2048, 0xFFFE), Ok((2048, 1)));
    assert_eq!(split_block(512, 512), Ok((512, 1)));
}

#[test]
fn test_split_block_equal_parts() {
    assert_eq!(split_block(2048, 1024), Ok((1024, 2)));
    assert_eq!(split_block(2048, 1000), Ok((512, 4)));
    assert_eq!(split_block(2352, 1000), Ok((784, 3)));
}

#[test]
fn test_split_block_odd_size_fails() {
    assert!(matches!(
        split_block(513, 100),
        Err(TransferError::BlockSplit {
            blocksize: 513,
            limit: 100
        })
    ));
}

#[test]
fn test_block_limit_honours_host_byte_count() {
    let mut xfer = AtapiTransfer::new(Duration::from_millis(50), false);
    xfer.set_capabilities(PhyCapabilities {
        max_blocksize: 8192,
        ..PhyCapabilities::default()
    });
    assert_eq!(xfer.block_limit(), 8192);

    xfer.bytes_req = 0x0201;
    assert_eq!(xfer.block_limit(), 0x0200);

    // A limit of 0 or 1 means "no limit"
    xfer.bytes_req = 1;
    assert_eq!(xfer.block_limit(), 8192);

    // DMA ignores the byte count
    xfer.bytes_req = 0x0200;
    xfer.dma_requested = true;
    assert_eq!(xfer.block_limit(), 8192);
}

#[test]
fn test_send_reconfigures_only_on_size_change() {
    let mut phy = MockPhy::new();
    let mut xfer = AtapiTransfer::new(Duration::from_millis(50), false);

    xfer.send_data(&mut phy, &[1u8; 1024], 512, 2).unwrap();
    xfer.send_data(&mut phy, &[2u8; 512], 512, 1).unwrap();
    assert_eq!(phy.write_starts(), &[(512, None)]);
    assert_eq!(phy.regs().byte_count(), 512);
    assert_eq!(phy.regs().sector_count, InterruptReason::TO_HOST.bits());

    xfer.send_data(&mut phy, &[3u8; 8], 8, 1).unwrap();
    assert_eq!(phy.write_starts(), &[(512, None), (8, None)]);
    assert_eq!(phy.sent_blocks().len(), 4);

    xfer.send_wait_finish(&mut phy).unwrap();
    assert_eq!(xfer.state, DataState::Idle);
}

#[test]
fn test_udma_mode_passed_only_when_requested() {
    let mut phy = MockPhy::new();
    let mut xfer = AtapiTransfer::new(Duration::from_millis(50), false);
    xfer.udma_mode = Some(2);

    xfer.send_data(&mut phy, &[0u8; 16], 16, 1).unwrap();
    xfer.send_wait_finish(&mut phy).unwrap();
    xfer.dma_requested = true;
    xfer.send_data(&mut phy, &[0u8; 16], 16, 1).unwrap();
    assert_eq!(phy.write_starts(), &[(16, None), (16, Some(2))]);
}

#[test]
fn test_recv_data_in_sub_blocks() {
    let mut phy = MockPhy::new();
    let mut xfer = AtapiTransfer::new(Duration::from_millis(50), false);
    xfer.bytes_req = 256;

    let payload: Vec<u8> = (0..512u32).map(|i| i as u8).collect();
    phy.queue_host_data(&payload);
    let mut buf = vec![0u8; 512];
    xfer.recv_data(&mut phy, &mut buf, 512, 1).unwrap();

    assert_eq!(buf, payload);
    assert_eq!(phy.read_starts(), &[(256, None)]);
    assert_eq!(xfer.state, DataState::Idle);
}

#[test]
fn test_send_timeout_aborts() {
    let mut phy = MockPhy::new();
    let mut xfer = AtapiTransfer::new(Duration::from_millis(5), false);
    phy.set_stall_writes(true);

    let result = xfer.send_data(&mut phy, &[0u8; 512], 512, 1);
    assert!(matches!(result, Err(TransferError::Timeout { .. })));
    assert_eq!(xfer.state, DataState::Idle);
}

proptest! {
    #[test]
    fn prop_even_blocks_always_split(half in 1usize..=2048, limit in 2usize..=8192) {
        let blocksize = half * 2;
        let (sub, parts) = split_block(blocksize, limit).unwrap();
        prop_assert_eq!(sub * parts, blocksize);
        prop_assert!(sub <= limit);
        prop_assert!(parts == 1 || sub % 2 == 0);
    }
}
