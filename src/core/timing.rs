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

//! Cooperative waiting with timeouts
//!
//! The engine never blocks on the PHY. Every wait spins on a readiness
//! check, calling [`Phy::platform_poll`] between attempts so timers and
//! other IRQ-fed queues keep running, and gives up when either the deadline
//! passes or the host interrupts the command.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use zuluide_core::core::phy::{MockPhy, Phy};
//! use zuluide_core::core::timing::wait_for;
//!
//! let mut phy = MockPhy::new();
//! phy.start_write(512, None);
//! let ready = wait_for(&mut phy, Duration::from_millis(100), true, "waiting for buffer", |p| {
//!     p.can_write_block()
//! });
//! assert!(ready.is_ok());
//! ```

use std::time::{Duration, Instant};

use crate::core::error::TransferError;
use crate::core::phy::Phy;

/// Default timeout for a single block handshake
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Point in time after which a wait is abandoned
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn new(timeout: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() > self.timeout
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Wait until `ready` returns true
///
/// # Arguments
///
/// * `phy` - PHY used for the poll hook and interruption check
/// * `timeout` - Maximum time to wait
/// * `check_interrupt` - Abort when the host interrupts the command
/// * `operation` - Description used in logs and the timeout error
/// * `ready` - Readiness predicate
///
/// # Returns
///
/// `Ok(())` once ready, [`TransferError::Timeout`] or
/// [`TransferError::Interrupted`] otherwise
pub fn wait_for<F>(
    phy: &mut dyn Phy,
    timeout: Duration,
    check_interrupt: bool,
    operation: &'static str,
    mut ready: F,
) -> Result<(), TransferError>
where
    F: FnMut(&mut dyn Phy) -> bool,
{
    let deadline = Deadline::new(timeout);
    loop {
        if ready(phy) {
            return Ok(());
        }

        phy.platform_poll();

        if deadline.expired() {
            log::warn!("Timeout while {} ({} ms)", operation, deadline.elapsed_ms());
            return Err(TransferError::Timeout {
                operation,
                elapsed_ms: deadline.elapsed_ms(),
            });
        }

        if check_interrupt && phy.is_command_interrupted() {
            log::debug!("Interrupted while {}", operation);
            return Err(TransferError::Interrupted);
        }
    }
}
