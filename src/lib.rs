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

//! IDE/ATAPI device emulation core
//!
//! The crate turns PHY events (a command was written, the bus was reset)
//! into ATA and ATAPI responses backed by image files. It emulates CD-ROM
//! drives, Iomega ZIP drives, generic removable disks and ATA hard disks.
//!
//! # Example
//!
//! ```no_run
//! use zuluide_core::core::config::{Config, DeviceConfig, DeviceKind};
//! use zuluide_core::core::phy::MockPhy;
//! use zuluide_core::core::protocol::IdeProtocol;
//!
//! let mut config = Config::default();
//! config
//!     .devices
//!     .push(DeviceConfig::new(DeviceKind::Cdrom).with_image("disc.iso"));
//!
//! let mut bus = IdeProtocol::new(MockPhy::new(), config);
//! bus.init()?;
//! loop {
//!     bus.poll();
//! #   break;
//! }
//! # Ok::<(), zuluide_core::core::error::IdeError>(())
//! ```

pub mod core;
