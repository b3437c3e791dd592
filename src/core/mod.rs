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

//! Emulation components
//!
//! - Bus dispatch ([`protocol`]) over the PHY boundary ([`phy`])
//! - Packet devices built on the shared ATAPI engine ([`atapi`]):
//!   CD-ROM, removable disk and ZIP drive
//! - ATA hard disk ([`rigid`])
//! - Streaming image storage ([`image`])

pub mod atapi;
pub mod cdrom;
pub mod config;
pub mod constants;
pub mod error;
pub mod image;
pub mod phy;
pub mod protocol;
pub mod removable;
pub mod rigid;
pub mod timing;
pub mod utils;
pub mod zip;

// Re-export commonly used types
pub use config::{Config, DeviceConfig, DeviceKind, IdeConfig};
pub use error::{IdeError, Result};
pub use image::{Image, ImageFile};
pub use phy::{MockPhy, Phy, PhyEvent};
pub use protocol::{Device, IdeProtocol};
