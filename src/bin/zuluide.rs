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

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;
use zuluide_core::core::config::{Config, DeviceConfig, DeviceKind, IdeConfig};
use zuluide_core::core::constants::{atapi_cmd, device_reg, ide_cmd, Status};
use zuluide_core::core::error::{IdeError, Result};
use zuluide_core::core::image::{create_image, parse_size, DriveType};
use zuluide_core::core::phy::{MockPhy, PhyEvent, Registers};
use zuluide_core::core::protocol::{Device, IdeProtocol};

/// IDE/ATAPI device emulator tools
#[derive(Parser)]
#[command(name = "zuluide")]
#[command(about = "IDE/ATAPI device emulator", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show how an image is presented to the host
    Info {
        image: PathBuf,

        /// Device kind, guessed from the file name when omitted
        #[arg(short, long)]
        kind: Option<DeviceKind>,

        /// Print a JSON report
        #[arg(long)]
        json: bool,
    },

    /// Dump the IDENTIFY block a device would send for an image
    Identify {
        image: PathBuf,

        #[arg(short, long)]
        kind: Option<DeviceKind>,
    },

    /// Create a zero-filled image (sizes like 100M, 2G, 650MiB)
    Create { size: String, path: PathBuf },

    /// Run a scripted host session against the configured devices
    Simulate {
        /// Configuration file, defaults to $ZULUIDE_CONFIG or zuluide.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Sectors read from each device
        #[arg(short = 'n', long, default_value = "4")]
        sectors: u8,
    },
}

#[derive(Serialize)]
struct ImageReport {
    path: PathBuf,
    kind: &'static str,
    file_size: u64,
    capacity: u64,
    writable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    geometry: Option<GeometryReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tracks: Vec<TrackReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lead_out_lba: Option<u32>,
}

#[derive(Serialize)]
struct GeometryReport {
    cylinders: u16,
    heads: u8,
    sectors_per_track: u8,
}

#[derive(Serialize)]
struct TrackReport {
    number: u8,
    mode: String,
    start_lba: u32,
    length: u32,
    file_offset: u64,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger with default level INFO
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let result = match args.command {
        Command::Info { image, kind, json } => cmd_info(&image, kind, json),
        Command::Identify { image, kind } => cmd_identify(&image, kind),
        Command::Create { size, path } => cmd_create(&size, &path),
        Command::Simulate { config, sectors } => cmd_simulate(config, sectors),
    };
    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

/// Device kind for an image without an explicit `--kind`
fn guess_kind(path: &Path) -> DeviceKind {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match DriveType::from_filename(&name) {
        DriveType::Cdrom => DeviceKind::Cdrom,
        DriveType::Zip100 => DeviceKind::Zip100,
        DriveType::Zip250 => DeviceKind::Zip250,
        DriveType::Removable => DeviceKind::Removable,
        DriveType::Rigid | DriveType::Unknown => DeviceKind::Rigid,
    }
}

/// Bus with a single device 0 bound to `image`, already past its reset
fn single_device_bus(image: &Path, kind: Option<DeviceKind>) -> Result<IdeProtocol<MockPhy>> {
    let kind = kind.unwrap_or_else(|| guess_kind(image));
    let config = Config {
        ide: IdeConfig::default(),
        devices: vec![DeviceConfig {
            read_only: true,
            ..DeviceConfig::new(kind).with_image(image)
        }],
    };
    let mut bus = IdeProtocol::new(MockPhy::new(), config);
    bus.init()?;
    bus.poll();

    let bound = bus.device(0).is_some_and(|d| d.image().is_some());
    if !bound {
        return Err(IdeError::NoImage);
    }
    Ok(bus)
}

fn cmd_info(path: &Path, kind: Option<DeviceKind>, json: bool) -> Result<()> {
    let bus = single_device_bus(path, kind)?;
    let Some(device) = bus.device(0) else {
        return Err(IdeError::NoImage);
    };
    let report = image_report(device);

    if json {
        let text = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
        println!("{}", text);
        return Ok(());
    }

    println!("Image:     {}", report.path.display());
    println!("Kind:      {}", report.kind);
    println!("File size: {} bytes", report.file_size);
    println!("Capacity:  {} bytes", report.capacity);
    println!("Writable:  {}", report.writable);
    if let Some(geometry) = &report.geometry {
        println!(
            "Geometry:  {}/{}/{} (C/H/S)",
            geometry.cylinders, geometry.heads, geometry.sectors_per_track
        );
    }
    for track in &report.tracks {
        println!(
            "Track {:02}:  {:<10} LBA {:>7}  {:>7} sectors  offset {}",
            track.number, track.mode, track.start_lba, track.length, track.file_offset
        );
    }
    if let Some(lead_out) = report.lead_out_lba {
        println!("Lead-out:  LBA {}", lead_out);
    }
    Ok(())
}

fn image_report(device: &Device) -> ImageReport {
    let image = device.image();
    let mut report = ImageReport {
        path: image.map(|i| i.path().to_path_buf()).unwrap_or_default(),
        kind: device.kind().name(),
        file_size: image.map_or(0, |i| i.capacity()),
        capacity: device.capacity(),
        writable: image.is_some_and(|i| i.writable()),
        geometry: None,
        tracks: Vec::new(),
        lead_out_lba: None,
    };

    if let Some(rigid) = device.as_rigid() {
        let geometry = rigid.geometry();
        report.geometry = Some(GeometryReport {
            cylinders: geometry.cylinders,
            heads: geometry.heads,
            sectors_per_track: geometry.sectors_per_track,
        });
    }
    if let Some(cdrom) = device.as_cdrom() {
        let layout = cdrom.layout();
        report.tracks = layout
            .tracks()
            .iter()
            .map(|track| TrackReport {
                number: track.number,
                mode: format!("{:?}", track.mode),
                start_lba: track.start_lba,
                length: layout.track_length(track),
                file_offset: track.file_offset,
            })
            .collect();
        report.lead_out_lba = Some(layout.lead_out_lba());
    }
    report
}

fn cmd_identify(path: &Path, kind: Option<DeviceKind>) -> Result<()> {
    let mut bus = single_device_bus(path, kind)?;
    let packet = bus.device(0).is_some_and(Device::is_packet_device);
    let command = if packet {
        ide_cmd::IDENTIFY_PACKET_DEVICE
    } else {
        ide_cmd::IDENTIFY_DEVICE
    };

    let (data, status) = ata_command(&mut bus, Registers { command, ..Registers::default() });
    if status.contains(Status::ERR) || data.len() != 512 {
        warn!("IDENTIFY failed, status {:?}", status);
    }

    for (row, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        println!("{:04X}: {}", row * 16, hex.join(" "));
    }
    if data.len() == 512 {
        // Model number, words 27..=46, byte-swapped
        let model: String = data[54..94]
            .chunks(2)
            .flat_map(|w| [w[1], w[0]])
            .map(char::from)
            .collect();
        println!("Model: {}", model.trim_end());
    }
    Ok(())
}

fn cmd_create(size: &str, path: &Path) -> Result<()> {
    let bytes = parse_size(size)?;
    create_image(path, bytes)?;
    info!("Created {} ({} bytes)", path.display(), bytes);
    Ok(())
}

fn cmd_simulate(config_path: Option<PathBuf>, sectors: u8) -> Result<()> {
    let config_path = config_path
        .or_else(|| std::env::var_os("ZULUIDE_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("zuluide.toml"));
    let config = Config::load(&config_path)?;

    let mut bus = IdeProtocol::new(MockPhy::new(), config);
    bus.init()?;
    info!("Bus reset: {:?}", bus.poll());

    for dev_index in 0..2 {
        let Some(device) = bus.device(dev_index) else {
            continue;
        };
        let kind = device.kind();
        let packet = device.is_packet_device();
        let dev_bit = if dev_index == 1 { device_reg::DEV } else { 0 };
        info!("Device {}: {} session", dev_index, kind.name());

        if packet {
            simulate_packet_device(&mut bus, dev_bit, sectors);
        } else {
            simulate_rigid_device(&mut bus, dev_bit, sectors);
        }
    }
    Ok(())
}

fn simulate_rigid_device(bus: &mut IdeProtocol<MockPhy>, dev_bit: u8, sectors: u8) {
    let (data, status) = ata_command(
        bus,
        Registers {
            command: ide_cmd::IDENTIFY_DEVICE,
            device: dev_bit,
            ..Registers::default()
        },
    );
    info!("  IDENTIFY DEVICE: {} bytes, status {:?}", data.len(), status);

    let (data, status) = ata_command(
        bus,
        Registers {
            command: ide_cmd::READ_SECTORS,
            device: dev_bit | device_reg::LBA,
            sector_count: sectors,
            ..Registers::default()
        },
    );
    info!("  READ SECTORS 0+{}: {} bytes, status {:?}", sectors, data.len(), status);
    log_preview(&data);
}

fn simulate_packet_device(bus: &mut IdeProtocol<MockPhy>, dev_bit: u8, sectors: u8) {
    let (data, status) = ata_command(
        bus,
        Registers {
            command: ide_cmd::IDENTIFY_PACKET_DEVICE,
            device: dev_bit,
            ..Registers::default()
        },
    );
    info!("  IDENTIFY PACKET DEVICE: {} bytes, status {:?}", data.len(), status);

    // The first command reports the medium change
    let (_, status) = packet_command(bus, dev_bit, &[atapi_cmd::TEST_UNIT_READY]);
    info!("  TEST UNIT READY: status {:?}", status);
    let (sense, _) = packet_command(bus, dev_bit, &[atapi_cmd::REQUEST_SENSE, 0, 0, 0, 18]);
    if sense.len() >= 14 {
        info!(
            "  REQUEST SENSE: key {:X} asc {:02X}{:02X}",
            sense[2] & 0x0F,
            sense[12],
            sense[13]
        );
    }

    let (capacity, status) = packet_command(bus, dev_bit, &[atapi_cmd::READ_CAPACITY]);
    if capacity.len() == 8 {
        let last = u32::from_be_bytes([capacity[0], capacity[1], capacity[2], capacity[3]]);
        let size = u32::from_be_bytes([capacity[4], capacity[5], capacity[6], capacity[7]]);
        info!("  READ CAPACITY: last LBA {}, {} bytes per sector", last, size);
    } else {
        info!("  READ CAPACITY: status {:?}", status);
    }

    let (data, status) = packet_command(
        bus,
        dev_bit,
        &[atapi_cmd::READ10, 0, 0, 0, 0, 0, 0, 0, sectors],
    );
    info!("  READ(10) 0+{}: {} bytes, status {:?}", sectors, data.len(), status);
    log_preview(&data);
}

/// Issue a non-packet command and collect the data and final status
fn ata_command(bus: &mut IdeProtocol<MockPhy>, regs: Registers) -> (Vec<u8>, Status) {
    bus.phy_mut().clear_irqs();
    bus.phy_mut().issue_command(regs);
    run_until_idle(bus);
    let data = bus.phy_mut().take_sent();
    let status = bus.phy().last_irq().unwrap_or(Status::empty());
    (data, status)
}

fn packet_command(bus: &mut IdeProtocol<MockPhy>, dev_bit: u8, prefix: &[u8]) -> (Vec<u8>, Status) {
    let mut cdb = [0u8; 12];
    cdb[..prefix.len()].copy_from_slice(prefix);
    bus.phy_mut().clear_irqs();
    bus.phy_mut().issue_packet(dev_bit, &cdb, 0xFFFE);
    run_until_idle(bus);
    let data = bus.phy_mut().take_sent();
    let status = bus.phy().last_irq().unwrap_or(Status::empty());
    (data, status)
}

fn run_until_idle(bus: &mut IdeProtocol<MockPhy>) {
    while bus.poll() != PhyEvent::None {}
}

fn log_preview(data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let preview: Vec<String> = data.iter().take(16).map(|b| format!("{:02X}", b)).collect();
    info!("  first bytes: {}", preview.join(" "));
}
