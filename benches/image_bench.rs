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

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::io::Write;
use tempfile::NamedTempFile;
use zuluide_core::core::config::{Config, DeviceConfig, DeviceKind};
use zuluide_core::core::constants::{device_reg, ide_cmd};
use zuluide_core::core::error::Result;
use zuluide_core::core::image::{Image, ImageCallback, ImageFile};
use zuluide_core::core::phy::{MockPhy, Registers};
use zuluide_core::core::protocol::IdeProtocol;

const IMAGE_SIZE: usize = 4 * 1024 * 1024;

fn image_file(size: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    file
}

/// Consumes at most `max_blocks` per offer
struct Sink {
    max_blocks: usize,
    checksum: u64,
}

impl ImageCallback for Sink {
    fn read_callback(&mut self, data: &[u8], blocksize: usize, num_blocks: usize) -> Result<usize> {
        let n = num_blocks.min(self.max_blocks);
        for byte in &data[..n * blocksize] {
            self.checksum = self.checksum.wrapping_add(*byte as u64);
        }
        Ok(n)
    }

    fn write_callback(&mut self, data: &mut [u8], blocksize: usize, num_blocks: usize) -> Result<usize> {
        let n = num_blocks.min(self.max_blocks);
        data[..n * blocksize].fill(0xA5);
        Ok(n)
    }
}

fn ring_buffer_read_benchmark(c: &mut Criterion) {
    let file = image_file(IMAGE_SIZE);
    let mut group = c.benchmark_group("image_read");
    group.throughput(Throughput::Bytes(IMAGE_SIZE as u64));

    // Whole-run consumption versus a host that takes one block at a time
    for max_blocks in [1usize, 16, usize::MAX] {
        group.bench_with_input(
            BenchmarkId::new("blocks_per_offer", max_blocks),
            &max_blocks,
            |b, &max_blocks| {
                let mut image = ImageFile::open(file.path(), true).unwrap();
                b.iter(|| {
                    let mut sink = Sink {
                        max_blocks,
                        checksum: 0,
                    };
                    image.read(0, 2048, IMAGE_SIZE / 2048, &mut sink).unwrap();
                    black_box(sink.checksum);
                });
            },
        );
    }

    for buffer_size in [4096usize, 65536, 262144] {
        group.bench_with_input(
            BenchmarkId::new("buffer_size", buffer_size),
            &buffer_size,
            |b, &buffer_size| {
                let mut image = ImageFile::open_with_buffer(file.path(), true, buffer_size).unwrap();
                b.iter(|| {
                    let mut sink = Sink {
                        max_blocks: usize::MAX,
                        checksum: 0,
                    };
                    image.read(0, 512, IMAGE_SIZE / 512, &mut sink).unwrap();
                    black_box(sink.checksum);
                });
            },
        );
    }

    group.finish();
}

fn ring_buffer_write_benchmark(c: &mut Criterion) {
    let file = image_file(IMAGE_SIZE);
    let mut group = c.benchmark_group("image_write");
    group.throughput(Throughput::Bytes(IMAGE_SIZE as u64));
    group.sample_size(20);

    group.bench_function("sequential_512", |b| {
        let mut image = ImageFile::open(file.path(), false).unwrap();
        b.iter(|| {
            let mut source = Sink {
                max_blocks: usize::MAX,
                checksum: 0,
            };
            image.write(0, 512, IMAGE_SIZE / 512, &mut source).unwrap();
        });
    });

    group.finish();
}

fn rigid_read_sectors_benchmark(c: &mut Criterion) {
    let file = image_file(IMAGE_SIZE);
    let mut config = Config::default();
    config
        .devices
        .push(DeviceConfig::new(DeviceKind::Rigid).with_image(file.path()));

    let mut bus = IdeProtocol::new(MockPhy::new(), config);
    bus.init().unwrap();
    bus.poll();

    let regs = Registers {
        command: ide_cmd::READ_SECTORS,
        device: device_reg::LBA,
        sector_count: 0,
        ..Registers::default()
    };

    let mut group = c.benchmark_group("rigid");
    group.throughput(Throughput::Bytes(256 * 512));
    group.bench_function("read_sectors_256", |b| {
        b.iter(|| {
            bus.phy_mut().issue_command(regs);
            bus.poll();
            black_box(bus.phy_mut().take_sent());
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    ring_buffer_read_benchmark,
    ring_buffer_write_benchmark,
    rigid_read_sectors_benchmark
);
criterion_main!(benches);
