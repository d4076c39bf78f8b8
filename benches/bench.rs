// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::num::NonZeroUsize;

use criterion::*;
use num_complex::Complex32;

use rhino_daq::{SampleBlock, Spectrometer, SpectrometerMode, Window};

/// Complex noise-like samples that don't need an RNG.
fn blocks(num_blocks: usize, block_len: usize) -> Vec<SampleBlock> {
    (0..num_blocks)
        .map(|b| {
            (0..block_len)
                .map(|i| {
                    let x = ((b * block_len + i) as f32 * 12.9898).sin() * 43758.545;
                    Complex32::new(x.fract(), (x * 1.618).fract())
                })
                .collect()
        })
        .collect()
}

fn spectral_estimation(c: &mut Criterion) {
    let num_channels = 2048;
    let mut group = c.benchmark_group("blocks_to_power");

    let fft = Spectrometer::new(SpectrometerMode::Fft, num_channels, Window::BlackmanHarris)
        .expect("valid spectrometer");
    let fft_blocks = blocks(16, fft.block_len());
    group.bench_function("fft 2048 channels, 16 blocks", |b| {
        b.iter(|| fft.blocks_to_power(black_box(&fft_blocks)))
    });

    let pfb = Spectrometer::new(
        SpectrometerMode::Pfb {
            num_taps: NonZeroUsize::new(4).expect("nonzero"),
        },
        num_channels,
        Window::Hann,
    )
    .expect("valid spectrometer");
    let pfb_blocks = blocks(16, pfb.block_len());
    group.bench_function("pfb 2048 channels 4 taps, 16 blocks", |b| {
        b.iter(|| pfb.blocks_to_power(black_box(&pfb_blocks)))
    });

    group.finish();
}

criterion_group!(benches, spectral_estimation);
criterion_main!(benches);
