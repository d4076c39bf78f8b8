// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turn batches of complex sample blocks into averaged power spectra.
//!
//! Two estimators are available. The windowed FFT transforms each block of
//! `num_channels` samples directly. The polyphase filter bank (PFB) takes
//! blocks `num_taps` times longer, weights them with a windowed-sinc
//! prototype filter and folds the taps together before a `num_channels` point
//! FFT; this buys much lower leakage between channels for the extra samples.
//!
//! Either way, the output is the mean of |FFT|² over all blocks, shifted so
//! that index 0 is the lowest frequency.

mod error;
mod window;

pub use error::SpectrumError;
pub use window::{Window, WindowCoefficients};
pub(crate) use window::WINDOWS_COMMA_SEPARATED;

use std::{num::NonZeroUsize, sync::Arc};

use hifitime::Duration;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::data::{PowerSpectrum, SampleBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectrometerMode {
    /// A windowed FFT per block.
    Fft,

    /// A first-stage polyphase filter bank.
    Pfb { num_taps: NonZeroUsize },
}

impl std::fmt::Display for SpectrometerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpectrometerMode::Fft => write!(f, "FFT"),
            SpectrometerMode::Pfb { num_taps } => write!(f, "PFB ({num_taps} taps)"),
        }
    }
}

/// A configured spectral estimator. Cheap to share between threads; it holds
/// no mutable state.
pub struct Spectrometer {
    mode: SpectrometerMode,
    num_channels: usize,
    window: WindowCoefficients,
    fft: Arc<dyn Fft<f64>>,
}

impl Spectrometer {
    /// Create a spectrometer using a named window function.
    pub fn new(
        mode: SpectrometerMode,
        num_channels: usize,
        window: Window,
    ) -> Result<Spectrometer, SpectrumError> {
        let coeffs = match mode {
            SpectrometerMode::Fft => WindowCoefficients::for_fft(window, num_channels),
            SpectrometerMode::Pfb { num_taps } => {
                WindowCoefficients::for_pfb(window, num_taps.get(), num_channels)
            }
        };
        Spectrometer::with_coefficients(mode, num_channels, coeffs)
    }

    /// Create a spectrometer with explicit window coefficients. There must be
    /// exactly one coefficient per sample in a block.
    pub fn with_coefficients(
        mode: SpectrometerMode,
        num_channels: usize,
        window: WindowCoefficients,
    ) -> Result<Spectrometer, SpectrumError> {
        if num_channels == 0 {
            return Err(SpectrumError::NoChannels);
        }
        let expected = block_len(mode, num_channels);
        if window.len() != expected {
            return Err(SpectrumError::WindowLength {
                got: window.len(),
                expected,
            });
        }

        let fft = FftPlanner::new().plan_fft_forward(num_channels);
        Ok(Spectrometer {
            mode,
            num_channels,
            window,
            fft,
        })
    }

    pub fn mode(&self) -> SpectrometerMode {
        self.mode
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn window(&self) -> &WindowCoefficients {
        &self.window
    }

    /// The number of samples each block must have.
    pub fn block_len(&self) -> usize {
        block_len(self.mode, self.num_channels)
    }

    /// Average the power spectra of `blocks`. Every block is checked before
    /// any work is done; a block of the wrong length is an error rather than
    /// something to pad or truncate.
    pub fn blocks_to_power(&self, blocks: &[SampleBlock]) -> Result<PowerSpectrum, SpectrumError> {
        if blocks.is_empty() {
            return Err(SpectrumError::NoBlocks);
        }
        let expected = self.block_len();
        if let Some((index, block)) = blocks
            .iter()
            .enumerate()
            .find(|(_, b)| b.len() != expected)
        {
            return Err(SpectrumError::BlockLength {
                index,
                got: block.len(),
                expected,
            });
        }

        let mut power = vec![0.0; self.num_channels];
        let mut buffer = vec![Complex64::default(); self.num_channels];
        let mut scratch = vec![Complex64::default(); self.fft.get_inplace_scratch_len()];
        for block in blocks {
            self.front_end(block, &mut buffer);
            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            power
                .iter_mut()
                .zip(buffer.iter())
                .for_each(|(p, v)| *p += v.norm_sqr());
        }

        let num_blocks = blocks.len() as f64;
        power.iter_mut().for_each(|p| *p /= num_blocks);
        fft_shift(&mut power);
        Ok(power)
    }

    /// Weight a block by the window and, for the PFB, sum the taps together.
    fn front_end(&self, block: &[num_complex::Complex32], out: &mut [Complex64]) {
        let window = self.window.as_slice();
        match self.mode {
            SpectrometerMode::Fft => {
                for ((o, s), w) in out.iter_mut().zip(block).zip(window) {
                    *o = Complex64::new(s.re as f64 * w, s.im as f64 * w);
                }
            }
            SpectrometerMode::Pfb { .. } => {
                out.iter_mut().for_each(|o| *o = Complex64::default());
                for (segment, weights) in block
                    .chunks_exact(self.num_channels)
                    .zip(window.chunks_exact(self.num_channels))
                {
                    for ((o, s), w) in out.iter_mut().zip(segment).zip(weights) {
                        *o += Complex64::new(s.re as f64 * w, s.im as f64 * w);
                    }
                }
            }
        }
    }
}

fn block_len(mode: SpectrometerMode, num_channels: usize) -> usize {
    match mode {
        SpectrometerMode::Fft => num_channels,
        SpectrometerMode::Pfb { num_taps } => num_taps.get() * num_channels,
    }
}

/// Move the zero-frequency bin to the centre of the spectrum (the same
/// convention as numpy's `fftshift`).
pub fn fft_shift(spectrum: &mut [f64]) {
    let half = spectrum.len() / 2;
    spectrum.rotate_right(half);
}

/// The centre frequency of each channel of a shifted spectrum \[Hz\].
pub fn channel_frequencies(centre_frequency: f64, sample_rate: f64, num_channels: usize) -> Vec<f64> {
    let channel_width = sample_rate / num_channels as f64;
    let half = (num_channels / 2) as f64;
    (0..num_channels)
        .map(|k| centre_frequency + (k as f64 - half) * channel_width)
        .collect()
}

/// How many sample blocks of `block_len` fit into `integration_time` at
/// `sample_rate`.
pub fn num_blocks_per_spectrum(
    integration_time: Duration,
    sample_rate: f64,
    block_len: usize,
) -> Result<NonZeroUsize, SpectrumError> {
    let num_samples = integration_time.to_seconds() * sample_rate;
    let num_blocks = (num_samples / block_len as f64).floor() as usize;
    NonZeroUsize::new(num_blocks).ok_or(SpectrumError::IntegrationTooShort {
        integration_time,
        sample_rate,
        block_len,
    })
}
