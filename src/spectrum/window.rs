// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Window functions applied to sample blocks before transforming them.

use std::f64::consts::PI;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::SpectrumError;

lazy_static::lazy_static! {
    pub(crate) static ref WINDOWS_COMMA_SEPARATED: String = Window::iter().join(", ");
}

/// Window functions that can be applied before the spectral transform. Names
/// are matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum Window {
    #[strum(to_string = "Rectangular", serialize = "Boxcar")]
    Rectangular,

    Blackman,

    BlackmanHarris,

    #[strum(to_string = "Hann", serialize = "Hanning")]
    Hann,

    Hamming,

    Cosine,

    Bartlett,
}

impl Window {
    /// Look up a window by name. Unknown names are an error.
    pub fn parse(name: &str) -> Result<Window, SpectrumError> {
        name.trim()
            .parse()
            .map_err(|_| SpectrumError::UnknownWindow {
                name: name.to_string(),
                valid: WINDOWS_COMMA_SEPARATED.as_str(),
            })
    }

    /// Generate `len` window coefficients. A symmetric window is suitable for
    /// filter design; a periodic window is the first `len` points of a
    /// `len + 1` point symmetric window and suits spectral analysis of
    /// contiguous blocks.
    pub fn coefficients(self, len: usize, symmetric: bool) -> Vec<f64> {
        if len == 0 {
            return vec![];
        }
        if len == 1 {
            return vec![1.0];
        }
        if !symmetric {
            let mut w = self.coefficients(len + 1, true);
            w.truncate(len);
            return w;
        }

        let denom = (len - 1) as f64;
        (0..len)
            .map(|n| {
                let n = n as f64;
                let x = 2.0 * PI * n / denom;
                match self {
                    Window::Rectangular => 1.0,
                    Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                    Window::BlackmanHarris => {
                        0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                            - 0.01168 * (3.0 * x).cos()
                    }
                    Window::Hann => 0.5 - 0.5 * x.cos(),
                    Window::Hamming => 0.54 - 0.46 * x.cos(),
                    Window::Cosine => (PI * (n + 0.5) / len as f64).sin(),
                    Window::Bartlett => 1.0 - (2.0 * n / denom - 1.0).abs(),
                }
            })
            .collect()
    }
}

/// The real-valued weights multiplied into every sample block. Computed once
/// per run and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCoefficients(Vec<f64>);

impl WindowCoefficients {
    /// Coefficients for the plain windowed-FFT spectrometer.
    pub fn for_fft(window: Window, num_channels: usize) -> WindowCoefficients {
        WindowCoefficients(window.coefficients(num_channels, true))
    }

    /// Coefficients for the polyphase filter bank: the (periodic) window
    /// shapes a sinc low-pass prototype filter whose cutoff is
    /// `1 / num_channels` of the Nyquist frequency.
    pub fn for_pfb(window: Window, num_taps: usize, num_channels: usize) -> WindowCoefficients {
        let len = num_taps * num_channels;
        let sinc = sinc_lowpass(len, 1.0 / num_channels as f64);
        let coeffs = window
            .coefficients(len, false)
            .into_iter()
            .zip(sinc)
            .map(|(w, s)| w * s)
            .collect();
        WindowCoefficients(coeffs)
    }

    /// Use arbitrary coefficients.
    pub fn from_vec(coeffs: Vec<f64>) -> WindowCoefficients {
        WindowCoefficients(coeffs)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// A linear-phase low-pass FIR filter of `len` taps with a rectangular window.
/// `cutoff` is relative to the Nyquist frequency. The taps are normalised to a
/// DC gain of 1.
fn sinc_lowpass(len: usize, cutoff: f64) -> Vec<f64> {
    let alpha = (len as f64 - 1.0) / 2.0;
    let taps: Vec<f64> = (0..len)
        .map(|n| {
            let m = n as f64 - alpha;
            cutoff * sinc(cutoff * m)
        })
        .collect();
    let dc_gain: f64 = taps.iter().sum();
    taps.into_iter().map(|t| t / dc_gain).collect()
}

/// The normalised sinc function.
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}
