// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The data products of an acquisition run.
//!
//! Both acquisition workers only ever append to their own series; all
//! timestamps within a series are non-decreasing. Nothing here relates one
//! worker's timestamps to the other's, that is the reducer's job.

#[cfg(test)]
mod tests;

use hifitime::{Duration, Epoch};
use ndarray::prelude::*;
use num_complex::Complex32;

use crate::constants::THERMOMETRY_SENTINEL;

/// One device read worth of complex baseband samples.
pub type SampleBlock = Vec<Complex32>;

/// An averaged power spectrum, one non-negative value per channel. Index 0 is
/// the lowest channel frequency.
pub type PowerSpectrum = Vec<f64>;

/// Power spectra with their capture times, in capture order.
#[derive(Debug, Clone, Default)]
pub struct Spectrogram {
    spectra: Vec<PowerSpectrum>,
    timestamps: Vec<Epoch>,
}

impl Spectrogram {
    pub fn new() -> Spectrogram {
        Spectrogram::default()
    }

    /// Append a spectrum. Capture times must not go backwards.
    pub fn push(&mut self, spectrum: PowerSpectrum, timestamp: Epoch) {
        debug_assert!(self.timestamps.last().map_or(true, |&t| t <= timestamp));
        debug_assert!(self.spectra.first().map_or(true, |s| s.len() == spectrum.len()));
        self.spectra.push(spectrum);
        self.timestamps.push(timestamp);
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// The number of channels in each spectrum, if there are any spectra.
    pub fn num_channels(&self) -> Option<usize> {
        self.spectra.first().map(|s| s.len())
    }

    pub fn spectra(&self) -> &[PowerSpectrum] {
        &self.spectra
    }

    pub fn timestamps(&self) -> &[Epoch] {
        &self.timestamps
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PowerSpectrum, Epoch)> {
        self.spectra.iter().zip(self.timestamps.iter().copied())
    }

    /// Pack the spectra into a (time, channel) array.
    pub fn to_array(&self) -> Array2<f64> {
        let num_chans = self.num_channels().unwrap_or(0);
        let mut array = Array2::zeros((self.len(), num_chans));
        for (mut row, spectrum) in array.outer_iter_mut().zip(self.spectra.iter()) {
            row.assign(&ArrayView1::from(spectrum.as_slice()));
        }
        array
    }

    /// Unpack a (time, channel) array. The number of rows must match the
    /// number of timestamps.
    pub fn from_array(array: ArrayView2<f64>, timestamps: Vec<Epoch>) -> Option<Spectrogram> {
        if array.len_of(Axis(0)) != timestamps.len() {
            return None;
        }
        Some(Spectrogram {
            spectra: array.outer_iter().map(|row| row.to_vec()).collect(),
            timestamps,
        })
    }
}

/// The switch network entered `label` at `start`. The interval implicitly
/// ends when the next one starts (or when the run ends).
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchInterval {
    pub label: String,
    pub start: Epoch,
}

/// One read of every thermometry probe \[°C\]. A failed read is recorded with
/// every probe set to [`THERMOMETRY_SENTINEL`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThermometrySample {
    pub temperatures: Vec<f64>,
    pub timestamp: Epoch,
}

impl ThermometrySample {
    /// A sample marking a failed read of `num_probes` probes.
    pub fn failed(num_probes: usize, timestamp: Epoch) -> ThermometrySample {
        ThermometrySample {
            temperatures: vec![THERMOMETRY_SENTINEL; num_probes],
            timestamp,
        }
    }

    /// Is this sample usable? A single bad probe spoils the whole row.
    pub fn is_valid(&self) -> bool {
        self.temperatures
            .iter()
            .all(|&t| t.is_finite() && t != THERMOMETRY_SENTINEL)
    }
}

/// Everything one acquisition run produced, handed from the coordinator to
/// the reducer.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub spectrogram: Spectrogram,

    /// The centre frequency of each spectrogram channel \[Hz\].
    pub channel_frequencies: Vec<f64>,

    pub switch_intervals: Vec<SwitchInterval>,

    pub thermometry: Vec<ThermometrySample>,

    /// When the run was started.
    pub start: Epoch,

    /// The run deadline.
    pub end: Epoch,
}

impl RunOutput {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
