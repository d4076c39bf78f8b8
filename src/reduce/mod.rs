// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Join a run's spectra and thermometry back to the switch states they were
//! taken in, and calibrate.
//!
//! Each switch interval `i` gets an analysis window
//! `[t_i + guard, t_{i+1} - guard)`; the last interval's window has no upper
//! bound. Everything captured inside the window is averaged. A window that
//! captured no spectra is reported rather than dropped.
//!
//! Windows are half-open rather than closed: a sample taken exactly at
//! `t_{i+1} - guard` is not part of window `i`. With no guard buffer, a sample
//! taken at the instant of a switch therefore counts once, for the state that
//! was switched to.
//!
//! Calibration uses the Y-factor method with a noise diode of known excess
//! noise ratio (ENR):
//!
//! ```text
//! Q     = (P_source - P_load) / (P_noise_diode - P_load)
//! T_nd  = T_load * 10^(ENR / 10)
//! T_cal = T_nd * Q + T_load
//! ```

mod error;
mod summary;

pub use error::ReduceError;
pub use summary::ReductionSummary;

use hifitime::{Duration, Epoch};
use indexmap::IndexMap;
use log::{debug, warn};
use rayon::prelude::*;

use crate::{
    constants::{
        CELSIUS_TO_KELVIN, DEFAULT_LOAD_LABEL, DEFAULT_NOISE_DIODE_LABEL, DEFAULT_SOURCE_LABEL,
    },
    data::{PowerSpectrum, RunOutput, ThermometrySample},
};

/// The averages over one switch interval's analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct DwellAverage {
    pub label: String,

    /// How many times this label had been visited before this dwell.
    pub cycle: usize,

    /// When the switch entered this state.
    pub start: Epoch,

    /// The analysis window. No upper bound for the last interval.
    pub window: (Epoch, Option<Epoch>),

    /// The mean of the spectra captured in the window, if there were any.
    pub spectrum: Option<PowerSpectrum>,

    pub num_spectra: usize,

    /// The mean capture time of the averaged spectra.
    pub mean_capture_time: Option<Epoch>,

    /// The per-probe mean of valid thermometry rows \[°C\], if there were
    /// any.
    pub temperatures: Option<Vec<f64>>,

    pub num_temperatures: usize,

    /// Thermometry rows in the window that were thrown out because a probe
    /// failed.
    pub num_rejected_temperatures: usize,
}

/// A dwell whose analysis window had no spectra in it.
#[derive(Debug, Clone, PartialEq)]
pub struct DegenerateWindow {
    pub label: String,
    pub cycle: usize,
    pub start: Epoch,
}

/// Every dwell of a run, grouped by switch label (in order of first visit).
#[derive(Debug, Clone, Default)]
pub struct SourceSeparation {
    pub dwells: IndexMap<String, Vec<DwellAverage>>,
    pub degenerate: Vec<DegenerateWindow>,
}

impl SourceSeparation {
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.dwells.keys().map(|s| s.as_str())
    }

    /// The averaged spectrum for every visit of `label`, in visit order.
    pub fn spectra(&self, label: &str) -> Vec<Option<&PowerSpectrum>> {
        self.dwells
            .get(label)
            .map(|dwells| dwells.iter().map(|d| d.spectrum.as_ref()).collect())
            .unwrap_or_default()
    }
}

/// One full traversal of the switch states.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCycle {
    pub index: usize,
    pub states: IndexMap<String, DwellAverage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleCalibration {
    Calibrated {
        /// \[K\]
        load_temperature: f64,

        /// \[K\]
        noise_diode_temperature: f64,

        q: Vec<f64>,

        /// \[K\]
        temperature: Vec<f64>,
    },

    /// Something needed for calibration wasn't measured in this cycle; each
    /// entry says what.
    Undefined { missing: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedCycle {
    pub index: usize,

    /// When the cycle's first state was entered.
    pub start: Epoch,

    pub calibration: CycleCalibration,
}

impl CalibratedCycle {
    pub fn temperature(&self) -> Option<&[f64]> {
        match &self.calibration {
            CycleCalibration::Calibrated { temperature, .. } => Some(temperature),
            CycleCalibration::Undefined { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reducer {
    guard_buffer: Duration,
    noise_diode_enr_db: f64,
    source_label: String,
    load_label: String,
    noise_diode_label: String,
    load_probe: usize,
}

impl Reducer {
    pub fn new(guard_buffer: Duration, noise_diode_enr_db: f64) -> Reducer {
        Reducer {
            guard_buffer,
            noise_diode_enr_db,
            source_label: DEFAULT_SOURCE_LABEL.to_string(),
            load_label: DEFAULT_LOAD_LABEL.to_string(),
            noise_diode_label: DEFAULT_NOISE_DIODE_LABEL.to_string(),
            load_probe: 0,
        }
    }

    /// Use different switch labels for the source, the load and the noise
    /// diode.
    pub fn with_labels<S: Into<String>>(mut self, source: S, load: S, noise_diode: S) -> Self {
        self.source_label = source.into();
        self.load_label = load.into();
        self.noise_diode_label = noise_diode.into();
        self
    }

    /// Use a different thermometry probe for the load temperature.
    pub fn with_load_probe(mut self, probe: usize) -> Self {
        self.load_probe = probe;
        self
    }

    pub fn guard_buffer(&self) -> Duration {
        self.guard_buffer
    }

    pub fn noise_diode_enr_db(&self) -> f64 {
        self.noise_diode_enr_db
    }

    /// Average the spectra and thermometry inside every switch interval's
    /// analysis window.
    pub fn separate_sources(&self, run: &RunOutput) -> Result<SourceSeparation, ReduceError> {
        let intervals = &run.switch_intervals;
        if intervals.is_empty() {
            return Err(ReduceError::NoIntervals);
        }
        if let Some(index) = intervals
            .windows(2)
            .position(|pair| pair[1].start < pair[0].start)
        {
            return Err(ReduceError::UnorderedIntervals { index: index + 1 });
        }

        let capture_times = run.spectrogram.timestamps();
        let spectra = run.spectrogram.spectra();
        let thermometry_times: Vec<Epoch> = run.thermometry.iter().map(|t| t.timestamp).collect();

        // Each window is independent; average them in parallel.
        let averages: Vec<DwellAverage> = intervals
            .par_iter()
            .enumerate()
            .map(|(i, interval)| {
                let lower = interval.start + self.guard_buffer;
                let upper = intervals.get(i + 1).map(|next| next.start - self.guard_buffer);

                let range = window_range(capture_times, lower, upper);
                let spectrum = mean_spectrum(&spectra[range.clone()]);
                let mean_capture_time = mean_epoch(&capture_times[range.clone()]);

                let therm_range = window_range(&thermometry_times, lower, upper);
                let rows = &run.thermometry[therm_range];
                let (temperatures, num_temperatures) = mean_temperatures(rows);

                DwellAverage {
                    label: interval.label.clone(),
                    cycle: 0,
                    start: interval.start,
                    window: (lower, upper),
                    spectrum,
                    num_spectra: range.len(),
                    mean_capture_time,
                    temperatures,
                    num_temperatures,
                    num_rejected_temperatures: rows.len() - num_temperatures,
                }
            })
            .collect();

        let mut separation = SourceSeparation::default();
        for mut average in averages {
            let dwells = separation.dwells.entry(average.label.clone()).or_default();
            average.cycle = dwells.len();
            if average.spectrum.is_none() {
                warn!(
                    "No spectra in the analysis window of {} (visit {}); its average is undefined",
                    average.label, average.cycle
                );
                separation.degenerate.push(DegenerateWindow {
                    label: average.label.clone(),
                    cycle: average.cycle,
                    start: average.start,
                });
            }
            if average.num_rejected_temperatures > 0 {
                debug!(
                    "Ignored {} failed thermometry reads in {} (visit {})",
                    average.num_rejected_temperatures, average.label, average.cycle
                );
            }
            dwells.push(average);
        }

        Ok(separation)
    }

    /// Group dwells into full traversals of the switch states. There are as
    /// many cycles as visits to the least-visited state.
    pub fn calibration_cycles(&self, separation: &SourceSeparation) -> Vec<CalibrationCycle> {
        let num_cycles = separation
            .dwells
            .values()
            .map(|dwells| dwells.len())
            .min()
            .unwrap_or(0);
        (0..num_cycles)
            .map(|index| CalibrationCycle {
                index,
                states: separation
                    .dwells
                    .iter()
                    .map(|(label, dwells)| (label.clone(), dwells[index].clone()))
                    .collect(),
            })
            .collect()
    }

    /// Calibrate every cycle. A cycle missing a spectrum or the load
    /// temperature is reported as undefined; a run that never visited one of
    /// the calibration states is an error.
    pub fn calibrate(
        &self,
        cycles: &[CalibrationCycle],
    ) -> Result<Vec<CalibratedCycle>, ReduceError> {
        cycles
            .iter()
            .map(|cycle| self.calibrate_cycle(cycle))
            .collect()
    }

    fn calibrate_cycle(&self, cycle: &CalibrationCycle) -> Result<CalibratedCycle, ReduceError> {
        let get = |label: &str| {
            cycle
                .states
                .get(label)
                .ok_or_else(|| ReduceError::MissingState {
                    label: label.to_string(),
                })
        };
        let source = get(self.source_label.as_str())?;
        let load = get(self.load_label.as_str())?;
        let noise_diode = get(self.noise_diode_label.as_str())?;
        let start = cycle
            .states
            .values()
            .map(|d| d.start)
            .min()
            .unwrap_or(source.start);

        let mut missing = vec![];
        for dwell in [source, load, noise_diode] {
            if dwell.spectrum.is_none() {
                missing.push(format!("{} spectrum", dwell.label));
            }
        }
        let load_temperature = match &load.temperatures {
            Some(temps) => {
                let t = temps.get(self.load_probe).ok_or(ReduceError::NoSuchProbe {
                    probe: self.load_probe,
                    num_probes: temps.len(),
                })?;
                Some(t + CELSIUS_TO_KELVIN)
            }
            None => {
                missing.push(format!("{} temperature", load.label));
                None
            }
        };

        let calibration = match (
            &source.spectrum,
            &load.spectrum,
            &noise_diode.spectrum,
            load_temperature,
        ) {
            (Some(src), Some(ld), Some(nd), Some(t_load)) if missing.is_empty() => {
                if src.len() != ld.len() || nd.len() != ld.len() {
                    return Err(ReduceError::ChannelMismatch { cycle: cycle.index });
                }
                let t_nd = noise_diode_temperature(t_load, self.noise_diode_enr_db);
                let q: Vec<f64> = src
                    .iter()
                    .zip(ld.iter())
                    .zip(nd.iter())
                    .map(|((&s, &l), &n)| y_factor(s, l, n))
                    .collect();
                let temperature = q
                    .iter()
                    .map(|&q| calibrated_temperature(q, t_nd, t_load))
                    .collect();
                CycleCalibration::Calibrated {
                    load_temperature: t_load,
                    noise_diode_temperature: t_nd,
                    q,
                    temperature,
                }
            }
            _ => {
                warn!(
                    "Calibration cycle {} is undefined; missing {}",
                    cycle.index,
                    missing.join(", ")
                );
                CycleCalibration::Undefined { missing }
            }
        };

        Ok(CalibratedCycle {
            index: cycle.index,
            start,
            calibration,
        })
    }
}

/// The Y-factor (Q ratio) of one channel.
pub fn y_factor(source: f64, load: f64, noise_diode: f64) -> f64 {
    (source - load) / (noise_diode - load)
}

/// The effective noise temperature of a noise diode with the given ENR
/// \[dB\], referenced to a load at `load_temperature` \[K\].
pub fn noise_diode_temperature(load_temperature: f64, enr_db: f64) -> f64 {
    load_temperature * 10_f64.powf(enr_db / 10.0)
}

pub fn calibrated_temperature(q: f64, noise_diode_temperature: f64, load_temperature: f64) -> f64 {
    noise_diode_temperature * q + load_temperature
}

/// The indices of the sorted `times` in `[lower, upper)`.
fn window_range(times: &[Epoch], lower: Epoch, upper: Option<Epoch>) -> std::ops::Range<usize> {
    let first = times.partition_point(|&t| t < lower);
    let last = match upper {
        Some(upper) => times.partition_point(|&t| t < upper),
        None => times.len(),
    };
    first..last.max(first)
}

fn mean_spectrum(spectra: &[PowerSpectrum]) -> Option<PowerSpectrum> {
    let (first, rest) = spectra.split_first()?;
    let mut sum = first.clone();
    for spectrum in rest {
        sum.iter_mut().zip(spectrum).for_each(|(s, v)| *s += v);
    }
    let n = spectra.len() as f64;
    sum.iter_mut().for_each(|s| *s /= n);
    Some(sum)
}

fn mean_epoch(times: &[Epoch]) -> Option<Epoch> {
    let (&first, _) = times.split_first()?;
    let offset: f64 = times.iter().map(|&t| (t - first).to_seconds()).sum::<f64>()
        / times.len() as f64;
    Some(first + Duration::from_seconds(offset))
}

/// The per-probe mean of the valid rows, and how many rows were valid. A row
/// with any failed probe is excluded entirely.
fn mean_temperatures(rows: &[ThermometrySample]) -> (Option<Vec<f64>>, usize) {
    let mut valid = rows.iter().filter(|row| row.is_valid());
    let first = match valid.next() {
        Some(first) => first,
        None => return (None, 0),
    };
    let mut sum = first.temperatures.clone();
    let mut count = 1;
    for row in valid {
        sum.iter_mut()
            .zip(&row.temperatures)
            .for_each(|(s, t)| *s += t);
        count += 1;
    }
    sum.iter_mut().for_each(|s| *s /= count as f64);
    (Some(sum), count)
}
