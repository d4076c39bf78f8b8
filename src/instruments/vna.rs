// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Vector network analyser bookkeeping. The VNA is only used between
//! acquisition runs, to characterise the calibration standards and the paths
//! through the switch network.

use indexmap::IndexMap;
use log::debug;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::{InstrumentError, SwitchNetwork};

/// S-parameters over a frequency sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SParameters {
    /// \[Hz\]
    pub frequencies: Vec<f64>,
    pub s11: Vec<Complex64>,
    pub s21: Vec<Complex64>,
}

pub trait Vna: Send {
    /// Perform a single sweep.
    fn sweep(&mut self) -> Result<SParameters, InstrumentError>;

    /// Perform `num_sweeps` sweeps and average them.
    fn measure_s_parameters(&mut self, num_sweeps: usize) -> Result<SParameters, InstrumentError> {
        let sweeps = (0..num_sweeps)
            .map(|_| self.sweep())
            .collect::<Result<Vec<_>, _>>()?;
        average_sweeps(&sweeps)
    }
}

/// Average S11 and S21 over sweeps. All sweeps must cover the same
/// frequencies; the first sweep's frequencies are returned.
pub fn average_sweeps(sweeps: &[SParameters]) -> Result<SParameters, InstrumentError> {
    let first = sweeps.first().ok_or(InstrumentError::NoSweeps)?;
    let num_points = first.frequencies.len();
    for (index, sweep) in sweeps.iter().enumerate() {
        for got in [sweep.frequencies.len(), sweep.s11.len(), sweep.s21.len()] {
            if got != num_points {
                return Err(InstrumentError::SweepLength {
                    index,
                    got,
                    expected: num_points,
                });
            }
        }
    }

    let mut s11 = vec![Complex64::default(); num_points];
    let mut s21 = vec![Complex64::default(); num_points];
    for sweep in sweeps {
        s11.iter_mut().zip(&sweep.s11).for_each(|(a, s)| *a += s);
        s21.iter_mut().zip(&sweep.s21).for_each(|(a, s)| *a += s);
    }
    let n = sweeps.len() as f64;
    s11.iter_mut().for_each(|s| *s /= n);
    s21.iter_mut().for_each(|s| *s /= n);

    Ok(SParameters {
        frequencies: first.frequencies.clone(),
        s11,
        s21,
    })
}

/// Measurements of the short, open and load calibration standards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolMeasurements {
    pub short: SParameters,
    pub open: SParameters,
    pub load: SParameters,
}

pub const VNA_SHORT_LABEL: &str = "vna_short";
pub const VNA_OPEN_LABEL: &str = "vna_open";
pub const VNA_LOAD_LABEL: &str = "vna_load";

/// Step the switch through the short, open and load standards and measure
/// each.
pub fn measure_sol_standards(
    vna: &mut dyn Vna,
    switch: &mut dyn SwitchNetwork,
    num_sweeps: usize,
) -> Result<SolMeasurements, InstrumentError> {
    let mut measure = |label: &str| -> Result<SParameters, InstrumentError> {
        debug!("Measuring calibration standard {label}");
        switch.set_state(label)?;
        vna.measure_s_parameters(num_sweeps)
    };
    Ok(SolMeasurements {
        short: measure(VNA_SHORT_LABEL)?,
        open: measure(VNA_OPEN_LABEL)?,
        load: measure(VNA_LOAD_LABEL)?,
    })
}

/// Measure every switch path in `labels`.
pub fn measure_paths(
    vna: &mut dyn Vna,
    switch: &mut dyn SwitchNetwork,
    labels: &[String],
    num_sweeps: usize,
) -> Result<IndexMap<String, SParameters>, InstrumentError> {
    let mut measurements = IndexMap::with_capacity(labels.len());
    for label in labels {
        debug!("Measuring switch path {label}");
        switch.set_state(label)?;
        measurements.insert(label.clone(), vna.measure_s_parameters(num_sweeps)?);
    }
    Ok(measurements)
}

/// A VNA looking at a fixed reflection. Successive sweeps wobble
/// deterministically around it so averaging has something to do.
pub struct SimulatedVna {
    frequencies: Vec<f64>,
    reflection: Complex64,
    num_sweeps: usize,
}

impl SimulatedVna {
    pub fn new(min_freq: f64, max_freq: f64, num_points: usize, reflection: Complex64) -> Self {
        let step = if num_points > 1 {
            (max_freq - min_freq) / (num_points - 1) as f64
        } else {
            0.0
        };
        SimulatedVna {
            frequencies: (0..num_points)
                .map(|i| min_freq + i as f64 * step)
                .collect(),
            reflection,
            num_sweeps: 0,
        }
    }
}

impl Vna for SimulatedVna {
    fn sweep(&mut self) -> Result<SParameters, InstrumentError> {
        // Alternate above and below the true value.
        let wobble = if self.num_sweeps % 2 == 0 { 1.01 } else { 0.99 };
        self.num_sweeps += 1;
        let s11 = self.reflection * wobble;
        let s21 = (1.0 - self.reflection.norm_sqr()).max(0.0).sqrt() * wobble;
        let n = self.frequencies.len();
        Ok(SParameters {
            frequencies: self.frequencies.clone(),
            s11: vec![s11; n],
            s21: vec![Complex64::new(s21, 0.0); n],
        })
    }
}
