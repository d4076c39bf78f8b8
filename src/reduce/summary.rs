// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A serialisable record of a reduction. Times are UNIX seconds; undefined
//! averages are `null`.

use std::{fs::File, io::BufWriter, path::Path};

use serde::{Deserialize, Serialize};

use super::{CalibratedCycle, CycleCalibration, DwellAverage, Reducer, ReduceError, SourceSeparation};
use crate::data::RunOutput;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionSummary {
    /// \[seconds\]
    pub guard_buffer: f64,
    pub noise_diode_enr_db: f64,
    /// \[Hz\]
    pub channel_frequencies: Vec<f64>,
    pub run_start: f64,
    pub run_end: f64,
    pub dwells: Vec<DwellSummary>,
    pub cycles: Vec<CycleSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DwellSummary {
    pub label: String,
    pub cycle: usize,
    pub start: f64,
    pub mean_capture_time: Option<f64>,
    pub num_spectra: usize,
    pub spectrum: Option<Vec<f64>>,
    /// \[°C\]
    pub temperatures: Option<Vec<f64>>,
    pub num_temperatures: usize,
    pub num_rejected_temperatures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub index: usize,
    pub start: f64,
    /// \[K\]
    pub load_temperature: Option<f64>,
    /// \[K\]
    pub noise_diode_temperature: Option<f64>,
    pub q: Option<Vec<f64>>,
    /// \[K\]
    pub temperature: Option<Vec<f64>>,
    pub missing: Vec<String>,
}

impl From<&DwellAverage> for DwellSummary {
    fn from(d: &DwellAverage) -> Self {
        DwellSummary {
            label: d.label.clone(),
            cycle: d.cycle,
            start: d.start.to_unix_seconds(),
            mean_capture_time: d.mean_capture_time.map(|t| t.to_unix_seconds()),
            num_spectra: d.num_spectra,
            spectrum: d.spectrum.clone(),
            temperatures: d.temperatures.clone(),
            num_temperatures: d.num_temperatures,
            num_rejected_temperatures: d.num_rejected_temperatures,
        }
    }
}

impl From<&CalibratedCycle> for CycleSummary {
    fn from(c: &CalibratedCycle) -> Self {
        let start = c.start.to_unix_seconds();
        match &c.calibration {
            CycleCalibration::Calibrated {
                load_temperature,
                noise_diode_temperature,
                q,
                temperature,
            } => CycleSummary {
                index: c.index,
                start,
                load_temperature: Some(*load_temperature),
                noise_diode_temperature: Some(*noise_diode_temperature),
                q: Some(q.clone()),
                temperature: Some(temperature.clone()),
                missing: vec![],
            },
            CycleCalibration::Undefined { missing } => CycleSummary {
                index: c.index,
                start,
                load_temperature: None,
                noise_diode_temperature: None,
                q: None,
                temperature: None,
                missing: missing.clone(),
            },
        }
    }
}

impl ReductionSummary {
    pub fn new(
        reducer: &Reducer,
        run: &RunOutput,
        separation: &SourceSeparation,
        calibrated: &[CalibratedCycle],
    ) -> ReductionSummary {
        let mut dwells: Vec<DwellSummary> = separation
            .dwells
            .values()
            .flatten()
            .map(DwellSummary::from)
            .collect();
        // Back into the order they happened.
        dwells.sort_by(|a, b| a.start.total_cmp(&b.start));

        ReductionSummary {
            guard_buffer: reducer.guard_buffer().to_seconds(),
            noise_diode_enr_db: reducer.noise_diode_enr_db(),
            channel_frequencies: run.channel_frequencies.clone(),
            run_start: run.start.to_unix_seconds(),
            run_end: run.end.to_unix_seconds(),
            dwells,
            cycles: calibrated.iter().map(CycleSummary::from).collect(),
        }
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ReduceError> {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
