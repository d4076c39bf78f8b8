// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A single pass through a predefined sequence of switch states, optionally
//! preceded by VNA measurements of the calibration standards and switch paths.

use std::{
    fs::File,
    io::BufWriter,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::info;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::InstrumentParams;
use crate::{
    acquisition::{Acquisition, AcquisitionError, Instruments},
    cache::{CacheError, RunCache},
    constants::VNA_NUM_POINTS,
    data::RunOutput,
    instruments::{
        measure_paths, measure_sol_standards, InstrumentError, SParameters, SimulatedVna,
        SolMeasurements, SwitchNetwork,
    },
};

/// The file VNA measurements are written to, inside the run cache directory.
pub(crate) const VNA_FILE: &str = "vna.json";

/// The reflection coefficient seen by the simulated VNA.
const SIMULATED_REFLECTION: Complex64 = Complex64::new(0.1, -0.05);

pub(crate) struct VnaParams {
    /// \[Hz\]
    pub(crate) min_freq: f64,

    /// \[Hz\]
    pub(crate) max_freq: f64,

    pub(crate) num_sweeps: NonZeroUsize,

    /// The switch paths to measure after the calibration standards.
    pub(crate) paths: Vec<String>,
}

/// Parameters needed to run a calibration cycle.
pub(crate) struct CalibrationCycleParams {
    /// A predefined run; each state is visited once.
    pub(crate) acquisition: Acquisition,

    pub(crate) instruments: InstrumentParams,

    /// \[Hz\]
    pub(crate) sample_rate: f64,

    pub(crate) output_dir: PathBuf,

    /// Measure with the VNA first? Only simulated instruments have a VNA.
    pub(crate) vna: Option<VnaParams>,
}

/// Everything measured by the VNA during a calibration cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct VnaMeasurements {
    pub(crate) standards: SolMeasurements,
    pub(crate) paths: IndexMap<String, SParameters>,
}

impl CalibrationCycleParams {
    pub(crate) fn run(&self) -> Result<RunOutput, CalibrationCycleError> {
        let CalibrationCycleParams {
            acquisition,
            instruments,
            sample_rate,
            output_dir,
            vna,
        } = self;

        let cache = RunCache::new(output_dir)?;
        let run = |instruments: Instruments| -> Result<RunOutput, CalibrationCycleError> {
            if let Some(vna) = vna {
                let measurements = measure_vna(vna, &mut *instruments.switch)?;
                write_vna(&output_dir.join(VNA_FILE), &measurements)?;
            }
            let output = acquisition.run(instruments, Some(&cache))?;
            info!(
                "Calibration cycle of {} states complete",
                output.switch_intervals.len()
            );
            Ok(output)
        };
        instruments.with_instruments(*sample_rate, run)
    }
}

fn measure_vna(
    params: &VnaParams,
    switch: &mut dyn SwitchNetwork,
) -> Result<VnaMeasurements, InstrumentError> {
    let mut vna = SimulatedVna::new(
        params.min_freq,
        params.max_freq,
        VNA_NUM_POINTS,
        SIMULATED_REFLECTION,
    );
    let num_sweeps = params.num_sweeps.get();
    info!(
        "Measuring calibration standards and {} switch paths ({num_sweeps} sweeps each)",
        params.paths.len()
    );
    let standards = measure_sol_standards(&mut vna, switch, num_sweeps)?;
    let paths = measure_paths(&mut vna, switch, &params.paths, num_sweeps)?;
    Ok(VnaMeasurements { standards, paths })
}

fn write_vna(path: &Path, measurements: &VnaMeasurements) -> Result<(), CalibrationCycleError> {
    let file = BufWriter::new(File::create(path).map_err(CacheError::from)?);
    serde_json::to_writer_pretty(file, measurements).map_err(|source| {
        CalibrationCycleError::Json {
            path: path.to_path_buf(),
            source,
        }
    })?;
    info!("VNA measurements written to {}", path.display());
    Ok(())
}

#[derive(Error, Debug)]
pub(crate) enum CalibrationCycleError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error("Couldn't write VNA measurements to {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
