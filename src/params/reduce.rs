// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reduce a cached run to per-state averages and calibrated temperatures.

use std::path::PathBuf;

use log::info;
use thiserror::Error;

use crate::{
    cache::{CacheError, RunCache},
    cli::InfoPrinter,
    reduce::{CycleCalibration, ReduceError, Reducer, ReductionSummary},
};

pub(crate) struct ReduceParams {
    pub(crate) cache: RunCache,

    pub(crate) reducer: Reducer,

    /// Where to write the JSON summary, if anywhere.
    pub(crate) output: Option<PathBuf>,
}

impl ReduceParams {
    pub(crate) fn run(&self) -> Result<ReductionSummary, ReductionError> {
        let ReduceParams {
            cache,
            reducer,
            output,
        } = self;

        let run = cache.read_run()?;
        info!(
            "Read {} spectra, {} switch intervals and {} thermometry rows from {}",
            run.spectrogram.len(),
            run.switch_intervals.len(),
            run.thermometry.len(),
            cache.dir().display()
        );

        let separation = reducer.separate_sources(&run)?;
        let cycles = reducer.calibration_cycles(&separation);
        let calibrated = reducer.calibrate(&cycles)?;

        let mut printer = InfoPrinter::new("Calibration".into());
        printer.push_line(format!("{} states", separation.dwells.len()).into());
        if !separation.degenerate.is_empty() {
            printer.push_line(
                format!(
                    "{} analysis windows had no spectra",
                    separation.degenerate.len()
                )
                .into(),
            );
        }
        for cycle in &calibrated {
            let line = match &cycle.calibration {
                CycleCalibration::Calibrated {
                    load_temperature,
                    temperature,
                    ..
                } => {
                    let mean = temperature.iter().sum::<f64>() / temperature.len().max(1) as f64;
                    format!(
                        "Cycle {}: mean temperature {mean:.2} K (load {load_temperature:.2} K)",
                        cycle.index
                    )
                }
                CycleCalibration::Undefined { missing } => {
                    format!("Cycle {}: undefined (no {})", cycle.index, missing.join(", "))
                }
            };
            printer.push_line(line.into());
        }
        printer.display();

        let summary = ReductionSummary::new(reducer, &run, &separation, &calibrated);
        if let Some(output) = output {
            summary.write_json(output)?;
            info!("Reduction written to {}", output.display());
        }
        Ok(summary)
    }
}

#[derive(Error, Debug)]
pub(crate) enum ReductionError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Reduce(#[from] ReduceError),
}
