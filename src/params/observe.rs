// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Continuous Dicke-switched observing.

use std::path::PathBuf;

use log::info;
use thiserror::Error;

use super::InstrumentParams;
use crate::{
    acquisition::{Acquisition, AcquisitionError},
    cache::{CacheError, RunCache},
    data::RunOutput,
    instruments::InstrumentError,
};

/// Parameters needed to observe.
pub(crate) struct ObserveParams {
    /// The run itself; the switch schedule cycles until the run length
    /// elapses.
    pub(crate) acquisition: Acquisition,

    pub(crate) instruments: InstrumentParams,

    /// \[Hz\]
    pub(crate) sample_rate: f64,

    /// Where the run cache is written.
    pub(crate) output_dir: PathBuf,
}

impl ObserveParams {
    pub(crate) fn run(&self) -> Result<RunOutput, ObserveError> {
        let ObserveParams {
            acquisition,
            instruments,
            sample_rate,
            output_dir,
        } = self;

        let cache = RunCache::new(output_dir)?;
        let output = instruments.with_instruments(*sample_rate, |instruments| {
            acquisition
                .run(instruments, Some(&cache))
                .map_err(ObserveError::from)
        })?;
        info!(
            "Observed for {} ({} spectra)",
            output.duration(),
            output.spectrogram.len()
        );
        Ok(output)
    }
}

#[derive(Error, Debug)]
pub(crate) enum ObserveError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),
}
