// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReduceError {
    #[error("Switch interval {index} starts before the interval preceding it")]
    UnorderedIntervals { index: usize },

    #[error("The run has no switch intervals, so there's nothing to separate")]
    NoIntervals,

    #[error("Calibration needs the '{label}' state, but the run never visited it")]
    MissingState { label: String },

    #[error("Thermometry probe {probe} was requested for the load temperature, but there are only {num_probes} probes")]
    NoSuchProbe { probe: usize, num_probes: usize },

    #[error("Spectra in calibration cycle {cycle} have different numbers of channels")]
    ChannelMismatch { cycle: usize },

    #[error("Couldn't write the reduction summary: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
