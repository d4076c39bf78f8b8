// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from instrument drivers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("The switch network has no state called '{0}'")]
    UnknownSwitchState(String),

    #[error("Couldn't parse thermometry line '{line}': {reason}")]
    BadThermometryLine { line: String, reason: String },

    #[error("Expected {expected} thermometry probes, but got {got}")]
    ProbeCount { expected: usize, got: usize },

    #[error("The sample stream has ended")]
    EndOfStream,

    #[error("The radio dropped a sample block")]
    DroppedBlock,

    #[error("The VNA returned no sweeps")]
    NoSweeps,

    #[error("VNA sweep {index} has {got} points, but sweep 0 has {expected}")]
    SweepLength {
        index: usize,
        got: usize,
        expected: usize,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
