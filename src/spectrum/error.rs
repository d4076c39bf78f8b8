// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from the spectral estimator. All of these are configuration errors;
//! none can be recovered from by retrying.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpectrumError {
    #[error("Unknown window function '{name}'; valid windows are: {valid}")]
    UnknownWindow { name: String, valid: &'static str },

    #[error("The number of spectrometer channels must be at least 1")]
    NoChannels,

    #[error("The number of polyphase filter bank taps must be at least 1")]
    NoTaps,

    #[error("Got {got} window coefficients, but the spectrometer needs {expected}")]
    WindowLength { got: usize, expected: usize },

    #[error("Sample block {index} has {got} samples, but the spectrometer needs exactly {expected}")]
    BlockLength {
        index: usize,
        got: usize,
        expected: usize,
    },

    #[error("Cannot make a power spectrum from zero sample blocks")]
    NoBlocks,

    #[error("An integration time of {integration_time} at {sample_rate} Hz doesn't fill a single block of {block_len} samples")]
    IntegrationTooShort {
        integration_time: hifitime::Duration,
        sample_rate: f64,
        block_len: usize,
    },
}
