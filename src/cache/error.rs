// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use super::SeriesKey;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("There is no run manifest in {0}; the run that wrote this cache didn't finish")]
    Incomplete(PathBuf),

    #[error("The run cache in {dir} is missing the '{key}' series")]
    MissingSeries { key: SeriesKey, dir: PathBuf },

    #[error("The run cache has {got} {what}, but {expected} timestamps")]
    LengthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("The run cache has spectra with {got} channels, but {expected} channel frequencies")]
    ChannelMismatch { got: usize, expected: usize },

    #[error("Couldn't (de)serialise {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Temperature rows have inconsistent lengths")]
    RaggedTemperatures,

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
