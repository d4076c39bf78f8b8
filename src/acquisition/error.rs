// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::{cache::CacheError, spectrum::SpectrumError, switching::SwitchingError};

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("The {worker} worker panicked; the run's data is incomplete")]
    WorkerPanicked { worker: &'static str },

    #[error("The run length must be positive")]
    NonPositiveRunLength,

    #[error("Predefined acquisition needs a switch schedule that visits each state once")]
    CyclicPredefinedSchedule,

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error(transparent)]
    Switching(#[from] SwitchingError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
