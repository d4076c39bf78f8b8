// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all rhino-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use super::{
    calibration_cycle::CalibrationCycleArgsError,
    common::{InstrumentArgsError, SpectrometerArgsError, UnitArgError, UnknownStateError},
    observe::ObserveArgsError,
    reduce::ReduceArgsError,
};
use crate::{
    acquisition::AcquisitionError,
    cache::CacheError,
    instruments::InstrumentError,
    params::{CalibrationCycleError, ObserveError, ReductionError},
    reduce::ReduceError,
    spectrum::SpectrumError,
    switching::SwitchingError,
};

/// The *only* publicly visible error from rhino.
#[derive(Error, Debug)]
pub enum RhinoError {
    /// An error related to observe.
    #[error("{0}")]
    Observe(String),

    /// An error related to calibration-cycle.
    #[error("{0}")]
    CalibrationCycle(String),

    /// An error related to reduce.
    #[error("{0}")]
    Reduce(String),

    /// An error related to the spectrometer settings or spectral processing.
    #[error("{0}")]
    Spectrometer(String),

    /// An error talking to (or setting up) the radio, switch, thermometry or
    /// VNA.
    #[error("{0}\n\nIf the instruments aren't connected, try --simulate.")]
    Instruments(String),

    /// An error related to switch schedules.
    #[error("{0}")]
    Switching(String),

    /// An error related to run caches.
    #[error("{0}")]
    Cache(String),

    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// A generic error, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

// Binary sub-command errors.

impl From<ObserveArgsError> for RhinoError {
    fn from(e: ObserveArgsError) -> Self {
        let s = e.to_string();
        match e {
            ObserveArgsError::NoRunLength
            | ObserveArgsError::NoStates
            | ObserveArgsError::NonPositiveCycleLength
            | ObserveArgsError::DwellCount { .. } => Self::Observe(s),
            ObserveArgsError::Unit(e) => Self::from(e),
            ObserveArgsError::UnknownState(e) => Self::from(e),
        }
    }
}

impl From<CalibrationCycleArgsError> for RhinoError {
    fn from(e: CalibrationCycleArgsError) -> Self {
        let s = e.to_string();
        match e {
            CalibrationCycleArgsError::NoStates
            | CalibrationCycleArgsError::VnaNeedsSimulation
            | CalibrationCycleArgsError::NoVnaSweeps => Self::CalibrationCycle(s),
            CalibrationCycleArgsError::Unit(e) => Self::from(e),
            CalibrationCycleArgsError::UnknownState(e) => Self::from(e),
        }
    }
}

impl From<ReduceArgsError> for RhinoError {
    fn from(e: ReduceArgsError) -> Self {
        let s = e.to_string();
        match e {
            ReduceArgsError::NoCache => Self::Reduce(s),
            ReduceArgsError::Unit(e) => Self::from(e),
        }
    }
}

impl From<ObserveError> for RhinoError {
    fn from(e: ObserveError) -> Self {
        match e {
            ObserveError::Acquisition(e) => Self::from(e),
            ObserveError::Cache(e) => Self::from(e),
            ObserveError::Instrument(e) => Self::from(e),
        }
    }
}

impl From<CalibrationCycleError> for RhinoError {
    fn from(e: CalibrationCycleError) -> Self {
        let s = e.to_string();
        match e {
            CalibrationCycleError::Acquisition(e) => Self::from(e),
            CalibrationCycleError::Cache(e) => Self::from(e),
            CalibrationCycleError::Instrument(e) => Self::from(e),
            CalibrationCycleError::Json { .. } => Self::CalibrationCycle(s),
        }
    }
}

impl From<ReductionError> for RhinoError {
    fn from(e: ReductionError) -> Self {
        match e {
            ReductionError::Cache(e) => Self::from(e),
            ReductionError::Reduce(e) => Self::from(e),
        }
    }
}

// Library code errors.

impl From<SpectrometerArgsError> for RhinoError {
    fn from(e: SpectrometerArgsError) -> Self {
        match e {
            SpectrometerArgsError::Unit(e) => Self::from(e),
            SpectrometerArgsError::Spectrum(e) => Self::from(e),
        }
    }
}

impl From<InstrumentArgsError> for RhinoError {
    fn from(e: InstrumentArgsError) -> Self {
        let s = e.to_string();
        match e {
            InstrumentArgsError::Unit(e) => Self::from(e),
            InstrumentArgsError::NoIqSource
            | InstrumentArgsError::BadIqFormat(_)
            | InstrumentArgsError::NoSwitchDevice
            | InstrumentArgsError::NoProbes
            | InstrumentArgsError::NoSwitchCommands
            | InstrumentArgsError::SimulatedLoadTemperature(_) => Self::Instruments(s),
        }
    }
}

impl From<UnitArgError> for RhinoError {
    fn from(e: UnitArgError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<UnknownStateError> for RhinoError {
    fn from(e: UnknownStateError) -> Self {
        Self::Switching(e.to_string())
    }
}

impl From<AcquisitionError> for RhinoError {
    fn from(e: AcquisitionError) -> Self {
        let s = e.to_string();
        match e {
            AcquisitionError::WorkerPanicked { .. }
            | AcquisitionError::NonPositiveRunLength
            | AcquisitionError::CyclicPredefinedSchedule => Self::Generic(s),
            AcquisitionError::Spectrum(e) => Self::from(e),
            AcquisitionError::Switching(e) => Self::from(e),
            AcquisitionError::Cache(e) => Self::from(e),
        }
    }
}

impl From<SpectrumError> for RhinoError {
    fn from(e: SpectrumError) -> Self {
        Self::Spectrometer(e.to_string())
    }
}

impl From<SwitchingError> for RhinoError {
    fn from(e: SwitchingError) -> Self {
        let s = e.to_string();
        match e {
            SwitchingError::SetState { .. } => Self::Instruments(s),
            SwitchingError::NoStates
            | SwitchingError::NonPositiveDwell { .. }
            | SwitchingError::NonPositiveCadence
            | SwitchingError::UnknownState { .. } => Self::Switching(s),
        }
    }
}

impl From<InstrumentError> for RhinoError {
    fn from(e: InstrumentError) -> Self {
        Self::Instruments(e.to_string())
    }
}

impl From<CacheError> for RhinoError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e.to_string())
    }
}

impl From<ReduceError> for RhinoError {
    fn from(e: ReduceError) -> Self {
        let s = e.to_string();
        match e {
            ReduceError::IO(e) => Self::from(e),
            ReduceError::Json(_) => Self::Generic(s),
            ReduceError::UnorderedIntervals { .. }
            | ReduceError::NoIntervals
            | ReduceError::MissingState { .. }
            | ReduceError::NoSuchProbe { .. }
            | ReduceError::ChannelMismatch { .. } => Self::Reduce(s),
        }
    }
}

impl From<std::io::Error> for RhinoError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
