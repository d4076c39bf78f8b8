// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Dicke-switched spectral acquisition and calibration for the RHINO radiometer.

A run steers a switch network through a list of RF source states while a
spectrometer continuously turns streamed complex samples into averaged power
spectra. The two workers run in parallel and never talk to each other; their
independently time-stamped outputs are joined afterwards by the reducer, which
averages spectra per switch dwell and derives calibrated temperatures.
 */

pub mod acquisition;
pub mod cache;
mod cli;
pub mod constants;
pub mod data;
pub mod instruments;
pub(crate) mod params;
pub mod reduce;
pub mod spectrum;
pub mod switching;
pub(crate) mod unit_parsing;

use crossbeam_utils::atomic::AtomicCell;

/// Should we be displaying progress bars?
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);

// Re-exports.
pub use acquisition::{Acquisition, AcquisitionError, AcquisitionMode, Instruments};
pub use cache::{CacheError, RunCache, SeriesKey};
pub use cli::{Rhino, RhinoError};
pub use data::{
    PowerSpectrum, RunOutput, SampleBlock, Spectrogram, SwitchInterval, ThermometrySample,
};
pub use reduce::{CalibratedCycle, CalibrationCycle, DwellAverage, Reducer, SourceSeparation};
pub use spectrum::{Spectrometer, SpectrometerMode, Window, WindowCoefficients};
pub use switching::{SwitchLog, SwitchSchedule};
