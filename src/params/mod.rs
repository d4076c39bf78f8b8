// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters that are ready to be used.
//!
//! The code here mirrors the code within the `cli` module; `cli` is unparsed,
//! user-facing code, whereas parameters have been parsed and validated. The
//! code here should be public to the entire crate.

mod calibration_cycle;
mod instruments;
mod observe;
mod reduce;

pub(crate) use calibration_cycle::{CalibrationCycleError, CalibrationCycleParams, VnaParams};
pub(crate) use instruments::{HardwareParams, InstrumentParams, SimulationParams};
pub(crate) use observe::{ObserveError, ObserveParams};
pub(crate) use reduce::{ReduceParams, ReductionError};
