// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The hardware an acquisition run talks to.
//!
//! Acquisition only ever needs four narrow capabilities: read a block of
//! samples from the radio, put the switch network into a named state, read the
//! thermometry probes and tell the time. Each is a trait here so that real
//! drivers, file replays and simulations are interchangeable.

mod clock;
mod error;
mod line;
mod raw_iq;
mod simulated;
mod vna;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use error::InstrumentError;
pub use line::{default_switch_commands, parse_temperature_line, LineSwitch, LineThermometer};
pub use raw_iq::{IqFormat, RawIqRadio};
pub use simulated::{SimulatedFrontEnd, SimulatedRadio, SimulatedSwitch, SimulatedThermometer};
pub use vna::{
    average_sweeps, measure_paths, measure_sol_standards, SParameters, SimulatedVna,
    SolMeasurements, Vna, VNA_LOAD_LABEL, VNA_OPEN_LABEL, VNA_SHORT_LABEL,
};

use crate::data::SampleBlock;

/// A source of complex baseband samples.
pub trait Radio: Send {
    /// Read exactly `len` samples. An error here is transient; the caller
    /// substitutes a block of zeros and carries on.
    fn read_block(&mut self, len: usize) -> Result<SampleBlock, InstrumentError>;
}

/// A network of RF switches selecting what the receiver sees.
pub trait SwitchNetwork: Send {
    /// Does this network have a state called `label`?
    fn supports(&self, label: &str) -> bool;

    /// Select the state called `label`. Returns once the relays have had time
    /// to settle. Failures are not retried.
    fn set_state(&mut self, label: &str) -> Result<(), InstrumentError>;

    /// Called once a run has stopped switching, whether or not the schedule
    /// finished cleanly.
    fn finish(&mut self) {}
}

/// A set of temperature probes \[°C\].
pub trait Thermometer: Send {
    fn num_probes(&self) -> usize;

    fn read(&mut self) -> Result<Vec<f64>, InstrumentError>;
}
