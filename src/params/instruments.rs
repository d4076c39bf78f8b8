// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The devices an acquisition run talks to. Devices are only opened when a
//! run starts.

use std::{
    fs::{File, OpenOptions},
    io::BufReader,
    path::{Path, PathBuf},
};

use hifitime::Duration;
use indexmap::IndexMap;
use log::debug;

use crate::{
    acquisition::Instruments,
    instruments::{
        default_switch_commands, Clock, InstrumentError, IqFormat, LineSwitch, LineThermometer,
        RawIqRadio, SimulatedClock, SimulatedFrontEnd, SimulatedThermometer, SystemClock,
    },
};

/// A simulated Dicke-switched receiver.
#[derive(Debug, Clone)]
pub(crate) struct SimulationParams {
    /// \[K\]
    pub(crate) antenna_temperature: f64,

    /// \[K\]
    pub(crate) load_temperature: f64,

    /// \[dB\]
    pub(crate) noise_diode_enr_db: f64,

    pub(crate) settle_time: Duration,
}

/// Real devices.
#[derive(Debug, Clone)]
pub(crate) struct HardwareParams {
    /// A file or pipe of interleaved I/Q samples.
    pub(crate) iq_source: PathBuf,

    pub(crate) iq_format: IqFormat,

    /// The device switch commands are written to.
    pub(crate) switch_device: PathBuf,

    /// The device thermometry lines are read from.
    pub(crate) thermometer_device: PathBuf,

    pub(crate) num_probes: usize,

    pub(crate) switch_commands: IndexMap<String, String>,

    pub(crate) settle_time: Duration,
}

#[derive(Debug, Clone)]
pub(crate) enum InstrumentParams {
    Simulated(SimulationParams),
    Hardware(HardwareParams),
}

impl InstrumentParams {
    /// The switch states these instruments know about.
    pub(crate) fn switch_labels(&self) -> Vec<String> {
        match self {
            // The simulated front end answers to the default dictionary.
            InstrumentParams::Simulated(_) => default_switch_commands().into_keys().collect(),
            InstrumentParams::Hardware(h) => h.switch_commands.keys().cloned().collect(),
        }
    }

    pub(crate) fn is_simulated(&self) -> bool {
        matches!(self, InstrumentParams::Simulated(_))
    }

    /// Open the devices and hand them to `f`. They are closed when `f`
    /// returns.
    pub(crate) fn with_instruments<T, E, F>(&self, sample_rate: f64, f: F) -> Result<T, E>
    where
        F: FnOnce(Instruments) -> Result<T, E>,
        E: From<InstrumentError>,
    {
        match self {
            InstrumentParams::Simulated(sim) => {
                debug!("Simulating the receiver: {sim:?}");
                // Both workers start at the same instant but keep their own
                // time.
                let start = SystemClock.now();
                let switch_clock = SimulatedClock::new(start);
                let radio_clock = SimulatedClock::new(start);
                let front_end = SimulatedFrontEnd::receiver(
                    sim.noise_diode_enr_db,
                    sim.load_temperature,
                    sim.antenna_temperature,
                    switch_clock.clone(),
                );
                let mut radio = front_end.radio(radio_clock.clone(), sample_rate);
                let mut switch = front_end.switch(sim.settle_time);
                let mut thermometer = SimulatedThermometer::receiver(sim.load_temperature);
                f(Instruments {
                    radio: &mut radio,
                    radio_clock: &radio_clock,
                    switch: &mut switch,
                    thermometer: &mut thermometer,
                    switch_clock: &switch_clock,
                })
            }

            InstrumentParams::Hardware(hw) => {
                debug!("Opening {}", hw.iq_source.display());
                let mut radio = RawIqRadio::new(BufReader::new(open(&hw.iq_source)?), hw.iq_format);
                debug!("Opening {}", hw.switch_device.display());
                let switch_device = OpenOptions::new()
                    .write(true)
                    .open(&hw.switch_device)
                    .map_err(InstrumentError::from)?;
                let mut switch =
                    LineSwitch::new(switch_device, hw.switch_commands.clone(), hw.settle_time);
                debug!("Opening {}", hw.thermometer_device.display());
                let mut thermometer = LineThermometer::new(
                    BufReader::new(open(&hw.thermometer_device)?),
                    hw.num_probes,
                );
                let clock = SystemClock;
                f(Instruments {
                    radio: &mut radio,
                    radio_clock: &clock,
                    switch: &mut switch,
                    thermometer: &mut thermometer,
                    switch_clock: &clock,
                })
            }
        }
    }
}

fn open(path: &Path) -> Result<File, InstrumentError> {
    Ok(File::open(path)?)
}
