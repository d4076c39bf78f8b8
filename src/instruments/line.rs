// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Drivers for the switch/thermometry controller, which speaks a simple line
//! protocol over a serial device. Switch commands are short strings written
//! verbatim; thermometry arrives as lines like `T1:27.8,T2:89.0`.

use std::io::{BufRead, Write};

use hifitime::Duration;
use indexmap::IndexMap;
use log::trace;

use super::{Clock, InstrumentError, SwitchNetwork, SystemClock, Thermometer};

/// The commands understood by the RHINO switch controller, keyed by switch
/// label.
pub fn default_switch_commands() -> IndexMap<String, String> {
    [
        ("vna_short", "t1t1e5"),
        ("vna_open", "t1t1e6"),
        ("vna_load", "t1t1e7"),
        ("vna_receiver", "t2t2e8"),
        ("vna_ns", "t1t1e3"),
        ("vna_obsload", "t1t1e2"),
        ("vna_ant", "t1t1e4"),
        ("receiver_load", "t2t2e2"),
        ("receiver_ns", "t2t2e3"),
        ("receiver_ant", "t2t2e4"),
    ]
    .into_iter()
    .map(|(label, cmd)| (label.to_string(), cmd.to_string()))
    .collect()
}

/// Parse a thermometry line. Each comma-separated field is `name:value`; only
/// the value is used, and there must be exactly `num_probes` of them. The
/// controller prints `nan` when a probe can't be read, so non-finite values
/// are errors.
pub fn parse_temperature_line(line: &str, num_probes: usize) -> Result<Vec<f64>, InstrumentError> {
    let bad = |reason: String| InstrumentError::BadThermometryLine {
        line: line.trim_end().to_string(),
        reason,
    };

    let temperatures = line
        .trim()
        .split(',')
        .map(|field| {
            let value = field.rsplit(':').next().unwrap_or(field).trim();
            match value.parse::<f64>() {
                Ok(t) if t.is_finite() => Ok(t),
                Ok(_) => Err(bad(format!("'{value}' is not a temperature"))),
                Err(e) => Err(bad(format!("'{value}': {e}"))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if temperatures.len() != num_probes {
        return Err(InstrumentError::ProbeCount {
            expected: num_probes,
            got: temperatures.len(),
        });
    }
    Ok(temperatures)
}

/// A switch network driven by writing command strings to a device. After every
/// write the driver waits a fixed settle time; nothing confirms that the
/// relays actually moved.
pub struct LineSwitch<W> {
    device: W,
    commands: IndexMap<String, String>,
    settle_time: Duration,
    clock: Box<dyn Clock>,
}

impl<W: Write + Send> LineSwitch<W> {
    pub fn new(device: W, commands: IndexMap<String, String>, settle_time: Duration) -> Self {
        LineSwitch {
            device,
            commands,
            settle_time,
            clock: Box::new(SystemClock),
        }
    }

    /// Wait on a different clock after each command.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn into_inner(self) -> W {
        self.device
    }
}

impl<W: Write + Send> SwitchNetwork for LineSwitch<W> {
    fn supports(&self, label: &str) -> bool {
        self.commands.contains_key(label)
    }

    fn set_state(&mut self, label: &str) -> Result<(), InstrumentError> {
        let command = self
            .commands
            .get(label)
            .ok_or_else(|| InstrumentError::UnknownSwitchState(label.to_string()))?;
        trace!("Switching to {label} ('{command}')");
        self.device.write_all(command.as_bytes())?;
        self.device.flush()?;
        self.clock.sleep(self.settle_time);
        Ok(())
    }
}

/// A thermometer that reads one line per request.
pub struct LineThermometer<R> {
    device: R,
    num_probes: usize,
    line: String,
}

impl<R: BufRead + Send> LineThermometer<R> {
    pub fn new(device: R, num_probes: usize) -> Self {
        LineThermometer {
            device,
            num_probes,
            line: String::new(),
        }
    }
}

impl<R: BufRead + Send> Thermometer for LineThermometer<R> {
    fn num_probes(&self) -> usize {
        self.num_probes
    }

    fn read(&mut self) -> Result<Vec<f64>, InstrumentError> {
        self.line.clear();
        if self.device.read_line(&mut self.line)? == 0 {
            return Err(InstrumentError::EndOfStream);
        }
        parse_temperature_line(&self.line, self.num_probes)
    }
}
