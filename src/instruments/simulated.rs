// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A simulated receiver front end, for dry runs and tests.
//!
//! The simulated switch records every state change on the timeline of its own
//! clock. The simulated radio looks up which state was selected at its own
//! clock's time and scales its output by that state's power, so spectra follow
//! the switch exactly as they would on real hardware, even though both clocks
//! are simulated and advance independently.

use std::{
    f32::consts::PI,
    num::NonZeroUsize,
    sync::{Arc, Mutex},
    time::Instant,
};

use crossbeam_utils::atomic::AtomicCell;
use hifitime::{Duration, Epoch};
use num_complex::Complex32;

use super::{
    default_switch_commands, Clock, InstrumentError, Radio, SimulatedClock, SwitchNetwork,
    Thermometer,
};
use crate::{
    constants::{
        CELSIUS_TO_KELVIN, DEFAULT_LOAD_LABEL, DEFAULT_NOISE_DIODE_LABEL, DEFAULT_SOURCE_LABEL,
    },
    data::SampleBlock,
};

/// How long (in real time) the simulated radio will wait for the simulated
/// switch to catch up before giving up and using the latest known state. The
/// radio doesn't wait at all once the switch has finished.
const MAX_SWITCH_WAIT: std::time::Duration = std::time::Duration::from_secs(2);

struct Timeline {
    labels: Vec<String>,
    powers: Vec<f64>,
    changes: Mutex<Vec<(Epoch, usize)>>,
    /// Set when the switch stops; no more changes will be recorded.
    finished: AtomicCell<bool>,
}

impl Timeline {
    fn state_at(&self, time: Epoch) -> usize {
        let changes = self.changes.lock().unwrap_or_else(|e| e.into_inner());
        changes
            .iter()
            .rev()
            .find(|(start, _)| *start <= time)
            .map(|&(_, i)| i)
            .unwrap_or(0)
    }
}

/// The physical world behind a simulated switch and radio: each switch state
/// has a constant received power.
#[derive(Clone)]
pub struct SimulatedFrontEnd {
    timeline: Arc<Timeline>,
    switch_clock: SimulatedClock,
}

impl SimulatedFrontEnd {
    /// `states` maps each switch label to the power the radio receives in that
    /// state. `switch_clock` must be the clock of the worker that drives the
    /// switch.
    pub fn new<I, S>(states: I, switch_clock: SimulatedClock) -> SimulatedFrontEnd
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (labels, powers) = states.into_iter().map(|(l, p)| (l.into(), p)).unzip();
        SimulatedFrontEnd {
            timeline: Arc::new(Timeline {
                labels,
                powers,
                changes: Mutex::new(vec![]),
                finished: AtomicCell::new(false),
            }),
            switch_clock,
        }
    }

    /// A Dicke-switched receiver with an antenna, an ambient load and a noise
    /// diode. Received power is proportional to the input temperature, so
    /// calibrating a run of this front end recovers `antenna_temperature`
    /// \[K\] when the load is measured at `load_temperature` \[K\].
    pub fn receiver(
        noise_diode_enr_db: f64,
        load_temperature: f64,
        antenna_temperature: f64,
        switch_clock: SimulatedClock,
    ) -> SimulatedFrontEnd {
        let noise_diode = load_temperature * 10_f64.powf(noise_diode_enr_db / 10.0);
        let receiver_states = [
            (DEFAULT_LOAD_LABEL, load_temperature),
            (DEFAULT_NOISE_DIODE_LABEL, noise_diode + load_temperature),
            (DEFAULT_SOURCE_LABEL, antenna_temperature),
        ];
        // The VNA paths terminate the receiver in the load.
        let vna_states: Vec<(String, f64)> = default_switch_commands()
            .into_keys()
            .filter(|label| receiver_states.iter().all(|(l, _)| *l != label.as_str()))
            .map(|label| (label, load_temperature))
            .collect();
        SimulatedFrontEnd::new(
            receiver_states
                .into_iter()
                .map(|(l, p)| (l.to_string(), p))
                .chain(vna_states),
            switch_clock,
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.timeline.labels
    }

    pub fn radio(&self, clock: SimulatedClock, sample_rate: f64) -> SimulatedRadio {
        SimulatedRadio {
            front_end: self.clone(),
            clock,
            sample_rate,
            dropout_every: None,
            num_reads: 0,
        }
    }

    pub fn switch(&self, settle_time: Duration) -> SimulatedSwitch {
        SimulatedSwitch {
            front_end: self.clone(),
            settle_time,
        }
    }
}

pub struct SimulatedRadio {
    front_end: SimulatedFrontEnd,
    clock: SimulatedClock,
    sample_rate: f64,
    dropout_every: Option<NonZeroUsize>,
    num_reads: usize,
}

impl SimulatedRadio {
    /// Fail every `n`th read with a dropped block.
    pub fn with_dropouts(mut self, n: NonZeroUsize) -> Self {
        self.dropout_every = Some(n);
        self
    }
}

impl Radio for SimulatedRadio {
    fn read_block(&mut self, len: usize) -> Result<SampleBlock, InstrumentError> {
        // A dropped block doesn't advance the clock; the caller waits out
        // the block instead.
        self.num_reads += 1;
        if let Some(n) = self.dropout_every {
            if self.num_reads % n.get() == 0 {
                return Err(InstrumentError::DroppedBlock);
            }
        }
        let t = self.clock.now();
        self.clock
            .advance(Duration::from_seconds(len as f64 / self.sample_rate));

        let timeline = &self.front_end.timeline;
        let started = Instant::now();
        while !timeline.finished.load()
            && self.front_end.switch_clock.now() <= t
            && started.elapsed() < MAX_SWITCH_WAIT
        {
            std::thread::yield_now();
        }
        let state = timeline.state_at(t);
        let amplitude = timeline.powers[state].sqrt() as f32;

        // A chirp has a flat spectrum, so every channel sees the same power.
        let len_f = len as f32;
        Ok((0..len)
            .map(|n| {
                let n = n as f32;
                let phase = PI * n * n / len_f;
                Complex32::from_polar(amplitude, phase)
            })
            .collect())
    }
}

pub struct SimulatedSwitch {
    front_end: SimulatedFrontEnd,
    settle_time: Duration,
}

impl SwitchNetwork for SimulatedSwitch {
    fn supports(&self, label: &str) -> bool {
        self.front_end.timeline.labels.iter().any(|l| l == label)
    }

    fn set_state(&mut self, label: &str) -> Result<(), InstrumentError> {
        let timeline = &self.front_end.timeline;
        let index = timeline
            .labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| InstrumentError::UnknownSwitchState(label.to_string()))?;
        {
            let mut changes = timeline.changes.lock().unwrap_or_else(|e| e.into_inner());
            changes.push((self.front_end.switch_clock.now(), index));
        }
        self.front_end.switch_clock.sleep(self.settle_time);
        Ok(())
    }

    fn finish(&mut self) {
        self.front_end.timeline.finished.store(true);
    }
}

/// A thermometer whose probes always read the same temperatures \[°C\].
pub struct SimulatedThermometer {
    temperatures: Vec<f64>,
    fail_every: Option<NonZeroUsize>,
    num_reads: usize,
}

impl SimulatedThermometer {
    pub fn new(temperatures: Vec<f64>) -> SimulatedThermometer {
        SimulatedThermometer {
            temperatures,
            fail_every: None,
            num_reads: 0,
        }
    }

    /// Two probes, the first on the ambient load at `load_temperature` \[K\].
    pub fn receiver(load_temperature: f64) -> SimulatedThermometer {
        SimulatedThermometer::new(vec![load_temperature - CELSIUS_TO_KELVIN, 40.0])
    }

    /// Fail every `n`th read with a garbled line.
    pub fn with_failures(mut self, n: NonZeroUsize) -> Self {
        self.fail_every = Some(n);
        self
    }
}

impl Thermometer for SimulatedThermometer {
    fn num_probes(&self) -> usize {
        self.temperatures.len()
    }

    fn read(&mut self) -> Result<Vec<f64>, InstrumentError> {
        self.num_reads += 1;
        if let Some(n) = self.fail_every {
            if self.num_reads % n.get() == 0 {
                return Err(InstrumentError::BadThermometryLine {
                    line: "T1:??".to_string(),
                    reason: "simulated failure".to_string(),
                });
            }
        }
        Ok(self.temperatures.clone())
    }
}
