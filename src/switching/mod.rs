// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Drive a switch network through a sequence of states, reading thermometry
//! while dwelling in each.

mod error;
#[cfg(test)]
mod tests;

pub use error::SwitchingError;

use crossbeam_utils::atomic::AtomicCell;
use hifitime::{Duration, Epoch};
use indicatif::ProgressBar;
use log::{debug, trace, warn};
use vec1::Vec1;

use crate::{
    data::{SwitchInterval, ThermometrySample},
    instruments::{Clock, SwitchNetwork, Thermometer},
};

/// Everything the scheduler recorded during a run.
#[derive(Debug, Clone, Default)]
pub struct SwitchLog {
    pub intervals: Vec<SwitchInterval>,
    pub thermometry: Vec<ThermometrySample>,
}

/// An ordered list of switch states and how long to dwell in each.
#[derive(Debug, Clone)]
pub struct SwitchSchedule {
    states: Vec1<(String, Duration)>,

    /// Go back to the first state after the last? If not, each state is
    /// visited exactly once.
    cyclic: bool,

    thermometry_cadence: Duration,
}

impl SwitchSchedule {
    /// Cycle through `states`, dividing `cycle_length` equally between them.
    pub fn equal_dwell(
        states: Vec<String>,
        cycle_length: Duration,
    ) -> Result<SwitchSchedule, SwitchingError> {
        let num_states = states.len().max(1) as f64;
        let dwell = cycle_length / num_states;
        SwitchSchedule::with_durations(states.into_iter().map(|s| (s, dwell)).collect())
    }

    /// Cycle through states with explicit dwell times.
    pub fn with_durations(
        states: Vec<(String, Duration)>,
    ) -> Result<SwitchSchedule, SwitchingError> {
        let states = Vec1::try_from_vec(states).map_err(|_| SwitchingError::NoStates)?;
        if let Some((label, _)) = states.iter().find(|(_, d)| *d <= Duration::ZERO) {
            return Err(SwitchingError::NonPositiveDwell {
                label: label.clone(),
            });
        }
        Ok(SwitchSchedule {
            states,
            cyclic: true,
            thermometry_cadence: Duration::from_seconds(
                crate::constants::DEFAULT_THERMOMETRY_CADENCE,
            ),
        })
    }

    /// Visit each of `states` once, in order, dwelling `dwell` in each. Used
    /// for calibration sequences.
    pub fn predefined(
        states: Vec<String>,
        dwell: Duration,
    ) -> Result<SwitchSchedule, SwitchingError> {
        let mut schedule =
            SwitchSchedule::with_durations(states.into_iter().map(|s| (s, dwell)).collect())?;
        schedule.cyclic = false;
        Ok(schedule)
    }

    /// Read the thermometer this often while dwelling.
    pub fn with_thermometry_cadence(
        mut self,
        cadence: Duration,
    ) -> Result<SwitchSchedule, SwitchingError> {
        if cadence <= Duration::ZERO {
            return Err(SwitchingError::NonPositiveCadence);
        }
        self.thermometry_cadence = cadence;
        Ok(self)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|(label, _)| label.as_str())
    }

    pub fn dwells(&self) -> impl Iterator<Item = Duration> + '_ {
        self.states.iter().map(|(_, dwell)| *dwell)
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    pub fn thermometry_cadence(&self) -> Duration {
        self.thermometry_cadence
    }

    /// The time taken to visit every state once.
    pub fn cycle_length(&self) -> Duration {
        self.states
            .iter()
            .fold(Duration::ZERO, |acc, (_, dwell)| acc + *dwell)
    }

    /// How long a run of this schedule takes, if it ends by itself. Cyclic
    /// schedules only end at a deadline.
    pub fn total_duration(&self) -> Option<Duration> {
        if self.cyclic {
            None
        } else {
            Some(self.cycle_length())
        }
    }

    /// Check that the switch network knows every state.
    pub fn validate(&self, switch: &dyn SwitchNetwork) -> Result<(), SwitchingError> {
        match self.labels().find(|label| !switch.supports(label)) {
            Some(label) => Err(SwitchingError::UnknownState {
                label: label.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Step through the schedule until `deadline` (or, for a predefined
    /// schedule, until every state has been visited). The deadline is honoured
    /// mid-dwell. A failed thermometry read is logged and recorded as a
    /// sentinel row; a failed switch command ends the run with an error.
    ///
    /// `abort` is polled between every device call; if it becomes `true`, the
    /// log so far is returned.
    pub fn run(
        &self,
        switch: &mut dyn SwitchNetwork,
        thermometer: &mut dyn Thermometer,
        clock: &dyn Clock,
        deadline: Epoch,
        abort: &AtomicCell<bool>,
        progress: &ProgressBar,
    ) -> Result<SwitchLog, SwitchingError> {
        let num_probes = thermometer.num_probes();
        let num_states = self.states.len();
        let mut log = SwitchLog::default();

        for visit in 0.. {
            if !self.cyclic && visit >= num_states {
                break;
            }
            let dwell_start = clock.now();
            if dwell_start >= deadline || abort.load() {
                break;
            }

            let (label, dwell) = &self.states[visit % num_states];
            // Dwells are measured from when the command is issued, so relay
            // settling doesn't accumulate into drift.
            let dwell_end = earliest(dwell_start + *dwell, deadline);
            switch
                .set_state(label)
                .map_err(|source| SwitchingError::SetState {
                    label: label.clone(),
                    source,
                })?;
            let entered = clock.now();
            debug!("Switched to {label}");
            log.intervals.push(SwitchInterval {
                label: label.clone(),
                start: entered,
            });
            progress.set_message(label.clone());

            loop {
                let now = clock.now();
                if now >= dwell_end || abort.load() {
                    break;
                }

                let sample = match thermometer.read() {
                    Ok(temperatures) if temperatures.len() != num_probes => {
                        warn!(
                            "Thermometer returned {} readings instead of {num_probes}",
                            temperatures.len()
                        );
                        ThermometrySample::failed(num_probes, now)
                    }
                    // Non-finite values can't be cached.
                    Ok(temperatures) if temperatures.iter().any(|t| !t.is_finite()) => {
                        warn!("Thermometer returned non-finite readings: {temperatures:?}");
                        ThermometrySample::failed(num_probes, now)
                    }
                    Ok(temperatures) => ThermometrySample {
                        temperatures,
                        timestamp: now,
                    },
                    Err(e) => {
                        warn!("Thermometry read failed: {e}");
                        ThermometrySample::failed(num_probes, now)
                    }
                };
                trace!("Thermometry: {:?}", sample.temperatures);
                log.thermometry.push(sample);

                let wake = earliest(now + self.thermometry_cadence, dwell_end);
                clock.sleep(wake - now);
                progress.set_position(elapsed_seconds(progress, clock.now(), deadline));
            }
        }

        Ok(log)
    }
}

fn earliest(a: Epoch, b: Epoch) -> Epoch {
    if a <= b {
        a
    } else {
        b
    }
}

/// Progress bars count whole seconds up to the deadline.
pub(crate) fn elapsed_seconds(progress: &ProgressBar, now: Epoch, deadline: Epoch) -> u64 {
    let length = progress.length().unwrap_or(0);
    let remaining = (deadline - now).to_seconds().max(0.0).ceil() as u64;
    length.saturating_sub(remaining)
}
