// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::num::NonZeroUsize;

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use super::*;
use crate::{
    cache::RunCache,
    constants::THERMOMETRY_SENTINEL,
    data::Spectrogram,
    instruments::{InstrumentError, SimulatedClock, SimulatedFrontEnd, SimulatedThermometer},
};

fn start() -> Epoch {
    Epoch::from_unix_seconds(1_700_000_000.0)
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A switch that fails on a particular state.
struct BrokenSwitch {
    bad: &'static str,
}

impl SwitchNetwork for BrokenSwitch {
    fn supports(&self, _: &str) -> bool {
        true
    }

    fn set_state(&mut self, label: &str) -> Result<(), InstrumentError> {
        if label == self.bad {
            Err(InstrumentError::IO(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "serial port went away",
            )))
        } else {
            Ok(())
        }
    }
}

/// A thermometer whose first probe reads `nan` on every other read.
struct FlakyProbe {
    num_reads: usize,
}

impl Thermometer for FlakyProbe {
    fn num_probes(&self) -> usize {
        2
    }

    fn read(&mut self) -> Result<Vec<f64>, InstrumentError> {
        self.num_reads += 1;
        if self.num_reads % 2 == 0 {
            Ok(vec![f64::NAN, 30.0])
        } else {
            Ok(vec![20.0, 30.0])
        }
    }
}

#[test]
fn test_equal_dwell_cycles_through_states() {
    let clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::new([("A", 1.0), ("B", 1.0), ("C", 1.0)], clock.clone());
    let mut switch = front_end.switch(Duration::from_seconds(0.5));
    let mut thermometer = SimulatedThermometer::new(vec![20.0, 30.0]);

    let schedule =
        SwitchSchedule::equal_dwell(labels(&["A", "B", "C"]), Duration::from_seconds(30.0))
            .unwrap();
    assert_eq!(schedule.num_states(), 3);
    assert!(schedule.total_duration().is_none());
    schedule.validate(&switch).unwrap();

    let deadline = start() + Duration::from_seconds(95.0);
    let log = schedule
        .run(
            &mut switch,
            &mut thermometer,
            &clock,
            deadline,
            &AtomicCell::new(false),
            &ProgressBar::hidden(),
        )
        .unwrap();

    let got: Vec<&str> = log.intervals.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(got, vec!["A", "B", "C", "A", "B", "C", "A", "B", "C", "A"]);
    for pair in log.intervals.windows(2) {
        let spacing = (pair[1].start - pair[0].start).to_seconds();
        assert_abs_diff_eq!(spacing, 10.0, epsilon = 1e-6);
    }
    // The run stops at the deadline, halfway through the last dwell.
    assert_eq!(clock.now(), deadline);

    // Thermometry is read every second while dwelling, starting after the
    // relays have settled.
    assert!(log.thermometry.iter().all(|t| t.is_valid()));
    assert!(log
        .thermometry
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    let first_dwell: Vec<_> = log
        .thermometry
        .iter()
        .filter(|t| t.timestamp < log.intervals[1].start)
        .collect();
    assert_eq!(first_dwell.len(), 10);
    assert_abs_diff_eq!(
        (first_dwell[0].timestamp - start()).to_seconds(),
        0.5,
        epsilon = 1e-6
    );
}

#[test]
fn test_predefined_visits_each_state_once() {
    let clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::new([("open", 1.0), ("short", 1.0)], clock.clone());
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::new(vec![20.0]);

    let schedule =
        SwitchSchedule::predefined(labels(&["short", "open"]), Duration::from_seconds(4.0))
            .unwrap();
    let total = schedule.total_duration().unwrap();
    assert_abs_diff_eq!(total.to_seconds(), 8.0);

    // A generous deadline; the schedule ends by itself.
    let log = schedule
        .run(
            &mut switch,
            &mut thermometer,
            &clock,
            start() + Duration::from_seconds(100.0),
            &AtomicCell::new(false),
            &ProgressBar::hidden(),
        )
        .unwrap();
    let got: Vec<&str> = log.intervals.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(got, vec!["short", "open"]);
    assert_eq!(clock.now(), start() + total);
    assert_eq!(log.thermometry.len(), 8);
}

#[test]
fn test_thermometry_failures_are_sentinel_rows() {
    let clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::new([("A", 1.0)], clock.clone());
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer =
        SimulatedThermometer::new(vec![20.0, 30.0]).with_failures(NonZeroUsize::new(2).unwrap());

    let schedule =
        SwitchSchedule::with_durations(vec![("A".to_string(), Duration::from_seconds(2.0))])
            .unwrap()
            .with_thermometry_cadence(Duration::from_seconds(0.5))
            .unwrap();
    let log = schedule
        .run(
            &mut switch,
            &mut thermometer,
            &clock,
            start() + Duration::from_seconds(4.0),
            &AtomicCell::new(false),
            &ProgressBar::hidden(),
        )
        .unwrap();

    // Two dwells of four reads each; the run carried on through failures.
    assert_eq!(log.intervals.len(), 2);
    assert_eq!(log.thermometry.len(), 8);
    let failed: Vec<_> = log.thermometry.iter().filter(|t| !t.is_valid()).collect();
    assert_eq!(failed.len(), 4);
    assert!(failed
        .iter()
        .all(|t| t.temperatures == vec![THERMOMETRY_SENTINEL; 2]));
}

#[test]
fn test_non_finite_thermometry_is_a_sentinel_row() {
    let clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::new([("A", 1.0)], clock.clone());
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = FlakyProbe { num_reads: 0 };

    let schedule =
        SwitchSchedule::predefined(labels(&["A"]), Duration::from_seconds(2.0))
            .unwrap()
            .with_thermometry_cadence(Duration::from_seconds(0.5))
            .unwrap();
    let log = schedule
        .run(
            &mut switch,
            &mut thermometer,
            &clock,
            start() + Duration::from_seconds(2.0),
            &AtomicCell::new(false),
            &ProgressBar::hidden(),
        )
        .unwrap();

    assert_eq!(log.thermometry.len(), 4);
    assert!(log
        .thermometry
        .iter()
        .flat_map(|t| &t.temperatures)
        .all(|t| t.is_finite()));
    let failed: Vec<_> = log.thermometry.iter().filter(|t| !t.is_valid()).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed
        .iter()
        .all(|t| t.temperatures == vec![THERMOMETRY_SENTINEL; 2]));

    // The run can still be cached and read back.
    let dir = TempDir::new().unwrap();
    let cache = RunCache::new(dir.path().join("run")).unwrap();
    let mut spectrogram = Spectrogram::new();
    spectrogram.push(vec![1.0, 2.0], start());
    cache.write_spectral(&spectrogram, &[69e6, 71e6]).unwrap();
    cache.write_switching(&log).unwrap();
    cache
        .write_manifest("predefined", start(), start() + Duration::from_seconds(2.0))
        .unwrap();
    let run = cache.read_run().unwrap();
    assert_eq!(run.thermometry.len(), 4);
    assert!(!run.thermometry[1].is_valid());
    assert!(run.thermometry[2].is_valid());
}

#[test]
fn test_switch_failure_is_surfaced() {
    let clock = SimulatedClock::new(start());
    let mut thermometer = SimulatedThermometer::new(vec![20.0]);
    let schedule =
        SwitchSchedule::equal_dwell(labels(&["A", "B"]), Duration::from_seconds(2.0)).unwrap();
    let result = schedule.run(
        &mut BrokenSwitch { bad: "B" },
        &mut thermometer,
        &clock,
        start() + Duration::from_seconds(10.0),
        &AtomicCell::new(false),
        &ProgressBar::hidden(),
    );
    match result {
        Err(SwitchingError::SetState { label, .. }) => assert_eq!(label, "B"),
        other => panic!("Expected a switch failure, got {other:?}"),
    }
}

#[test]
fn test_abort_stops_the_schedule() {
    let clock = SimulatedClock::new(start());
    let mut thermometer = SimulatedThermometer::new(vec![20.0]);
    let schedule =
        SwitchSchedule::equal_dwell(labels(&["A", "B"]), Duration::from_seconds(2.0)).unwrap();
    let log = schedule
        .run(
            &mut BrokenSwitch { bad: "" },
            &mut thermometer,
            &clock,
            start() + Duration::from_seconds(10.0),
            &AtomicCell::new(true),
            &ProgressBar::hidden(),
        )
        .unwrap();
    assert!(log.intervals.is_empty());
    assert!(log.thermometry.is_empty());
}

#[test]
fn test_bad_schedules() {
    assert!(matches!(
        SwitchSchedule::equal_dwell(vec![], Duration::from_seconds(30.0)),
        Err(SwitchingError::NoStates)
    ));
    assert!(matches!(
        SwitchSchedule::with_durations(vec![
            ("A".to_string(), Duration::from_seconds(1.0)),
            ("B".to_string(), Duration::ZERO),
        ]),
        Err(SwitchingError::NonPositiveDwell { label }) if label == "B"
    ));
    assert!(matches!(
        SwitchSchedule::predefined(labels(&["A"]), Duration::from_seconds(1.0))
            .unwrap()
            .with_thermometry_cadence(Duration::ZERO),
        Err(SwitchingError::NonPositiveCadence)
    ));

    let clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::new([("A", 1.0)], clock);
    let schedule =
        SwitchSchedule::equal_dwell(labels(&["A", "Z"]), Duration::from_seconds(2.0)).unwrap();
    assert!(matches!(
        schedule.validate(&front_end.switch(Duration::ZERO)),
        Err(SwitchingError::UnknownState { label }) if label == "Z"
    ));
}
