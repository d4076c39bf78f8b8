// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{num::NonZeroUsize, time::Instant};

use tempfile::TempDir;

use super::*;
use crate::{
    data::SampleBlock,
    instruments::{
        InstrumentError, SimulatedClock, SimulatedFrontEnd, SimulatedThermometer,
    },
    spectrum::{SpectrometerMode, SpectrumError, Window},
    switching::SwitchingError,
};

const SAMPLE_RATE: f64 = 1024.0;
const NUM_CHANNELS: usize = 64;

fn start() -> Epoch {
    Epoch::from_unix_seconds(1_700_000_000.0)
}

fn labels() -> Vec<String> {
    ["receiver_load", "receiver_ns", "receiver_ant"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn acquisition(mode: AcquisitionMode, schedule: SwitchSchedule) -> Acquisition {
    let spectrometer =
        Spectrometer::new(SpectrometerMode::Fft, NUM_CHANNELS, Window::Blackman).unwrap();
    Acquisition::new(
        spectrometer,
        70e6,
        SAMPLE_RATE,
        Duration::from_seconds(1.0),
        schedule,
        mode,
    )
    .unwrap()
}

fn continuous(run_length: f64) -> Acquisition {
    let schedule = SwitchSchedule::equal_dwell(labels(), Duration::from_seconds(3.0))
        .unwrap()
        .with_thermometry_cadence(Duration::from_seconds(0.25))
        .unwrap();
    acquisition(
        AcquisitionMode::Continuous {
            run_length: Duration::from_seconds(run_length),
        },
        schedule,
    )
}

/// A radio with a fixed output that only advances its own clock.
struct PlainRadio {
    clock: SimulatedClock,
    len_override: Option<usize>,
}

impl Radio for PlainRadio {
    fn read_block(&mut self, len: usize) -> Result<SampleBlock, InstrumentError> {
        self.clock
            .advance(Duration::from_seconds(len as f64 / SAMPLE_RATE));
        Ok(vec![Complex32::new(1.0, 0.0); self.len_override.unwrap_or(len)])
    }
}

struct PanickingRadio;

impl Radio for PanickingRadio {
    fn read_block(&mut self, _: usize) -> Result<SampleBlock, InstrumentError> {
        panic!("The radio caught fire");
    }
}

struct BrokenSwitch;

impl SwitchNetwork for BrokenSwitch {
    fn supports(&self, _: &str) -> bool {
        true
    }

    fn set_state(&mut self, _: &str) -> Result<(), InstrumentError> {
        Err(InstrumentError::IO(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no reply",
        )))
    }
}

#[test]
fn test_continuous_run() {
    let acquisition = continuous(5.0);
    assert_eq!(acquisition.blocks_per_spectrum().get(), 16);
    assert_eq!(acquisition.channel_frequencies().len(), NUM_CHANNELS);

    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::receiver(9.6, 300.0, 1000.0, switch_clock.clone());
    let mut radio = front_end.radio(radio_clock.clone(), SAMPLE_RATE);
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let output = acquisition
        .run(
            Instruments {
                radio: &mut radio,
                radio_clock: &radio_clock,
                switch: &mut switch,
                thermometer: &mut thermometer,
                switch_clock: &switch_clock,
            },
            None,
        )
        .unwrap();

    // One spectrum per second of data, one interval per second of dwell.
    assert_eq!(output.spectrogram.len(), 5);
    assert_eq!(output.spectrogram.num_channels(), Some(NUM_CHANNELS));
    assert_eq!(output.switch_intervals.len(), 5);
    let got: Vec<&str> = output
        .switch_intervals
        .iter()
        .map(|i| i.label.as_str())
        .collect();
    assert_eq!(
        got,
        vec![
            "receiver_load",
            "receiver_ns",
            "receiver_ant",
            "receiver_load",
            "receiver_ns"
        ]
    );
    assert_eq!(output.thermometry.len(), 20);
    assert_eq!(output.start, start());
    assert_eq!(output.end, start() + Duration::from_seconds(5.0));
    assert!(output
        .spectrogram
        .timestamps()
        .windows(2)
        .all(|pair| pair[0] <= pair[1]));

    // The spectra followed the switch: the noise diode is loudest, then the
    // antenna, then the load.
    let total = |i: usize| output.spectrogram.spectra()[i].iter().sum::<f64>();
    assert!(total(1) > total(2));
    assert!(total(2) > total(0));
    assert!((total(3) - total(0)).abs() < 1e-9 * total(0));
}

#[test]
fn test_predefined_run() {
    let schedule = SwitchSchedule::predefined(labels(), Duration::from_seconds(2.0)).unwrap();
    let acquisition = acquisition(AcquisitionMode::Predefined, schedule);
    assert_eq!(acquisition.run_length(), Duration::from_seconds(6.0));

    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::receiver(9.6, 300.0, 1000.0, switch_clock.clone());
    let mut radio = front_end.radio(radio_clock.clone(), SAMPLE_RATE);
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let output = acquisition
        .run(
            Instruments {
                radio: &mut radio,
                radio_clock: &radio_clock,
                switch: &mut switch,
                thermometer: &mut thermometer,
                switch_clock: &switch_clock,
            },
            None,
        )
        .unwrap();
    assert_eq!(output.spectrogram.len(), 6);
    let got: Vec<&str> = output
        .switch_intervals
        .iter()
        .map(|i| i.label.as_str())
        .collect();
    assert_eq!(got, vec!["receiver_load", "receiver_ns", "receiver_ant"]);
}

#[test]
fn test_predefined_needs_a_finite_schedule() {
    let spectrometer =
        Spectrometer::new(SpectrometerMode::Fft, NUM_CHANNELS, Window::Blackman).unwrap();
    let schedule = SwitchSchedule::equal_dwell(labels(), Duration::from_seconds(3.0)).unwrap();
    let result = Acquisition::new(
        spectrometer,
        70e6,
        SAMPLE_RATE,
        Duration::from_seconds(1.0),
        schedule,
        AcquisitionMode::Predefined,
    );
    assert!(matches!(
        result,
        Err(AcquisitionError::CyclicPredefinedSchedule)
    ));
}

#[test]
fn test_integration_too_short() {
    let spectrometer =
        Spectrometer::new(SpectrometerMode::Fft, NUM_CHANNELS, Window::Blackman).unwrap();
    let schedule = SwitchSchedule::equal_dwell(labels(), Duration::from_seconds(3.0)).unwrap();
    let result = Acquisition::new(
        spectrometer,
        70e6,
        SAMPLE_RATE,
        Duration::from_milliseconds(10.0),
        schedule,
        AcquisitionMode::Continuous {
            run_length: Duration::from_seconds(5.0),
        },
    );
    assert!(matches!(
        result,
        Err(AcquisitionError::Spectrum(
            SpectrumError::IntegrationTooShort { .. }
        ))
    ));
}

#[test]
fn test_dropped_blocks_dont_stop_the_run() {
    let acquisition = continuous(5.0);
    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::receiver(9.6, 300.0, 1000.0, switch_clock.clone());
    let mut radio = front_end
        .radio(radio_clock.clone(), SAMPLE_RATE)
        .with_dropouts(NonZeroUsize::new(3).unwrap());
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let output = acquisition
        .run(
            Instruments {
                radio: &mut radio,
                radio_clock: &radio_clock,
                switch: &mut switch,
                thermometer: &mut thermometer,
                switch_clock: &switch_clock,
            },
            None,
        )
        .unwrap();
    assert_eq!(output.spectrogram.len(), 5);
}

#[test]
fn test_run_length_not_a_whole_number_of_spectra() {
    // The last spectrum is still being integrated when the switch stops.
    let acquisition = continuous(4.5);
    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::receiver(9.6, 300.0, 1000.0, switch_clock.clone());
    let mut radio = front_end.radio(radio_clock.clone(), SAMPLE_RATE);
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let started = Instant::now();
    let output = acquisition
        .run(
            Instruments {
                radio: &mut radio,
                radio_clock: &radio_clock,
                switch: &mut switch,
                thermometer: &mut thermometer,
                switch_clock: &switch_clock,
            },
            None,
        )
        .unwrap();
    assert!(
        started.elapsed() < std::time::Duration::from_secs(2),
        "Run took {:?}",
        started.elapsed()
    );
    assert_eq!(output.spectrogram.len(), 5);
    assert_eq!(radio_clock.now(), start() + Duration::from_seconds(5.0));
}

#[test]
fn test_unknown_switch_state_is_caught_before_starting() {
    let acquisition = continuous(5.0);
    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::new([("receiver_load", 1.0)], switch_clock.clone());
    let mut radio = PlainRadio {
        clock: radio_clock.clone(),
        len_override: None,
    };
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let result = acquisition.run(
        Instruments {
            radio: &mut radio,
            radio_clock: &radio_clock,
            switch: &mut switch,
            thermometer: &mut thermometer,
            switch_clock: &switch_clock,
        },
        None,
    );
    assert!(matches!(
        result,
        Err(AcquisitionError::Switching(SwitchingError::UnknownState { .. }))
    ));
    // Nothing ran.
    assert_eq!(radio_clock.now(), start());
}

#[test]
fn test_wrong_block_length_is_fatal() {
    let acquisition = continuous(5.0);
    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::receiver(9.6, 300.0, 1000.0, switch_clock.clone());
    let mut radio = PlainRadio {
        clock: radio_clock.clone(),
        len_override: Some(NUM_CHANNELS - 1),
    };
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let result = acquisition.run(
        Instruments {
            radio: &mut radio,
            radio_clock: &radio_clock,
            switch: &mut switch,
            thermometer: &mut thermometer,
            switch_clock: &switch_clock,
        },
        None,
    );
    assert!(matches!(
        result,
        Err(AcquisitionError::Spectrum(SpectrumError::BlockLength { .. }))
    ));
}

#[test]
fn test_worker_panic_is_not_an_empty_result() {
    let acquisition = continuous(5.0);
    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::receiver(9.6, 300.0, 1000.0, switch_clock.clone());
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let dir = TempDir::new().unwrap();
    let cache = RunCache::new(dir.path()).unwrap();
    let result = acquisition.run(
        Instruments {
            radio: &mut PanickingRadio,
            radio_clock: &radio_clock,
            switch: &mut switch,
            thermometer: &mut thermometer,
            switch_clock: &switch_clock,
        },
        Some(&cache),
    );
    assert!(matches!(
        result,
        Err(AcquisitionError::WorkerPanicked {
            worker: "spectrometer"
        })
    ));
    // The cache isn't marked complete.
    assert!(cache.read_run().is_err());
}

#[test]
fn test_switch_failure_stops_the_run() {
    let acquisition = continuous(5.0);
    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let mut radio = PlainRadio {
        clock: radio_clock.clone(),
        len_override: None,
    };
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let result = acquisition.run(
        Instruments {
            radio: &mut radio,
            radio_clock: &radio_clock,
            switch: &mut BrokenSwitch,
            thermometer: &mut thermometer,
            switch_clock: &switch_clock,
        },
        None,
    );
    assert!(matches!(
        result,
        Err(AcquisitionError::Switching(SwitchingError::SetState { .. }))
    ));
}

#[test]
fn test_run_is_cached() {
    let acquisition = continuous(5.0);
    let switch_clock = SimulatedClock::new(start());
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::receiver(9.6, 300.0, 1000.0, switch_clock.clone());
    let mut radio = front_end.radio(radio_clock.clone(), SAMPLE_RATE);
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let dir = TempDir::new().unwrap();
    let cache = RunCache::new(dir.path()).unwrap();
    let output = acquisition
        .run(
            Instruments {
                radio: &mut radio,
                radio_clock: &radio_clock,
                switch: &mut switch,
                thermometer: &mut thermometer,
                switch_clock: &switch_clock,
            },
            Some(&cache),
        )
        .unwrap();

    let cached = cache.read_run().unwrap();
    assert_eq!(cached.spectrogram.spectra(), output.spectrogram.spectra());
    assert_eq!(cached.switch_intervals.len(), output.switch_intervals.len());
    assert_eq!(cached.thermometry.len(), output.thermometry.len());
    assert_eq!(cached.channel_frequencies, output.channel_frequencies);
    assert_eq!(cache.read_manifest().unwrap().mode, "continuous");
}

#[test]
fn test_no_spectra_before_the_run_starts() {
    let acquisition = continuous(5.0);
    // Something else used the switch before the run.
    let switch_clock = SimulatedClock::new(start() + Duration::from_seconds(3.0));
    let radio_clock = SimulatedClock::new(start());
    let front_end = SimulatedFrontEnd::receiver(9.6, 300.0, 1000.0, switch_clock.clone());
    let mut radio = front_end.radio(radio_clock.clone(), SAMPLE_RATE);
    let mut switch = front_end.switch(Duration::ZERO);
    let mut thermometer = SimulatedThermometer::receiver(300.0);

    let output = acquisition
        .run(
            Instruments {
                radio: &mut radio,
                radio_clock: &radio_clock,
                switch: &mut switch,
                thermometer: &mut thermometer,
                switch_clock: &switch_clock,
            },
            None,
        )
        .unwrap();
    assert_eq!(output.start, start() + Duration::from_seconds(3.0));
    assert_eq!(output.spectrogram.len(), 5);
    assert_eq!(output.spectrogram.timestamps()[0], output.start);
}
