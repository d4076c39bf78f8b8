// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use hifitime::Duration;
use tempfile::TempDir;

use super::*;

fn epoch(s: f64) -> Epoch {
    Epoch::from_unix_seconds(1_700_000_000.0 + s)
}

fn spectral() -> (Spectrogram, Vec<f64>) {
    let mut spectrogram = Spectrogram::new();
    spectrogram.push(vec![1.0, 2.0, 3.0], epoch(0.0));
    spectrogram.push(vec![4.0, 5.0, 6.0], epoch(0.5));
    (spectrogram, vec![69e6, 70e6, 71e6])
}

fn switching() -> SwitchLog {
    SwitchLog {
        intervals: vec![
            SwitchInterval {
                label: "receiver_load".to_string(),
                start: epoch(0.0),
            },
            SwitchInterval {
                label: "receiver_ns".to_string(),
                start: epoch(10.0),
            },
        ],
        thermometry: vec![
            ThermometrySample {
                temperatures: vec![27.8, 89.0],
                timestamp: epoch(0.25),
            },
            ThermometrySample::failed(2, epoch(1.25)),
        ],
    }
}

#[test]
fn test_series_names() {
    let names: Vec<&'static str> = SeriesKey::iter().map(|k| k.into()).collect();
    assert_eq!(
        names,
        vec![
            "spectra",
            "captureTimestamps",
            "channelFrequencies",
            "switchLabels",
            "switchTimestamps",
            "temperatures",
            "temperatureTimestamps"
        ]
    );
    assert_eq!(SeriesKey::SwitchLabels.file_name(), "switchLabels.json");
}

#[test]
fn test_complete_run_reads_back() {
    let dir = TempDir::new().unwrap();
    let cache = RunCache::new(dir.path().join("run")).unwrap();
    let (spectrogram, freqs) = spectral();
    cache.write_spectral(&spectrogram, &freqs).unwrap();
    cache.write_switching(&switching()).unwrap();
    cache
        .write_manifest("continuous", epoch(0.0), epoch(20.0))
        .unwrap();

    for key in SeriesKey::iter() {
        assert!(cache.path(key).exists(), "{key} wasn't written");
    }

    let run = cache.read_run().unwrap();
    assert_eq!(run.spectrogram.spectra(), spectrogram.spectra());
    assert_eq!(run.channel_frequencies, freqs);
    assert_eq!(run.switch_intervals.len(), 2);
    assert_eq!(run.switch_intervals[1].label, "receiver_ns");
    assert_abs_diff_eq!(
        (run.switch_intervals[1].start - epoch(10.0)).to_seconds(),
        0.0,
        epsilon = 1e-6
    );
    assert_eq!(run.thermometry.len(), 2);
    assert!(run.thermometry[0].is_valid());
    assert!(!run.thermometry[1].is_valid());
    assert_abs_diff_eq!(
        run.duration().to_seconds(),
        Duration::from_seconds(20.0).to_seconds(),
        epsilon = 1e-6
    );

    let manifest = cache.read_manifest().unwrap();
    assert_eq!(manifest.mode, "continuous");
    assert_eq!(manifest.series.len(), 7);
}

#[test]
fn test_unfinished_run_is_not_empty_run() {
    let dir = TempDir::new().unwrap();
    let cache = RunCache::new(dir.path()).unwrap();
    let (spectrogram, freqs) = spectral();
    cache.write_spectral(&spectrogram, &freqs).unwrap();

    assert!(matches!(cache.read_run(), Err(CacheError::Incomplete(_))));
}

#[test]
fn test_overwritten_run_is_incomplete_until_finished() {
    let dir = TempDir::new().unwrap();
    let cache = RunCache::new(dir.path()).unwrap();
    let (spectrogram, freqs) = spectral();
    cache.write_spectral(&spectrogram, &freqs).unwrap();
    cache.write_switching(&switching()).unwrap();
    cache.write_manifest("continuous", epoch(0.0), epoch(20.0)).unwrap();
    assert!(cache.read_run().is_ok());

    cache.clear_manifest().unwrap();
    assert!(matches!(cache.read_run(), Err(CacheError::Incomplete(_))));
    // Clearing twice is fine.
    cache.clear_manifest().unwrap();
}

#[test]
fn test_missing_series() {
    let dir = TempDir::new().unwrap();
    let cache = RunCache::new(dir.path()).unwrap();
    cache.write_switching(&switching()).unwrap();
    cache.write_manifest("predefined", epoch(0.0), epoch(1.0)).unwrap();

    match cache.read_run() {
        Err(CacheError::MissingSeries { key, .. }) => assert_eq!(key, SeriesKey::Spectra),
        other => panic!("Expected a missing series, got {other:?}"),
    }
}

#[test]
fn test_mismatched_series() {
    let dir = TempDir::new().unwrap();
    let cache = RunCache::new(dir.path()).unwrap();
    let (spectrogram, _) = spectral();
    cache.write_spectral(&spectrogram, &[1.0, 2.0]).unwrap();
    cache.write_switching(&switching()).unwrap();
    cache.write_manifest("continuous", epoch(0.0), epoch(1.0)).unwrap();

    assert!(matches!(
        cache.read_run(),
        Err(CacheError::ChannelMismatch {
            got: 3,
            expected: 2
        })
    ));
}
