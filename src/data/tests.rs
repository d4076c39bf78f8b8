// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

fn epoch(s: f64) -> Epoch {
    Epoch::from_unix_seconds(1_700_000_000.0 + s)
}

#[test]
fn test_spectrogram_array_conversion() {
    let mut spectrogram = Spectrogram::new();
    assert!(spectrogram.is_empty());
    assert_eq!(spectrogram.num_channels(), None);
    assert_eq!(spectrogram.to_array().dim(), (0, 0));

    spectrogram.push(vec![1.0, 2.0, 3.0], epoch(0.0));
    spectrogram.push(vec![4.0, 5.0, 6.0], epoch(1.0));
    assert_eq!(spectrogram.len(), 2);
    assert_eq!(spectrogram.num_channels(), Some(3));

    let array = spectrogram.to_array();
    assert_eq!(array.dim(), (2, 3));
    assert_abs_diff_eq!(array[(1, 2)], 6.0);

    let back = Spectrogram::from_array(array.view(), spectrogram.timestamps().to_vec()).unwrap();
    assert_eq!(back.spectra(), spectrogram.spectra());
    assert_eq!(back.timestamps(), spectrogram.timestamps());

    // Mismatched timestamps are refused.
    assert!(Spectrogram::from_array(array.view(), vec![epoch(0.0)]).is_none());
}

#[test]
fn test_thermometry_validity() {
    let failed = ThermometrySample::failed(2, epoch(0.0));
    assert_eq!(failed.temperatures, vec![-273.0, -273.0]);
    assert!(!failed.is_valid());

    let good = ThermometrySample {
        temperatures: vec![27.8, 89.0],
        timestamp: epoch(1.0),
    };
    assert!(good.is_valid());

    let partly_bad = ThermometrySample {
        temperatures: vec![27.8, THERMOMETRY_SENTINEL],
        timestamp: epoch(2.0),
    };
    assert!(!partly_bad.is_valid());

    let nan = ThermometrySample {
        temperatures: vec![f64::NAN, 20.0],
        timestamp: epoch(3.0),
    };
    assert!(!nan.is_valid());
}

#[test]
fn test_run_output_duration() {
    let output = RunOutput {
        spectrogram: Spectrogram::new(),
        channel_frequencies: vec![],
        switch_intervals: vec![],
        thermometry: vec![],
        start: epoch(0.0),
        end: epoch(30.0),
    };
    assert_abs_diff_eq!(output.duration().to_seconds(), 30.0, epsilon = 1e-6);
}
