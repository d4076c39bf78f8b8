// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A run-scoped store of named data series.
//!
//! Each acquisition worker writes its own series when it finishes; the
//! coordinator writes the manifest only once both have succeeded. Every series
//! is a JSON file named after its key. Timestamps are stored as UNIX seconds.

mod error;
#[cfg(test)]
mod tests;

pub use error::CacheError;

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use hifitime::Epoch;
use log::debug;
use ndarray::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    data::{RunOutput, Spectrogram, SwitchInterval, ThermometrySample},
    switching::SwitchLog,
};

const MANIFEST_FILE: &str = "manifest.json";

/// The names of the series in a run cache.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum SeriesKey {
    Spectra,
    CaptureTimestamps,
    ChannelFrequencies,
    SwitchLabels,
    SwitchTimestamps,
    Temperatures,
    TemperatureTimestamps,
}

impl SeriesKey {
    pub fn file_name(self) -> String {
        format!("{self}.json")
    }
}

/// Written last; its presence marks a complete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// A description of how the run was acquired.
    pub mode: String,

    /// \[UNIX seconds\]
    pub start: f64,

    /// \[UNIX seconds\]
    pub end: f64,

    pub series: Vec<SeriesKey>,

    pub rhino_version: String,
}

#[derive(Debug, Clone)]
pub struct RunCache {
    dir: PathBuf,
}

impl RunCache {
    /// Use (and create, if necessary) the directory `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<RunCache, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(RunCache { dir })
    }

    /// Use an existing cache without touching the filesystem. Reading from a
    /// directory that doesn't hold a finished run is an error.
    pub fn open<P: AsRef<Path>>(dir: P) -> RunCache {
        RunCache {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: SeriesKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Write the spectral worker's series.
    pub fn write_spectral(
        &self,
        spectrogram: &Spectrogram,
        channel_frequencies: &[f64],
    ) -> Result<(), CacheError> {
        self.write_series(SeriesKey::Spectra, &spectrogram.to_array())?;
        self.write_series(
            SeriesKey::CaptureTimestamps,
            &to_unix(spectrogram.timestamps().iter().copied()),
        )?;
        self.write_series(SeriesKey::ChannelFrequencies, channel_frequencies)?;
        Ok(())
    }

    /// Write the switching worker's series.
    pub fn write_switching(&self, log: &SwitchLog) -> Result<(), CacheError> {
        let labels: Vec<&str> = log.intervals.iter().map(|i| i.label.as_str()).collect();
        self.write_series(SeriesKey::SwitchLabels, &labels)?;
        self.write_series(
            SeriesKey::SwitchTimestamps,
            &to_unix(log.intervals.iter().map(|i| i.start)),
        )?;

        let num_probes = log
            .thermometry
            .first()
            .map(|t| t.temperatures.len())
            .unwrap_or(0);
        let mut temperatures = Array2::zeros((log.thermometry.len(), num_probes));
        for (mut row, sample) in temperatures.outer_iter_mut().zip(log.thermometry.iter()) {
            if sample.temperatures.len() != num_probes {
                return Err(CacheError::RaggedTemperatures);
            }
            row.assign(&ArrayView1::from(sample.temperatures.as_slice()));
        }
        self.write_series(SeriesKey::Temperatures, &temperatures)?;
        self.write_series(
            SeriesKey::TemperatureTimestamps,
            &to_unix(log.thermometry.iter().map(|t| t.timestamp)),
        )?;
        Ok(())
    }

    /// Mark the run as complete.
    pub fn write_manifest(&self, mode: &str, start: Epoch, end: Epoch) -> Result<(), CacheError> {
        let manifest = RunManifest {
            mode: mode.to_string(),
            start: start.to_unix_seconds(),
            end: end.to_unix_seconds(),
            series: SeriesKey::iter().collect(),
            rhino_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let path = self.dir.join(MANIFEST_FILE);
        debug!("Writing run manifest to {}", path.display());
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, &manifest)
            .map_err(|source| CacheError::Json { path, source })
    }

    /// Mark the cache as incomplete, e.g. before a new run overwrites it.
    pub fn clear_manifest(&self) -> Result<(), CacheError> {
        let path = self.dir.join(MANIFEST_FILE);
        if path.exists() {
            debug!("Removing the old run manifest {}", path.display());
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn read_manifest(&self) -> Result<RunManifest, CacheError> {
        let path = self.dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(CacheError::Incomplete(self.dir.clone()));
        }
        let file = BufReader::new(File::open(&path)?);
        serde_json::from_reader(file).map_err(|source| CacheError::Json { path, source })
    }

    /// Read a complete run back.
    pub fn read_run(&self) -> Result<RunOutput, CacheError> {
        let manifest = self.read_manifest()?;

        let spectra: Array2<f64> = self.read_series(SeriesKey::Spectra)?;
        let capture_timestamps = from_unix(self.read_series(SeriesKey::CaptureTimestamps)?);
        let channel_frequencies: Vec<f64> = self.read_series(SeriesKey::ChannelFrequencies)?;
        let (num_spectra, num_channels) = spectra.dim();
        let num_captures = capture_timestamps.len();
        if num_spectra > 0 && num_channels != channel_frequencies.len() {
            return Err(CacheError::ChannelMismatch {
                got: num_channels,
                expected: channel_frequencies.len(),
            });
        }
        let spectrogram = Spectrogram::from_array(spectra.view(), capture_timestamps).ok_or(
            CacheError::LengthMismatch {
                what: "spectra",
                got: num_spectra,
                expected: num_captures,
            },
        )?;

        let labels: Vec<String> = self.read_series(SeriesKey::SwitchLabels)?;
        let switch_timestamps = from_unix(self.read_series(SeriesKey::SwitchTimestamps)?);
        check_len("switch labels", labels.len(), switch_timestamps.len())?;
        let switch_intervals = labels
            .into_iter()
            .zip(switch_timestamps)
            .map(|(label, start)| SwitchInterval { label, start })
            .collect();

        let temperatures: Array2<f64> = self.read_series(SeriesKey::Temperatures)?;
        let temperature_timestamps =
            from_unix(self.read_series(SeriesKey::TemperatureTimestamps)?);
        check_len(
            "temperature rows",
            temperatures.len_of(Axis(0)),
            temperature_timestamps.len(),
        )?;
        let thermometry = temperatures
            .outer_iter()
            .zip(temperature_timestamps)
            .map(|(row, timestamp)| ThermometrySample {
                temperatures: row.to_vec(),
                timestamp,
            })
            .collect();

        Ok(RunOutput {
            spectrogram,
            channel_frequencies,
            switch_intervals,
            thermometry,
            start: Epoch::from_unix_seconds(manifest.start),
            end: Epoch::from_unix_seconds(manifest.end),
        })
    }

    fn write_series<T: Serialize + ?Sized>(
        &self,
        key: SeriesKey,
        value: &T,
    ) -> Result<(), CacheError> {
        let path = self.path(key);
        debug!("Writing {key} to {}", path.display());
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(file, value).map_err(|source| CacheError::Json { path, source })
    }

    fn read_series<T: DeserializeOwned>(&self, key: SeriesKey) -> Result<T, CacheError> {
        let path = self.path(key);
        if !path.exists() {
            return Err(CacheError::MissingSeries {
                key,
                dir: self.dir.clone(),
            });
        }
        let file = BufReader::new(File::open(&path)?);
        serde_json::from_reader(file).map_err(|source| CacheError::Json { path, source })
    }
}

fn check_len(what: &'static str, got: usize, expected: usize) -> Result<(), CacheError> {
    if got == expected {
        Ok(())
    } else {
        Err(CacheError::LengthMismatch {
            what,
            got,
            expected,
        })
    }
}

fn to_unix<I: Iterator<Item = Epoch>>(epochs: I) -> Vec<f64> {
    epochs.map(|e| e.to_unix_seconds()).collect()
}

fn from_unix(seconds: Vec<f64>) -> Vec<Epoch> {
    seconds.into_iter().map(Epoch::from_unix_seconds).collect()
}
