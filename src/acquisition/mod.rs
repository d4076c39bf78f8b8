// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run spectral acquisition and switch cycling side by side.
//!
//! A run forks two workers. The "spectrometer" worker turns batches of sample
//! blocks into power spectra until the deadline; the "switching" worker steps
//! the switch schedule and reads thermometry until the same deadline. They
//! share nothing but the (read-only) deadline and an error flag, and each
//! stamps its output with its own clock. Once both have been joined, their
//! outputs are combined into a [`RunOutput`]; matching spectra to switch
//! states is left to the reducer.

mod error;
#[cfg(test)]
mod tests;

pub use error::AcquisitionError;

use std::{num::NonZeroUsize, thread};

use crossbeam_utils::atomic::AtomicCell;
use hifitime::{Duration, Epoch};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, trace, warn};
use num_complex::Complex32;
use scopeguard::defer_on_unwind;

use crate::{
    cache::RunCache,
    data::{RunOutput, Spectrogram},
    instruments::{Clock, Radio, SwitchNetwork, Thermometer},
    spectrum::{channel_frequencies, num_blocks_per_spectrum, Spectrometer},
    switching::{elapsed_seconds, SwitchLog, SwitchSchedule},
    PROGRESS_BARS,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcquisitionMode {
    /// Both workers run for `run_length`; the switch schedule cycles.
    Continuous { run_length: Duration },

    /// The switch schedule visits each state once; the run lasts exactly as
    /// long as that takes.
    Predefined,
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionMode::Continuous { .. } => write!(f, "continuous"),
            AcquisitionMode::Predefined => write!(f, "predefined"),
        }
    }
}

/// The devices used by a run. The two clocks must share an origin; they are
/// separate so that simulated devices can advance their own worker's time.
pub struct Instruments<'a> {
    pub radio: &'a mut dyn Radio,
    pub radio_clock: &'a dyn Clock,
    pub switch: &'a mut dyn SwitchNetwork,
    pub thermometer: &'a mut dyn Thermometer,
    pub switch_clock: &'a dyn Clock,
}

/// A validated acquisition run, ready to be executed.
pub struct Acquisition {
    spectrometer: Spectrometer,
    blocks_per_spectrum: NonZeroUsize,
    block_duration: Duration,
    channel_frequencies: Vec<f64>,
    schedule: SwitchSchedule,
    mode: AcquisitionMode,
    run_length: Duration,
}

impl Acquisition {
    /// Every spectrum integrates for `integration_time` (rounded down to a
    /// whole number of sample blocks) at `sample_rate` \[Hz\], centred on
    /// `centre_frequency` \[Hz\].
    pub fn new(
        spectrometer: Spectrometer,
        centre_frequency: f64,
        sample_rate: f64,
        integration_time: Duration,
        schedule: SwitchSchedule,
        mode: AcquisitionMode,
    ) -> Result<Acquisition, AcquisitionError> {
        let blocks_per_spectrum =
            num_blocks_per_spectrum(integration_time, sample_rate, spectrometer.block_len())?;
        let run_length = match mode {
            AcquisitionMode::Continuous { run_length } => run_length,
            AcquisitionMode::Predefined => schedule
                .total_duration()
                .ok_or(AcquisitionError::CyclicPredefinedSchedule)?,
        };
        if run_length <= Duration::ZERO {
            return Err(AcquisitionError::NonPositiveRunLength);
        }
        let channel_frequencies =
            channel_frequencies(centre_frequency, sample_rate, spectrometer.num_channels());
        let block_duration = Duration::from_seconds(spectrometer.block_len() as f64 / sample_rate);

        Ok(Acquisition {
            spectrometer,
            blocks_per_spectrum,
            block_duration,
            channel_frequencies,
            schedule,
            mode,
            run_length,
        })
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn run_length(&self) -> Duration {
        self.run_length
    }

    pub fn blocks_per_spectrum(&self) -> NonZeroUsize {
        self.blocks_per_spectrum
    }

    pub fn channel_frequencies(&self) -> &[f64] {
        &self.channel_frequencies
    }

    pub fn schedule(&self) -> &SwitchSchedule {
        &self.schedule
    }

    pub fn spectrometer(&self) -> &Spectrometer {
        &self.spectrometer
    }

    /// Execute the run. Blocks until both workers have finished. If `cache` is
    /// given, each worker persists its own series when it finishes, and the
    /// manifest is written once both have succeeded.
    ///
    /// An unknown switch state is reported before anything starts. If either
    /// worker fails, the other is told to stop early and the failure is
    /// returned; a worker panic is reported as such, never as an empty result.
    pub fn run(
        &self,
        instruments: Instruments,
        cache: Option<&RunCache>,
    ) -> Result<RunOutput, AcquisitionError> {
        let Instruments {
            radio,
            radio_clock,
            switch,
            thermometer,
            switch_clock,
        } = instruments;
        self.schedule.validate(switch)?;
        if let Some(cache) = cache {
            cache.clear_manifest()?;
        }

        let start = switch_clock.now();
        let deadline = start + self.run_length;
        info!(
            "Starting a {} run of {} ({} spectra of {} blocks)",
            self.mode,
            self.run_length,
            self.mode_description(),
            self.blocks_per_spectrum
        );

        // Progress bars.
        let multi_progress = MultiProgress::with_draw_target(if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        });
        let num_seconds = self.run_length.to_seconds().ceil() as u64;
        let spectral_progress = multi_progress.add(
            ProgressBar::new(num_seconds)
                .with_style(
                    ProgressStyle::default_bar()
                        .template("{msg:17}: [{wide_bar:.blue}] {pos:3}/{len:3} s ({elapsed_precise}<{eta_precise})")
                        .expect("template is valid")
                        .progress_chars("=> "),
                )
                .with_position(0)
                .with_message("Spectra"),
        );
        let switch_progress = multi_progress.add(
            ProgressBar::new(num_seconds)
                .with_style(
                    ProgressStyle::default_bar()
                        .template("{msg:17}: [{wide_bar:.green}] {pos:3}/{len:3} s ({elapsed_precise}<{eta_precise})")
                        .expect("template is valid")
                        .progress_chars("=> "),
                )
                .with_position(0)
                .with_message("Switching"),
        );

        // Use a variable to track whether any threads have an issue.
        let error = AtomicCell::new(false);

        let (spectral_result, switch_result) = thread::scope(|scope| {
            let spectral_handle = thread::Builder::new()
                .name("spectrometer".to_string())
                .spawn_scoped(scope, || {
                    // If a panic happens, update our atomic error.
                    defer_on_unwind! { error.store(true); }
                    spectral_progress.tick();

                    let result = self
                        .acquire_spectra(
                            radio,
                            radio_clock,
                            (start, deadline),
                            &error,
                            &spectral_progress,
                        )
                        .and_then(|spectrogram| {
                            if let Some(cache) = cache {
                                cache.write_spectral(&spectrogram, &self.channel_frequencies)?;
                            }
                            Ok(spectrogram)
                        });
                    // If the result was an error, allow the other thread to see
                    // this so it can abandon its work early.
                    if result.is_err() {
                        error.store(true);
                    }
                    spectral_progress.abandon_with_message("Finished spectra");
                    result
                })
                .expect("OS can create threads");

            let switch_handle = thread::Builder::new()
                .name("switching".to_string())
                .spawn_scoped(scope, || {
                    defer_on_unwind! { error.store(true); }
                    switch_progress.tick();

                    let result: Result<SwitchLog, AcquisitionError> = self
                        .schedule
                        .run(
                            &mut *switch,
                            thermometer,
                            switch_clock,
                            deadline,
                            &error,
                            &switch_progress,
                        )
                        .map_err(AcquisitionError::from);
                    switch.finish();
                    let result = result.and_then(|log| {
                        if let Some(cache) = cache {
                            cache.write_switching(&log)?;
                        }
                        Ok(log)
                    });
                    if result.is_err() {
                        error.store(true);
                    }
                    switch_progress.abandon_with_message("Finished switching");
                    result
                })
                .expect("OS can create threads");

            // Join both handles before looking at either result, so that
            // neither worker outlives the run.
            (spectral_handle.join(), switch_handle.join())
        });

        // A panic trumps any error, as the other worker probably only stopped
        // because of it.
        let spectral_result = spectral_result.map_err(|_| AcquisitionError::WorkerPanicked {
            worker: "spectrometer",
        })?;
        let switch_result = switch_result.map_err(|_| AcquisitionError::WorkerPanicked {
            worker: "switching",
        })?;
        let spectrogram = spectral_result?;
        let switch_log = switch_result?;

        let end = deadline;
        if let Some(cache) = cache {
            cache.write_manifest(&self.mode.to_string(), start, end)?;
            info!("Run cached to {}", cache.dir().display());
        }
        info!(
            "Acquired {} spectra and {} switch intervals",
            spectrogram.len(),
            switch_log.intervals.len()
        );

        Ok(RunOutput {
            spectrogram,
            channel_frequencies: self.channel_frequencies.clone(),
            switch_intervals: switch_log.intervals,
            thermometry: switch_log.thermometry,
            start,
            end,
        })
    }

    fn mode_description(&self) -> String {
        let per_spectrum = self.spectrometer.block_len() * self.blocks_per_spectrum.get();
        format!(
            "{} {} channels, {per_spectrum} samples per spectrum",
            self.spectrometer.mode(),
            self.spectrometer.num_channels()
        )
    }

    /// The spectrometer worker. A failed block read is replaced by zeros and
    /// still takes as long as the block would have; a block of the wrong
    /// length is fatal.
    fn acquire_spectra(
        &self,
        radio: &mut dyn Radio,
        clock: &dyn Clock,
        (start, deadline): (Epoch, Epoch),
        error: &AtomicCell<bool>,
        progress: &ProgressBar,
    ) -> Result<Spectrogram, AcquisitionError> {
        // Nothing captured before the run started belongs to it.
        let now = clock.now();
        if now < start {
            clock.sleep(start - now);
        }

        let block_len = self.spectrometer.block_len();
        let num_blocks = self.blocks_per_spectrum.get();
        let mut spectrogram = Spectrogram::new();
        let mut blocks = Vec::with_capacity(num_blocks);
        let mut num_dropped: usize = 0;

        loop {
            let capture_start = clock.now();
            if capture_start >= deadline || error.load() {
                break;
            }

            blocks.clear();
            for _ in 0..num_blocks {
                let block = match radio.read_block(block_len) {
                    Ok(block) => block,
                    Err(e) => {
                        // Only shout about the first failure; a dead stream
                        // fails every read.
                        if num_dropped == 0 {
                            warn!("Couldn't read a sample block, using zeros instead: {e}");
                        } else {
                            trace!("Couldn't read a sample block: {e}");
                        }
                        num_dropped += 1;
                        clock.sleep(self.block_duration);
                        vec![Complex32::default(); block_len]
                    }
                };
                blocks.push(block);
            }

            let spectrum = self.spectrometer.blocks_to_power(&blocks)?;
            spectrogram.push(spectrum, capture_start);
            progress.set_position(elapsed_seconds(progress, clock.now(), deadline));
        }

        if num_dropped > 0 {
            warn!("{num_dropped} sample blocks couldn't be read and were replaced with zeros");
        }
        debug!("Finished acquiring {} spectra", spectrogram.len());
        Ok(spectrogram)
    }
}
