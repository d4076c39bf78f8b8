// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{num::NonZeroUsize, path::PathBuf};

use clap::{Args, Parser};
use hifitime::Duration;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{
    check_states, display_warnings, parse_duration_arg, InfoPrinter, InstrumentArgs,
    SpectrometerArgs, UnitArgError, UnknownStateError, Warn, ARG_FILE_HELP,
    THERMOMETRY_CADENCE_HELP,
};
use crate::{
    acquisition::{Acquisition, AcquisitionMode},
    constants::*,
    params::{CalibrationCycleParams, VnaParams},
    switching::SwitchSchedule,
    RhinoError,
};

const DEFAULT_OUTPUT_DIR: &str = "rhino_calibration";
const DEFAULT_VNA_PATHS: [&str; 4] = ["vna_obsload", "vna_ns", "vna_ant", "vna_receiver"];

lazy_static::lazy_static! {
    static ref STATES_HELP: String =
        format!("The switch states to visit, once each, in order. Default: {DEFAULT_LOAD_LABEL} {DEFAULT_NOISE_DIODE_LABEL} {DEFAULT_SOURCE_LABEL}");

    static ref DWELL_HELP: String =
        format!("How long to dwell in each state. Units may be given (e.g. 30s); the default unit is seconds. Default: {DEFAULT_DWELL_TIME} s");

    static ref OUTPUT_HELP: String =
        format!("The directory the run cache is written to. Default: {DEFAULT_OUTPUT_DIR}");

    static ref VNA_SWEEPS_HELP: String =
        format!("The number of VNA sweeps averaged per measurement. Default: {DEFAULT_VNA_NUM_SWEEPS}");

    static ref VNA_PATHS_HELP: String =
        format!("The switch paths measured with the VNA after the calibration standards. Default: {}", DEFAULT_VNA_PATHS.join(" "));
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CalibrationCycleArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "calibration_cycle")]
    #[serde(default)]
    pub(super) cycle_args: CalibrationCycleCliArgs,

    #[clap(flatten)]
    #[serde(rename = "spectrometer")]
    #[serde(default)]
    pub(super) spectrometer_args: SpectrometerArgs,

    #[clap(flatten)]
    #[serde(rename = "instruments")]
    #[serde(default)]
    pub(super) instrument_args: InstrumentArgs,
}

#[derive(Args, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CalibrationCycleCliArgs {
    #[clap(short, long, parse(from_os_str), help = OUTPUT_HELP.as_str(), help_heading = "CALIBRATION CYCLE")]
    pub(super) output: Option<PathBuf>,

    #[clap(long, multiple_values(true), help = STATES_HELP.as_str(), help_heading = "CALIBRATION CYCLE")]
    pub(super) states: Option<Vec<String>>,

    #[clap(short, long, help = DWELL_HELP.as_str(), help_heading = "CALIBRATION CYCLE")]
    pub(super) dwell: Option<String>,

    #[clap(long, help = THERMOMETRY_CADENCE_HELP.as_str(), help_heading = "CALIBRATION CYCLE")]
    pub(super) thermometry_cadence: Option<String>,

    /// Measure the short, open and load standards and the switch paths with
    /// the VNA before acquiring spectra. Requires --simulate.
    #[clap(long, help_heading = "VNA")]
    #[serde(default)]
    pub(super) vna: bool,

    #[clap(long, help = VNA_SWEEPS_HELP.as_str(), help_heading = "VNA")]
    pub(super) vna_sweeps: Option<usize>,

    #[clap(long, multiple_values(true), help = VNA_PATHS_HELP.as_str(), help_heading = "VNA")]
    pub(super) vna_paths: Option<Vec<String>>,
}

impl CalibrationCycleCliArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            output: self.output.or(other.output),
            states: self.states.or(other.states),
            dwell: self.dwell.or(other.dwell),
            thermometry_cadence: self.thermometry_cadence.or(other.thermometry_cadence),
            vna: self.vna || other.vna,
            vna_sweeps: self.vna_sweeps.or(other.vna_sweeps),
            vna_paths: self.vna_paths.or(other.vna_paths),
        }
    }
}

impl CalibrationCycleArgs {
    /// Consolidate the command-line and file arguments, preferring the
    /// command line.
    pub(super) fn merge(self) -> Result<CalibrationCycleArgs, RhinoError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let CalibrationCycleArgs {
                args_file: _,
                cycle_args,
                spectrometer_args,
                instrument_args,
            } = unpack_arg_file!(arg_file);

            Ok(CalibrationCycleArgs {
                args_file: None,
                cycle_args: cli_args.cycle_args.merge(cycle_args),
                spectrometer_args: cli_args.spectrometer_args.merge(spectrometer_args),
                instrument_args: cli_args.instrument_args.merge(instrument_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<CalibrationCycleParams, RhinoError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            cycle_args:
                CalibrationCycleCliArgs {
                    output,
                    states,
                    dwell,
                    thermometry_cadence,
                    vna,
                    vna_sweeps,
                    vna_paths,
                },
            spectrometer_args,
            instrument_args,
        } = self;

        let states = states.unwrap_or_else(|| {
            [
                DEFAULT_LOAD_LABEL,
                DEFAULT_NOISE_DIODE_LABEL,
                DEFAULT_SOURCE_LABEL,
            ]
            .map(String::from)
            .to_vec()
        });
        if states.is_empty() {
            return Err(CalibrationCycleArgsError::NoStates.into());
        }
        let dwell = parse_duration_arg("dwell time", dwell.as_deref())?
            .unwrap_or_else(|| Duration::from_seconds(DEFAULT_DWELL_TIME));
        let thermometry_cadence =
            parse_duration_arg("thermometry cadence", thermometry_cadence.as_deref())?
                .unwrap_or_else(|| Duration::from_seconds(DEFAULT_THERMOMETRY_CADENCE));

        let setup = spectrometer_args.parse()?;
        let instruments = instrument_args.parse()?;
        check_states(&states, &instruments).map_err(CalibrationCycleArgsError::from)?;

        let vna = if vna {
            if !instruments.is_simulated() {
                return Err(CalibrationCycleArgsError::VnaNeedsSimulation.into());
            }
            let num_sweeps = NonZeroUsize::new(vna_sweeps.unwrap_or(DEFAULT_VNA_NUM_SWEEPS))
                .ok_or(CalibrationCycleArgsError::NoVnaSweeps)?;
            let paths = vna_paths
                .unwrap_or_else(|| DEFAULT_VNA_PATHS.map(String::from).to_vec());
            check_states(&paths, &instruments).map_err(CalibrationCycleArgsError::from)?;
            let half_band = setup.sample_rate / 2.0 + VNA_BAND_PADDING;
            Some(VnaParams {
                min_freq: (setup.centre_frequency - half_band).max(0.0),
                max_freq: setup.centre_frequency + half_band,
                num_sweeps,
                paths,
            })
        } else {
            if vna_sweeps.is_some() || vna_paths.is_some() {
                "VNA arguments are ignored without --vna".warn();
            }
            None
        };

        if setup.integration_time > dwell {
            format!(
                "The integration time ({}) is longer than the dwell ({dwell}); no spectra will be captured",
                setup.integration_time
            )
            .warn();
        }

        let schedule = SwitchSchedule::predefined(states, dwell)?
            .with_thermometry_cadence(thermometry_cadence)?;
        let output_dir = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let mut printer = InfoPrinter::new("Calibration cycle".into());
        printer.push_line(
            format!(
                "{} for {dwell} each",
                schedule.labels().collect::<Vec<_>>().join(", ")
            )
            .into(),
        );
        printer.push_line(format!("Thermometry every {thermometry_cadence}").into());
        if let Some(vna) = &vna {
            printer.push_block(vec![
                format!(
                    "VNA: {:.3} to {:.3} MHz, {} sweeps",
                    vna.min_freq / 1e6,
                    vna.max_freq / 1e6,
                    vna.num_sweeps
                )
                .into(),
                format!("Paths: {}", vna.paths.join(", ")).into(),
            ]);
        }
        printer.push_line(format!("Run cache: {}", output_dir.display()).into());
        printer.display();

        let sample_rate = setup.sample_rate;
        let acquisition = Acquisition::new(
            setup.spectrometer,
            setup.centre_frequency,
            sample_rate,
            setup.integration_time,
            schedule,
            AcquisitionMode::Predefined,
        )?;

        display_warnings();

        Ok(CalibrationCycleParams {
            acquisition,
            instruments,
            sample_rate,
            output_dir,
            vna,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), RhinoError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub(super) enum CalibrationCycleArgsError {
    #[error("No switch states were given")]
    NoStates,

    #[error("Only simulated instruments have a VNA; use --simulate or drop --vna")]
    VnaNeedsSimulation,

    #[error("The number of VNA sweeps must be at least 1")]
    NoVnaSweeps,

    #[error(transparent)]
    Unit(#[from] UnitArgError),

    #[error(transparent)]
    UnknownState(#[from] UnknownStateError),
}
