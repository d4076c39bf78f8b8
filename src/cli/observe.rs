// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

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
    params::ObserveParams,
    switching::SwitchSchedule,
    RhinoError,
};

const DEFAULT_OUTPUT_DIR: &str = "rhino_run";

lazy_static::lazy_static! {
    static ref STATES_HELP: String =
        format!("The switch states to cycle through, in order. Default: {DEFAULT_LOAD_LABEL} {DEFAULT_NOISE_DIODE_LABEL} {DEFAULT_SOURCE_LABEL}");

    static ref CYCLE_LENGTH_HELP: String =
        format!("The length of one pass through all states, divided equally between them. Units may be given (e.g. 1min); the default unit is seconds. Default: {DEFAULT_DWELL_TIME} s per state");

    static ref OUTPUT_HELP: String =
        format!("The directory the run cache is written to. Default: {DEFAULT_OUTPUT_DIR}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ObserveArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "observe")]
    #[serde(default)]
    pub(super) observe_args: ObserveCliArgs,

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
pub(super) struct ObserveCliArgs {
    #[clap(short, long, parse(from_os_str), help = OUTPUT_HELP.as_str(), help_heading = "OBSERVING")]
    pub(super) output: Option<PathBuf>,

    /// How long to observe for. Units may be given (e.g. 2h); the default unit
    /// is seconds. Required.
    #[clap(short = 'l', long, help_heading = "OBSERVING")]
    pub(super) run_length: Option<String>,

    #[clap(long, multiple_values(true), help = STATES_HELP.as_str(), help_heading = "OBSERVING")]
    pub(super) states: Option<Vec<String>>,

    #[clap(long, help = CYCLE_LENGTH_HELP.as_str(), help_heading = "OBSERVING")]
    pub(super) cycle_length: Option<String>,

    /// Dwell times for each state, in the same order as the states. Overrides
    /// --cycle-length.
    #[clap(long, multiple_values(true), help_heading = "OBSERVING")]
    pub(super) dwell_times: Option<Vec<String>>,

    #[clap(long, help = THERMOMETRY_CADENCE_HELP.as_str(), help_heading = "OBSERVING")]
    pub(super) thermometry_cadence: Option<String>,
}

impl ObserveCliArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            output: self.output.or(other.output),
            run_length: self.run_length.or(other.run_length),
            states: self.states.or(other.states),
            cycle_length: self.cycle_length.or(other.cycle_length),
            dwell_times: self.dwell_times.or(other.dwell_times),
            thermometry_cadence: self.thermometry_cadence.or(other.thermometry_cadence),
        }
    }
}

impl ObserveArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<ObserveArgs, RhinoError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Ensure all of the file args are accounted for by pattern
            // matching.
            let ObserveArgs {
                args_file: _,
                observe_args,
                spectrometer_args,
                instrument_args,
            } = unpack_arg_file!(arg_file);

            Ok(ObserveArgs {
                args_file: None,
                observe_args: cli_args.observe_args.merge(observe_args),
                spectrometer_args: cli_args.spectrometer_args.merge(spectrometer_args),
                instrument_args: cli_args.instrument_args.merge(instrument_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<ObserveParams, RhinoError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            observe_args:
                ObserveCliArgs {
                    output,
                    run_length,
                    states,
                    cycle_length,
                    dwell_times,
                    thermometry_cadence,
                },
            spectrometer_args,
            instrument_args,
        } = self;

        let run_length = parse_duration_arg("run length", run_length.as_deref())?
            .ok_or(ObserveArgsError::NoRunLength)?;
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
            return Err(ObserveArgsError::NoStates.into());
        }

        let setup = spectrometer_args.parse()?;
        let instruments = instrument_args.parse()?;
        check_states(&states, &instruments).map_err(ObserveArgsError::from)?;

        let schedule = match dwell_times {
            Some(dwell_times) => {
                if cycle_length.is_some() {
                    "--cycle-length is ignored when --dwell-times are given".warn();
                }
                if dwell_times.len() != states.len() {
                    return Err(ObserveArgsError::DwellCount {
                        states: states.len(),
                        dwells: dwell_times.len(),
                    }
                    .into());
                }
                let dwells = dwell_times
                    .iter()
                    .map(|d| {
                        parse_duration_arg("dwell time", Some(d.as_str()))
                            .map(|d| d.unwrap_or(Duration::ZERO))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                SwitchSchedule::with_durations(states.into_iter().zip(dwells).collect())?
            }
            None => {
                let cycle_length = parse_duration_arg("cycle length", cycle_length.as_deref())?
                    .unwrap_or_else(|| {
                        Duration::from_seconds(DEFAULT_DWELL_TIME * states.len() as f64)
                    });
                if cycle_length <= Duration::ZERO {
                    return Err(ObserveArgsError::NonPositiveCycleLength.into());
                }
                SwitchSchedule::equal_dwell(states, cycle_length)?
            }
        };
        let thermometry_cadence =
            parse_duration_arg("thermometry cadence", thermometry_cadence.as_deref())?
                .unwrap_or_else(|| Duration::from_seconds(DEFAULT_THERMOMETRY_CADENCE));
        let schedule = schedule.with_thermometry_cadence(thermometry_cadence)?;

        let shortest_dwell = schedule.dwells().min().unwrap_or(Duration::ZERO);
        if setup.integration_time > shortest_dwell {
            format!(
                "The integration time ({}) is longer than the shortest dwell ({shortest_dwell}); some dwells will have no spectra",
                setup.integration_time
            )
            .warn();
        }

        let mut printer = InfoPrinter::new("Observing".into());
        printer.push_line(format!("Run length: {run_length}").into());
        printer.push_block(
            schedule
                .labels()
                .zip(schedule.dwells())
                .map(|(label, dwell)| format!("{label}: {dwell}").into())
                .collect(),
        );
        printer.push_line(format!("Thermometry every {thermometry_cadence}").into());
        let output_dir = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        printer.push_line(format!("Run cache: {}", output_dir.display()).into());
        printer.display();

        let sample_rate = setup.sample_rate;
        let acquisition = Acquisition::new(
            setup.spectrometer,
            setup.centre_frequency,
            sample_rate,
            setup.integration_time,
            schedule,
            AcquisitionMode::Continuous { run_length },
        )?;

        display_warnings();

        Ok(ObserveParams {
            acquisition,
            instruments,
            sample_rate,
            output_dir,
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
pub(super) enum ObserveArgsError {
    #[error("No run length was given")]
    NoRunLength,

    #[error("No switch states were given")]
    NoStates,

    #[error("The cycle length must be positive")]
    NonPositiveCycleLength,

    #[error("Got {dwells} dwell times for {states} switch states")]
    DwellCount { states: usize, dwells: usize },

    #[error(transparent)]
    Unit(#[from] UnitArgError),

    #[error(transparent)]
    UnknownState(#[from] UnknownStateError),
}
