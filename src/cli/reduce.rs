// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use hifitime::Duration;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{
    display_warnings, parse_duration_arg, InfoPrinter, UnitArgError, ARG_FILE_HELP,
    NOISE_DIODE_ENR_HELP,
};
use crate::{cache::RunCache, constants::*, params::ReduceParams, reduce::Reducer, RhinoError};

lazy_static::lazy_static! {
    static ref GUARD_BUFFER_HELP: String =
        format!("Spectra within this long after a switch are ignored, while the front end settles. Units may be given (e.g. 500ms); the default unit is seconds. Default: {DEFAULT_GUARD_BUFFER} s");

    static ref SOURCE_LABEL_HELP: String =
        format!("The switch state of the sky source. Default: {DEFAULT_SOURCE_LABEL}");

    static ref LOAD_LABEL_HELP: String =
        format!("The switch state of the ambient load. Default: {DEFAULT_LOAD_LABEL}");

    static ref NOISE_DIODE_LABEL_HELP: String =
        format!("The switch state of the noise diode. Default: {DEFAULT_NOISE_DIODE_LABEL}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ReduceArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The run cache directory written by `observe` or `calibration-cycle`.
    #[clap(short, long, parse(from_os_str), help_heading = "INPUT")]
    pub(super) cache: Option<PathBuf>,

    /// Write the reduction to this JSON file.
    #[clap(short, long, parse(from_os_str), help_heading = "OUTPUT")]
    pub(super) output: Option<PathBuf>,

    #[clap(short, long, help = GUARD_BUFFER_HELP.as_str(), help_heading = "REDUCTION")]
    pub(super) guard_buffer: Option<String>,

    #[clap(long, help = NOISE_DIODE_ENR_HELP.as_str(), help_heading = "REDUCTION")]
    pub(super) noise_diode_enr: Option<f64>,

    /// The thermometry probe on the ambient load (zero-indexed).
    #[clap(long, help_heading = "REDUCTION")]
    pub(super) load_probe: Option<usize>,

    #[clap(long, help = SOURCE_LABEL_HELP.as_str(), help_heading = "SWITCH STATES")]
    pub(super) source_label: Option<String>,

    #[clap(long, help = LOAD_LABEL_HELP.as_str(), help_heading = "SWITCH STATES")]
    pub(super) load_label: Option<String>,

    #[clap(long, help = NOISE_DIODE_LABEL_HELP.as_str(), help_heading = "SWITCH STATES")]
    pub(super) noise_diode_label: Option<String>,
}

impl ReduceArgs {
    /// Consolidate the command-line and file arguments, preferring the
    /// command line.
    pub(super) fn merge(self) -> Result<ReduceArgs, RhinoError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let ReduceArgs {
                args_file: _,
                cache,
                output,
                guard_buffer,
                noise_diode_enr,
                load_probe,
                source_label,
                load_label,
                noise_diode_label,
            } = unpack_arg_file!(arg_file);

            Ok(ReduceArgs {
                args_file: None,
                cache: cli_args.cache.or(cache),
                output: cli_args.output.or(output),
                guard_buffer: cli_args.guard_buffer.or(guard_buffer),
                noise_diode_enr: cli_args.noise_diode_enr.or(noise_diode_enr),
                load_probe: cli_args.load_probe.or(load_probe),
                source_label: cli_args.source_label.or(source_label),
                load_label: cli_args.load_label.or(load_label),
                noise_diode_label: cli_args.noise_diode_label.or(noise_diode_label),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<ReduceParams, RhinoError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            cache,
            output,
            guard_buffer,
            noise_diode_enr,
            load_probe,
            source_label,
            load_label,
            noise_diode_label,
        } = self;

        let cache = cache.ok_or(ReduceArgsError::NoCache)?;
        let guard_buffer = parse_duration_arg("guard buffer", guard_buffer.as_deref())?
            .unwrap_or_else(|| Duration::from_seconds(DEFAULT_GUARD_BUFFER));
        let noise_diode_enr = noise_diode_enr.unwrap_or(DEFAULT_NOISE_DIODE_ENR_DB);
        let load_probe = load_probe.unwrap_or(0);
        let source_label = source_label.unwrap_or_else(|| DEFAULT_SOURCE_LABEL.to_string());
        let load_label = load_label.unwrap_or_else(|| DEFAULT_LOAD_LABEL.to_string());
        let noise_diode_label =
            noise_diode_label.unwrap_or_else(|| DEFAULT_NOISE_DIODE_LABEL.to_string());

        let mut printer = InfoPrinter::new("Reducing".into());
        printer.push_line(format!("Run cache: {}", cache.display()).into());
        printer.push_block(vec![
            format!("Guard buffer: {guard_buffer}").into(),
            format!("Noise diode ENR: {noise_diode_enr} dB").into(),
            format!("Load temperature from probe {load_probe}").into(),
        ]);
        printer.push_line(
            format!("Source '{source_label}', load '{load_label}', noise diode '{noise_diode_label}'")
                .into(),
        );
        if let Some(output) = &output {
            printer.push_line(format!("Output: {}", output.display()).into());
        }
        printer.display();

        let reducer = Reducer::new(guard_buffer, noise_diode_enr)
            .with_labels(source_label, load_label, noise_diode_label)
            .with_load_probe(load_probe);

        display_warnings();

        Ok(ReduceParams {
            cache: RunCache::open(cache),
            reducer,
            output,
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
pub(super) enum ReduceArgsError {
    #[error("No run cache was given")]
    NoCache,

    #[error(transparent)]
    Unit(#[from] UnitArgError),
}
