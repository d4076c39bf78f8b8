// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Arguments shared by command-line interfaces. Both `observe` and
//! `calibration-cycle` drive a spectrometer with the same instruments, so
//! the same arguments are shared between them.

mod printers;

pub(crate) use printers::{display_warnings, InfoPrinter, Warn};

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr};

use clap::Args;
use hifitime::Duration;
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::{
    constants::*,
    instruments::{default_switch_commands, IqFormat},
    params::{HardwareParams, InstrumentParams, SimulationParams},
    spectrum::{Spectrometer, SpectrometerMode, SpectrumError, Window, WINDOWS_COMMA_SEPARATED},
    unit_parsing::{parse_duration, parse_freq_hz, UnitParseError},
};

const DEFAULT_WINDOW: Window = Window::Rectangular;

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);

    static ref CENTRE_FREQUENCY_HELP: String =
        format!("The receiver centre frequency. Units may be given (e.g. 70MHz); the default unit is Hz. Default: {} MHz", DEFAULT_CENTRE_FREQUENCY / 1e6);

    static ref SAMPLE_RATE_HELP: String =
        format!("The receiver sample rate, which is also the bandwidth. Units may be given (e.g. 8MHz); the default unit is Hz. Default: {} MHz", DEFAULT_SAMPLE_RATE / 1e6);

    static ref NUM_CHANNELS_HELP: String =
        format!("The number of spectral channels. Powers of 2 are fastest. Default: {DEFAULT_NUM_CHANNELS}");

    static ref WINDOW_HELP: String =
        format!("The window applied before the spectral transform. Supported windows: {}. Default: {DEFAULT_WINDOW}", *WINDOWS_COMMA_SEPARATED);

    static ref NUM_TAPS_HELP: String =
        format!("The number of polyphase filter bank taps. Only used with --pfb. Default: {DEFAULT_NUM_TAPS}");

    static ref INTEGRATION_TIME_HELP: String =
        format!("The integration time of each spectrum. Units may be given (e.g. 500ms); the default unit is seconds. Default: {DEFAULT_INTEGRATION_TIME} s");

    static ref IQ_FORMAT_HELP: String =
        format!("The sample format of the I/Q source. Supported formats: {}. Default: {}", IqFormat::iter().join(", "), IqFormat::Cf32);

    static ref NUM_PROBES_HELP: String =
        format!("The number of thermometry probes. Default: {DEFAULT_NUM_PROBES}");

    static ref SETTLE_TIME_HELP: String =
        format!("How long to wait for the relays after each switch command. Default: {DEFAULT_SWITCH_SETTLE_TIME} s");

    static ref SIMULATED_ANTENNA_HELP: String =
        format!("The antenna temperature of the simulated receiver [K]. Default: {DEFAULT_SIMULATED_ANTENNA_TEMPERATURE}");

    static ref SIMULATED_LOAD_HELP: String =
        format!("The load temperature of the simulated receiver [K]. Default: {DEFAULT_SIMULATED_LOAD_TEMPERATURE}");

    pub(super) static ref NOISE_DIODE_ENR_HELP: String =
        format!("The excess noise ratio of the noise diode [dB]. Default: {DEFAULT_NOISE_DIODE_ENR_DB}");

    pub(super) static ref THERMOMETRY_CADENCE_HELP: String =
        format!("How often to read the thermometry probes. Default: {DEFAULT_THERMOMETRY_CADENCE} s");
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
    #[strum(serialize = "yaml", serialize = "yml")]
    Yaml,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());
        let decode_error = |format: &str, err: &dyn std::fmt::Display| {
            RhinoError::ArgFile(format!(
                "Couldn't decode {format} structure from {:?}:\n{err}",
                $arg_file
            ))
        };

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                toml::from_str(&contents).map_err(|err| decode_error("toml", &err))?
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                serde_json::from_str(&contents).map_err(|err| decode_error("json", &err))?
            }
            Some(ArgFileTypes::Yaml) => {
                debug!("Parsing yaml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                serde_yaml::from_str(&contents).map_err(|err| decode_error("yaml", &err))?
            }

            None => {
                return Err(RhinoError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

/// Parse a duration argument, if one was given.
pub(super) fn parse_duration_arg(
    what: &'static str,
    arg: Option<&str>,
) -> Result<Option<Duration>, UnitArgError> {
    arg.map(|s| parse_duration(s).map_err(|source| UnitArgError { what, source }))
        .transpose()
}

#[derive(Error, Debug)]
#[error("Couldn't parse the {what}: {source}")]
pub(crate) struct UnitArgError {
    what: &'static str,
    source: UnitParseError,
}

#[derive(Args, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SpectrometerArgs {
    #[clap(short = 'f', long, help = CENTRE_FREQUENCY_HELP.as_str(), help_heading = "SPECTROMETER")]
    pub(super) centre_frequency: Option<String>,

    #[clap(short, long, help = SAMPLE_RATE_HELP.as_str(), help_heading = "SPECTROMETER")]
    pub(super) sample_rate: Option<String>,

    #[clap(short = 'c', long, help = NUM_CHANNELS_HELP.as_str(), help_heading = "SPECTROMETER")]
    pub(super) num_channels: Option<usize>,

    #[clap(short, long, help = WINDOW_HELP.as_str(), help_heading = "SPECTROMETER")]
    pub(super) window: Option<String>,

    /// Use a polyphase filter bank rather than a windowed FFT.
    #[clap(long, help_heading = "SPECTROMETER")]
    #[serde(default)]
    pub(super) pfb: bool,

    #[clap(long, help = NUM_TAPS_HELP.as_str(), help_heading = "SPECTROMETER")]
    pub(super) num_taps: Option<usize>,

    #[clap(short = 't', long, help = INTEGRATION_TIME_HELP.as_str(), help_heading = "SPECTROMETER")]
    pub(super) integration_time: Option<String>,
}

/// A validated spectrometer and the receiver settings it runs with.
pub(super) struct SpectrometerSetup {
    pub(super) spectrometer: Spectrometer,

    /// \[Hz\]
    pub(super) centre_frequency: f64,

    /// \[Hz\]
    pub(super) sample_rate: f64,

    pub(super) integration_time: Duration,
}

impl SpectrometerArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            centre_frequency: self.centre_frequency.or(other.centre_frequency),
            sample_rate: self.sample_rate.or(other.sample_rate),
            num_channels: self.num_channels.or(other.num_channels),
            window: self.window.or(other.window),
            pfb: self.pfb || other.pfb,
            num_taps: self.num_taps.or(other.num_taps),
            integration_time: self.integration_time.or(other.integration_time),
        }
    }

    pub(super) fn parse(self) -> Result<SpectrometerSetup, SpectrometerArgsError> {
        let Self {
            centre_frequency,
            sample_rate,
            num_channels,
            window,
            pfb,
            num_taps,
            integration_time,
        } = self;

        let parse_freq = |what, arg: Option<String>, default| match arg {
            Some(s) => parse_freq_hz(&s).map_err(|source| UnitArgError { what, source }),
            None => Ok(default),
        };
        let centre_frequency =
            parse_freq("centre frequency", centre_frequency, DEFAULT_CENTRE_FREQUENCY)?;
        let sample_rate = parse_freq("sample rate", sample_rate, DEFAULT_SAMPLE_RATE)?;
        let integration_time =
            parse_duration_arg("integration time", integration_time.as_deref())?
                .unwrap_or_else(|| Duration::from_seconds(DEFAULT_INTEGRATION_TIME));

        let window = match window {
            Some(w) => Window::parse(&w)?,
            None => DEFAULT_WINDOW,
        };
        let num_channels = num_channels.unwrap_or(DEFAULT_NUM_CHANNELS);
        let mode = if pfb {
            let num_taps = num_taps.unwrap_or(DEFAULT_NUM_TAPS);
            SpectrometerMode::Pfb {
                num_taps: NonZeroUsize::new(num_taps).ok_or(SpectrumError::NoTaps)?,
            }
        } else {
            if num_taps.is_some() {
                "--num-taps is ignored without --pfb".warn();
            }
            SpectrometerMode::Fft
        };
        let spectrometer = Spectrometer::new(mode, num_channels, window)?;

        let mut printer = InfoPrinter::new("Spectrometer".into());
        printer.push_block(vec![
            format!("{mode}, {num_channels} channels, {window} window").into(),
            format!(
                "Channel width: {:.3} kHz",
                sample_rate / num_channels as f64 / 1e3
            )
            .into(),
        ]);
        printer.push_block(vec![
            format!("Centre frequency: {:.3} MHz", centre_frequency / 1e6).into(),
            format!("Sample rate:      {:.3} MHz", sample_rate / 1e6).into(),
        ]);
        printer.push_line(format!("Integration time: {integration_time}").into());
        printer.display();

        Ok(SpectrometerSetup {
            spectrometer,
            centre_frequency,
            sample_rate,
            integration_time,
        })
    }
}

#[derive(Error, Debug)]
pub(crate) enum SpectrometerArgsError {
    #[error(transparent)]
    Unit(#[from] UnitArgError),

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

#[derive(Args, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct InstrumentArgs {
    /// Simulate the receiver, switch and thermometry rather than talking to
    /// hardware. Simulated runs complete as fast as the spectra can be
    /// computed.
    #[clap(long, help_heading = "INSTRUMENTS")]
    #[serde(default)]
    pub(super) simulate: bool,

    /// The file or pipe the receiver's interleaved I/Q samples are read from,
    /// e.g. a FIFO fed by an SDR capture tool.
    #[clap(long, parse(from_os_str), help_heading = "INSTRUMENTS")]
    pub(super) iq_source: Option<PathBuf>,

    #[clap(long, help = IQ_FORMAT_HELP.as_str(), help_heading = "INSTRUMENTS")]
    pub(super) iq_format: Option<String>,

    /// The device switch commands are written to, e.g. /dev/ttyACM0.
    #[clap(long, parse(from_os_str), help_heading = "INSTRUMENTS")]
    pub(super) switch_device: Option<PathBuf>,

    /// The device thermometry lines (e.g. "T1:27.8,T2:89.0") are read from.
    /// Defaults to the switch device.
    #[clap(long, parse(from_os_str), help_heading = "INSTRUMENTS")]
    pub(super) thermometer_device: Option<PathBuf>,

    #[clap(long, help = NUM_PROBES_HELP.as_str(), help_heading = "INSTRUMENTS")]
    pub(super) num_probes: Option<usize>,

    #[clap(long, help = SETTLE_TIME_HELP.as_str(), help_heading = "INSTRUMENTS")]
    pub(super) settle_time: Option<String>,

    #[clap(long, help = SIMULATED_ANTENNA_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) simulated_antenna_temperature: Option<f64>,

    #[clap(long, help = SIMULATED_LOAD_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) simulated_load_temperature: Option<f64>,

    #[clap(long, help = NOISE_DIODE_ENR_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) simulated_noise_diode_enr: Option<f64>,

    /// The command string written to the switch device for each state. Only
    /// settable in an arguments file; defaults to the receiver and VNA
    /// states of the RHINO switch controller.
    #[clap(skip)]
    pub(super) switch_commands: Option<IndexMap<String, String>>,
}

impl InstrumentArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            simulate: self.simulate || other.simulate,
            iq_source: self.iq_source.or(other.iq_source),
            iq_format: self.iq_format.or(other.iq_format),
            switch_device: self.switch_device.or(other.switch_device),
            thermometer_device: self.thermometer_device.or(other.thermometer_device),
            num_probes: self.num_probes.or(other.num_probes),
            settle_time: self.settle_time.or(other.settle_time),
            simulated_antenna_temperature: self
                .simulated_antenna_temperature
                .or(other.simulated_antenna_temperature),
            simulated_load_temperature: self
                .simulated_load_temperature
                .or(other.simulated_load_temperature),
            simulated_noise_diode_enr: self
                .simulated_noise_diode_enr
                .or(other.simulated_noise_diode_enr),
            switch_commands: self.switch_commands.or(other.switch_commands),
        }
    }

    pub(super) fn parse(self) -> Result<InstrumentParams, InstrumentArgsError> {
        let Self {
            simulate,
            iq_source,
            iq_format,
            switch_device,
            thermometer_device,
            num_probes,
            settle_time,
            simulated_antenna_temperature,
            simulated_load_temperature,
            simulated_noise_diode_enr,
            switch_commands,
        } = self;

        let settle_time = parse_duration_arg("settle time", settle_time.as_deref())?
            .unwrap_or_else(|| Duration::from_seconds(DEFAULT_SWITCH_SETTLE_TIME));
        let mut printer = InfoPrinter::new("Instruments".into());

        let params = if simulate {
            let ignored = [
                ("--iq-source", iq_source.is_some()),
                ("--iq-format", iq_format.is_some()),
                ("--switch-device", switch_device.is_some()),
                ("--thermometer-device", thermometer_device.is_some()),
                ("--num-probes", num_probes.is_some()),
                ("switch_commands", switch_commands.is_some()),
            ];
            for (arg, _) in ignored.into_iter().filter(|(_, given)| *given) {
                format!("{arg} is ignored when simulating").warn();
            }

            let sim = SimulationParams {
                antenna_temperature: simulated_antenna_temperature
                    .unwrap_or(DEFAULT_SIMULATED_ANTENNA_TEMPERATURE),
                load_temperature: simulated_load_temperature
                    .unwrap_or(DEFAULT_SIMULATED_LOAD_TEMPERATURE),
                noise_diode_enr_db: simulated_noise_diode_enr
                    .unwrap_or(DEFAULT_NOISE_DIODE_ENR_DB),
                settle_time,
            };
            if sim.load_temperature <= 0.0 {
                return Err(InstrumentArgsError::SimulatedLoadTemperature(
                    sim.load_temperature,
                ));
            }
            printer.push_block(vec![
                "Simulated receiver".into(),
                format!(
                    "Antenna {} K, load {} K, noise diode ENR {} dB",
                    sim.antenna_temperature, sim.load_temperature, sim.noise_diode_enr_db
                )
                .into(),
            ]);
            InstrumentParams::Simulated(sim)
        } else {
            if simulated_antenna_temperature.is_some()
                || simulated_load_temperature.is_some()
                || simulated_noise_diode_enr.is_some()
            {
                "Simulation arguments are ignored without --simulate".warn();
            }

            let iq_source = iq_source.ok_or(InstrumentArgsError::NoIqSource)?;
            let iq_format = match iq_format {
                Some(f) => IqFormat::from_str(&f)
                    .map_err(|_| InstrumentArgsError::BadIqFormat(f.clone()))?,
                None => IqFormat::Cf32,
            };
            let switch_device = switch_device.ok_or(InstrumentArgsError::NoSwitchDevice)?;
            let thermometer_device = thermometer_device.unwrap_or_else(|| switch_device.clone());
            let num_probes = num_probes.unwrap_or(DEFAULT_NUM_PROBES);
            if num_probes == 0 {
                return Err(InstrumentArgsError::NoProbes);
            }
            let switch_commands = switch_commands.unwrap_or_else(default_switch_commands);
            if switch_commands.is_empty() {
                return Err(InstrumentArgsError::NoSwitchCommands);
            }

            printer.push_block(vec![
                format!("I/Q source: {} ({iq_format})", iq_source.display()).into(),
                format!("Switch: {}", switch_device.display()).into(),
                format!(
                    "Thermometry: {} ({num_probes} probes)",
                    thermometer_device.display()
                )
                .into(),
            ]);
            InstrumentParams::Hardware(HardwareParams {
                iq_source,
                iq_format,
                switch_device,
                thermometer_device,
                num_probes,
                switch_commands,
                settle_time,
            })
        };
        debug!("Switch states: {:?}", params.switch_labels());
        printer.push_line(format!("Switch settle time: {settle_time}").into());
        printer.display();

        Ok(params)
    }
}

#[derive(Error, Debug)]
pub(crate) enum InstrumentArgsError {
    #[error("No I/Q source was given; either supply one or --simulate")]
    NoIqSource,

    #[error("'{0}' is not a supported I/Q format")]
    BadIqFormat(String),

    #[error("No switch device was given; either supply one or --simulate")]
    NoSwitchDevice,

    #[error("There must be at least one thermometry probe")]
    NoProbes,

    #[error("The switch command dictionary is empty")]
    NoSwitchCommands,

    #[error("The simulated load temperature must be positive, got {0} K")]
    SimulatedLoadTemperature(f64),

    #[error(transparent)]
    Unit(#[from] UnitArgError),
}

/// Check that the instruments know every requested switch state.
pub(super) fn check_states(
    states: &[String],
    instruments: &InstrumentParams,
) -> Result<(), UnknownStateError> {
    let known = instruments.switch_labels();
    match states.iter().find(|s| !known.contains(s)) {
        Some(label) => Err(UnknownStateError {
            label: label.clone(),
            known: known.join(", "),
        }),
        None => Ok(()),
    }
}

#[derive(Error, Debug)]
#[error("The switch has no state called '{label}'; known states are: {known}")]
pub(crate) struct UnknownStateError {
    label: String,
    known: String,
}
