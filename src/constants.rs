// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision.
 */

/// The value a thermometry probe reports when a read failed. It is below
/// absolute zero on the Celsius scale the probes report in, so it can never be
/// mistaken for a real reading.
pub const THERMOMETRY_SENTINEL: f64 = -273.0;

/// Add this to a Celsius temperature to get Kelvin.
pub const CELSIUS_TO_KELVIN: f64 = 273.15;

/// The default number of thermometry probes on the switch controller.
pub const DEFAULT_NUM_PROBES: usize = 2;

/// The default time between thermometry reads \[seconds\].
pub const DEFAULT_THERMOMETRY_CADENCE: f64 = 1.0;

/// The default time given to relays to settle after a switch command
/// \[seconds\].
pub const DEFAULT_SWITCH_SETTLE_TIME: f64 = 0.5;

/// The default guard buffer excluded either side of a switch transition
/// \[seconds\].
pub const DEFAULT_GUARD_BUFFER: f64 = 1.0;

/// The default excess noise ratio of the noise diode \[dB\].
pub const DEFAULT_NOISE_DIODE_ENR_DB: f64 = 9.6;

/// The default number of spectrometer channels.
pub const DEFAULT_NUM_CHANNELS: usize = 2048;

/// The default number of polyphase filter bank taps.
pub const DEFAULT_NUM_TAPS: usize = 4;

/// The default receiver centre frequency \[Hz\].
pub const DEFAULT_CENTRE_FREQUENCY: f64 = 70e6;

/// The default receiver sample rate (and bandwidth) \[Hz\].
pub const DEFAULT_SAMPLE_RATE: f64 = 8e6;

/// The default integration time of a single averaged spectrum \[seconds\].
pub const DEFAULT_INTEGRATION_TIME: f64 = 1.0;

/// The switch label of the sky (antenna) input to the receiver.
pub const DEFAULT_SOURCE_LABEL: &str = "receiver_ant";

/// The switch label of the ambient reference load input to the receiver.
pub const DEFAULT_LOAD_LABEL: &str = "receiver_load";

/// The switch label of the noise-diode input to the receiver.
pub const DEFAULT_NOISE_DIODE_LABEL: &str = "receiver_ns";

/// The default time spent in each switch state \[seconds\].
pub const DEFAULT_DWELL_TIME: f64 = 20.0;

/// The default number of VNA sweeps averaged per measurement.
pub const DEFAULT_VNA_NUM_SWEEPS: usize = 20;

/// The number of points in a VNA sweep.
pub const VNA_NUM_POINTS: usize = 101;

/// VNA sweeps extend this far beyond the spectrometer band on either side
/// \[Hz\].
pub const VNA_BAND_PADDING: f64 = 1e6;

/// The sky temperature seen by a simulated antenna \[K\].
pub const DEFAULT_SIMULATED_ANTENNA_TEMPERATURE: f64 = 3000.0;

/// The physical temperature of a simulated reference load \[K\].
pub const DEFAULT_SIMULATED_LOAD_TEMPERATURE: f64 = 300.0;
