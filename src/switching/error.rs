// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::instruments::InstrumentError;

#[derive(Error, Debug)]
pub enum SwitchingError {
    #[error("A switch schedule needs at least one state")]
    NoStates,

    #[error("The dwell time of switch state '{label}' must be positive")]
    NonPositiveDwell { label: String },

    #[error("The thermometry cadence must be positive")]
    NonPositiveCadence,

    #[error("The switch network doesn't know the state '{label}'")]
    UnknownState { label: String },

    #[error("Couldn't set the switch to '{label}': {source}")]
    SetState {
        label: String,
        source: InstrumentError,
    },
}
