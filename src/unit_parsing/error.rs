// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum UnitParseError {
    #[error(
        "Successfully parsed a time unit, but could not parse the numerical component of '{0}'"
    )]
    GotTimeUnitButCantParse(String),

    #[error(
        "Successfully parsed a frequency unit, but could not parse the numerical component of '{0}'"
    )]
    GotFreqUnitButCantParse(String),

    #[error("Could not parse '{input}' as a {unit_type}")]
    Unknown {
        input: String,
        unit_type: &'static str,
    },

    #[error("'{0}' must be a finite, positive quantity")]
    NotPositive(String),
}
