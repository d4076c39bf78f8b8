// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A radio that replays interleaved I/Q samples from a file or pipe, as
//! written by common SDR capture tools (`rtl_sdr` writes `cu8`, SoapySDR and
//! GNU Radio file sinks write `cf32`).

use std::io::{ErrorKind, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::{InstrumentError, Radio};
use crate::data::SampleBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum IqFormat {
    /// Little-endian 32-bit floats.
    Cf32,

    /// Unsigned bytes centred on 127.5.
    Cu8,
}

impl IqFormat {
    fn bytes_per_sample(self) -> usize {
        match self {
            IqFormat::Cf32 => 8,
            IqFormat::Cu8 => 2,
        }
    }
}

pub struct RawIqRadio<R> {
    reader: R,
    format: IqFormat,
    bytes: Vec<u8>,
    floats: Vec<f32>,
}

impl<R: Read + Send> RawIqRadio<R> {
    pub fn new(reader: R, format: IqFormat) -> Self {
        RawIqRadio {
            reader,
            format,
            bytes: vec![],
            floats: vec![],
        }
    }
}

impl<R: Read + Send> Radio for RawIqRadio<R> {
    fn read_block(&mut self, len: usize) -> Result<SampleBlock, InstrumentError> {
        self.bytes.resize(len * self.format.bytes_per_sample(), 0);
        match self.reader.read_exact(&mut self.bytes) {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(InstrumentError::EndOfStream)
            }
            Err(e) => return Err(e.into()),
        }

        let block = match self.format {
            IqFormat::Cf32 => {
                self.floats.resize(len * 2, 0.0);
                self.bytes
                    .as_slice()
                    .read_f32_into::<LittleEndian>(&mut self.floats)?;
                self.floats
                    .chunks_exact(2)
                    .map(|iq| Complex32::new(iq[0], iq[1]))
                    .collect()
            }
            IqFormat::Cu8 => self
                .bytes
                .chunks_exact(2)
                .map(|iq| {
                    Complex32::new(
                        (iq[0] as f32 - 127.5) / 127.5,
                        (iq[1] as f32 - 127.5) / 127.5,
                    )
                })
                .collect(),
        };
        Ok(block)
    }
}
