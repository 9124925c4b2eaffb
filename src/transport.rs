// PSBT transport codec for air-gapped bitcoin multisig coordination.
//
// SPDX-License-Identifier: Apache-2.0
//
// Written in 2020-2024 by
//     Dr Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// Copyright (C) 2020-2024 LNP/BP Standards Association. All rights reserved.
// Copyright (C) 2020-2024 Dr Maxim Orlovsky. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Classification of raw scanned text and its decoding into a PSBT value.
//!
//! Scan sources (camera QR reader, or a file picker standing in for one on
//! desktop) hand over arbitrary text. Before attempting base64 PSBT decoding
//! the text is classified, in this exact order:
//!
//! 1. a case-insensitive `UR` prefix marks a BC-UR fountain-encoded payload,
//!    which is a separate multi-part encoding this codec does not speak;
//! 2. text containing neither `+` nor `=` is taken for raw transaction hex,
//!    which has no place in a co-signing flow;
//! 3. everything else is attempted as base64-encoded PSBT binary data.
//!
//! The UR check must run first: a UR payload contains no `+` or `=` either and
//! would otherwise be misreported as raw hex.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;

use crate::{Psbt, PsbtError};

/// Transport-level failures surfaced to the user; all of them are terminal
/// for the given input and none is retried.
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum TransportError {
    /// BC-UR encoded payloads are not supported by this transport.
    UnsupportedEncoding,

    /// scanned text looks like raw transaction hex and not like a PSBT.
    WrongFormat,

    /// invalid base64 encoding - {0}
    #[from]
    NotBase64(base64::DecodeError),

    /// invalid PSBT data - {0}
    #[from]
    MalformedPsbt(PsbtError),
}

/// Format of a scanned text payload, as determined by the classification
/// heuristic; the real decoding work happens only for [`ScannedFormat::Base64`]
/// inputs.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[display(lowercase)]
pub enum ScannedFormat {
    /// BC-UR fountain-encoded payload (`UR:` prefixed).
    Ur,

    /// Heuristically detected raw transaction hex.
    Hex,

    /// Base64 text, presumed to carry serialized PSBT data.
    Base64,
}

impl ScannedFormat {
    /// Classifies raw scanned text.
    ///
    /// Known limitation: base64 text happens to contain neither `+` nor `=`
    /// for certain payload lengths and byte patterns, and such PSBTs are
    /// misdetected as raw hex. The behavior is kept for compatibility with
    /// existing co-signing flows; senders normalize by always producing
    /// padded base64.
    pub fn recognize(text: &str) -> ScannedFormat {
        let bytes = text.as_bytes();
        if bytes.len() >= 2 && bytes[..2].eq_ignore_ascii_case(b"ur") {
            return ScannedFormat::Ur;
        }
        if !text.contains('+') && !text.contains('=') {
            return ScannedFormat::Hex;
        }
        ScannedFormat::Base64
    }
}

impl Psbt {
    /// Decodes text scanned from a co-signer into a PSBT value, applying the
    /// [`ScannedFormat::recognize`] classification first.
    pub fn from_scanned(text: &str) -> Result<Psbt, TransportError> {
        match ScannedFormat::recognize(text) {
            ScannedFormat::Ur => Err(TransportError::UnsupportedEncoding),
            ScannedFormat::Hex => Err(TransportError::WrongFormat),
            ScannedFormat::Base64 => {
                let data = BASE64_STANDARD.decode(text)?;
                Psbt::deserialize(data).map_err(TransportError::from)
            }
        }
    }
}

/// Validates a scanned co-signer response and returns the original base64
/// text for forwarding to the downstream signature-merging handler.
///
/// Downstream consumers expect the textual form, not the parsed value, so the
/// input is passed through verbatim once it is known to decode.
pub fn forward_cosigner_payload(text: &str) -> Result<String, TransportError> {
    Psbt::from_scanned(text)?;
    Ok(text.to_owned())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ur_prefix_wins_over_hex_heuristic() {
        // no `+` or `=` present, still must be detected as UR
        assert_eq!(ScannedFormat::recognize("UR:CRYPTO-PSBT/TYQ"), ScannedFormat::Ur);
        assert_eq!(ScannedFormat::recognize("ur:crypto-psbt/tyq"), ScannedFormat::Ur);
        assert_eq!(ScannedFormat::recognize("uRabcdef"), ScannedFormat::Ur);
    }

    #[test]
    fn bare_hex_detected() {
        assert_eq!(ScannedFormat::recognize("deadbeef0102"), ScannedFormat::Hex);
        assert_eq!(ScannedFormat::recognize("0200000001AB"), ScannedFormat::Hex);
        // anything without base64-specific characters lands here as well
        assert_eq!(ScannedFormat::recognize("not hex at all"), ScannedFormat::Hex);
    }

    #[test]
    fn base64_detected() {
        assert_eq!(ScannedFormat::recognize("cHNidP8BAHU="), ScannedFormat::Base64);
        assert_eq!(ScannedFormat::recognize("aa+bb"), ScannedFormat::Base64);
    }

    #[test]
    fn empty_text_is_not_ur() {
        assert_eq!(ScannedFormat::recognize(""), ScannedFormat::Hex);
        assert_eq!(ScannedFormat::recognize("u"), ScannedFormat::Hex);
    }
}
