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

//! Export seams towards platform collaborators: the file write-and-share
//! dialog and the NFC tag writer. Both consume the base64 interchange form;
//! sink failures are reported to the caller and never affect the in-memory
//! PSBT value.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};

use crate::Psbt;

pub const PSBT_FILE_EXTENSION: &str = "psbt";

/// Generates the export file name from a timestamp, `<epoch-millis>.psbt`.
pub fn psbt_file_name(at: DateTime<Utc>) -> String {
    format!("{}.{PSBT_FILE_EXTENSION}", at.timestamp_millis())
}

/// File write-and-share dialog provided by the platform layer.
pub trait FileSink {
    type Error: StdError;

    fn write_and_share(&mut self, file_name: &str, contents: &str) -> Result<(), Self::Error>;
}

/// NFC hardware access provided by the platform layer. Availability must be
/// probed before a write is attempted; platforms answer the probe from a
/// cached readiness signal.
pub trait NfcTagWriter {
    type Error: StdError;

    fn is_supported_and_enabled(&self) -> bool;

    fn write_ndef(&mut self, payload: &str) -> Result<(), Self::Error>;
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NfcExportError<E: StdError> {
    /// NFC hardware is absent or disabled.
    Unavailable,

    /// Writing the NDEF message to the tag failed.
    Write(E),
}

impl<E: StdError> Display for NfcExportError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NfcExportError::Unavailable => f.write_str("NFC hardware is absent or disabled"),
            NfcExportError::Write(e) => write!(f, "writing NDEF message failed - {e}"),
        }
    }
}

impl<E: StdError + 'static> StdError for NfcExportError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            NfcExportError::Unavailable => None,
            NfcExportError::Write(e) => Some(e),
        }
    }
}

/// Writes the base64 form of the PSBT into a timestamp-named file through the
/// platform sink, returning the generated file name.
pub fn export_to_file<S: FileSink>(
    sink: &mut S,
    psbt: &Psbt,
    at: DateTime<Utc>,
) -> Result<String, S::Error> {
    let file_name = psbt_file_name(at);
    sink.write_and_share(&file_name, &psbt.to_base64())?;
    Ok(file_name)
}

/// Writes the base64 form of the PSBT to a physical NFC tag, probing hardware
/// availability first.
pub fn export_to_tag<W: NfcTagWriter>(
    writer: &mut W,
    psbt: &Psbt,
) -> Result<(), NfcExportError<W::Error>> {
    if !writer.is_supported_and_enabled() {
        return Err(NfcExportError::Unavailable);
    }
    writer.write_ndef(&psbt.to_base64()).map_err(NfcExportError::Write)
}

#[cfg(test)]
mod test {
    use std::convert::Infallible;

    use chrono::TimeZone;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        files: Vec<(String, String)>,
    }

    impl FileSink for RecordingSink {
        type Error = Infallible;

        fn write_and_share(&mut self, file_name: &str, contents: &str) -> Result<(), Infallible> {
            self.files.push((file_name.to_owned(), contents.to_owned()));
            Ok(())
        }
    }

    struct RecordingTag {
        enabled: bool,
        payloads: Vec<String>,
    }

    impl NfcTagWriter for RecordingTag {
        type Error = Infallible;

        fn is_supported_and_enabled(&self) -> bool { self.enabled }

        fn write_ndef(&mut self, payload: &str) -> Result<(), Infallible> {
            self.payloads.push(payload.to_owned());
            Ok(())
        }
    }

    #[test]
    fn file_name_from_epoch_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(psbt_file_name(at), "1700000000123.psbt");
    }

    #[test]
    fn file_export_writes_base64() {
        let psbt = Psbt::create();
        let mut sink = RecordingSink::default();
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let file_name = export_to_file(&mut sink, &psbt, at).unwrap();

        assert_eq!(file_name, "1700000000000.psbt");
        assert_eq!(sink.files, vec![(file_name, psbt.to_base64())]);
    }

    #[test]
    fn tag_export_requires_availability() {
        let psbt = Psbt::create();
        let mut tag = RecordingTag {
            enabled: false,
            payloads: vec![],
        };

        assert_eq!(export_to_tag(&mut tag, &psbt), Err(NfcExportError::Unavailable));
        assert!(tag.payloads.is_empty());

        tag.enabled = true;
        export_to_tag(&mut tag, &psbt).unwrap();
        assert_eq!(tag.payloads, vec![psbt.to_base64()]);
    }
}
