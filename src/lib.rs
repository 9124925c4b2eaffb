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

//! Moving PSBTs between co-signers over narrow channels: hex payloads for QR
//! display, base64 payloads for file and NFC-tag export, and classification of
//! raw scanned text coming back from a co-signer.

#[macro_use]
extern crate amplify;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

mod consensus;
mod origin;
mod sigtypes;
mod keys;
mod maps;
mod data;
mod coders;
mod transport;
mod export;
#[cfg(feature = "serde")]
mod serde_utils;

pub use coders::{Decode, DecodeError, Encode, PsbtError, RawBytes};
pub use consensus::{
    ByteStr, ConsensusDataError, LockTime, Outpoint, RedeemScript, Sats, ScriptBytes, ScriptPubkey,
    SeqNo, SigScript, Tx, TxIn, TxOut, TxVer, Txid, UnsignedTx, UnsignedTxIn, VarInt, Vout,
    Witness, WitnessScript,
};
pub use data::{Input, Output, Psbt, PsbtParseError};
pub use export::{
    export_to_file, export_to_tag, psbt_file_name, FileSink, NfcExportError, NfcTagWriter,
    PSBT_FILE_EXTENSION,
};
pub use keys::{GlobalKey, InputKey, KeyPair, KeyType, KeyValue, OutputKey, PropKey};
pub use maps::{KeyData, KeyMap, Map, MapName, ValueData};
pub use origin::{DerivationIndex, Fingerprint, KeyOrigin, Xpub, XpubDecodeError};
pub use sigtypes::{LegacyPk, LegacySig, NonStandardSighashType, SighashFlag, SighashType};
pub use transport::{forward_cosigner_payload, ScannedFormat, TransportError};
