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

use indexmap::IndexMap;

pub use self::display_from_str::PsbtParseError;
use crate::maps::{KeyData, ValueData};
use crate::origin::KeyOrigin;
use crate::sigtypes::{LegacyPk, LegacySig};
use crate::{
    LockTime, Outpoint, PropKey, RedeemScript, Sats, ScriptPubkey, SeqNo, SighashType, SigScript,
    Tx, TxOut, TxVer, UnsignedTx, UnsignedTxIn, Witness, WitnessScript, Xpub,
};

/// In-memory value of a partially signed transaction.
///
/// The structure is a decoded form of the v0 (BIP-174) binary serialization:
/// the global unsigned transaction is split into per-input and per-output
/// records which also carry the signing metadata collected so far. Unknown and
/// proprietary keys are preserved so that a decode-encode cycle is byte-exact
/// for canonically ordered sources.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
// Serde deserialize is not implemented and would require a manual
// implementation instead of derive, since inputs and outputs must be
// initialized with their indexes and cross-checked against the unknown fields.
pub struct Psbt {
    /// Transaction version.
    pub tx_version: TxVer,

    /// Transaction-level locktime.
    pub lock_time: LockTime,

    /// The corresponding key-value map for each input.
    pub(crate) inputs: Vec<Input>,

    /// The corresponding key-value map for each output.
    pub(crate) outputs: Vec<Output>,

    /// A global map from extended public keys to the used key fingerprint and
    /// derivation path as defined by BIP 32.
    pub xpubs: IndexMap<Xpub, KeyOrigin>,

    /// Proprietary keys.
    pub proprietary: IndexMap<PropKey, ValueData>,

    /// Unknown keys.
    pub unknown: IndexMap<u8, IndexMap<KeyData, ValueData>>,
}

impl Default for Psbt {
    fn default() -> Self { Psbt::create() }
}

impl Psbt {
    pub fn create() -> Psbt {
        Psbt {
            tx_version: TxVer::V2,
            lock_time: LockTime::ZERO,
            inputs: vec![],
            outputs: vec![],
            xpubs: empty!(),
            proprietary: empty!(),
            unknown: empty!(),
        }
    }

    pub fn from_unsigned_tx(unsigned_tx: UnsignedTx) -> Self {
        let mut psbt = Psbt::create();
        psbt.reset_from_unsigned_tx(unsigned_tx);
        psbt
    }

    pub(crate) fn reset_from_unsigned_tx(&mut self, unsigned_tx: UnsignedTx) {
        self.tx_version = unsigned_tx.version;
        self.lock_time = unsigned_tx.lock_time;
        self.inputs = unsigned_tx
            .inputs
            .into_iter()
            .enumerate()
            .map(|(index, txin)| Input::from_unsigned_txin(index, txin))
            .collect();
        self.outputs = unsigned_tx
            .outputs
            .into_iter()
            .enumerate()
            .map(|(index, txout)| Output::from_txout(index, txout))
            .collect();
    }

    pub fn to_unsigned_tx(&self) -> UnsignedTx {
        UnsignedTx {
            version: self.tx_version,
            inputs: self.inputs().map(Input::to_unsigned_txin).collect(),
            outputs: self.outputs().map(Output::to_txout).collect(),
            lock_time: self.lock_time,
        }
    }

    pub fn input(&self, index: usize) -> Option<&Input> { self.inputs.get(index) }

    pub fn inputs(&self) -> impl Iterator<Item = &Input> { self.inputs.iter() }

    pub(crate) fn inputs_mut(&mut self) -> impl Iterator<Item = &mut Input> {
        self.inputs.iter_mut()
    }

    pub fn output(&self, index: usize) -> Option<&Output> { self.outputs.get(index) }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> { self.outputs.iter() }

    pub(crate) fn outputs_mut(&mut self) -> impl Iterator<Item = &mut Output> {
        self.outputs.iter_mut()
    }

    pub fn xpubs(&self) -> impl Iterator<Item = (&Xpub, &KeyOrigin)> { self.xpubs.iter() }

    /// Sum of the input values, if each input has its previous output data
    /// attached.
    pub fn input_sum(&self) -> Option<Sats> {
        self.inputs().map(Input::value).try_fold(Sats::ZERO, |sum, value| {
            value.map(|value| sum.saturating_add(value))
        })
    }

    #[inline]
    pub fn output_sum(&self) -> Sats { self.outputs().map(Output::value).sum() }

    /// Transaction fee; `None` if some inputs miss previous output data or if
    /// outputs spend more than inputs provide.
    pub fn fee(&self) -> Option<Sats> { self.input_sum()?.checked_sub(self.output_sum()) }

    /// Detects whether all inputs have reached the finalized state.
    pub fn is_finalized(&self) -> bool { self.inputs().all(Input::is_finalized) }
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub struct Input {
    /// The index of this input. Used in error reporting.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) index: usize,

    /// Previous transaction outpoint to spend.
    pub previous_outpoint: Outpoint,

    /// Sequence number of this input, as stored in the unsigned transaction.
    pub sequence_number: SeqNo,

    /// The non-witness transaction this input spends from. Should only be
    /// `Some` for inputs which spend non-segwit outputs or if it is unknown
    /// whether an input spends a segwit output.
    pub non_witness_tx: Option<Tx>,

    /// The transaction output this input spends from. Should only be `Some`
    /// for inputs which spend segwit outputs, including P2SH embedded ones.
    pub witness_utxo: Option<TxOut>,

    /// A map from public keys to their corresponding signature as would be
    /// pushed to the stack from a scriptSig or witness.
    pub partial_sigs: IndexMap<LegacyPk, LegacySig>,

    /// The sighash type to be used for this input. Signatures for this input
    /// must use the sighash type.
    pub sighash_type: Option<SighashType>,

    /// The redeem script for this input.
    pub redeem_script: Option<RedeemScript>,

    /// The witness script for this input.
    pub witness_script: Option<WitnessScript>,

    /// A map from public keys needed to sign this input to their corresponding
    /// master key fingerprints and derivation paths.
    pub bip32_derivation: IndexMap<LegacyPk, KeyOrigin>,

    /// The finalized, fully-constructed scriptSig with signatures and any
    /// other scripts necessary for this input to pass validation.
    pub final_script_sig: Option<SigScript>,

    /// The finalized, fully-constructed scriptWitness with signatures and any
    /// other scripts necessary for this input to pass validation.
    pub final_witness: Option<Witness>,

    /// Proprietary keys.
    pub proprietary: IndexMap<PropKey, ValueData>,

    /// Unknown keys.
    pub unknown: IndexMap<u8, IndexMap<KeyData, ValueData>>,
}

impl Input {
    pub(crate) fn from_unsigned_txin(index: usize, txin: UnsignedTxIn) -> Input {
        Input {
            index,
            previous_outpoint: txin.prev_output,
            sequence_number: txin.sequence,
            non_witness_tx: None,
            witness_utxo: None,
            partial_sigs: empty!(),
            sighash_type: None,
            redeem_script: None,
            witness_script: None,
            bip32_derivation: empty!(),
            final_script_sig: None,
            final_witness: None,
            proprietary: empty!(),
            unknown: empty!(),
        }
    }

    pub(crate) fn to_unsigned_txin(&self) -> UnsignedTxIn {
        UnsignedTxIn {
            prev_output: self.previous_outpoint,
            sequence: self.sequence_number,
        }
    }

    #[inline]
    pub fn index(&self) -> usize { self.index }

    /// The output this input spends, if its data are attached to the input
    /// either as a witness UTXO or inside a non-witness transaction.
    pub fn prev_txout(&self) -> Option<&TxOut> {
        if let Some(txout) = &self.witness_utxo {
            return Some(txout);
        }
        self.non_witness_tx
            .as_ref()?
            .outputs
            .get(self.previous_outpoint.vout.into_usize())
    }

    pub fn value(&self) -> Option<Sats> { self.prev_txout().map(|txout| txout.value) }

    pub fn is_finalized(&self) -> bool {
        self.final_script_sig.is_some() || self.final_witness.is_some()
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub struct Output {
    /// The index of this output. Used in error reporting.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) index: usize,

    /// The output value, as stored in the unsigned transaction.
    pub amount: Sats,

    /// The output destination script, as stored in the unsigned transaction.
    pub script: ScriptPubkey,

    /// The redeem script for this output.
    pub redeem_script: Option<RedeemScript>,

    /// The witness script for this output.
    pub witness_script: Option<WitnessScript>,

    /// A map from public keys to their corresponding master key fingerprints
    /// and derivation paths.
    pub bip32_derivation: IndexMap<LegacyPk, KeyOrigin>,

    /// Proprietary keys.
    pub proprietary: IndexMap<PropKey, ValueData>,

    /// Unknown keys.
    pub unknown: IndexMap<u8, IndexMap<KeyData, ValueData>>,
}

impl Output {
    pub(crate) fn from_txout(index: usize, txout: TxOut) -> Output {
        Output {
            index,
            amount: txout.value,
            script: txout.script_pubkey,
            redeem_script: None,
            witness_script: None,
            bip32_derivation: empty!(),
            proprietary: empty!(),
            unknown: empty!(),
        }
    }

    pub(crate) fn to_txout(&self) -> TxOut {
        TxOut {
            value: self.amount,
            script_pubkey: self.script.clone(),
        }
    }

    #[inline]
    pub fn index(&self) -> usize { self.index }

    #[inline]
    pub fn value(&self) -> Sats { self.amount }
}

mod display_from_str {
    use std::fmt::{self, Display, Formatter, LowerHex};
    use std::str::FromStr;

    use amplify::hex::{self, FromHex, ToHex};
    use base64::display::Base64Display;
    use base64::prelude::BASE64_STANDARD;
    use base64::Engine;

    use super::*;
    use crate::PsbtError;

    #[derive(Clone, Debug, Display, Error, From)]
    #[display(inner)]
    pub enum PsbtParseError {
        #[from]
        Hex(hex::Error),

        #[from]
        Base64(base64::DecodeError),

        #[from]
        Psbt(PsbtError),
    }

    impl Psbt {
        pub fn from_base64(s: &str) -> Result<Psbt, PsbtParseError> {
            Psbt::deserialize(BASE64_STANDARD.decode(s)?).map_err(PsbtParseError::from)
        }

        pub fn from_base16(s: &str) -> Result<Psbt, PsbtParseError> {
            let data = Vec::<u8>::from_hex(s)?;
            Psbt::deserialize(data).map_err(PsbtParseError::from)
        }

        pub fn to_base64(&self) -> String { BASE64_STANDARD.encode(self.serialize()) }

        pub fn to_base16(&self) -> String { self.serialize().to_hex() }
    }

    /// FromStr implementation parses both Base64 and Hex (Base16) encodings.
    impl FromStr for Psbt {
        type Err = PsbtParseError;

        #[inline]
        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Self::from_base16(s).or_else(|_| Self::from_base64(s))
        }
    }

    /// PSBT is displayed as a Base64-encoded string, matching the interchange
    /// form used by file and NFC-tag payloads.
    impl Display for Psbt {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "{}", Base64Display::new(&self.serialize(), &BASE64_STANDARD))
        }
    }

    /// Lowercase hex form of the exact serialized bytes; the payload format
    /// consumed by QR display surfaces.
    impl LowerHex for Psbt {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.to_base16()) }
    }
}
