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

use std::fmt::Debug;
use std::hash::Hash;
use std::io::Sink;

use crate::maps::{KeyData, ValueData};
use crate::{Decode, Encode, VarInt};

/// Key types of a single PSBT map section. Unknown key types must be
/// preserved, not rejected, so every implementation carries an `Unknown`
/// variant.
pub trait KeyType: Copy + Ord + Eq + Hash + Debug + Encode + Decode + 'static {
    const STANDARD: &'static [Self];
    fn unknown(val: u8) -> Self;
    fn from_u8(val: u8) -> Self;
    fn into_u8(self) -> u8;
    fn to_u8(&self) -> u8 { self.into_u8() }
    fn has_key_data(self) -> bool;
    fn is_required(self) -> bool;
    fn is_proprietary(self) -> bool;
}

const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;
const PSBT_GLOBAL_XPUB: u8 = 0x01;
const PSBT_GLOBAL_VERSION: u8 = 0xFB;
const PSBT_GLOBAL_PROPRIETARY: u8 = 0xFC;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[non_exhaustive]
pub enum GlobalKey {
    /// `PSBT_GLOBAL_UNSIGNED_TX`
    UnsignedTx,

    /// `PSBT_GLOBAL_XPUB`
    Xpub,

    /// `PSBT_GLOBAL_VERSION`
    Version,

    /// `PSBT_GLOBAL_PROPRIETARY`
    Proprietary,

    /// All unknown keys
    Unknown(u8),
}

impl KeyType for GlobalKey {
    const STANDARD: &'static [Self] = &[Self::UnsignedTx, Self::Xpub, Self::Version];

    fn unknown(val: u8) -> Self { Self::Unknown(val) }

    fn from_u8(val: u8) -> Self {
        match val {
            x if x == Self::UnsignedTx.into_u8() => Self::UnsignedTx,
            x if x == Self::Xpub.into_u8() => Self::Xpub,
            x if x == Self::Version.into_u8() => Self::Version,
            x if x == Self::Proprietary.into_u8() => Self::Proprietary,
            unknown => Self::Unknown(unknown),
        }
    }

    fn into_u8(self) -> u8 {
        match self {
            GlobalKey::UnsignedTx => PSBT_GLOBAL_UNSIGNED_TX,
            GlobalKey::Xpub => PSBT_GLOBAL_XPUB,
            GlobalKey::Version => PSBT_GLOBAL_VERSION,
            GlobalKey::Proprietary => PSBT_GLOBAL_PROPRIETARY,
            GlobalKey::Unknown(key_type) => key_type,
        }
    }

    fn has_key_data(self) -> bool {
        match self {
            GlobalKey::UnsignedTx => false,
            GlobalKey::Xpub => true,
            GlobalKey::Version => false,
            GlobalKey::Proprietary => true,
            GlobalKey::Unknown(_) => true,
        }
    }

    fn is_required(self) -> bool {
        match self {
            GlobalKey::UnsignedTx => true,
            GlobalKey::Xpub => false,
            GlobalKey::Version => false,
            GlobalKey::Proprietary => false,
            GlobalKey::Unknown(_) => false,
        }
    }

    fn is_proprietary(self) -> bool { self == Self::Proprietary }
}

const PSBT_IN_NON_WITNESS_UTXO: u8 = 0x00;
const PSBT_IN_WITNESS_UTXO: u8 = 0x01;
const PSBT_IN_PARTIAL_SIG: u8 = 0x02;
const PSBT_IN_SIGHASH_TYPE: u8 = 0x03;
const PSBT_IN_REDEEM_SCRIPT: u8 = 0x04;
const PSBT_IN_WITNESS_SCRIPT: u8 = 0x05;
const PSBT_IN_BIP32_DERIVATION: u8 = 0x06;
const PSBT_IN_FINAL_SCRIPTSIG: u8 = 0x07;
const PSBT_IN_FINAL_SCRIPTWITNESS: u8 = 0x08;
const PSBT_IN_PROPRIETARY: u8 = 0xFC;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[non_exhaustive]
pub enum InputKey {
    /// `PSBT_IN_NON_WITNESS_UTXO`
    NonWitnessUtxo,

    /// `PSBT_IN_WITNESS_UTXO`
    WitnessUtxo,

    /// `PSBT_IN_PARTIAL_SIG`
    PartialSig,

    /// `PSBT_IN_SIGHASH_TYPE`
    SighashType,

    /// `PSBT_IN_REDEEM_SCRIPT`
    RedeemScript,

    /// `PSBT_IN_WITNESS_SCRIPT`
    WitnessScript,

    /// `PSBT_IN_BIP32_DERIVATION`
    Bip32Derivation,

    /// `PSBT_IN_FINAL_SCRIPTSIG`
    FinalScriptSig,

    /// `PSBT_IN_FINAL_SCRIPTWITNESS`
    FinalWitness,

    /// `PSBT_IN_PROPRIETARY`
    Proprietary,

    /// All unknown keys
    Unknown(u8),
}

impl KeyType for InputKey {
    const STANDARD: &'static [Self] = &[
        Self::NonWitnessUtxo,
        Self::WitnessUtxo,
        Self::PartialSig,
        Self::SighashType,
        Self::RedeemScript,
        Self::WitnessScript,
        Self::Bip32Derivation,
        Self::FinalScriptSig,
        Self::FinalWitness,
    ];

    fn unknown(val: u8) -> Self { Self::Unknown(val) }

    fn from_u8(val: u8) -> Self {
        match val {
            x if x == Self::NonWitnessUtxo.into_u8() => Self::NonWitnessUtxo,
            x if x == Self::WitnessUtxo.into_u8() => Self::WitnessUtxo,
            x if x == Self::PartialSig.into_u8() => Self::PartialSig,
            x if x == Self::SighashType.into_u8() => Self::SighashType,
            x if x == Self::RedeemScript.into_u8() => Self::RedeemScript,
            x if x == Self::WitnessScript.into_u8() => Self::WitnessScript,
            x if x == Self::Bip32Derivation.into_u8() => Self::Bip32Derivation,
            x if x == Self::FinalScriptSig.into_u8() => Self::FinalScriptSig,
            x if x == Self::FinalWitness.into_u8() => Self::FinalWitness,
            x if x == Self::Proprietary.into_u8() => Self::Proprietary,
            unknown => Self::Unknown(unknown),
        }
    }

    fn into_u8(self) -> u8 {
        match self {
            InputKey::NonWitnessUtxo => PSBT_IN_NON_WITNESS_UTXO,
            InputKey::WitnessUtxo => PSBT_IN_WITNESS_UTXO,
            InputKey::PartialSig => PSBT_IN_PARTIAL_SIG,
            InputKey::SighashType => PSBT_IN_SIGHASH_TYPE,
            InputKey::RedeemScript => PSBT_IN_REDEEM_SCRIPT,
            InputKey::WitnessScript => PSBT_IN_WITNESS_SCRIPT,
            InputKey::Bip32Derivation => PSBT_IN_BIP32_DERIVATION,
            InputKey::FinalScriptSig => PSBT_IN_FINAL_SCRIPTSIG,
            InputKey::FinalWitness => PSBT_IN_FINAL_SCRIPTWITNESS,
            InputKey::Proprietary => PSBT_IN_PROPRIETARY,
            InputKey::Unknown(key_type) => key_type,
        }
    }

    fn has_key_data(self) -> bool {
        match self {
            InputKey::NonWitnessUtxo => false,
            InputKey::WitnessUtxo => false,
            InputKey::PartialSig => true,
            InputKey::SighashType => false,
            InputKey::RedeemScript => false,
            InputKey::WitnessScript => false,
            InputKey::Bip32Derivation => true,
            InputKey::FinalScriptSig => false,
            InputKey::FinalWitness => false,
            InputKey::Proprietary => true,
            InputKey::Unknown(_) => true,
        }
    }

    fn is_required(self) -> bool { false }

    fn is_proprietary(self) -> bool { self == Self::Proprietary }
}

const PSBT_OUT_REDEEM_SCRIPT: u8 = 0x00;
const PSBT_OUT_WITNESS_SCRIPT: u8 = 0x01;
const PSBT_OUT_BIP32_DERIVATION: u8 = 0x02;
const PSBT_OUT_PROPRIETARY: u8 = 0xFC;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[non_exhaustive]
pub enum OutputKey {
    /// `PSBT_OUT_REDEEM_SCRIPT`
    RedeemScript,

    /// `PSBT_OUT_WITNESS_SCRIPT`
    WitnessScript,

    /// `PSBT_OUT_BIP32_DERIVATION`
    Bip32Derivation,

    /// `PSBT_OUT_PROPRIETARY`
    Proprietary,

    /// All unknown keys
    Unknown(u8),
}

impl KeyType for OutputKey {
    const STANDARD: &'static [Self] =
        &[Self::RedeemScript, Self::WitnessScript, Self::Bip32Derivation];

    fn unknown(val: u8) -> Self { Self::Unknown(val) }

    fn from_u8(val: u8) -> Self {
        match val {
            x if x == Self::RedeemScript.into_u8() => Self::RedeemScript,
            x if x == Self::WitnessScript.into_u8() => Self::WitnessScript,
            x if x == Self::Bip32Derivation.into_u8() => Self::Bip32Derivation,
            x if x == Self::Proprietary.into_u8() => Self::Proprietary,
            unknown => Self::Unknown(unknown),
        }
    }

    fn into_u8(self) -> u8 {
        match self {
            OutputKey::RedeemScript => PSBT_OUT_REDEEM_SCRIPT,
            OutputKey::WitnessScript => PSBT_OUT_WITNESS_SCRIPT,
            OutputKey::Bip32Derivation => PSBT_OUT_BIP32_DERIVATION,
            OutputKey::Proprietary => PSBT_OUT_PROPRIETARY,
            OutputKey::Unknown(key_type) => key_type,
        }
    }

    fn has_key_data(self) -> bool {
        match self {
            OutputKey::RedeemScript | OutputKey::WitnessScript => false,
            OutputKey::Bip32Derivation => true,
            OutputKey::Proprietary => true,
            OutputKey::Unknown(_) => true,
        }
    }

    fn is_required(self) -> bool { false }

    fn is_proprietary(self) -> bool { self == Self::Proprietary }
}

pub enum KeyValue<T: KeyType> {
    Pair(KeyPair<T, KeyData, ValueData>),
    Separator,
}

pub struct KeyPair<T: KeyType, K, V> {
    pub key_type: T,
    pub key_data: K,
    pub value_data: V,
}

impl<T: KeyType, K, V> KeyPair<T, K, V> {
    pub fn new(key_type: T, key_data: K, value_data: V) -> Self {
        Self {
            key_type,
            key_data,
            value_data,
        }
    }

    pub fn key_len(&self) -> VarInt
    where K: Encode {
        let mut sink = Sink::default();
        let count = self.key_data.encode(&mut sink).expect("sink write doesn't fail");
        VarInt::with(count + 1 /* key type byte */)
    }

    pub fn value_len(&self) -> VarInt
    where V: Encode {
        let mut sink = Sink::default();
        let len = self.value_data.encode(&mut sink).expect("sink write doesn't fail");
        VarInt::with(len)
    }
}

impl<'a, T: KeyType> KeyPair<T, Box<dyn Encode + 'a>, Box<dyn Encode + 'a>> {
    pub fn boxed(key_type: T, key_data: impl Encode + 'a, value_data: impl Encode + 'a) -> Self {
        KeyPair {
            key_type,
            key_data: Box::new(key_data),
            value_data: Box::new(value_data),
        }
    }
}

#[derive(Clone, PartialOrd, Ord, Eq, PartialEq, Hash, Debug, Display)]
#[display("{identifier} {subtype:#x}")]
pub struct PropKey {
    pub identifier: String,
    pub subtype: u64,
    pub data: Vec<u8>,
}
