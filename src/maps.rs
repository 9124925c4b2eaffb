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

use std::collections::BTreeMap;
use std::io::{Read, Write};

use amplify::IoError;
use indexmap::IndexMap;

use crate::coders::RawBytes;
use crate::consensus::ByteStr;
use crate::keys::KeyValue;
use crate::origin::KeyOrigin;
use crate::sigtypes::{LegacyPk, LegacySig};
use crate::{
    Decode, DecodeError, Encode, GlobalKey, Input, InputKey, KeyPair, KeyType, Output, OutputKey,
    PropKey, Psbt, PsbtError, RedeemScript, SighashType, SigScript, Tx, TxOut, UnsignedTx, Witness,
    WitnessScript, Xpub,
};

pub type KeyData = ByteStr;
pub type ValueData = ByteStr;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display(lowercase)]
pub enum MapName {
    Global,
    Input,
    Output,
}

/// Raw key-value content of a single PSBT map section, as read from a stream
/// and before being interpreted into typed fields.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Map<K: KeyType> {
    pub name: MapName,
    pub singular: BTreeMap<K, ValueData>,
    pub plural: BTreeMap<K, BTreeMap<KeyData, ValueData>>,
    pub proprietary: IndexMap<PropKey, ValueData>,
    pub unknown: IndexMap<u8, IndexMap<KeyData, ValueData>>,
}

impl<K: KeyType> Map<K> {
    fn new(name: MapName) -> Self {
        Map {
            name,
            singular: empty!(),
            plural: empty!(),
            proprietary: empty!(),
            unknown: empty!(),
        }
    }

    pub fn parse(name: MapName, stream: &mut impl Read) -> Result<Self, DecodeError> {
        let mut map = Map::<K>::new(name);

        while let KeyValue::<K>::Pair(pair) = KeyValue::<K>::decode(stream)? {
            if map.singular.contains_key(&pair.key_type) {
                return Err(PsbtError::RepeatedKey(name, pair.key_type.to_u8()).into());
            }
            if pair.key_type.is_proprietary() {
                let prop_key = PropKey::deserialize(pair.key_data)?;
                if map.proprietary.contains_key(&prop_key) {
                    return Err(PsbtError::RepeatedPropKey(name, prop_key).into());
                }
                map.proprietary.insert(prop_key, pair.value_data);
            } else if K::STANDARD.contains(&pair.key_type) {
                if pair.key_type.has_key_data() {
                    let submap = map.plural.entry(pair.key_type).or_default();
                    if submap.insert(pair.key_data, pair.value_data).is_some() {
                        return Err(PsbtError::RepeatedKey(name, pair.key_type.to_u8()).into());
                    }
                } else {
                    if !pair.key_data.is_empty() {
                        return Err(PsbtError::NonEmptyKeyData(
                            name,
                            pair.key_type.to_u8(),
                            pair.key_data,
                        )
                        .into());
                    }
                    map.singular.insert(pair.key_type, pair.value_data);
                }
            } else {
                let submap = map.unknown.entry(pair.key_type.to_u8()).or_default();
                if submap.contains_key(&pair.key_data) {
                    return Err(PsbtError::RepeatedUnknownKey(name, pair.key_type.to_u8()).into());
                }
                submap.insert(pair.key_data, pair.value_data);
            }
        }

        Ok(map)
    }

    pub fn check(&self) -> Result<(), PsbtError> {
        for key_type in K::STANDARD {
            if key_type.is_required()
                && ((key_type.has_key_data() && !self.plural.contains_key(key_type))
                    || (!key_type.has_key_data() && !self.singular.contains_key(key_type)))
            {
                return Err(PsbtError::RequiredKeyAbsent(self.name, key_type.to_u8()));
            }
        }
        Ok(())
    }
}

macro_rules! once {
    ($key_type:expr, $expr:expr) => {
        vec![KeyPair::boxed($key_type, (), $expr)]
    };
}
macro_rules! option {
    ($key_type:expr, $expr:expr) => {
        $expr.as_ref().map(|e| KeyPair::boxed($key_type, (), e)).into_iter().collect()
    };
}
macro_rules! iter {
    ($key_type:expr, $expr:expr) => {
        $expr.iter().map(|(k, v)| KeyPair::boxed($key_type, k, v)).collect()
    };
}

/// Typed interpretation of one PSBT map section: how its standard keys are
/// read into fields and written back out of them.
pub trait KeyMap: Sized {
    type Keys: KeyType;
    const PROPRIETARY_TYPE: Self::Keys;

    fn encode_map(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = 0;

        for key_type in Self::Keys::STANDARD {
            for pair in self.retrieve_key_pair(*key_type) {
                counter += pair.encode(writer)?;
            }
        }

        for (key_type, submap) in self._unknown_map() {
            for (key_data, value_data) in submap {
                let pair = KeyPair::new(
                    Self::Keys::unknown(*key_type),
                    RawBytes(key_data),
                    RawBytes(value_data),
                );
                counter += pair.encode(writer)?;
            }
        }

        for (prop_key, value_data) in self._proprietary_map() {
            let pair = KeyPair::new(Self::PROPRIETARY_TYPE, prop_key, RawBytes(value_data));
            counter += pair.encode(writer)?;
        }

        counter += 1;
        writer.write_all(&[0])?;

        Ok(counter)
    }

    fn parse_map(&mut self, map: Map<Self::Keys>) -> Result<(), PsbtError> {
        map.check()?;

        for (k, v) in map.singular {
            self.insert_singular(k, v)?;
        }
        for (k, submap) in map.plural {
            for (d, v) in submap {
                self.insert_plural(k, d, v)?;
            }
        }
        for (p, v) in map.proprietary {
            self.insert_proprietary(p, v);
        }
        for (k, submap) in map.unknown {
            for (d, v) in submap {
                self.insert_unknown(k, d, v);
            }
        }
        Ok(())
    }

    #[doc(hidden)]
    fn _proprietary_map(&self) -> &IndexMap<PropKey, ValueData>;
    #[doc(hidden)]
    fn _proprietary_map_mut(&mut self) -> &mut IndexMap<PropKey, ValueData>;

    #[doc(hidden)]
    fn _unknown_map(&self) -> &IndexMap<u8, IndexMap<KeyData, ValueData>>;
    #[doc(hidden)]
    fn _unknown_map_mut(&mut self) -> &mut IndexMap<u8, IndexMap<KeyData, ValueData>>;

    #[allow(clippy::type_complexity)]
    fn retrieve_key_pair<'enc>(
        &'enc self,
        key_type: Self::Keys,
    ) -> Vec<KeyPair<Self::Keys, Box<dyn Encode + 'enc>, Box<dyn Encode + 'enc>>>;

    fn insert_singular(
        &mut self,
        key_type: Self::Keys,
        value_data: ValueData,
    ) -> Result<(), PsbtError>;

    fn insert_plural(
        &mut self,
        key_type: Self::Keys,
        key_data: KeyData,
        value_data: ValueData,
    ) -> Result<(), PsbtError>;

    fn insert_proprietary(&mut self, prop_key: PropKey, value_data: ValueData) {
        self._proprietary_map_mut().insert(prop_key, value_data);
    }

    fn insert_unknown(&mut self, key_type: u8, key_data: KeyData, value_data: ValueData) {
        self._unknown_map_mut().entry(key_type).or_default().insert(key_data, value_data);
    }
}

impl KeyMap for Psbt {
    type Keys = GlobalKey;
    const PROPRIETARY_TYPE: Self::Keys = GlobalKey::Proprietary;

    fn _proprietary_map(&self) -> &IndexMap<PropKey, ValueData> { &self.proprietary }
    fn _proprietary_map_mut(&mut self) -> &mut IndexMap<PropKey, ValueData> {
        &mut self.proprietary
    }

    fn _unknown_map(&self) -> &IndexMap<u8, IndexMap<KeyData, ValueData>> { &self.unknown }
    fn _unknown_map_mut(&mut self) -> &mut IndexMap<u8, IndexMap<KeyData, ValueData>> {
        &mut self.unknown
    }

    fn retrieve_key_pair<'enc>(
        &'enc self,
        key_type: Self::Keys,
    ) -> Vec<KeyPair<Self::Keys, Box<dyn Encode + 'enc>, Box<dyn Encode + 'enc>>> {
        match key_type {
            GlobalKey::UnsignedTx => once!(key_type, self.to_unsigned_tx()),
            GlobalKey::Xpub => iter!(key_type, self.xpubs),
            // Global version key is implicit for the only supported version
            // and is never emitted back.
            GlobalKey::Version => vec![],

            GlobalKey::Proprietary | GlobalKey::Unknown(_) => unreachable!(),
        }
    }

    fn insert_singular(
        &mut self,
        key_type: Self::Keys,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            GlobalKey::UnsignedTx => {
                self.reset_from_unsigned_tx(UnsignedTx::deserialize(value_data)?)
            }
            GlobalKey::Version => {
                let version = u32::deserialize(value_data)?;
                if version != 0 {
                    return Err(PsbtError::UnsupportedVersion(version));
                }
            }

            GlobalKey::Xpub => unreachable!(),
            GlobalKey::Proprietary | GlobalKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }

    fn insert_plural(
        &mut self,
        key_type: Self::Keys,
        key_data: KeyData,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            GlobalKey::Xpub => {
                let xpub = Xpub::deserialize(key_data)?;
                let origin = KeyOrigin::deserialize(value_data)?;
                self.xpubs.insert(xpub, origin);
            }

            GlobalKey::UnsignedTx | GlobalKey::Version => unreachable!(),
            GlobalKey::Proprietary | GlobalKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }
}

impl KeyMap for Input {
    type Keys = InputKey;
    const PROPRIETARY_TYPE: Self::Keys = InputKey::Proprietary;

    fn _proprietary_map(&self) -> &IndexMap<PropKey, ValueData> { &self.proprietary }
    fn _proprietary_map_mut(&mut self) -> &mut IndexMap<PropKey, ValueData> {
        &mut self.proprietary
    }

    fn _unknown_map(&self) -> &IndexMap<u8, IndexMap<KeyData, ValueData>> { &self.unknown }
    fn _unknown_map_mut(&mut self) -> &mut IndexMap<u8, IndexMap<KeyData, ValueData>> {
        &mut self.unknown
    }

    fn retrieve_key_pair<'enc>(
        &'enc self,
        key_type: Self::Keys,
    ) -> Vec<KeyPair<Self::Keys, Box<dyn Encode + 'enc>, Box<dyn Encode + 'enc>>> {
        match key_type {
            InputKey::NonWitnessUtxo => option!(key_type, self.non_witness_tx),
            InputKey::WitnessUtxo => option!(key_type, self.witness_utxo),
            InputKey::PartialSig => iter!(key_type, self.partial_sigs),
            InputKey::SighashType => option!(key_type, self.sighash_type),
            InputKey::RedeemScript => option!(key_type, self.redeem_script),
            InputKey::WitnessScript => option!(key_type, self.witness_script),
            InputKey::Bip32Derivation => iter!(key_type, self.bip32_derivation),
            InputKey::FinalScriptSig => option!(key_type, self.final_script_sig),
            InputKey::FinalWitness => option!(key_type, self.final_witness),

            InputKey::Proprietary | InputKey::Unknown(_) => unreachable!(),
        }
    }

    fn insert_singular(
        &mut self,
        key_type: Self::Keys,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            InputKey::NonWitnessUtxo => self.non_witness_tx = Some(Tx::deserialize(value_data)?),
            InputKey::WitnessUtxo => self.witness_utxo = Some(TxOut::deserialize(value_data)?),
            InputKey::SighashType => {
                self.sighash_type = Some(SighashType::deserialize(value_data)?)
            }
            InputKey::RedeemScript => {
                self.redeem_script = Some(RedeemScript::deserialize(value_data)?)
            }
            InputKey::WitnessScript => {
                self.witness_script = Some(WitnessScript::deserialize(value_data)?)
            }
            InputKey::FinalScriptSig => {
                self.final_script_sig = Some(SigScript::deserialize(value_data)?)
            }
            InputKey::FinalWitness => self.final_witness = Some(Witness::deserialize(value_data)?),

            InputKey::PartialSig | InputKey::Bip32Derivation => unreachable!(),
            InputKey::Proprietary | InputKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }

    fn insert_plural(
        &mut self,
        key_type: Self::Keys,
        key_data: KeyData,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            InputKey::PartialSig => {
                let pk = LegacyPk::deserialize(key_data)?;
                let sig = LegacySig::deserialize(value_data)?;
                self.partial_sigs.insert(pk, sig);
            }
            InputKey::Bip32Derivation => {
                let pk = LegacyPk::deserialize(key_data)?;
                let origin = KeyOrigin::deserialize(value_data)?;
                self.bip32_derivation.insert(pk, origin);
            }

            InputKey::NonWitnessUtxo
            | InputKey::WitnessUtxo
            | InputKey::SighashType
            | InputKey::RedeemScript
            | InputKey::WitnessScript
            | InputKey::FinalScriptSig
            | InputKey::FinalWitness => unreachable!(),

            InputKey::Proprietary | InputKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }
}

impl KeyMap for Output {
    type Keys = OutputKey;
    const PROPRIETARY_TYPE: Self::Keys = OutputKey::Proprietary;

    fn _proprietary_map(&self) -> &IndexMap<PropKey, ValueData> { &self.proprietary }
    fn _proprietary_map_mut(&mut self) -> &mut IndexMap<PropKey, ValueData> {
        &mut self.proprietary
    }

    fn _unknown_map(&self) -> &IndexMap<u8, IndexMap<KeyData, ValueData>> { &self.unknown }
    fn _unknown_map_mut(&mut self) -> &mut IndexMap<u8, IndexMap<KeyData, ValueData>> {
        &mut self.unknown
    }

    fn retrieve_key_pair<'enc>(
        &'enc self,
        key_type: Self::Keys,
    ) -> Vec<KeyPair<Self::Keys, Box<dyn Encode + 'enc>, Box<dyn Encode + 'enc>>> {
        match key_type {
            OutputKey::RedeemScript => option!(key_type, self.redeem_script),
            OutputKey::WitnessScript => option!(key_type, self.witness_script),
            OutputKey::Bip32Derivation => iter!(key_type, self.bip32_derivation),

            OutputKey::Proprietary | OutputKey::Unknown(_) => unreachable!(),
        }
    }

    fn insert_singular(
        &mut self,
        key_type: Self::Keys,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            OutputKey::RedeemScript => {
                self.redeem_script = Some(RedeemScript::deserialize(value_data)?)
            }
            OutputKey::WitnessScript => {
                self.witness_script = Some(WitnessScript::deserialize(value_data)?)
            }

            OutputKey::Bip32Derivation => unreachable!(),
            OutputKey::Proprietary | OutputKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }

    fn insert_plural(
        &mut self,
        key_type: Self::Keys,
        key_data: KeyData,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            OutputKey::Bip32Derivation => {
                let pk = LegacyPk::deserialize(key_data)?;
                let origin = KeyOrigin::deserialize(value_data)?;
                self.bip32_derivation.insert(pk, origin);
            }

            OutputKey::RedeemScript | OutputKey::WitnessScript => unreachable!(),
            OutputKey::Proprietary | OutputKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }
}
