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

//! Special serde serializations: byte- and key-like types are rendered as
//! their canonical string forms, so serialized PSBTs stay readable and usable
//! as map keys. Deserialization of the top-level types is intentionally not
//! provided; transport decoding goes through the binary codec.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::consensus::ByteStr;
use crate::origin::{DerivationIndex, Fingerprint, KeyOrigin, Xpub};
use crate::sigtypes::{LegacyPk, LegacySig};
use crate::{
    Encode, PropKey, RedeemScript, ScriptBytes, ScriptPubkey, SighashType, SigScript, Tx, Txid,
    Witness, WitnessScript,
};

macro_rules! serde_display_impl {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

serde_display_impl!(ByteStr);
serde_display_impl!(Txid);
serde_display_impl!(ScriptBytes);
serde_display_impl!(ScriptPubkey);
serde_display_impl!(SigScript);
serde_display_impl!(RedeemScript);
serde_display_impl!(WitnessScript);
serde_display_impl!(PropKey);
serde_display_impl!(LegacyPk);
serde_display_impl!(LegacySig);
serde_display_impl!(SighashType);
serde_display_impl!(Fingerprint);
serde_display_impl!(DerivationIndex);
serde_display_impl!(KeyOrigin);

impl Serialize for Xpub {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use amplify::hex::ToHex;
        serializer.collect_str(&self.encode().to_hex())
    }
}

impl Serialize for Witness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self.elements() {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

impl Serialize for Tx {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use amplify::hex::ToHex;
        let mut data = Vec::new();
        self.encode(&mut data).expect("in-memory encoding can't error");
        serializer.collect_str(&data.to_hex())
    }
}
