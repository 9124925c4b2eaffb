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

//! Consensus serialization for the transaction structures embedded into PSBT
//! key-value maps: varints, outpoints, scripts, witnesses and transactions.

use std::fmt::{self, Display, Formatter, LowerHex};
use std::io::{Read, Write};
use std::iter::Sum;

use amplify::hex::ToHex;
use amplify::IoError;

use crate::coders::RawBytes;
use crate::{Decode, DecodeError, Encode};

/// Maximal size of a variable-length byte sequence accepted by the decoder;
/// matches the consensus block size limit.
pub(crate) const MAX_DATA_SIZE: u64 = 4_000_000;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ConsensusDataError {
    /// non-minimal variable-length integer encoding.
    NonMinimalVarInt,

    /// variable-length data size {0} exceeds maximum allowed.
    OversizedData(u64),

    /// invalid segwit flag {0:#02x}.
    InvalidSegwitFlag(u8),

    /// unsigned transaction contains scriptSig data.
    UnsignedTxHasScriptSig,
}

#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display(LowerHex)]
pub struct ByteStr(Vec<u8>);

impl From<&[u8]> for ByteStr {
    fn from(slice: &[u8]) -> Self { ByteStr(slice.to_vec()) }
}

impl AsRef<[u8]> for ByteStr {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl ByteStr {
    pub fn new(data: impl Into<Vec<u8>>) -> Self { ByteStr(data.into()) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn as_slice(&self) -> &[u8] { &self.0 }

    pub fn into_vec(self) -> Vec<u8> { self.0 }
}

impl LowerHex for ByteStr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.0.to_hex()) }
}

impl Encode for ByteStr {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&self.0)?;
        Ok(self.0.len())
    }
}

impl Decode for ByteStr {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        RawBytes::<Vec<u8>>::decode(reader).map(|raw| ByteStr(raw.0))
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display(inner)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
pub struct VarInt(pub u64);

impl VarInt {
    pub const fn new(val: u64) -> Self { VarInt(val) }

    pub fn with(val: impl Into<usize>) -> Self { VarInt(val.into() as u64) }

    pub const fn to_u64(self) -> u64 { self.0 }

    pub const fn to_usize(self) -> usize { self.0 as usize }
}

impl Encode for VarInt {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        match self.0 {
            0..=0xFC => {
                (self.0 as u8).encode(writer)?;
                Ok(1)
            }
            0xFD..=0xFFFF => {
                0xFDu8.encode(writer)?;
                (self.0 as u16).encode(writer)?;
                Ok(3)
            }
            0x10000..=0xFFFF_FFFF => {
                0xFEu8.encode(writer)?;
                (self.0 as u32).encode(writer)?;
                Ok(5)
            }
            _ => {
                0xFFu8.encode(writer)?;
                self.0.encode(writer)?;
                Ok(9)
            }
        }
    }
}

impl Decode for VarInt {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let val = match u8::decode(reader)? {
            0xFF => {
                let x = u64::decode(reader)?;
                if x < 0x1_0000_0000 {
                    return Err(ConsensusDataError::NonMinimalVarInt.into());
                }
                x
            }
            0xFE => {
                let x = u32::decode(reader)?;
                if x < 0x1_0000 {
                    return Err(ConsensusDataError::NonMinimalVarInt.into());
                }
                x as u64
            }
            0xFD => {
                let x = u16::decode(reader)?;
                if x < 0xFD {
                    return Err(ConsensusDataError::NonMinimalVarInt.into());
                }
                x as u64
            }
            small => small as u64,
        };
        Ok(VarInt(val))
    }
}

fn decode_prefixed_bytes(reader: &mut impl Read) -> Result<Vec<u8>, DecodeError> {
    let len = VarInt::decode(reader)?;
    if len.to_u64() > MAX_DATA_SIZE {
        return Err(ConsensusDataError::OversizedData(len.to_u64()).into());
    }
    let mut data = vec![0u8; len.to_usize()];
    reader.read_exact(data.as_mut_slice())?;
    Ok(data)
}

fn encode_prefixed_bytes(data: &[u8], writer: &mut dyn Write) -> Result<usize, IoError> {
    let counter = VarInt::with(data.len()).encode(writer)?;
    writer.write_all(data)?;
    Ok(counter + data.len())
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display(inner)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
pub struct Sats(pub u64);

impl Sats {
    pub const ZERO: Sats = Sats(0);

    pub fn saturating_add(self, other: impl Into<Sats>) -> Sats {
        Sats(self.0.saturating_add(other.into().0))
    }

    pub fn checked_sub(self, other: impl Into<Sats>) -> Option<Sats> {
        self.0.checked_sub(other.into().0).map(Sats)
    }
}

impl Sum for Sats {
    fn sum<I: Iterator<Item = Sats>>(iter: I) -> Self {
        iter.fold(Sats::ZERO, Sats::saturating_add)
    }
}

impl Encode for Sats {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> { self.0.encode(writer) }
}

impl Decode for Sats {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        u64::decode(reader).map(Sats)
    }
}

/// Transaction identifier in its in-memory (little-endian) byte order; the
/// display form follows the conventional reversed (big-endian) hex notation.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
pub struct Txid([u8; 32]);

impl Txid {
    pub const fn from_byte_array(data: [u8; 32]) -> Self { Txid(data) }

    pub const fn to_byte_array(self) -> [u8; 32] { self.0 }
}

impl AsRef<[u8]> for Txid {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl Display for Txid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut bytes = self.0;
        bytes.reverse();
        f.write_str(&bytes.to_hex())
    }
}

impl Encode for Txid {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&self.0)?;
        Ok(32)
    }
}

impl Decode for Txid {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; 32];
        reader.read_exact(&mut buf)?;
        Ok(Txid(buf))
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display(inner)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
pub struct Vout(pub u32);

impl Vout {
    pub const fn into_u32(self) -> u32 { self.0 }

    pub const fn into_usize(self) -> usize { self.0 as usize }
}

impl Encode for Vout {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> { self.0.encode(writer) }
}

impl Decode for Vout {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        u32::decode(reader).map(Vout)
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[display("{txid}:{vout}")]
#[cfg_attr(
    feature = "serde",
    derive(Serialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub struct Outpoint {
    pub txid: Txid,
    pub vout: Vout,
}

impl Outpoint {
    pub fn new(txid: Txid, vout: impl Into<Vout>) -> Self {
        Outpoint {
            txid,
            vout: vout.into(),
        }
    }
}

impl Encode for Outpoint {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        Ok(self.txid.encode(writer)? + self.vout.encode(writer)?)
    }
}

impl Decode for Outpoint {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let txid = Txid::decode(reader)?;
        let vout = Vout::decode(reader)?;
        Ok(Outpoint { txid, vout })
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display(inner)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
pub struct SeqNo(pub u32);

impl SeqNo {
    pub const FINAL: SeqNo = SeqNo(0xFFFF_FFFF);
}

impl Encode for SeqNo {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> { self.0.encode(writer) }
}

impl Decode for SeqNo {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        u32::decode(reader).map(SeqNo)
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display(inner)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
pub struct LockTime(pub u32);

impl LockTime {
    pub const ZERO: LockTime = LockTime(0);
}

impl Encode for LockTime {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> { self.0.encode(writer) }
}

impl Decode for LockTime {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        u32::decode(reader).map(LockTime)
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, From)]
#[display(inner)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
pub struct TxVer(pub i32);

impl TxVer {
    pub const V1: TxVer = TxVer(1);
    pub const V2: TxVer = TxVer(2);
}

impl Default for TxVer {
    fn default() -> Self { TxVer::V2 }
}

impl Encode for TxVer {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> { self.0.encode(writer) }
}

impl Decode for TxVer {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        i32::decode(reader).map(TxVer)
    }
}

#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display(LowerHex)]
pub struct ScriptBytes(Vec<u8>);

impl From<&[u8]> for ScriptBytes {
    fn from(slice: &[u8]) -> Self { ScriptBytes(slice.to_vec()) }
}

impl AsRef<[u8]> for ScriptBytes {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl ScriptBytes {
    pub fn new(data: impl Into<Vec<u8>>) -> Self { ScriptBytes(data.into()) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn as_slice(&self) -> &[u8] { &self.0 }

    pub fn into_vec(self) -> Vec<u8> { self.0 }

    pub(crate) fn encode_prefixed(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        encode_prefixed_bytes(&self.0, writer)
    }

    pub(crate) fn decode_prefixed(reader: &mut impl Read) -> Result<Self, DecodeError> {
        decode_prefixed_bytes(reader).map(ScriptBytes)
    }
}

impl LowerHex for ScriptBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.0.to_hex()) }
}

impl Encode for ScriptBytes {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&self.0)?;
        Ok(self.0.len())
    }
}

impl Decode for ScriptBytes {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        RawBytes::<Vec<u8>>::decode(reader).map(|raw| ScriptBytes(raw.0))
    }
}

macro_rules! script_newtype {
    ($name:ident) => {
        #[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
        #[display(inner)]
        pub struct $name(ScriptBytes);

        impl $name {
            pub fn from_inner(script: ScriptBytes) -> Self { Self(script) }

            pub fn as_script_bytes(&self) -> &ScriptBytes { &self.0 }

            pub fn into_script_bytes(self) -> ScriptBytes { self.0 }

            pub fn len(&self) -> usize { self.0.len() }

            pub fn is_empty(&self) -> bool { self.0.is_empty() }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] { self.0.as_ref() }
        }

        impl From<Vec<u8>> for $name {
            fn from(data: Vec<u8>) -> Self { Self(ScriptBytes::from(data)) }
        }

        impl Encode for $name {
            fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
                self.0.encode(writer)
            }
        }

        impl Decode for $name {
            fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
                ScriptBytes::decode(reader).map(Self)
            }
        }
    };
}

script_newtype!(ScriptPubkey);
script_newtype!(SigScript);
script_newtype!(RedeemScript);
script_newtype!(WitnessScript);

/// Witness stack of a single input: a sequence of byte strings serialized with
/// the same layout in both transaction wire data and PSBT values.
#[derive(Clone, Eq, PartialEq, Hash, Default, Debug)]
pub struct Witness(Vec<ByteStr>);

impl Witness {
    pub fn new() -> Self { Witness(vec![]) }

    pub fn from_elements(elements: impl IntoIterator<Item = impl Into<Vec<u8>>>) -> Self {
        Witness(elements.into_iter().map(|e| ByteStr::new(e)).collect())
    }

    pub fn elements(&self) -> impl Iterator<Item = &ByteStr> { self.0.iter() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl Encode for Witness {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = VarInt::with(self.0.len()).encode(writer)?;
        for element in &self.0 {
            counter += encode_prefixed_bytes(element.as_slice(), writer)?;
        }
        Ok(counter)
    }
}

impl Decode for Witness {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let count = VarInt::decode(reader)?;
        let mut elements = Vec::with_capacity(count.to_usize().min(0xFF));
        for _ in 0..count.to_u64() {
            elements.push(ByteStr::new(decode_prefixed_bytes(reader)?));
        }
        Ok(Witness(elements))
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub struct TxOut {
    pub value: Sats,
    pub script_pubkey: ScriptPubkey,
}

impl TxOut {
    pub fn new(script_pubkey: impl Into<ScriptPubkey>, value: impl Into<Sats>) -> Self {
        TxOut {
            value: value.into(),
            script_pubkey: script_pubkey.into(),
        }
    }
}

impl Encode for TxOut {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = self.value.encode(writer)?;
        counter += self.script_pubkey.as_script_bytes().encode_prefixed(writer)?;
        Ok(counter)
    }
}

impl Decode for TxOut {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let value = Sats::decode(reader)?;
        let script_pubkey = ScriptBytes::decode_prefixed(reader)?;
        Ok(TxOut {
            value,
            script_pubkey: ScriptPubkey::from_inner(script_pubkey),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TxIn {
    pub prev_output: Outpoint,
    pub sig_script: SigScript,
    pub sequence: SeqNo,
    pub witness: Witness,
}

impl TxIn {
    fn encode_base(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = self.prev_output.encode(writer)?;
        counter += self.sig_script.as_script_bytes().encode_prefixed(writer)?;
        counter += self.sequence.encode(writer)?;
        Ok(counter)
    }

    fn decode_base(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let prev_output = Outpoint::decode(reader)?;
        let sig_script = ScriptBytes::decode_prefixed(reader)?;
        let sequence = SeqNo::decode(reader)?;
        Ok(TxIn {
            prev_output,
            sig_script: SigScript::from_inner(sig_script),
            sequence,
            witness: Witness::new(),
        })
    }
}

/// Fully-signed (or partially-signed) transaction, as carried by the
/// `PSBT_IN_NON_WITNESS_UTXO` value. Decoding recognizes the segwit
/// marker-and-flag extension; a leading zero varint is always interpreted as
/// the segwit marker, which is the consensus behavior for any transaction
/// valid on-chain.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Tx {
    pub version: TxVer,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: LockTime,
}

impl Tx {
    pub fn is_segwit(&self) -> bool { self.inputs.iter().any(|txin| !txin.witness.is_empty()) }
}

impl Encode for Tx {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let segwit = self.is_segwit();
        let mut counter = self.version.encode(writer)?;

        if segwit {
            writer.write_all(&[0x00, 0x01])?;
            counter += 2;
        }

        counter += VarInt::with(self.inputs.len()).encode(writer)?;
        for input in &self.inputs {
            counter += input.encode_base(writer)?;
        }

        counter += VarInt::with(self.outputs.len()).encode(writer)?;
        for output in &self.outputs {
            counter += output.encode(writer)?;
        }

        if segwit {
            for input in &self.inputs {
                counter += input.witness.encode(writer)?;
            }
        }

        counter += self.lock_time.encode(writer)?;
        Ok(counter)
    }
}

impl Decode for Tx {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let version = TxVer::decode(reader)?;

        let mut segwit = false;
        let mut input_count = VarInt::decode(reader)?;
        if input_count.to_u64() == 0 {
            let flag = u8::decode(reader)?;
            if flag != 0x01 {
                return Err(ConsensusDataError::InvalidSegwitFlag(flag).into());
            }
            segwit = true;
            input_count = VarInt::decode(reader)?;
        }

        let mut inputs = Vec::with_capacity(input_count.to_usize().min(0xFF));
        for _ in 0..input_count.to_u64() {
            inputs.push(TxIn::decode_base(reader)?);
        }

        let output_count = VarInt::decode(reader)?;
        let mut outputs = Vec::with_capacity(output_count.to_usize().min(0xFF));
        for _ in 0..output_count.to_u64() {
            outputs.push(TxOut::decode(reader)?);
        }

        if segwit {
            for input in &mut inputs {
                input.witness = Witness::decode(reader)?;
            }
        }

        let lock_time = LockTime::decode(reader)?;

        Ok(Tx {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}

/// Transaction data the way they are stored in the PSBT global unsigned
/// transaction key.
///
/// A dedicated type is required since a PSBT may contain an unsigned
/// transaction with zero inputs (BIP-174 test cases have those), which a
/// consensus decoder would misread as a segwit marker and fail on the flag
/// byte. Unsigned transactions are thus always parsed without segwit
/// interpretation, and the type guarantees that none of the inputs carries a
/// scriptSig.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct UnsignedTx {
    pub version: TxVer,
    pub inputs: Vec<UnsignedTxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: LockTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct UnsignedTxIn {
    pub prev_output: Outpoint,
    pub sequence: SeqNo,
}

impl Encode for UnsignedTxIn {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = self.prev_output.encode(writer)?;
        // empty scriptSig slot
        writer.write_all(&[0x00])?;
        counter += 1;
        counter += self.sequence.encode(writer)?;
        Ok(counter)
    }
}

impl Decode for UnsignedTxIn {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let prev_output = Outpoint::decode(reader)?;
        let sig_script = ScriptBytes::decode_prefixed(reader)?;
        if !sig_script.is_empty() {
            return Err(ConsensusDataError::UnsignedTxHasScriptSig.into());
        }
        let sequence = SeqNo::decode(reader)?;
        Ok(UnsignedTxIn {
            prev_output,
            sequence,
        })
    }
}

impl Encode for UnsignedTx {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = self.version.encode(writer)?;

        counter += VarInt::with(self.inputs.len()).encode(writer)?;
        for input in &self.inputs {
            counter += input.encode(writer)?;
        }

        counter += VarInt::with(self.outputs.len()).encode(writer)?;
        for output in &self.outputs {
            counter += output.encode(writer)?;
        }

        counter += self.lock_time.encode(writer)?;
        Ok(counter)
    }
}

impl Decode for UnsignedTx {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let version = TxVer::decode(reader)?;

        let input_count = VarInt::decode(reader)?;
        let mut inputs = Vec::with_capacity(input_count.to_usize().min(0xFF));
        for _ in 0..input_count.to_u64() {
            inputs.push(UnsignedTxIn::decode(reader)?);
        }

        let output_count = VarInt::decode(reader)?;
        let mut outputs = Vec::with_capacity(output_count.to_usize().min(0xFF));
        for _ in 0..output_count.to_u64() {
            outputs.push(TxOut::decode(reader)?);
        }

        let lock_time = LockTime::decode(reader)?;

        Ok(UnsignedTx {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::PsbtError;

    fn roundtrip<T: Encode + Decode + Eq + std::fmt::Debug>(val: &T) -> Vec<u8> {
        let mut data = Vec::new();
        val.encode(&mut data).unwrap();
        assert_eq!(&T::deserialize(&data).unwrap(), val);
        data
    }

    #[test]
    fn varint_widths() {
        assert_eq!(roundtrip(&VarInt::new(0)), vec![0x00]);
        assert_eq!(roundtrip(&VarInt::new(0xFC)), vec![0xFC]);
        assert_eq!(roundtrip(&VarInt::new(0xFD)), vec![0xFD, 0xFD, 0x00]);
        assert_eq!(roundtrip(&VarInt::new(0xFFFF)), vec![0xFD, 0xFF, 0xFF]);
        assert_eq!(roundtrip(&VarInt::new(0x1_0000)), vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn varint_non_minimal() {
        assert_eq!(
            VarInt::deserialize([0xFDu8, 0x01, 0x00]),
            Err(PsbtError::Consensus(ConsensusDataError::NonMinimalVarInt))
        );
    }

    #[test]
    fn txid_display_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        assert_eq!(
            Txid::from_byte_array(bytes).to_string(),
            "00000000000000000000000000000000000000000000000000000000000000ab"
        );
    }

    #[test]
    fn segwit_tx_roundtrip() {
        let tx = Tx {
            version: TxVer::V2,
            inputs: vec![TxIn {
                prev_output: Outpoint::new(Txid::from_byte_array([0x11; 32]), 1u32),
                sig_script: SigScript::default(),
                sequence: SeqNo::FINAL,
                witness: Witness::from_elements([vec![0x30, 0x45], vec![0x02, 0x21]]),
            }],
            outputs: vec![TxOut::new(vec![0x00u8, 0x14, 0xAA], 1000u64)],
            lock_time: LockTime::ZERO,
        };
        assert!(tx.is_segwit());
        let data = roundtrip(&tx);
        // marker and flag right after the 4 version bytes
        assert_eq!(&data[4..6], &[0x00, 0x01]);
    }

    #[test]
    fn legacy_tx_roundtrip() {
        let tx = Tx {
            version: TxVer::V1,
            inputs: vec![TxIn {
                prev_output: Outpoint::new(Txid::from_byte_array([0x22; 32]), 0u32),
                sig_script: SigScript::from(vec![0x51]),
                sequence: SeqNo::FINAL,
                witness: Witness::new(),
            }],
            outputs: vec![TxOut::new(vec![0x51u8], 500u64)],
            lock_time: LockTime(101),
        };
        roundtrip(&tx);
    }

    #[test]
    fn unsigned_tx_zero_inputs() {
        // zero inputs must not trip segwit interpretation
        let tx = UnsignedTx {
            version: TxVer::V2,
            inputs: vec![],
            outputs: vec![TxOut::new(vec![0x51u8], 100u64)],
            lock_time: LockTime::ZERO,
        };
        roundtrip(&tx);
    }

    #[test]
    fn unsigned_tx_rejects_sigscript() {
        let mut data = Vec::new();
        TxVer::V2.encode(&mut data).unwrap();
        VarInt::new(1).encode(&mut data).unwrap();
        Outpoint::new(Txid::from_byte_array([0u8; 32]), 0u32).encode(&mut data).unwrap();
        data.push(0x01); // non-empty scriptSig
        data.push(0x51);
        SeqNo::FINAL.encode(&mut data).unwrap();
        VarInt::new(0).encode(&mut data).unwrap();
        LockTime::ZERO.encode(&mut data).unwrap();

        assert_eq!(
            UnsignedTx::deserialize(&data),
            Err(PsbtError::Consensus(ConsensusDataError::UnsignedTxHasScriptSig))
        );
    }
}
