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

use std::io::{self, Cursor, Read, Write};

use amplify::IoError;

use crate::consensus::ConsensusDataError;
use crate::keys::KeyValue;
use crate::maps::{KeyData, KeyMap, Map, MapName};
use crate::origin::XpubDecodeError;
use crate::sigtypes::NonStandardSighashType;
use crate::{GlobalKey, InputKey, KeyPair, KeyType, OutputKey, PropKey, Psbt, VarInt};

#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(inner)]
pub enum DecodeError {
    #[from]
    #[from(io::Error)]
    Io(IoError),

    #[from]
    #[from(ConsensusDataError)]
    #[from(NonStandardSighashType)]
    #[from(XpubDecodeError)]
    Psbt(PsbtError),
}

#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum PsbtError {
    /// unexpected end of data.
    UnexpectedEod,

    /// PSBT data are followed by some excessive bytes.
    DataNotConsumed,

    /// invalid magic bytes {0}.
    InvalidMagic(KeyData),

    /// repeated key {1:#02x} in {0} map.
    RepeatedKey(MapName, u8),

    /// repeated proprietary key {1} in {0} map.
    RepeatedPropKey(MapName, PropKey),

    /// repeated unknown key {1:#02x} in {0} map.
    RepeatedUnknownKey(MapName, u8),

    /// key {1:#02x} in {0} map must not contain additional key data.
    NonEmptyKeyData(MapName, u8, KeyData),

    /// key {1:#02x} required for the {0} map is not present.
    RequiredKeyAbsent(MapName, u8),

    /// PSBT version {0} is not supported.
    UnsupportedVersion(u32),

    /// empty signature data.
    EmptySig,

    /// invalid signature data. Details: {0}
    InvalidSig(secp256k1::Error),

    #[from]
    #[display(inner)]
    InvalidSighash(NonStandardSighashType),

    /// invalid compressed pubkey data.
    InvalidComprPubkey,

    /// invalid uncompressed pubkey data.
    InvalidUncomprPubkey,

    /// unrecognized public key encoding starting with flag {0:#02x}.
    UnrecognizedKeyFormat(u8),

    #[from]
    #[display(inner)]
    InvalidXpub(XpubDecodeError),

    #[from]
    #[display(inner)]
    Consensus(ConsensusDataError),
}

impl From<DecodeError> for PsbtError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Psbt(e) => e,
            DecodeError::Io(_) => PsbtError::UnexpectedEod,
        }
    }
}

pub trait Encode {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError>;
}

impl<'a, T: Encode> Encode for &'a T {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> { (*self).encode(writer) }
}

impl<'a> Encode for Box<dyn Encode + 'a> {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        self.as_ref().encode(writer)
    }
}

pub trait Decode
where Self: Sized
{
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError>;
    fn deserialize(bytes: impl AsRef<[u8]>) -> Result<Self, PsbtError> {
        let bytes = bytes.as_ref();
        let mut cursor = Cursor::new(bytes);
        let me = Self::decode(&mut cursor)?;
        if cursor.position() != bytes.len() as u64 {
            return Err(PsbtError::DataNotConsumed);
        }
        Ok(me)
    }
}

/// Wrapper for data which are encoded as they are, without any length prefix,
/// consuming the rest of the buffer on decoding.
pub struct RawBytes<T>(pub T);

impl<T: AsRef<[u8]>> Encode for RawBytes<T> {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let data = self.0.as_ref();
        writer.write_all(data)?;
        Ok(data.len())
    }
}

impl Decode for RawBytes<Vec<u8>> {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(RawBytes(data))
    }
}

impl Psbt {
    const MAGIC: [u8; 5] = *b"psbt\xFF";

    pub fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = Self::MAGIC.len();
        writer.write_all(&Self::MAGIC)?;

        counter += self.encode_map(writer)?;

        for input in self.inputs() {
            counter += input.encode_map(writer)?;
        }

        for output in self.outputs() {
            counter += output.encode_map(writer)?;
        }

        Ok(counter)
    }

    pub fn encode_vec(&self, writer: &mut Vec<u8>) -> usize {
        self.encode(writer).expect("in-memory encoding can't error")
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut vec = Vec::new();
        self.encode_vec(&mut vec);
        vec
    }

    pub fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut magic = Self::MAGIC;
        reader.read_exact(&mut magic)?;
        if magic != Self::MAGIC {
            return Err(PsbtError::InvalidMagic(magic.to_vec().into()).into());
        }

        let map = Map::<GlobalKey>::parse(MapName::Global, reader)?;
        let mut psbt = Psbt::create();
        psbt.parse_map(map)?;

        for input in psbt.inputs_mut() {
            let map = Map::<InputKey>::parse(MapName::Input, reader)?;
            input.parse_map(map)?;
        }

        for output in psbt.outputs_mut() {
            let map = Map::<OutputKey>::parse(MapName::Output, reader)?;
            output.parse_map(map)?;
        }

        Ok(psbt)
    }

    pub fn deserialize(data: impl AsRef<[u8]>) -> Result<Self, PsbtError> {
        let data = data.as_ref();
        let mut cursor = Cursor::new(data);
        let psbt = Self::decode(&mut cursor)?;
        if cursor.position() != data.len() as u64 {
            return Err(PsbtError::DataNotConsumed);
        }
        Ok(psbt)
    }
}

impl Encode for GlobalKey {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        self.to_u8().encode(writer)
    }
}

impl Decode for GlobalKey {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        u8::decode(reader).map(Self::from_u8)
    }
}

impl Encode for InputKey {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        self.to_u8().encode(writer)
    }
}

impl Decode for InputKey {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        u8::decode(reader).map(Self::from_u8)
    }
}

impl Encode for OutputKey {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        self.to_u8().encode(writer)
    }
}

impl Decode for OutputKey {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        u8::decode(reader).map(Self::from_u8)
    }
}

impl<T: KeyType, K: Encode, V: Encode> Encode for KeyPair<T, K, V> {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = 0;

        counter += self.key_len().encode(writer)?;
        counter += self.key_type.encode(writer)?;
        counter += self.key_data.encode(writer)?;

        counter += self.value_len().encode(writer)?;
        counter += self.value_data.encode(writer)?;

        Ok(counter)
    }
}

impl<T: KeyType> Decode for KeyValue<T> {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let key_len = VarInt::decode(reader)?;
        if key_len.to_u64() == 0 {
            return Ok(KeyValue::Separator);
        }
        if key_len.to_u64() > crate::consensus::MAX_DATA_SIZE {
            return Err(ConsensusDataError::OversizedData(key_len.to_u64()).into());
        }

        let key_type = T::decode(reader)?;
        let mut key_data = vec![0u8; key_len.to_usize() - 1];
        reader.read_exact(key_data.as_mut_slice())?;

        let value_len = VarInt::decode(reader)?;
        if value_len.to_u64() > crate::consensus::MAX_DATA_SIZE {
            return Err(ConsensusDataError::OversizedData(value_len.to_u64()).into());
        }
        let mut value_data = vec![0u8; value_len.to_usize()];
        reader.read_exact(value_data.as_mut_slice())?;

        Ok(KeyValue::Pair(KeyPair {
            key_type,
            key_data: key_data.into(),
            value_data: value_data.into(),
        }))
    }
}

impl Encode for PropKey {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let mut counter = 0;

        counter += VarInt::with(self.identifier.len()).encode(writer)?;
        writer.write_all(self.identifier.as_bytes())?;
        counter += self.identifier.len();

        counter += VarInt::new(self.subtype).encode(writer)?;

        writer.write_all(&self.data)?;
        counter += self.data.len();

        Ok(counter)
    }
}

impl Decode for PropKey {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let len = VarInt::decode(reader)?;
        let mut identifier = vec![0u8; len.to_usize()];
        reader.read_exact(&mut identifier)?;
        let identifier = String::from_utf8_lossy(&identifier).to_string();

        let subtype = VarInt::decode(reader)?.to_u64();

        let mut data = Vec::<u8>::new();
        reader.read_to_end(&mut data)?;

        Ok(PropKey {
            identifier,
            subtype,
            data,
        })
    }
}

impl Encode for u8 {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&[*self])?;
        Ok(1)
    }
}

impl Decode for u8 {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl Encode for u16 {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&self.to_le_bytes())?;
        Ok(2)
    }
}

impl Decode for u16 {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }
}

impl Encode for u32 {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&self.to_le_bytes())?;
        Ok(4)
    }
}

impl Decode for u32 {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl Encode for u64 {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&self.to_le_bytes())?;
        Ok(8)
    }
}

impl Decode for u64 {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl Encode for i32 {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&self.to_le_bytes())?;
        Ok(4)
    }
}

impl Decode for i32 {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }
}

impl Encode for () {
    fn encode(&self, _writer: &mut dyn Write) -> Result<usize, IoError> { Ok(0) }
}

impl Decode for () {
    fn decode(_reader: &mut impl Read) -> Result<Self, DecodeError> { Ok(()) }
}
