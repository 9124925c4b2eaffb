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

//! BIP32 key provenance data carried by PSBT derivation and global xpub
//! entries.

use std::fmt::{self, Display, Formatter};
use std::io::{Read, Write};

use amplify::hex::ToHex;
use amplify::IoError;
use secp256k1::PublicKey;

use crate::{Decode, DecodeError, Encode};

const HARDENED_INDEX_BOUNDARY: u32 = 1 << 31;

const VER_MAINNET: u32 = 0x0488_B21E;
const VER_TESTNET: u32 = 0x0435_87CF;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum XpubDecodeError {
    /// unknown extended pubkey version {0:#010x}.
    UnknownKeyVersion(u32),

    /// invalid public key data inside an extended pubkey.
    InvalidPubkey,
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, From)]
pub struct Fingerprint([u8; 4]);

impl Fingerprint {
    pub const fn from_byte_array(data: [u8; 4]) -> Self { Fingerprint(data) }

    pub const fn to_byte_array(self) -> [u8; 4] { self.0 }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.0.to_hex()) }
}

/// Single BIP32 derivation step in its raw `u32` form; hardened indexes are
/// displayed with the `h` suffix.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, From)]
pub struct DerivationIndex(pub u32);

impl DerivationIndex {
    pub fn hardened(child: u32) -> Self { DerivationIndex(child | HARDENED_INDEX_BOUNDARY) }

    pub fn normal(child: u32) -> Self { DerivationIndex(child) }

    pub const fn is_hardened(self) -> bool { self.0 >= HARDENED_INDEX_BOUNDARY }

    pub const fn child_number(self) -> u32 { self.0 & !HARDENED_INDEX_BOUNDARY }

    pub const fn index(self) -> u32 { self.0 }
}

impl Display for DerivationIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_hardened() {
            write!(f, "{}h", self.child_number())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Provenance of a key used in a PSBT: fingerprint of the master key and the
/// derivation path from it.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug)]
pub struct KeyOrigin {
    master_fp: Fingerprint,
    derivation: Vec<DerivationIndex>,
}

impl KeyOrigin {
    pub fn new(master_fp: Fingerprint, derivation: Vec<DerivationIndex>) -> Self {
        KeyOrigin {
            master_fp,
            derivation,
        }
    }

    pub fn master_fp(&self) -> Fingerprint { self.master_fp }

    pub fn derivation(&self) -> &[DerivationIndex] { &self.derivation }
}

impl Display for KeyOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.master_fp)?;
        for index in &self.derivation {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

impl Encode for KeyOrigin {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(self.master_fp.as_ref())?;
        for index in &self.derivation {
            index.index().encode(writer)?;
        }
        Ok(4 + self.derivation.len() * 4)
    }
}

impl Decode for KeyOrigin {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let master_fp = Fingerprint::from_byte_array(buf);
        let mut derivation = Vec::new();
        while let Ok(index) = u32::decode(reader) {
            derivation.push(DerivationIndex(index));
        }
        Ok(KeyOrigin::new(master_fp, derivation))
    }
}

/// Extended public key in its 78-byte BIP32 serialization. Only the fields
/// needed for byte-exact round-tripping and structural validation are parsed;
/// no derivation is performed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Xpub {
    pub testnet: bool,
    pub depth: u8,
    pub parent_fp: Fingerprint,
    pub child_number: DerivationIndex,
    pub chain_code: [u8; 32],
    pub pubkey: PublicKey,
}

impl Xpub {
    pub fn decode(data: [u8; 78]) -> Result<Self, XpubDecodeError> {
        let version = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let testnet = match version {
            VER_MAINNET => false,
            VER_TESTNET => true,
            unknown => return Err(XpubDecodeError::UnknownKeyVersion(unknown)),
        };

        let depth = data[4];

        let mut parent_fp = [0u8; 4];
        parent_fp.copy_from_slice(&data[5..9]);

        let child_number = u32::from_be_bytes([data[9], data[10], data[11], data[12]]);

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        let pubkey =
            PublicKey::from_slice(&data[45..78]).map_err(|_| XpubDecodeError::InvalidPubkey)?;

        Ok(Xpub {
            testnet,
            depth,
            parent_fp: Fingerprint::from_byte_array(parent_fp),
            child_number: DerivationIndex(child_number),
            chain_code,
            pubkey,
        })
    }

    pub fn encode(&self) -> [u8; 78] {
        let mut data = [0u8; 78];
        let version = if self.testnet { VER_TESTNET } else { VER_MAINNET };
        data[0..4].copy_from_slice(&version.to_be_bytes());
        data[4] = self.depth;
        data[5..9].copy_from_slice(self.parent_fp.as_ref());
        data[9..13].copy_from_slice(&self.child_number.index().to_be_bytes());
        data[13..45].copy_from_slice(&self.chain_code);
        data[45..78].copy_from_slice(&self.pubkey.serialize());
        data
    }
}

impl Encode for Xpub {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        writer.write_all(&Xpub::encode(self))?;
        Ok(78)
    }
}

impl Decode for Xpub {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; 78];
        reader.read_exact(&mut buf)?;
        Xpub::decode(buf).map_err(DecodeError::from)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_display() {
        assert_eq!(DerivationIndex::normal(42).to_string(), "42");
        assert_eq!(DerivationIndex::hardened(84).to_string(), "84h");
    }

    #[test]
    fn origin_display() {
        let origin = KeyOrigin::new(Fingerprint::from_byte_array([0xAA, 0xBB, 0xCC, 0xDD]), vec![
            DerivationIndex::hardened(48),
            DerivationIndex::hardened(0),
            DerivationIndex::normal(2),
        ]);
        assert_eq!(origin.to_string(), "aabbccdd/48h/0h/2");
    }

    #[test]
    fn origin_codec() {
        let origin = KeyOrigin::new(Fingerprint::from_byte_array([1, 2, 3, 4]), vec![
            DerivationIndex::hardened(48),
            DerivationIndex::normal(1),
        ]);
        let mut data = Vec::new();
        origin.encode(&mut data).unwrap();
        assert_eq!(data.len(), 12);
        assert_eq!(KeyOrigin::deserialize(&data).unwrap(), origin);
    }
}
