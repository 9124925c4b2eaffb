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

use std::fmt::{self, Display, Formatter};
use std::io::{Read, Write};

use amplify::hex::ToHex;
use amplify::IoError;
use secp256k1::{ecdsa, PublicKey};

use crate::{Decode, DecodeError, Encode, PsbtError};

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_ANYONE_CAN_PAY: u32 = 0x80;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Error)]
#[display("non-standard signature hash type {0:#010x}")]
pub struct NonStandardSighashType(pub u32);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum SighashFlag {
    /// 0x1: Sign all outputs.
    All = 0x01,
    /// 0x2: Sign no outputs --- anyone can choose the destination.
    None = 0x02,
    /// 0x3: Sign the output whose index matches this input's index.
    Single = 0x03,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SighashType {
    pub flag: SighashFlag,
    pub anyone_can_pay: bool,
}

impl SighashType {
    pub const fn all() -> Self {
        SighashType {
            flag: SighashFlag::All,
            anyone_can_pay: false,
        }
    }

    pub fn from_consensus_u32(val: u32) -> Result<Self, NonStandardSighashType> {
        let anyone_can_pay = val & SIGHASH_ANYONE_CAN_PAY == SIGHASH_ANYONE_CAN_PAY;
        let flag = match val & !SIGHASH_ANYONE_CAN_PAY {
            SIGHASH_ALL => SighashFlag::All,
            SIGHASH_NONE => SighashFlag::None,
            SIGHASH_SINGLE => SighashFlag::Single,
            _ => return Err(NonStandardSighashType(val)),
        };
        Ok(SighashType {
            flag,
            anyone_can_pay,
        })
    }

    pub fn to_consensus_u32(&self) -> u32 {
        let mut val = self.flag as u32;
        if self.anyone_can_pay {
            val |= SIGHASH_ANYONE_CAN_PAY;
        }
        val
    }

    pub fn from_psbt_u8(val: u8) -> Result<Self, NonStandardSighashType> {
        Self::from_consensus_u32(val as u32)
    }

    pub fn to_psbt_u8(&self) -> u8 { self.to_consensus_u32() as u8 }
}

impl Display for SighashType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.flag {
            SighashFlag::All => f.write_str("ALL")?,
            SighashFlag::None => f.write_str("NONE")?,
            SighashFlag::Single => f.write_str("SINGLE")?,
        }
        if self.anyone_can_pay {
            f.write_str("|ANYONECANPAY")?;
        }
        Ok(())
    }
}

impl Encode for SighashType {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        self.to_consensus_u32().encode(writer)
    }
}

impl Decode for SighashType {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let val = u32::decode(reader)?;
        Self::from_consensus_u32(val).map_err(DecodeError::from)
    }
}

/// Pre-taproot public key serialized in either compressed (33-byte) or
/// uncompressed (65-byte) form, matching the serialization used as key data of
/// partial-signature and BIP32 derivation entries.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct LegacyPk {
    pub compressed: bool,
    pub pubkey: PublicKey,
}

impl LegacyPk {
    pub const fn compressed(pubkey: PublicKey) -> Self {
        LegacyPk {
            compressed: true,
            pubkey,
        }
    }

    pub const fn uncompressed(pubkey: PublicKey) -> Self {
        LegacyPk {
            compressed: false,
            pubkey,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self.compressed {
            true => self.pubkey.serialize().to_vec(),
            false => self.pubkey.serialize_uncompressed().to_vec(),
        }
    }
}

impl Display for LegacyPk {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.serialize().to_hex()) }
}

impl Encode for LegacyPk {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let data = self.serialize();
        writer.write_all(&data)?;
        Ok(data.len())
    }
}

impl Decode for LegacyPk {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let flag = u8::decode(reader)?;
        match flag {
            0x02 | 0x03 => {
                let mut buf = [0u8; 33];
                buf[0] = flag;
                reader.read_exact(&mut buf[1..])?;
                let pubkey = PublicKey::from_slice(&buf)
                    .map_err(|_| PsbtError::InvalidComprPubkey)?;
                Ok(LegacyPk::compressed(pubkey))
            }
            0x04 => {
                let mut buf = [0u8; 65];
                buf[0] = flag;
                reader.read_exact(&mut buf[1..])?;
                let pubkey = PublicKey::from_slice(&buf)
                    .map_err(|_| PsbtError::InvalidUncomprPubkey)?;
                Ok(LegacyPk::uncompressed(pubkey))
            }
            other => Err(PsbtError::UnrecognizedKeyFormat(other).into()),
        }
    }
}

/// ECDSA signature together with the sighash type byte, as stored in
/// partial-signature values.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct LegacySig {
    pub sig: ecdsa::Signature,
    pub sighash_type: SighashType,
}

impl LegacySig {
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = self.sig.serialize_der().to_vec();
        data.push(self.sighash_type.to_psbt_u8());
        data
    }
}

impl Display for LegacySig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.serialize().to_hex()) }
}

impl Encode for LegacySig {
    fn encode(&self, writer: &mut dyn Write) -> Result<usize, IoError> {
        let sig = self.sig.serialize_der();
        writer.write_all(sig.as_ref())?;
        self.sighash_type.to_psbt_u8().encode(writer)?;
        Ok(sig.len() + 1)
    }
}

impl Decode for LegacySig {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = Vec::with_capacity(78);
        reader.read_to_end(&mut buf)?;
        let (sighash, sig) = buf.split_last().ok_or(PsbtError::EmptySig)?;
        let sig = ecdsa::Signature::from_der(sig).map_err(PsbtError::InvalidSig)?;
        let sighash_type = SighashType::from_psbt_u8(*sighash)?;
        Ok(LegacySig { sig, sighash_type })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sighash_consensus_roundtrip() {
        for val in [0x01u32, 0x02, 0x03, 0x81, 0x82, 0x83] {
            let sighash = SighashType::from_consensus_u32(val).unwrap();
            assert_eq!(sighash.to_consensus_u32(), val);
        }
    }

    #[test]
    fn sighash_nonstandard() {
        assert_eq!(SighashType::from_consensus_u32(0), Err(NonStandardSighashType(0)));
        assert_eq!(SighashType::from_consensus_u32(0x04), Err(NonStandardSighashType(0x04)));
        assert_eq!(SighashType::from_consensus_u32(0x80), Err(NonStandardSighashType(0x80)));
    }

    #[test]
    fn sighash_display() {
        assert_eq!(SighashType::all().to_string(), "ALL");
        let single_acp = SighashType::from_consensus_u32(0x83).unwrap();
        assert_eq!(single_acp.to_string(), "SINGLE|ANYONECANPAY");
    }
}
