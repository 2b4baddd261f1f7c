// Copyright (c) 2022-2023 The Klaytn Authors

//! Signature assembly from raw device responses

use std::fmt::Display;

use log::{debug, warn};
use num_bigint::BigUint;
use num_traits::Num;
use serde::{Deserialize, Serialize};

use ledger_klaytn_apdu::sign::RawSignature;

use super::TxInfo;
use crate::Error;

/// Largest `v` representable in the device's single recovery byte
const MAX_ONE_BYTE_V: u32 = 255;

/// Chain signature `(v, r, s)`, serialised as hex strings
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(try_from = "SignatureHex", into = "SignatureHex")]
pub struct Signature {
    /// Recovery value, parity folded with the chain id where required
    pub v: BigUint,
    /// R component (big endian)
    pub r: [u8; 32],
    /// S component (big endian)
    pub s: [u8; 32],
}

impl Signature {
    /// Assemble a chain signature from a raw device signature and the
    /// information decoded from the signed pre-image
    pub fn assemble(raw: &RawSignature, info: &TxInfo) -> Self {
        let one_byte_chain_id = ((info.chain_id_truncated as u64 * 2 + 35) % 256) as u8;

        // Device folds the truncated chain id into the recovery byte modulo 256
        let parity = raw.recovery.wrapping_sub(one_byte_chain_id);
        if parity > 1 {
            warn!(
                "Unexpected recovery parity {} (recovery byte 0x{:02x}, chain id {})",
                parity, raw.recovery, info.chain_id
            );
        }

        let folded = &info.chain_id * 2u32 + 35u32;

        let v = match &folded + 1u32 > BigUint::from(MAX_ONE_BYTE_V) {
            true if info.kind.is_typed() => BigUint::from(parity % 2),
            true => folded + parity,
            false => BigUint::from(raw.recovery),
        };

        debug!(
            "Assembled {} signature (recovery byte 0x{:02x}, v 0x{:x})",
            info.kind, raw.recovery, v
        );

        Self {
            v,
            r: raw.r,
            s: raw.s,
        }
    }

    /// Hex encoded `v`, left padded to an even number of digits
    pub fn v_hex(&self) -> String {
        let v = format!("{:x}", self.v);
        match v.len() % 2 {
            0 => v,
            _ => format!("0{v}"),
        }
    }

    /// Hex encoded `r`
    pub fn r_hex(&self) -> String {
        hex::encode(self.r)
    }

    /// Hex encoded `s`
    pub fn s_hex(&self) -> String {
        hex::encode(self.s)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "v: {}, r: {}, s: {}",
            self.v_hex(),
            self.r_hex(),
            self.s_hex()
        )
    }
}

/// Hex string representation for signature serialisation
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SignatureHex {
    v: String,
    r: String,
    s: String,
}

impl From<Signature> for SignatureHex {
    fn from(s: Signature) -> Self {
        Self {
            v: s.v_hex(),
            r: s.r_hex(),
            s: s.s_hex(),
        }
    }
}

impl TryFrom<SignatureHex> for Signature {
    type Error = Error;

    fn try_from(h: SignatureHex) -> Result<Self, Self::Error> {
        let strip = |s: &str| s.trim_start_matches("0x").to_string();

        let v = BigUint::from_str_radix(&strip(&h.v), 16).map_err(|_| Error::InvalidSignature)?;

        let (mut r, mut s) = ([0u8; 32], [0u8; 32]);
        hex::decode_to_slice(strip(&h.r), &mut r).map_err(|_| Error::InvalidSignature)?;
        hex::decode_to_slice(strip(&h.s), &mut s).map_err(|_| Error::InvalidSignature)?;

        Ok(Self { v, r, s })
    }
}
