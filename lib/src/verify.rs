// Copyright (c) 2022-2023 The Klaytn Authors

//! Address derivation and signature verification helpers
//!
//! Stateless utilities for checking device responses: keccak hashing,
//! EIP-55 checksummed addresses, address derivation from SEC1 public keys
//! and signer recovery from assembled `(v, r, s)` signatures.

use std::{fmt::Display, str::FromStr};

use k256::{
    ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey,
};
use log::debug;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use sha3::{Digest, Keccak256};

use crate::{tx::Signature, Error};

/// Compute the keccak256 digest of the provided data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Klaytn account address
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Fetch address bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

/// Render address with `0x` prefix and EIP-55 checksum
impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        write!(f, "0x")?;

        for (i, c) in lower.chars().enumerate() {
            let nibble = match i % 2 {
                0 => hash[i / 2] >> 4,
                _ => hash[i / 2] & 0x0f,
            };

            match c.is_ascii_alphabetic() && nibble >= 8 {
                true => write!(f, "{}", c.to_ascii_uppercase())?,
                false => write!(f, "{c}")?,
            }
        }

        Ok(())
    }
}

impl std::fmt::LowerHex for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Parse an address from hex, with or without `0x` prefix
impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut b = [0u8; 20];
        hex::decode_to_slice(s.trim_start_matches("0x"), &mut b)?;
        Ok(Self(b))
    }
}

/// Derive an address from an SEC1 encoded (compressed or uncompressed)
/// public key
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address, Error> {
    let pk = PublicKey::from_sec1_bytes(public_key).map_err(|_| Error::InvalidSignature)?;

    Ok(address_from_point(&pk))
}

fn address_from_point(pk: &PublicKey) -> Address {
    let p = pk.to_encoded_point(false);

    // Hash the 64-byte point, skipping the SEC1 tag
    let hash = keccak256(&p.as_bytes()[1..]);

    let mut a = [0u8; 20];
    a.copy_from_slice(&hash[12..]);
    Address(a)
}

/// Recover the signer address for a pre-image and assembled signature.
///
/// `v` may be a bare parity (`0` / `1`), a legacy recovery value
/// (`27` / `28`) or chain id folded (`chain_id * 2 + 35 + {0, 1}`).
pub fn recover_address(
    preimage: &[u8],
    signature: &Signature,
    chain_id: &BigUint,
) -> Result<Address, Error> {
    let parity = recovery_parity(&signature.v, chain_id).ok_or(Error::InvalidSignature)?;

    let sig = EcdsaSignature::from_scalars(signature.r, signature.s)
        .map_err(|_| Error::InvalidSignature)?;

    // Recovery expects low-s, negating s flips the y parity
    let (sig, parity) = match sig.normalize_s() {
        Some(n) => (n, parity ^ 1),
        None => (sig, parity),
    };

    let recovery_id = RecoveryId::from_byte(parity).ok_or(Error::InvalidSignature)?;

    let hash = keccak256(preimage);
    let vk = VerifyingKey::recover_from_prehash(&hash, &sig, recovery_id)
        .map_err(|_| Error::InvalidSignature)?;

    let address = address_from_point(&PublicKey::from(&vk));

    debug!("Recovered signer {} (v: {:x})", address, signature.v);

    Ok(address)
}

/// Resolve the y parity from a recovery value
fn recovery_parity(v: &BigUint, chain_id: &BigUint) -> Option<u8> {
    let folded = chain_id * 2u32 + 35u32;

    if v >= &folded {
        return match (v - &folded).to_u8() {
            Some(p) if p <= 1 => Some(p),
            _ => None,
        };
    }

    match v.to_u8() {
        Some(p @ 0..=1) => Some(p),
        Some(p @ 27..=28) => Some(p - 27),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use k256::ecdsa::SigningKey;

    use super::*;

    /// Test private key, corresponding to the default speculos seed
    const TEST_KEY: &str = "ba988b41f30ab65c5b8df817aa27468292d089db601892b01bccf0028d0d95bb";

    const TEST_ADDRESS: &str = "0x6E93a3ACfbaDF457F29fb0E57FA42274004c32EA";

    #[test]
    fn keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn checksum_display() {
        let a = Address::from_str("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(a.to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert_eq!(format!("{a:#x}"), "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");

        let a = Address::from_str(TEST_ADDRESS).unwrap();
        assert_eq!(a.to_string(), TEST_ADDRESS);

        assert!(Address::from_str("0x1234").is_err());
    }

    #[test]
    fn derive_address() {
        // Uncompressed public key as returned by the device
        let pk = hex::decode("0431553d8c312ef1668adcf75f179a59accb85ffad9ea2a8ecf91049d9cdafc4706f3eb10091a459826803d353b3e3a98af0e999cd44353879930d8baf0779fde7").unwrap();
        assert_eq!(
            address_from_public_key(&pk).unwrap().to_string(),
            TEST_ADDRESS
        );

        // Compressed form of the same key
        let sk = SigningKey::from_slice(&hex::decode(TEST_KEY).unwrap()).unwrap();
        let compressed = PublicKey::from(sk.verifying_key()).to_encoded_point(true);
        assert_eq!(
            address_from_public_key(compressed.as_bytes())
                .unwrap()
                .to_string(),
            TEST_ADDRESS
        );

        assert!(address_from_public_key(&[0x04, 0x01]).is_err());
    }

    #[test]
    fn recover_parity_forms() {
        let sk = SigningKey::from_slice(&hex::decode(TEST_KEY).unwrap()).unwrap();
        let preimage = b"\xc4\x83abc";
        let chain_id = BigUint::from(8217u32);

        let (sig, recid) = sk
            .sign_prehash_recoverable(&keccak256(preimage))
            .unwrap();
        let p = recid.to_byte() as u32;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig.r().to_bytes());
        s.copy_from_slice(&sig.s().to_bytes());

        for v in [
            BigUint::from(p),
            BigUint::from(27 + p),
            BigUint::from(8217u32 * 2 + 35 + p),
        ] {
            let signature = Signature { v, r, s };
            let a = recover_address(preimage, &signature, &chain_id).unwrap();
            assert_eq!(a.to_string(), TEST_ADDRESS);
        }

        // Parity outside the folded range
        let signature = Signature {
            v: BigUint::from(8217u32 * 2 + 35 + 2),
            r,
            s,
        };
        assert!(matches!(
            recover_address(preimage, &signature, &chain_id),
            Err(Error::InvalidSignature)
        ));
    }
}
