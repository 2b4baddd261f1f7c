// Copyright (c) 2022-2023 The Klaytn Authors

//! BIP32 derivation paths and their binary encoding

use core::{fmt::Display, str::FromStr};

use byteorder::{BigEndian, ByteOrder};
use encdec::{DecodeOwned, Encode};
use heapless::Vec;

use crate::ApduError;

/// Hardened derivation bit
pub const HARDENED: u32 = 0x8000_0000;

/// Maximum supported path depth
pub const MAX_PATH_DEPTH: usize = 10;

/// Default Klaytn path prefix (`44'/8217'`)
pub const KLAY_COIN_TYPE: u32 = 8217;

/// BIP32 derivation path, an ordered list of (optionally hardened) indices.
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     COUNT     |                 INDEX[0] (u32 BE)             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |               |             INDEX[1..COUNT] ...               /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bip32Path(Vec<u32, MAX_PATH_DEPTH>);

/// Errors parsing a [Bip32Path]
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum PathError {
    /// Path contains no indices
    Empty,
    /// Path exceeds [MAX_PATH_DEPTH]
    TooDeep,
    /// Segment is not a decimal index
    InvalidSegment,
    /// Index does not fit in 31 bits
    IndexOutOfRange,
}

impl Bip32Path {
    /// Create a path from raw (already hardened) indices
    pub fn from_indices(indices: &[u32]) -> Result<Self, PathError> {
        if indices.is_empty() {
            return Err(PathError::Empty);
        }

        Vec::from_slice(indices)
            .map(Self)
            .map_err(|_| PathError::TooDeep)
    }

    /// Default Klaytn account path, `44'/8217'/{account}'/0/0`
    pub fn klaytn(account: u32) -> Result<Self, PathError> {
        if account >= HARDENED {
            return Err(PathError::IndexOutOfRange);
        }

        Self::from_indices(&[
            44 | HARDENED,
            KLAY_COIN_TYPE | HARDENED,
            account | HARDENED,
            0,
            0,
        ])
    }

    /// Fetch path indices (hardened bit included)
    pub fn indices(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for Bip32Path {
    type Err = PathError;

    /// Parse a path string, rejecting malformed segments
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("m/")
            .or_else(|| s.strip_prefix("M/"))
            .unwrap_or(s);

        let mut indices = Vec::<u32, MAX_PATH_DEPTH>::new();

        for segment in s.split('/') {
            let (digits, hardened) = match segment.strip_suffix(['\'', 'h', 'H']) {
                Some(d) => (d, true),
                None => (segment, false),
            };

            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PathError::InvalidSegment);
            }

            let index: u32 = digits.parse().map_err(|_| PathError::IndexOutOfRange)?;
            if index >= HARDENED {
                return Err(PathError::IndexOutOfRange);
            }

            let index = if hardened { index | HARDENED } else { index };
            indices.push(index).map_err(|_| PathError::TooDeep)?;
        }

        if indices.is_empty() {
            return Err(PathError::Empty);
        }

        Ok(Self(indices))
    }
}

impl Display for Bip32Path {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }

            match index & HARDENED != 0 {
                true => write!(f, "{}'", index & !HARDENED)?,
                false => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

impl Encode for Bip32Path {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(1 + self.0.len() * 4)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.encode_len()?;
        if buff.len() < n {
            return Err(ApduError::InvalidLength);
        }

        buff[0] = self.0.len() as u8;
        for (i, index) in self.0.iter().enumerate() {
            BigEndian::write_u32(&mut buff[1 + i * 4..][..4], *index);
        }

        Ok(n)
    }
}

impl DecodeOwned for Bip32Path {
    type Output = Self;
    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let count = *buff.first().ok_or(ApduError::InvalidLength)? as usize;
        if count == 0 || count > MAX_PATH_DEPTH {
            return Err(ApduError::InvalidEncoding);
        }

        let n = 1 + count * 4;
        if buff.len() < n {
            return Err(ApduError::InvalidLength);
        }

        let mut indices = Vec::new();
        for i in 0..count {
            let index = BigEndian::read_u32(&buff[1 + i * 4..][..4]);
            indices
                .push(index)
                .map_err(|_| ApduError::InvalidEncoding)?;
        }

        Ok((Self(indices), n))
    }
}
