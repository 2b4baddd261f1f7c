// Copyright (c) 2022-2023 The Klaytn Authors

//! Transaction signing APDUs
//!
//! Signing streams the BIP32 path and transaction pre-image to the device in
//! one or more commands, using the instruction for the transaction family.
//! P1/P2 encode the position of each command and the fee variant, with the
//! layout depending on the [Protocol] revision supported by the app.

use encdec::{DecodeOwned, Encode};
use strum::{Display, EnumString, EnumVariantNames};

use super::{ApduError, ApduReq, Instruction};
use crate::tx::{FeeVariant, TxKind};

/// Signing protocol revision
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, Display, EnumString, EnumVariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    /// 155-byte window, path prefixed onto the first data command,
    /// P1 carries the fee variant and P2 the continuation marker
    V1,
    /// 255-byte window, path sent as its own leading command,
    /// P2 carries [SignFlags]
    #[default]
    V2,
}

/// P2 continuation marker for [Protocol::V1]
pub const V1_P2_CONTINUE: u8 = 0x80;

/// P1 for the path command under [Protocol::V2]
pub const V2_P1_PATH: u8 = 0x00;

/// P1 for data commands under [Protocol::V2]
pub const V2_P1_DATA: u8 = 0x80;

bitflags::bitflags! {
    /// Signing flags, carried in P2 under [Protocol::V2]
    pub struct SignFlags: u8 {
        /// Fee delegated transaction
        const FEE_DELEGATED = 0x01;
        /// Fee delegated with a fee ratio
        const FEE_RATIO = 0x02;
        /// Data continues a previous data command
        const EXTEND = 0x40;
        /// Further commands follow
        const MORE = 0x80;
    }
}

impl From<FeeVariant> for SignFlags {
    fn from(v: FeeVariant) -> Self {
        match v {
            FeeVariant::Basic => SignFlags::empty(),
            FeeVariant::FeeDelegated => SignFlags::FEE_DELEGATED,
            FeeVariant::FeeDelegatedWithRatio => SignFlags::FEE_DELEGATED | SignFlags::FEE_RATIO,
        }
    }
}

impl Protocol {
    /// Maximum command payload for this revision
    pub const fn max_chunk(&self) -> usize {
        match self {
            Protocol::V1 => 155,
            Protocol::V2 => 255,
        }
    }

    /// Whether the encoded path is prefixed onto the first data command
    pub const fn embeds_path(&self) -> bool {
        matches!(self, Protocol::V1)
    }

    /// Compute P1/P2 for command `index` of `count` in a signing exchange.
    ///
    /// Under [Protocol::V2] command 0 carries the path and data commands
    /// follow, under [Protocol::V1] every command carries data.
    pub fn params(&self, fee: FeeVariant, index: usize, count: usize) -> (u8, u8) {
        let last = index + 1 >= count;

        match self {
            Protocol::V1 => {
                let p2 = match index {
                    0 => 0x00,
                    _ => V1_P2_CONTINUE,
                };
                (fee as u8, p2)
            }
            Protocol::V2 => {
                let mut flags = SignFlags::from(fee);
                if !last {
                    flags |= SignFlags::MORE;
                }

                match index {
                    0 => (V2_P1_PATH, flags.bits()),
                    1 => (V2_P1_DATA, flags.bits()),
                    _ => (V2_P1_DATA, (flags | SignFlags::EXTEND).bits()),
                }
            }
        }
    }
}

/// Signing request APDU, one per chunk of a signing exchange
///
/// The payload is an opaque chunk (path, data or both depending on the
/// protocol revision), instruction and P1/P2 are computed by the host.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SignReq<'a> {
    /// Transaction kind, selecting the instruction
    pub kind: TxKind,
    /// P1 parameter
    pub p1: u8,
    /// P2 parameter
    pub p2: u8,
    /// Chunk payload
    pub data: &'a [u8],
}

impl<'a> SignReq<'a> {
    /// Create a new [SignReq] APDU
    pub fn new(kind: TxKind, (p1, p2): (u8, u8), data: &'a [u8]) -> Self {
        Self { kind, p1, p2, data }
    }
}

impl<'a> ApduReq for SignReq<'a> {
    fn ins(&self) -> Instruction {
        self.kind.instruction()
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }
}

impl<'a> Encode for SignReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.data.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.data.len();
        if buff.len() < n {
            return Err(ApduError::InvalidLength);
        }

        buff[..n].copy_from_slice(self.data);

        Ok(n)
    }
}

/// Raw recoverable signature as returned by the device
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   RECOVERY    |                                               |
/// +-+-+-+-+-+-+-+-+                                               +
/// /                      R (32-byte, big endian)                  /
/// +               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |               |                                               |
/// +-+-+-+-+-+-+-+-+                                               +
/// /                      S (32-byte, big endian)                  /
/// +               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |               |
/// +-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RawSignature {
    /// Recovery byte (possibly chain id folded)
    pub recovery: u8,
    /// R component
    pub r: [u8; 32],
    /// S component
    pub s: [u8; 32],
}

impl RawSignature {
    /// Encoded signature length
    pub const LEN: usize = 65;

    /// Build from the device byte layout
    pub fn from_bytes(b: &[u8; 65]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&b[1..33]);
        s.copy_from_slice(&b[33..65]);

        Self {
            recovery: b[0],
            r,
            s,
        }
    }

    /// Convert to the device byte layout
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut b = [0u8; 65];
        b[0] = self.recovery;
        b[1..33].copy_from_slice(&self.r);
        b[33..65].copy_from_slice(&self.s);
        b
    }
}

impl Encode for RawSignature {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(Self::LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < Self::LEN {
            return Err(ApduError::InvalidLength);
        }

        buff[..Self::LEN].copy_from_slice(&self.to_bytes());

        Ok(Self::LEN)
    }
}

impl DecodeOwned for RawSignature {
    type Output = Self;
    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let b: &[u8; 65] = buff
            .get(..Self::LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(ApduError::InvalidLength)?;

        Ok((Self::from_bytes(b), Self::LEN))
    }
}

/// Signing response, received after the final command of an exchange
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SignResp {
    /// Device produced a signature
    Signature(RawSignature),
    /// User rejected the request on the device
    Rejected,
}

impl Encode for SignResp {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        match self {
            SignResp::Signature(s) => s.encode_len(),
            SignResp::Rejected => Ok(1),
        }
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        match self {
            SignResp::Signature(s) => s.encode(buff),
            SignResp::Rejected if !buff.is_empty() => {
                buff[0] = 0x00;
                Ok(1)
            }
            SignResp::Rejected => Err(ApduError::InvalidLength),
        }
    }
}

impl DecodeOwned for SignResp {
    type Output = Self;
    type Error = ApduError;

    /// Decode a complete response payload, 65 bytes is a signature and
    /// exactly one byte the rejection marker
    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        match buff.len() {
            RawSignature::LEN => {
                let (s, n) = RawSignature::decode_owned(buff)?;
                Ok((SignResp::Signature(s), n))
            }
            1 => Ok((SignResp::Rejected, 1)),
            _ => Err(ApduError::InvalidLength),
        }
    }
}
