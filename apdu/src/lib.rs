// Copyright (c) 2022-2023 The Klaytn Authors

//! Protocol / APDU definitions for Klaytn app communication
//!
//! This module provides the command surface of the Klaytn hardware wallet app:
//! the class byte, instruction table, per-transaction-kind descriptors, the
//! P1/P2 control parameters for each protocol revision and the encodings of
//! request and response payloads.
//!
//! Unlike most Ledger apps, multi-byte integers in payloads are big-endian
//! (BIP32 path indices) and signatures are returned in the `recovery || r || s`
//! layout expected by the chain's transaction format.
//!

#![no_std]

use core::fmt::Debug;

pub use ledger_apdu::APDUCommand;

pub mod address;
pub mod path;
pub mod prelude;
pub mod sign;
pub mod status;
pub mod tx;
pub mod version;

/// Klaytn APDU Class
pub const KLAY_APDU_CLA: u8 = 0xe0;

/// Maximum APDU payload length (single byte `Lc`)
pub const MAX_APDU_DATA: usize = 255;

/// Klaytn APDU instruction codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum Instruction {
    /// Fetch application version
    GetVersion = 0x01,

    /// Fetch public key and address for a BIP32 path
    GetAddress = 0x02,

    /// Sign a legacy (ethereum style) transaction
    SignLegacy = 0x04,

    /// Sign a value transfer transaction
    SignValueTransfer = 0x08,

    /// Sign a value transfer with memo transaction
    SignValueTransferMemo = 0x10,

    /// Sign a smart contract deployment
    SignSmartContractDeploy = 0x28,

    /// Sign a smart contract execution
    SignSmartContractExecution = 0x30,

    /// Sign a transaction cancellation
    SignCancel = 0x38,
}

/// APDU encoding / decoding errors
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum ApduError {
    /// Buffer too short for the encoded object
    InvalidLength,
    /// Encoded object is not valid
    InvalidEncoding,
    /// Invalid UTF8 / ASCII content
    Utf8,
}

impl From<encdec::Error> for ApduError {
    fn from(e: encdec::Error) -> Self {
        match e {
            encdec::Error::Length => ApduError::InvalidLength,
            _ => ApduError::InvalidEncoding,
        }
    }
}

/// Request APDUs with a fixed class and computed instruction / P1 / P2
pub trait ApduReq: encdec::Encode<Error = ApduError> {
    /// Fetch the instruction for this request
    fn ins(&self) -> Instruction;

    /// Fetch the P1 parameter for this request
    fn p1(&self) -> u8 {
        0
    }

    /// Fetch the P2 parameter for this request
    fn p2(&self) -> u8 {
        0
    }

    /// Encode request into `buff`, returning an [APDUCommand] over the written data
    fn command<'a>(&self, buff: &'a mut [u8]) -> Result<APDUCommand<&'a [u8]>, ApduError> {
        let n = self.encode(buff)?;
        if n > MAX_APDU_DATA {
            return Err(ApduError::InvalidLength);
        }

        Ok(APDUCommand {
            cla: KLAY_APDU_CLA,
            ins: self.ins() as u8,
            p1: self.p1(),
            p2: self.p2(),
            data: &buff[..n],
        })
    }
}

#[cfg(test)]
pub(crate) mod test {
    use encdec::{Decode, Encode};

    use super::*;

    /// Helper for APDU encode / decode tests
    pub fn encode_decode_apdu<'a, A>(buff: &'a mut [u8], apdu: &A) -> usize
    where
        A: Encode<Error = ApduError> + Decode<'a, Output = A, Error = ApduError> + PartialEq + Debug,
    {
        // Encode APDU
        let n = apdu.encode(buff).expect("encode failed");

        // Ensure encoded data fits maximum APDU payload
        let m = MAX_APDU_DATA;
        assert!(n <= m, "encoded length {n} exceeds maximum APDU payload {m}");

        // Check encoded length matches expected length
        let expected_n = apdu.encode_len().expect("get length failed");
        assert_eq!(n, expected_n, "encode length mismatch");

        // Decode APDU
        let (decoded, decoded_n) = A::decode(&buff[..n]).expect("decode failed");

        // Check decoded object and length match
        assert_eq!(apdu, &decoded);
        assert_eq!(expected_n, decoded_n);

        n
    }
}
