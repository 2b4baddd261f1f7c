// Copyright (c) 2022-2023 The Klaytn Authors

//! APDU status words returned by the Klaytn app

use num_enum::TryFromPrimitive;
use strum::Display;

/// Status words appended to every device response
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, TryFromPrimitive)]
#[repr(u16)]
pub enum StatusWord {
    /// Command completed
    Ok = 0x9000,
    /// Device is locked
    Locked = 0x5515,
    /// Klaytn app is not open
    AppNotOpen = 0x6511,
    /// Incorrect data length
    WrongLength = 0x6700,
    /// Security status not satisfied
    SecurityStatusNotSatisfied = 0x6982,
    /// Conditions of use not satisfied (request denied)
    ConditionsNotSatisfied = 0x6985,
    /// Invalid data in the command payload
    InvalidData = 0x6a80,
    /// Not enough memory to process the command
    NotEnoughMemory = 0x6a84,
    /// Incorrect P1 or P2 parameter
    WrongP1P2 = 0x6b00,
    /// Instruction not supported by the app
    InsNotSupported = 0x6d00,
    /// Class not supported by the app
    ClaNotSupported = 0x6e00,
    /// Unknown internal error
    TechnicalProblem = 0x6f00,
}

impl StatusWord {
    /// Decode a raw status word, returning `None` for unknown values
    pub fn decode(sw: u16) -> Option<Self> {
        Self::try_from(sw).ok()
    }

    /// Check whether a raw status word indicates success
    pub fn is_ok(sw: u16) -> bool {
        sw == StatusWord::Ok as u16
    }
}
