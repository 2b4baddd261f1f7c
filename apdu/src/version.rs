// Copyright (c) 2022-2023 The Klaytn Authors

//! Application version APDUs

use core::fmt::Display;

use encdec::{DecodeOwned, Encode};

use super::{ApduError, ApduReq, Instruction};

/// Fetch application version APDU
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct VersionReq {}

impl ApduReq for VersionReq {
    /// Version GET APDU is instruction `0x01`
    fn ins(&self) -> Instruction {
        Instruction::GetVersion
    }
}

impl Encode for VersionReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn encode(&self, _buff: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl DecodeOwned for VersionReq {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(_buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        Ok((Self {}, 0))
    }
}

bitflags::bitflags! {
    /// Application version flags
    pub struct AppFlags: u8 {
        /// Blind signing of unparsed payloads is enabled on the device
        const BLIND_SIGNING = 1 << 0;
    }
}

/// Application version response APDU
///
/// Older firmware omits the flags byte, returning only the version triple.
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     FLAGS     |     MAJOR     |     MINOR     |     PATCH     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct VersionResp {
    /// Application flags
    pub flags: AppFlags,
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Patch version
    pub patch: u8,
}

impl VersionResp {
    /// Create a new version response
    pub fn new(flags: AppFlags, major: u8, minor: u8, patch: u8) -> Self {
        Self {
            flags,
            major,
            minor,
            patch,
        }
    }
}

/// Render as `major.minor.patch`
impl Display for VersionResp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Encode for VersionResp {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(4)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < 4 {
            return Err(ApduError::InvalidLength);
        }

        buff[0] = self.flags.bits();
        buff[1] = self.major;
        buff[2] = self.minor;
        buff[3] = self.patch;

        Ok(4)
    }
}

impl DecodeOwned for VersionResp {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        match buff.len() {
            3 => Ok((
                Self::new(AppFlags::empty(), buff[0], buff[1], buff[2]),
                3,
            )),
            n if n >= 4 => Ok((
                Self::new(
                    AppFlags::from_bits_truncate(buff[0]),
                    buff[1],
                    buff[2],
                    buff[3],
                ),
                4,
            )),
            _ => Err(ApduError::InvalidLength),
        }
    }
}
