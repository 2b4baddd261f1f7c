// Copyright (c) 2022-2023 The Klaytn Authors

use ledger_klaytn_apdu::{path::PathError, status::StatusWord, ApduError};
use tokio::time::error::Elapsed;

/// Ledger Klaytn API Error Type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HID Init Error
    #[error("could not create HidApi instance")]
    HidInit,

    /// HID API error
    #[cfg(feature = "transport_hid")]
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// Transport error (link failure, device disconnected)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Device returned a failure status word
    #[error("Device returned status 0x{0:04x} ({})", status_name(.0))]
    Status(u16),

    /// User rejected the request on the device
    #[error("Operation rejected by user")]
    UserRejected,

    /// Pre-image could not be decoded for the transaction kind
    #[error("Malformed transaction pre-image: {0}")]
    MalformedPreimage(String),

    /// Unrecognised transaction kind
    #[error("Unknown transaction kind: {0}")]
    UnknownKind(String),

    /// Invalid BIP32 derivation path
    #[error("Invalid derivation path: {0}")]
    InvalidPath(PathError),

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Unexpected APDU response
    #[error("Unexpected APDU response")]
    UnexpectedResponse,

    /// APDU encoding / decoding error
    #[error("APDU error: {0}")]
    Apdu(ApduError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request timeout
    #[error("Timeout waiting for device response")]
    RequestTimeout,

    /// No device found
    #[error("No device found")]
    NoDevice,
}

/// Helper to name known status words for display
fn status_name(sw: &u16) -> String {
    match StatusWord::decode(*sw) {
        Some(s) => s.to_string(),
        None => "Unknown".to_string(),
    }
}

impl From<ApduError> for Error {
    fn from(e: ApduError) -> Self {
        Error::Apdu(e)
    }
}

impl From<PathError> for Error {
    fn from(e: PathError) -> Self {
        Error::InvalidPath(e)
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::RequestTimeout
    }
}

impl From<rlp::DecoderError> for Error {
    fn from(e: rlp::DecoderError) -> Self {
        Error::MalformedPreimage(e.to_string())
    }
}
