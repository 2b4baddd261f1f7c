// Copyright (c) 2022-2023 The Klaytn Authors

use std::str::FromStr;

use ledger_klaytn::apdu::prelude::{Bip32Path, Protocol, TxKind};

/// Hex encoded bytes, with or without `0x` prefix
#[derive(Clone, PartialEq, Debug)]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s.trim_start_matches("0x")).map(HexBytes)
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for HexBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Parse a BIP32 derivation path argument
pub fn parse_path(s: &str) -> Result<Bip32Path, String> {
    Bip32Path::from_str(s).map_err(|e| format!("invalid path '{s}': {e}"))
}

/// Parse a signing protocol revision argument
pub fn parse_protocol(s: &str) -> Result<Protocol, String> {
    Protocol::from_str(s).map_err(|_| format!("unsupported protocol '{s}' (expected v1 or v2)"))
}

/// Parse a transaction kind argument (kebab-case or SDK type name)
pub fn parse_kind(s: &str) -> Result<TxKind, String> {
    ledger_klaytn::tx::parse_kind(s).map_err(|e| e.to_string())
}
