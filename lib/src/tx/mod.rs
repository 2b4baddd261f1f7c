// Copyright (c) 2022-2023 The Klaytn Authors

//! Transaction APIs
//!
//! Pre-image decoding, chunking and signature assembly for Klaytn
//! transactions, along with the [KlaytnTransaction] seam used to accept
//! transaction objects from external transaction models.

use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use ledger_klaytn_apdu::tx::TxKind;

use crate::Error;

mod decode;
pub use decode::TxInfo;

mod chunk;
pub use chunk::chunk_payload;

mod signature;
pub use signature::Signature;

/// Transaction objects that may be signed by the device
pub trait KlaytnTransaction {
    /// Transaction kind, selecting the signing instruction and fee variant
    fn kind(&self) -> TxKind;

    /// RLP encoded signing pre-image
    fn rlp_for_signature(&self) -> Vec<u8>;
}

/// Unsigned transaction, a kind and an RLP encoded pre-image
///
/// Serialised as `{ "kind": "...", "preimage": "0x..." }`, where the kind
/// may be provided as a kebab-case name (`fee-delegated-cancel`) or an SDK
/// type name (`TxTypeFeeDelegatedCancel`).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct UnsignedTx {
    /// Transaction kind
    #[serde(with = "kind_str")]
    pub kind: TxKind,

    /// RLP encoded signing pre-image
    #[serde(with = "hex_str")]
    pub preimage: Vec<u8>,
}

impl UnsignedTx {
    /// Create a new unsigned transaction
    pub fn new(kind: TxKind, preimage: Vec<u8>) -> Self {
        Self { kind, preimage }
    }
}

impl KlaytnTransaction for UnsignedTx {
    fn kind(&self) -> TxKind {
        self.kind
    }

    fn rlp_for_signature(&self) -> Vec<u8> {
        self.preimage.clone()
    }
}

/// Parse a transaction kind from a kebab-case or SDK type name
pub fn parse_kind(s: &str) -> Result<TxKind, Error> {
    if let Ok(k) = TxKind::from_str(s) {
        return Ok(k);
    }

    TxKind::from_type_name(s).ok_or_else(|| Error::UnknownKind(s.to_string()))
}

/// Per-call signing state
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum SignState {
    #[default]
    Idle,
    PreimageReady,
    Chunked,
    /// Command `n` of the exchange is in flight
    Dispatching(usize),
    ResponseCollected,
    SignatureAssembled,
    Rejected,
    TransportFailed,
}

impl SignState {
    /// Whether this state ends a signing call
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignState::SignatureAssembled | SignState::Rejected | SignState::TransportFailed
        )
    }

    /// Move to the next state, logging the transition
    pub fn transition(&mut self, next: SignState) {
        debug!("Sign state: {} -> {}", self, next);
        *self = next;
    }
}

impl std::fmt::Display for SignState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignState::Dispatching(n) => write!(f, "Dispatching({n})"),
            s => write!(f, "{s:?}"),
        }
    }
}

/// Serde helpers for transaction kinds as strings
mod kind_str {
    use ledger_klaytn_apdu::tx::TxKind;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(kind: &TxKind, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(kind)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TxKind, D::Error> {
        let s = String::deserialize(d)?;
        super::parse_kind(&s).map_err(D::Error::custom)
    }
}

/// Serde helpers for `0x` prefixed hex byte strings
mod hex_str {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s.trim_start_matches("0x")).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(
            parse_kind("fee-delegated-smart-contract-execution").unwrap(),
            TxKind::FeeDelegatedSmartContractExecution
        );
        assert_eq!(
            parse_kind("TxTypeFeeDelegatedCancelWithRatio").unwrap(),
            TxKind::FeeDelegatedCancelWithRatio
        );
        assert!(matches!(
            parse_kind("value-transfer-deluxe"),
            Err(Error::UnknownKind(_))
        ));
    }

    #[test]
    fn unsigned_tx_json() {
        let j = r#"{ "kind": "TxTypeValueTransfer", "preimage": "0xc20801" }"#;

        let tx: UnsignedTx = serde_json::from_str(j).unwrap();
        assert_eq!(tx.kind(), TxKind::ValueTransfer);
        assert_eq!(tx.rlp_for_signature(), vec![0xc2, 0x08, 0x01]);

        let v = serde_json::to_value(&tx).unwrap();
        assert_eq!(v["kind"], "value-transfer");
        assert_eq!(v["preimage"], "0xc20801");
    }

    #[test]
    fn sign_state_display() {
        let mut s = SignState::default();
        assert_eq!(s, SignState::Idle);

        s.transition(SignState::Dispatching(2));
        assert_eq!(s.to_string(), "Dispatching(2)");
        assert!(!s.is_terminal());

        s.transition(SignState::Rejected);
        assert!(s.is_terminal());
    }
}
