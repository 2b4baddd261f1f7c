// Copyright (c) 2022-2023 The Klaytn Authors

//! Pre-image decoding, locating the chain id and signature trailer

use log::debug;
use num_bigint::BigUint;
use rlp::{Rlp, RlpStream};

use ledger_klaytn_apdu::tx::TxKind;

use crate::Error;

/// Legacy pre-images carry a `[chainId, 0, 0]` trailer beyond this item count
const LEGACY_FIELDS: usize = 6;

/// Number of trailing signature placeholder items
const TRAILER_ITEMS: usize = 3;

/// Information decoded from a transaction pre-image, used to chunk the
/// pre-image and to assemble the final signature
#[derive(Clone, PartialEq, Debug)]
pub struct TxInfo {
    /// Transaction kind
    pub kind: TxKind,
    /// Full precision chain id
    pub chain_id: BigUint,
    /// Chain id truncated to 32 bits (as seen by the device)
    pub chain_id_truncated: u32,
    /// Byte offset of the `[chainId, 0, 0]` trailer, 0 if absent
    pub trailer_offset: usize,
}

impl TxInfo {
    /// Decode a pre-image for the provided transaction kind
    pub fn decode(preimage: &[u8], kind: TxKind) -> Result<Self, Error> {
        let r = Rlp::new(preimage);

        if !r.is_list() {
            return Err(Error::MalformedPreimage(
                "pre-image is not an RLP list".to_string(),
            ));
        }

        // Outer list must cover the whole pre-image
        let p = r.payload_info()?;
        if p.header_len + p.value_len != preimage.len() {
            return Err(Error::MalformedPreimage(format!(
                "RLP list length {} does not match pre-image length {}",
                p.header_len + p.value_len,
                preimage.len()
            )));
        }

        let count = r.item_count()?;

        // Locate chain id item
        let chain_id_item = match kind.is_typed() {
            true if count < 2 => {
                return Err(Error::MalformedPreimage(format!(
                    "{kind} pre-image has {count} items, expected at least 2"
                )))
            }
            true => Some(r.at(1)?),
            false if count < LEGACY_FIELDS => {
                return Err(Error::MalformedPreimage(format!(
                    "{kind} pre-image has {count} items, expected at least {LEGACY_FIELDS}"
                )))
            }
            false if count > LEGACY_FIELDS => Some(r.at(LEGACY_FIELDS)?),
            false => None,
        };

        let chain_id_raw = match &chain_id_item {
            Some(i) if i.is_list() => {
                return Err(Error::MalformedPreimage(
                    "chain id item is a list".to_string(),
                ))
            }
            Some(i) => i.data()?,
            None => &[0x01],
        };

        let chain_id = BigUint::from_bytes_be(chain_id_raw);
        let chain_id_truncated = truncate_chain_id(chain_id_raw);

        // Locate signature trailer
        let trailer_offset = match count > LEGACY_FIELDS {
            true => {
                let mut s = RlpStream::new_list(TRAILER_ITEMS);
                for i in count - TRAILER_ITEMS..count {
                    s.append_raw(r.at(i)?.as_raw(), 1);
                }
                let trailer = s.out();

                // Offset is the trailer payload, excluding its own list header
                let header_len = Rlp::new(&trailer).payload_info()?.header_len;
                preimage.len() - (trailer.len() - header_len)
            }
            false => 0,
        };

        debug!(
            "Decoded {} pre-image: {} items, chain id {} (truncated {}), trailer offset {}",
            kind, count, chain_id, chain_id_truncated, trailer_offset
        );

        Ok(Self {
            kind,
            chain_id,
            chain_id_truncated,
            trailer_offset,
        })
    }
}

/// Truncate big-endian chain id bytes to the trailing 32 bits,
/// left-padding shorter values
fn truncate_chain_id(raw: &[u8]) -> u32 {
    let mut b = [0u8; 4];

    match raw.len() {
        n if n > 4 => b.copy_from_slice(&raw[n - 4..]),
        n => b[4 - n..].copy_from_slice(raw),
    }

    u32::from_be_bytes(b)
}
