// Copyright (c) 2022-2023 The Klaytn Authors

//! Pre-image chunking for multi-command signing exchanges

use encdec::Encode;
use log::debug;

use ledger_klaytn_apdu::{path::Bip32Path, sign::Protocol};

use crate::Error;

/// Split a path and pre-image into command payloads for the provided
/// [Protocol] revision.
///
/// Under [Protocol::V2] the encoded path is returned as its own leading
/// payload, under [Protocol::V1] it is prefixed onto the first data payload.
///
/// Where `trailer_offset` is non-zero, chunk boundaries never fall inside
/// `[trailer_offset, len)` and a chunk never begins at the trailer: a chunk
/// that would end inside the trailer instead ends one byte before it, so the
/// following chunk carries the trailer whole.
pub fn chunk_payload(
    path: &Bip32Path,
    preimage: &[u8],
    trailer_offset: usize,
    protocol: Protocol,
) -> Result<Vec<Vec<u8>>, Error> {
    let len = preimage.len();
    if len == 0 {
        return Err(Error::MalformedPreimage("empty pre-image".to_string()));
    }
    if trailer_offset >= len {
        return Err(Error::MalformedPreimage(format!(
            "trailer offset {trailer_offset} exceeds pre-image length {len}"
        )));
    }

    let mut path_buff = [0u8; 64];
    let path_len = path.encode(&mut path_buff)?;
    let path = &path_buff[..path_len];

    let max = protocol.max_chunk();
    let mut chunks = Vec::new();

    // Path and first chunk budget depend on protocol revision
    let mut window = match protocol.embeds_path() {
        true => max - path_len,
        false => {
            chunks.push(path.to_vec());
            max
        }
    };

    let mut start = 0;
    while start < len {
        let mut end = (start + window).min(len);

        // Never split the trailer, nor start a chunk on it
        if trailer_offset > 0 && end < len && end >= trailer_offset {
            end = trailer_offset - 1;

            if end <= start {
                return Err(Error::MalformedPreimage(format!(
                    "trailer at {trailer_offset} does not fit the {max} byte command window"
                )));
            }
        }

        let chunk = match (protocol.embeds_path(), start) {
            (true, 0) => [path, &preimage[..end]].concat(),
            _ => preimage[start..end].to_vec(),
        };

        chunks.push(chunk);

        start = end;
        window = max;
    }

    debug!(
        "Split {} byte pre-image into {} {} commands (trailer offset {})",
        len,
        chunks.len(),
        protocol,
        trailer_offset
    );

    Ok(chunks)
}
