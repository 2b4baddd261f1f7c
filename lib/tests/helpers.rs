// Copyright (c) 2022-2023 The Klaytn Authors

//! Shared integration test helpers
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    ops::Deref,
    str::FromStr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use ledger_apdu::{APDUAnswer, APDUCommand};
use ledger_transport::Exchange;
use log::{debug, LevelFilter};
use num_bigint::BigUint;
use rlp::Rlp;
use simplelog::SimpleLogger;

use ledger_klaytn::{
    apdu::{
        path::Bip32Path,
        sign::{Protocol, SignFlags, V1_P2_CONTINUE, V2_P1_PATH},
    },
    tx::Signature,
    verify::keccak256,
    Error,
};

/// Test private key (default speculos seed, path `44'/8217'/0'/0/0`)
pub const TEST_KEY: &str = "ba988b41f30ab65c5b8df817aa27468292d089db601892b01bccf0028d0d95bb";

/// Address for [TEST_KEY]
pub const TEST_ADDRESS: &str = "0x6E93a3ACfbaDF457F29fb0E57FA42274004c32EA";

/// Receiver address used in test transactions
pub const TEST_RECEIVER: &str = "0x0EE56B604c869E3792c99E35C1C424f88F87dC8a";

/// Setup logging, level from `LOG_LEVEL` env (defaults to debug)
pub fn setup_logging() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Record / replay transport, checking each command against a transcript
/// of `=> command` / `<= response` lines.
///
/// Clones share the transcript, so a clone retained after the transport
/// is moved into a [DeviceHandle](ledger_klaytn::DeviceHandle) can check
/// it was fully consumed.
#[derive(Clone)]
pub struct ReplayTransport {
    exchanges: Arc<Mutex<VecDeque<(Vec<u8>, Vec<u8>)>>>,
}

impl ReplayTransport {
    /// Create a replay transport from a transcript
    pub fn new(transcript: &str) -> Self {
        let mut exchanges = VecDeque::new();
        let mut command = None;

        for l in transcript.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(c) = l.strip_prefix("=>") {
                command = Some(hex::decode(c.trim()).expect("invalid command hex"));
            } else if let Some(r) = l.strip_prefix("<=") {
                let c = command.take().expect("response without command");
                exchanges.push_back((c, hex::decode(r.trim()).expect("invalid response hex")));
            } else {
                panic!("invalid transcript line: '{l}'");
            }
        }

        Self {
            exchanges: Arc::new(Mutex::new(exchanges)),
        }
    }

    /// Check all recorded exchanges have been consumed
    pub fn is_done(&self) -> bool {
        self.exchanges.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl Exchange for ReplayTransport {
    type Error = Error;
    type AnswerType = Vec<u8>;

    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync,
    {
        let apdu = command.serialize();

        let next = self.exchanges.lock().unwrap().pop_front();
        let (expected, resp) =
            next.ok_or_else(|| Error::Transport("replay transcript exhausted".to_string()))?;

        assert_eq!(hex::encode(&apdu), hex::encode(&expected), "unexpected APDU");

        APDUAnswer::from_answer(resp).map_err(|_| Error::UnexpectedResponse)
    }
}

/// Command parameters recorded by [SoftDevice]
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Recorded {
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub len: usize,
}

/// Shared record of commands received by a [SoftDevice]
pub type CommandLog = Arc<Mutex<Vec<Recorded>>>;

/// Software signer emulating the Klaytn app signing flow.
///
/// Reassembles chunked pre-images for the configured protocol revision,
/// signs with k256 once the full RLP list has arrived and folds the
/// truncated chain id into the recovery byte as the device does.
pub struct SoftDevice {
    key: SigningKey,
    chain_id_truncated: u32,
    protocol: Protocol,
    reject: bool,
    data: Mutex<Vec<u8>>,
    log: CommandLog,
}

impl SoftDevice {
    pub fn new(chain_id: &BigUint, protocol: Protocol) -> Self {
        let b = chain_id.to_bytes_be();
        let mut t = [0u8; 4];
        match b.len() {
            n if n > 4 => t.copy_from_slice(&b[n - 4..]),
            n => t[4 - n..].copy_from_slice(&b),
        }

        Self {
            key: test_key(),
            chain_id_truncated: u32::from_be_bytes(t),
            protocol,
            reject: false,
            data: Mutex::new(vec![]),
            log: CommandLog::default(),
        }
    }

    /// Reject signing requests as the user would on device
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Fetch a handle to the command log, retained after the device
    /// is moved into a [DeviceHandle](ledger_klaytn::DeviceHandle)
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Handle a command, returning the response payload once signing completes
    fn handle(&self, p1: u8, p2: u8, payload: &[u8]) -> Option<Vec<u8>> {
        let mut data = self.data.lock().unwrap();

        match self.protocol {
            Protocol::V2 if p1 == V2_P1_PATH => {
                data.clear();
                return None;
            }
            Protocol::V2 => {
                data.extend_from_slice(payload);
                if SignFlags::from_bits_truncate(p2).contains(SignFlags::MORE) {
                    return None;
                }
            }
            Protocol::V1 if p2 != V1_P2_CONTINUE => {
                // Skip the path prefix
                let n = 1 + payload[0] as usize * 4;
                data.clear();
                data.extend_from_slice(&payload[n..]);
            }
            Protocol::V1 => data.extend_from_slice(payload),
        }

        // Wait for the complete RLP list
        let info = Rlp::new(&data).payload_info().ok()?;
        if data.len() < info.header_len + info.value_len {
            return None;
        }

        if self.reject {
            return Some(vec![0x00]);
        }

        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(&keccak256(&data))
            .unwrap();

        let recovery =
            ((self.chain_id_truncated as u64 * 2 + 35 + recid.to_byte() as u64) % 256) as u8;

        debug!(
            "SoftDevice signed {} bytes (recovery id {}, byte 0x{:02x})",
            data.len(),
            recid.to_byte(),
            recovery
        );

        let mut resp = vec![recovery];
        resp.extend_from_slice(&sig.to_bytes());
        Some(resp)
    }
}

#[async_trait]
impl Exchange for SoftDevice {
    type Error = Error;
    type AnswerType = Vec<u8>;

    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync,
    {
        self.log.lock().unwrap().push(Recorded {
            ins: command.ins,
            p1: command.p1,
            p2: command.p2,
            len: command.data.len(),
        });

        let mut resp = self
            .handle(command.p1, command.p2, &command.data)
            .unwrap_or_default();
        resp.extend_from_slice(&[0x90, 0x00]);

        APDUAnswer::from_answer(resp).map_err(|_| Error::UnexpectedResponse)
    }
}

/// Test derivation path, `44'/8217'/0'/0/0`
pub fn test_path() -> Bip32Path {
    Bip32Path::klaytn(0).unwrap()
}

/// Load the test signing key
pub fn test_key() -> SigningKey {
    SigningKey::from_slice(&hex::decode(TEST_KEY).unwrap()).unwrap()
}

/// Independent reference signature over a pre-image, `v` computed per
/// EIP-155 for legacy transactions or as the bare parity for typed ones
pub fn reference_signature(preimage: &[u8], chain_id: &BigUint, typed: bool) -> Signature {
    let (sig, recid) = test_key()
        .sign_prehash_recoverable(&keccak256(preimage))
        .unwrap();

    let parity = recid.to_byte() as u32;
    let folded = chain_id * 2u32 + 35u32;

    let v = match (typed, &folded + 1u32 > BigUint::from(255u32)) {
        (true, true) => BigUint::from(parity),
        (_, _) => folded + parity,
    };

    let b = sig.to_bytes();
    let (mut r, mut s) = ([0u8; 32], [0u8; 32]);
    r.copy_from_slice(&b[..32]);
    s.copy_from_slice(&b[32..]);

    Signature { v, r, s }
}
