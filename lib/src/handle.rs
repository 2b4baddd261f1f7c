// Copyright (c) 2022-2023 The Klaytn Authors

//! Handle for connected ledger devices
//!
//! This provides methods for interacting with the Klaytn app
//! and is generic over [Exchange] transports

use std::sync::Arc;

use encdec::{Decode, DecodeOwned};
use ledger_transport::Exchange;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use ledger_klaytn_apdu::{
    address::{AddressReq, AddressResp},
    path::Bip32Path,
    sign::{Protocol, RawSignature, SignReq, SignResp},
    status::StatusWord,
    tx::TxKind,
    version::{AppFlags, VersionReq, VersionResp},
    ApduReq, MAX_APDU_DATA,
};

use crate::{
    tx::{chunk_payload, KlaytnTransaction, SignState, Signature, TxInfo},
    Error,
};

/// Klaytn handle for a connected ledger device.
///
/// This is generic over [Exchange] types to support different
/// underlying transports
pub struct DeviceHandle<T: Exchange> {
    /// Transport for communication, locked per operation
    t: Arc<Mutex<T>>,
}

/// Clone shares the underlying transport
impl<T: Exchange> Clone for DeviceHandle<T> {
    fn clone(&self) -> Self {
        Self { t: self.t.clone() }
    }
}

/// Create a [DeviceHandle] wrapper from a type implementing [Exchange]
impl<T: Exchange> From<T> for DeviceHandle<T> {
    fn from(t: T) -> Self {
        Self {
            t: Arc::new(Mutex::new(t)),
        }
    }
}

/// Klaytn app version information
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppVersion {
    /// Version string, `major.minor.patch`
    pub version: String,
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    /// Blind signing enabled on device
    pub blind_signing: bool,
}

impl From<VersionResp> for AppVersion {
    fn from(v: VersionResp) -> Self {
        Self {
            version: v.to_string(),
            major: v.major,
            minor: v.minor,
            patch: v.patch,
            blind_signing: v.flags.contains(AppFlags::BLIND_SIGNING),
        }
    }
}

/// Account address information
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddressInfo {
    /// `0x` prefixed address
    pub address: String,
    /// Hex encoded public key
    pub public_key: String,
    /// Hex encoded BIP32 chain code, when returned by the device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_code: Option<String>,
}

impl<'a> From<AddressResp<'a>> for AddressInfo {
    fn from(r: AddressResp<'a>) -> Self {
        let address = match r.address.starts_with("0x") {
            true => r.address.to_string(),
            false => format!("0x{}", r.address),
        };

        Self {
            address,
            public_key: hex::encode(r.public_key),
            chain_code: r.chain_code.map(hex::encode),
        }
    }
}

impl<T> DeviceHandle<T>
where
    T: Exchange + Send + Sync,
    T::Error: Into<Error>,
{
    /// Fetch Klaytn app version
    pub async fn app_version(&self) -> Result<AppVersion, Error> {
        debug!("Requesting app version");

        let t = self.t.lock().await;
        let data = request(&*t, &VersionReq {}).await?;

        let (resp, _) = VersionResp::decode_owned(&data)?;

        Ok(resp.into())
    }

    /// Fetch the public key and address for the provided derivation path,
    /// optionally confirming the address on the device
    pub async fn address(
        &self,
        path: &Bip32Path,
        display: bool,
        account_index: u8,
    ) -> Result<AddressInfo, Error> {
        debug!(
            "Requesting address for path: {}, account: {} (display: {})",
            path, account_index, display
        );

        let req = AddressReq::new(path.clone(), display, account_index);

        let t = self.t.lock().await;
        let data = request(&*t, &req).await?;

        let (resp, _) = AddressResp::decode(&data)?;

        Ok(resp.into())
    }

    /// Sign a transaction pre-image using the device.
    ///
    /// The pre-image is decoded to locate the chain id and signature trailer,
    /// split into commands for the provided [Protocol] revision and streamed
    /// to the device in order. The transport is held for the whole exchange
    /// and failures are returned without retry, as resending part of an
    /// exchange would desynchronise the device.
    pub async fn sign(
        &self,
        path: &Bip32Path,
        kind: TxKind,
        preimage: &[u8],
        protocol: Protocol,
    ) -> Result<Signature, Error> {
        let mut state = SignState::default();

        debug!("Signing {} transaction ({} bytes)", kind, preimage.len());

        let info = TxInfo::decode(preimage, kind)?;
        state.transition(SignState::PreimageReady);

        let chunks = chunk_payload(path, preimage, info.trailer_offset, protocol)?;
        state.transition(SignState::Chunked);

        let t = self.t.lock().await;

        // Intermediate responses are acknowledgements only
        let mut resp = vec![];
        for (i, c) in chunks.iter().enumerate() {
            state.transition(SignState::Dispatching(i));

            let req = SignReq::new(kind, protocol.params(kind.fee(), i, chunks.len()), c);

            resp = match request(&*t, &req).await {
                Ok(r) => r,
                Err(Error::Status(sw)) if sw == StatusWord::ConditionsNotSatisfied as u16 => {
                    state.transition(SignState::Rejected);
                    return Err(Error::UserRejected);
                }
                Err(e) => {
                    state.transition(SignState::TransportFailed);
                    return Err(e);
                }
            };
        }

        state.transition(SignState::ResponseCollected);

        let raw = collect_signature(&resp, &mut state)?;

        let signature = Signature::assemble(&raw, &info);
        state.transition(SignState::SignatureAssembled);

        Ok(signature)
    }

    /// Sign a transaction object using the device
    pub async fn sign_transaction(
        &self,
        path: &Bip32Path,
        tx: &(impl KlaytnTransaction + Sync),
        protocol: Protocol,
    ) -> Result<Signature, Error> {
        let preimage = tx.rlp_for_signature();

        self.sign(path, tx.kind(), &preimage, protocol).await
    }
}

/// Decode the final signing response, moving to a terminal state on failure
fn collect_signature(resp: &[u8], state: &mut SignState) -> Result<RawSignature, Error> {
    match SignResp::decode_owned(resp) {
        Ok((SignResp::Signature(s), _)) => Ok(s),
        Ok((SignResp::Rejected, _)) => {
            state.transition(SignState::Rejected);
            Err(Error::UserRejected)
        }
        Err(_) => {
            warn!("Unexpected {} byte signing response", resp.len());
            state.transition(SignState::TransportFailed);
            Err(Error::UnexpectedResponse)
        }
    }
}

/// Helper to issue a request, checking and stripping the status word
async fn request<T, R>(t: &T, req: &R) -> Result<Vec<u8>, Error>
where
    T: Exchange + Send + Sync,
    T::Error: Into<Error>,
    R: ApduReq + Sync,
{
    let mut buff = [0u8; MAX_APDU_DATA];
    let cmd = req.command(&mut buff)?;

    debug!(
        "APDU TX: ins: {:02x}, p1: {:02x}, p2: {:02x}, data: {:02x?}",
        cmd.ins, cmd.p1, cmd.p2, cmd.data
    );

    let answer = t.exchange(&cmd).await.map_err(Into::<Error>::into)?;

    let sw = answer.retcode();
    let data = answer.data().to_vec();

    debug!("APDU RX: sw: {:04x}, data: {:02x?}", sw, data);

    if !StatusWord::is_ok(sw) {
        return Err(Error::Status(sw));
    }

    Ok(data)
}
