// Copyright (c) 2022-2023 The Klaytn Authors

//! Transports for Klaytn ledger devices and the generic transport
//! abstraction for hiding underlying transport types

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    ops::Deref,
    time::Duration,
};

use async_trait::async_trait;
use ledger_apdu::{APDUAnswer, APDUCommand};
use ledger_transport::Exchange;
use log::{debug, trace, warn};
use strum::Display;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
};

#[cfg(feature = "transport_hid")]
pub use ledger_transport_hid::{LedgerHIDError, TransportNativeHID};

use crate::Error;

/// Default speculos APDU port
pub const SPECULOS_APDU_PORT: u16 = 9999;

/// TCP transport options, for connecting to a speculos instance
#[derive(Clone, Debug, PartialEq, clap::Parser)]
pub struct TcpOptions {
    /// Speculos APDU server address
    #[clap(long = "tcp-addr", env = "KLAY_TCP_ADDR", default_value = "127.0.0.1")]
    pub addr: IpAddr,

    /// Speculos APDU server port
    #[clap(long = "tcp-port", env = "KLAY_TCP_PORT", default_value_t = SPECULOS_APDU_PORT)]
    pub port: u16,

    /// Per-exchange timeout (seconds), covering user interaction on the device
    #[clap(long = "tcp-timeout", default_value_t = 60)]
    pub timeout_s: u64,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: SPECULOS_APDU_PORT,
            timeout_s: 60,
        }
    }
}

impl TcpOptions {
    /// Fetch socket address for these options
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }

    /// Fetch exchange timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }
}

/// TCP transport for the speculos APDU socket.
///
/// Commands are framed as `u32be(len) || apdu`, responses as
/// `u32be(len) || data || sw` where `len` excludes the status word.
///
/// A timed out or failed exchange may leave a partial or late response
/// in the socket, so the stream is closed and later exchanges fail.
pub struct TransportTcp {
    s: Mutex<Option<TcpStream>>,
    timeout: Duration,
}

impl TransportTcp {
    /// Connect to a speculos instance
    pub async fn new(opts: TcpOptions) -> Result<Self, Error> {
        let addr = opts.socket_addr();

        debug!("Connecting to speculos at {}", addr);

        let s = tokio::time::timeout(opts.timeout(), TcpStream::connect(addr)).await??;

        Ok(Self {
            s: Mutex::new(Some(s)),
            timeout: opts.timeout(),
        })
    }

    /// Write a framed APDU and read the framed response (data || sw)
    async fn exchange_raw(s: &mut TcpStream, apdu: &[u8]) -> Result<Vec<u8>, Error> {
        let mut req = Vec::with_capacity(4 + apdu.len());
        req.extend_from_slice(&(apdu.len() as u32).to_be_bytes());
        req.extend_from_slice(apdu);

        trace!("TCP TX: {:02x?}", req);

        s.write_all(&req).await?;

        let mut len = [0u8; 4];
        s.read_exact(&mut len).await?;

        let n = u32::from_be_bytes(len) as usize;
        let mut resp = vec![0u8; n + 2];
        s.read_exact(&mut resp).await?;

        trace!("TCP RX: {:02x?}", resp);

        Ok(resp)
    }
}

#[async_trait]
impl Exchange for TransportTcp {
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

        let mut guard = self.s.lock().await;
        let s = guard
            .as_mut()
            .ok_or_else(|| Error::Transport("connection closed".to_string()))?;

        let r = tokio::time::timeout(self.timeout, Self::exchange_raw(s, &apdu)).await;

        let resp = match r {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                warn!("TCP exchange failed, closing connection: {}", e);
                *guard = None;
                return Err(e);
            }
            Err(e) => {
                warn!("TCP exchange timed out, closing connection");
                *guard = None;
                return Err(e.into());
            }
        };

        APDUAnswer::from_answer(resp).map_err(|_| Error::UnexpectedResponse)
    }
}

/// Generic ledger device (abstract over transport types)
#[derive(Display)]
#[non_exhaustive]
pub enum GenericTransport {
    #[cfg(feature = "transport_hid")]
    Hid(TransportNativeHID),
    #[cfg(feature = "transport_tcp")]
    Tcp(TransportTcp),
}

/// Convert a HID transport into a generic transport
#[cfg(feature = "transport_hid")]
impl From<TransportNativeHID> for GenericTransport {
    fn from(t: TransportNativeHID) -> Self {
        Self::Hid(t)
    }
}

/// Convert a TCP transport into a generic transport
#[cfg(feature = "transport_tcp")]
impl From<TransportTcp> for GenericTransport {
    fn from(t: TransportTcp) -> Self {
        Self::Tcp(t)
    }
}

/// Implementation of [Exchange] for [GenericTransport], hiding transport error types
#[async_trait]
impl Exchange for GenericTransport {
    type Error = Error;
    type AnswerType = Vec<u8>;

    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync,
    {
        let r = match self {
            #[cfg(feature = "transport_hid")]
            Self::Hid(t) => t.exchange(command).await?,
            #[cfg(feature = "transport_tcp")]
            Self::Tcp(t) => t.exchange(command).await?,
            #[cfg(not(any(feature = "transport_hid", feature = "transport_tcp")))]
            _ => return Err(Error::NoDevice),
        };

        Ok(r)
    }
}

#[cfg(feature = "transport_hid")]
impl From<LedgerHIDError> for Error {
    fn from(e: LedgerHIDError) -> Self {
        match e {
            LedgerHIDError::DeviceNotFound => Error::NoDevice,
            LedgerHIDError::Hid(e) => Error::Hid(e),
            LedgerHIDError::Io(e) => Error::Io(e),
            e => Error::Transport(format!("HID: {e}")),
        }
    }
}
