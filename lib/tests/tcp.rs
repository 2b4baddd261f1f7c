// Copyright (c) 2022-2023 The Klaytn Authors

//! Speculos TCP transport framing
#![cfg(feature = "transport_tcp")]

use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use ledger_klaytn::{
    transport::{TcpOptions, TransportTcp},
    Connect, DeviceHandle, Error, Filter, LedgerProvider,
};

mod helpers;
use helpers::*;

/// Mock speculos reply behaviour
#[derive(Clone, Copy, PartialEq, Debug)]
enum Replies {
    /// Answer every request
    Prompt,
    /// Never answer
    Silent,
    /// Answer the first request after a delay exceeding the client timeout
    SlowFirst,
}

/// Start a speculos-style APDU server answering version requests.
///
/// Each version reply increments the patch number, so a stale reply
/// read by a later request is detectable.
async fn speculos(replies: Replies) -> anyhow::Result<TcpOptions> {
    let l = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let port = l.local_addr()?.port();

    tokio::spawn(async move {
        while let Ok((mut s, _)) = l.accept().await {
            tokio::spawn(async move {
                let mut n = 0u8;
                loop {
                    let mut len = [0u8; 4];
                    if s.read_exact(&mut len).await.is_err() {
                        return;
                    }

                    let mut apdu = vec![0u8; u32::from_be_bytes(len) as usize];
                    if s.read_exact(&mut apdu).await.is_err() {
                        return;
                    }

                    if replies == Replies::Silent {
                        continue;
                    }

                    if replies == Replies::SlowFirst && n == 0 {
                        tokio::time::sleep(Duration::from_millis(1500)).await;
                    }

                    // Version for GET_VERSION, INS not supported otherwise
                    let resp: Vec<u8> = match apdu[1] {
                        0x01 => {
                            n += 1;
                            vec![0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, n, 0x90, 0x00]
                        }
                        _ => vec![0x00, 0x00, 0x00, 0x00, 0x6d, 0x00],
                    };

                    if s.write_all(&resp).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    Ok(TcpOptions {
        addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port,
        timeout_s: 1,
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_exchange() -> anyhow::Result<()> {
    setup_logging();

    let opts = speculos(Replies::Prompt).await?;

    let t = TransportTcp::new(opts).await?;
    let d = DeviceHandle::from(t);

    let v = d.app_version().await?;
    assert_eq!(v.version, "0.0.1");

    let r = d.address(&test_path(), false, 0).await;
    assert!(matches!(r, Err(Error::Status(0x6d00))), "{r:?}");

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_discovery() -> anyhow::Result<()> {
    setup_logging();

    let opts = speculos(Replies::Prompt).await?;

    let p = LedgerProvider::new()?.with_tcp_options(opts.clone());

    let devices = p.list_devices(Filter::Tcp).await;
    assert_eq!(devices.len(), 1);

    let d = Connect::<TransportTcp>::connect(&p, &opts).await?;
    assert_eq!(d.app_version().await?.version, "0.0.1");

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_timeout() -> anyhow::Result<()> {
    setup_logging();

    let opts = speculos(Replies::Silent).await?;

    let d = DeviceHandle::from(TransportTcp::new(opts).await?);

    let r = d.app_version().await;
    assert!(matches!(r, Err(Error::RequestTimeout)), "{r:?}");

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_closed_after_timeout() -> anyhow::Result<()> {
    setup_logging();

    let opts = speculos(Replies::SlowFirst).await?;

    let d = DeviceHandle::from(TransportTcp::new(opts).await?);

    let r = d.app_version().await;
    assert!(matches!(r, Err(Error::RequestTimeout)), "{r:?}");

    // Let the late 0.0.1 reply land in the socket
    tokio::time::sleep(Duration::from_millis(1000)).await;

    // Must not return the late reply to the timed out request
    let r = d.app_version().await;
    assert!(matches!(r, Err(Error::Transport(_))), "{r:?}");

    Ok(())
}
