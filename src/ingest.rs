//! ==============================================================================
//! ingest.rs - udp sensor ingestor
//! ==============================================================================
//!
//! purpose:
//!     receives sensor datagrams over udp and upserts them into the record store.
//!
//! per datagram:
//!     1. recv up to `max_datagram_bytes`, decode utf-8 dropping bad bytes, trim
//!     2. parse json, require an object with `zone_id` (else log + drop)
//!     3. stamp `last_updated` and `sender_ip`
//!     4. reload store from disk, upsert by zone, write it back with fsync
//!
//! one datagram is fully handled before the next `recv_from`. no reply is ever
//! sent. socket and disk write errors end the loop (and the process).
//!
//! ==============================================================================

use crate::config::IngestConfig;
use crate::domain::{self, Rejection, SensorRecord};
use crate::store::RecordStore;

use anyhow::{Context, Result};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::UdpSocket;

/// what happened to one datagram
#[derive(Debug)]
pub enum Outcome {
    Stored { zone_id: Value, updated: bool },
    Rejected(Rejection),
}

/// decode datagram bytes as utf-8, dropping invalid sequences, and trim
pub fn decode_datagram(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text.trim().to_string()
}

/// owns the socket and the store location for the process lifetime
pub struct Ingestor {
    socket: UdpSocket,
    store_path: PathBuf,
    max_datagram_bytes: usize,
}

impl Ingestor {
    pub async fn bind(config: &IngestConfig) -> Result<Self> {
        let addr = config.bind_addr();
        let socket = UdpSocket::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind udp socket on {}", addr))?;
        Ok(Self {
            socket,
            store_path: config.store_path.clone(),
            max_datagram_bytes: config.max_datagram_bytes,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// receive loop; only returns on a socket or store write error
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            addr = %self.local_addr()?,
            store = %self.store_path.display(),
            "[INGEST] UDP server listening"
        );
        let mut buf = vec![0u8; self.max_datagram_bytes];

        loop {
            let (len, sender) = self
                .socket
                .recv_from(&mut buf)
                .await
                .context("udp receive failed")?;
            self.handle_datagram(&buf[..len], sender).await?;
        }
    }

    /// handle one datagram end to end
    ///
    /// malformed input is logged and reported as `Outcome::Rejected`;
    /// only store write failures come back as `Err`.
    pub async fn handle_datagram(&self, bytes: &[u8], sender: SocketAddr) -> Result<Outcome> {
        let text = decode_datagram(bytes);

        let mut record = match SensorRecord::parse(&text) {
            Ok(record) => record,
            Err(rejection) => {
                match &rejection {
                    Rejection::InvalidJson(e) => tracing::warn!(
                        from = %sender,
                        raw = %text,
                        error = %e,
                        "[INGEST] invalid json"
                    ),
                    other => tracing::warn!(from = %sender, raw = %text, "[INGEST] {}", other),
                }
                return Ok(Outcome::Rejected(rejection));
            }
        };

        record.stamp(sender.ip(), domain::local_timestamp());
        let zone_id = record.zone_id().clone();

        // blocking file io, awaited so packets stay strictly sequential
        let path = self.store_path.clone();
        let upsert = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut store = RecordStore::load(&path);
            let upsert = store.upsert(record);
            store.save(&path)?;
            Ok(upsert)
        })
        .await
        .context("store task join error")??;

        tracing::info!(
            zone_id = %domain::zone_label(&zone_id),
            updated = upsert.is_update(),
            from = %sender,
            "[INGEST] stored reading"
        );

        Ok(Outcome::Stored {
            zone_id,
            updated: upsert.is_update(),
        })
    }
}
