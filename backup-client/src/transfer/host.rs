//! Host-availability capability: reachability probe and wake signal.

use crate::utils::errors::{AgentError, Result};
use futures_util::future::BoxFuture;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// Answers whether the storage host is reachable right now.
pub trait HostProbe: Send + Sync {
    fn probe(&self) -> BoxFuture<'_, bool>;
}

/// Asks a sleeping storage host to power up.
pub trait WakeSignal: Send + Sync {
    fn wake(&self) -> BoxFuture<'_, Result<()>>;
}

/// Probes the storage service's health endpoint
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/health", server_url.trim_end_matches('/')),
        })
    }
}

impl HostProbe for HttpHealthProbe {
    fn probe(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.client.get(&self.url).send().await {
                Ok(resp) => resp.status().is_success(),
                Err(e) => {
                    debug!(url = %self.url, "Health probe failed: {}", e);
                    false
                }
            }
        })
    }
}

/// Wake-on-LAN magic packet sent over UDP broadcast
pub struct WakeOnLan {
    mac: [u8; 6],
    broadcast_addr: String,
}

impl WakeOnLan {
    pub fn new(mac: &str, broadcast_addr: &str) -> Result<Self> {
        Ok(Self {
            mac: parse_mac(mac)?,
            broadcast_addr: broadcast_addr.to_string(),
        })
    }
}

impl WakeSignal for WakeOnLan {
    fn wake(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let socket = UdpSocket::bind("0.0.0.0:0").await?;
            socket.set_broadcast(true)?;
            socket
                .send_to(&magic_packet(&self.mac), self.broadcast_addr.as_str())
                .await?;
            Ok(())
        })
    }
}

/// Accepts `001A2B3C4D5E` or the same with any single-character separator
pub fn parse_mac(mac: &str) -> Result<[u8; 6]> {
    let digits: String = match mac.len() {
        12 => mac.to_string(),
        17 => {
            let sep = mac.as_bytes()[2] as char;
            mac.split(sep).collect()
        }
        _ => String::new(),
    };

    let invalid = || AgentError::Configuration(format!("invalid MAC address: {}", mac));
    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let mut bytes = [0u8; 6];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let pair = digits.get(i * 2..i * 2 + 2).ok_or_else(invalid)?;
        *byte = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
    }
    Ok(bytes)
}

/// Six `0xFF` bytes followed by the MAC repeated sixteen times
fn magic_packet(mac: &[u8; 6]) -> Vec<u8> {
    let mut packet = vec![0xFF; 6];
    for _ in 0..16 {
        packet.extend_from_slice(mac);
    }
    packet
}
