//! Host network interface
//!
//! On a general-purpose host the operating system owns the association, so
//! joining is a no-op and the status is derived from a routing probe towards
//! the broker: a connected UDP socket reveals which local address the kernel
//! would use, without sending any traffic.

use super::{Credentials, LinkError, LinkFailure, LinkState, NetworkInterface};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info};

pub struct HostInterface {
    probe_target: String,
    address: Option<IpAddr>,
}

impl HostInterface {
    /// `host` and `port` are the endpoint the link must be able to reach
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            probe_target: format!("{host}:{port}"),
            address: None,
        }
    }

    async fn probe(&self) -> (LinkState, Option<IpAddr>) {
        let target = match tokio::net::lookup_host(&self.probe_target).await {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => return (LinkState::Joining, None),
            },
            Err(e) => {
                debug!(target = %self.probe_target, error = %e, "Probe target did not resolve");
                return (LinkState::Joining, None);
            }
        };

        let bind_addr: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = match UdpSocket::bind(bind_addr).await {
            Ok(socket) => socket,
            Err(e) => {
                debug!(error = %e, "Failed to open probe socket");
                return (LinkState::Failed(LinkFailure::Other), None);
            }
        };

        if let Err(e) = socket.connect(target).await {
            debug!(%target, error = %e, "No route to probe target");
            return (LinkState::Down, None);
        }

        match socket.local_addr() {
            Ok(local) if !local.ip().is_unspecified() => (LinkState::Up, Some(local.ip())),
            Ok(_) => (LinkState::JoinedNoAddress, None),
            Err(_) => (LinkState::JoinedNoAddress, None),
        }
    }
}

#[async_trait]
impl NetworkInterface for HostInterface {
    async fn begin_join(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        if !credentials.ssid.is_empty() {
            info!(ssid = %credentials.ssid, "Association is managed by the host, waiting for route");
        }
        Ok(())
    }

    async fn status_code(&mut self) -> i32 {
        let (state, address) = self.probe().await;
        self.address = address;
        state.code()
    }

    async fn address(&mut self) -> Option<IpAddr> {
        self.address
    }
}
