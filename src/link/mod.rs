//! Network link management
//!
//! The link is the network association underneath any broker session. It is
//! polled through [`NetworkInterface`] and summarised as a [`LinkState`];
//! [`LinkManager::ensure_up`] drives a join attempt with a bounded poll budget.

pub mod host;

use crate::indicator::StatusIndicator;
use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use host::HostInterface;

/// Why a join attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailure {
    Other,
    NoMatchingNetwork,
    BadAuth,
    Unknown(i32),
}

/// Link status as reported by the interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Joining,
    JoinedNoAddress,
    Up,
    Failed(LinkFailure),
}

impl LinkState {
    /// Map a raw interface status code
    pub fn from_status_code(code: i32) -> Self {
        match code {
            0 => LinkState::Down,
            1 => LinkState::Joining,
            2 => LinkState::JoinedNoAddress,
            3 => LinkState::Up,
            -1 => LinkState::Failed(LinkFailure::Other),
            -2 => LinkState::Failed(LinkFailure::NoMatchingNetwork),
            -3 => LinkState::Failed(LinkFailure::BadAuth),
            other => LinkState::Failed(LinkFailure::Unknown(other)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            LinkState::Down => 0,
            LinkState::Joining => 1,
            LinkState::JoinedNoAddress => 2,
            LinkState::Up => 3,
            LinkState::Failed(LinkFailure::Other) => -1,
            LinkState::Failed(LinkFailure::NoMatchingNetwork) => -2,
            LinkState::Failed(LinkFailure::BadAuth) => -3,
            LinkState::Failed(LinkFailure::Unknown(code)) => *code,
        }
    }

    /// Polling stops once the link is up or has failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkState::Up | LinkState::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            LinkState::Down => "Link Down",
            LinkState::Joining => "Link Join",
            LinkState::JoinedNoAddress => "Link NoIP",
            LinkState::Up => "Link Up",
            LinkState::Failed(LinkFailure::Other) => "Link Fail",
            LinkState::Failed(LinkFailure::NoMatchingNetwork) => "Link NoNet",
            LinkState::Failed(LinkFailure::BadAuth) => "Link BadAuth",
            LinkState::Failed(LinkFailure::Unknown(_)) => "Unknown",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Failed(LinkFailure::Unknown(code)) => write!(f, "Unknown ({code})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Network credentials
#[derive(Clone, Default)]
pub struct Credentials {
    pub ssid: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: Option<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    #[error("Network connection failed: {0}")]
    ConnectFailed(LinkState),

    #[error("Network interface error: {message}")]
    Interface { message: String },
}

impl LinkError {
    pub fn interface<S: Into<String>>(message: S) -> Self {
        Self::Interface {
            message: message.into(),
        }
    }
}

/// Platform network interface
#[async_trait]
pub trait NetworkInterface: Send {
    /// Start associating; completion is observed through `status_code`
    async fn begin_join(&mut self, credentials: &Credentials) -> Result<(), LinkError>;

    /// Raw status code, see [`LinkState::from_status_code`]
    async fn status_code(&mut self) -> i32;

    /// Address assigned to the interface, if any
    async fn address(&mut self) -> Option<IpAddr>;

    async fn is_connected(&mut self) -> bool {
        self.status_code().await == LinkState::Up.code()
    }
}

#[async_trait]
impl<T: NetworkInterface + ?Sized> NetworkInterface for Box<T> {
    async fn begin_join(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        (**self).begin_join(credentials).await
    }

    async fn status_code(&mut self) -> i32 {
        (**self).status_code().await
    }

    async fn address(&mut self) -> Option<IpAddr> {
        (**self).address().await
    }

    async fn is_connected(&mut self) -> bool {
        (**self).is_connected().await
    }
}

pub struct LinkManager<N: NetworkInterface> {
    interface: N,
    tick: Duration,
    state: LinkState,
    address: Option<IpAddr>,
}

impl<N: NetworkInterface> LinkManager<N> {
    pub fn new(interface: N, tick: Duration) -> Self {
        Self {
            interface,
            tick,
            state: LinkState::Down,
            address: None,
        }
    }

    /// Last observed state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Address recorded when the link last came up
    pub fn address(&self) -> Option<IpAddr> {
        self.address
    }

    pub async fn is_connected(&mut self) -> bool {
        let connected = self.interface.is_connected().await;
        if !connected && self.state == LinkState::Up {
            self.state = LinkState::Down;
        }
        connected
    }

    /// Bring the link up, polling at most `timeout_ticks` times.
    ///
    /// No-op when the interface already reports a connection. The indicator
    /// blinks while joining and stays lit once the link is up.
    pub async fn ensure_up<I>(
        &mut self,
        credentials: &Credentials,
        timeout_ticks: u32,
        indicator: &mut I,
    ) -> Result<(), LinkError>
    where
        I: StatusIndicator + ?Sized,
    {
        if self.interface.is_connected().await {
            debug!("Link already up");
            self.state = LinkState::Up;
            return Ok(());
        }

        info!(ssid = %credentials.ssid, "Connecting to network");
        self.address = None;
        self.interface.begin_join(credentials).await?;

        for tick in 1..=timeout_ticks {
            let state = self.poll_state().await;
            if state.is_terminal() {
                break;
            }
            indicator.toggle();
            info!(tick, status = %state, "Waiting for network connection");
            tokio::time::sleep(self.tick).await;
        }

        indicator.off();
        let state = self.poll_state().await;
        info!(status = %state, code = state.code(), "Network status");

        if state != LinkState::Up {
            warn!(status = %state, "Network connection failed");
            return Err(LinkError::ConnectFailed(state));
        }

        indicator.on();
        self.address = self.interface.address().await;
        match self.address {
            Some(address) => info!(%address, "Network connected"),
            None => info!("Network connected"),
        }
        Ok(())
    }

    async fn poll_state(&mut self) -> LinkState {
        self.state = LinkState::from_status_code(self.interface.status_code().await);
        self.state
    }
}
