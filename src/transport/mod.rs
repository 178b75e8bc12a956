//! Broker session layer
//!
//! [`SessionConnector`] opens a publish/subscribe session, [`Session`] is the
//! live handle. The MQTT implementation lives in [`mqtt`]; tests drive the
//! supervisor through the scripted doubles in `crate::testing`.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod mqtt;

/// Session layer errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Any I/O or protocol failure on a live or connecting session
    #[error("Session broken: {message}")]
    Broken { message: String },

    #[error("Payload serialization failed")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
}

impl SessionError {
    pub fn broken<S: Into<String>>(message: S) -> Self {
        Self::Broken {
            message: message.into(),
        }
    }
}

/// Broker endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Message the broker publishes on our behalf when the session drops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWillMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Everything needed to open a session
#[derive(Clone)]
pub struct SessionOptions {
    pub client_id: String,
    pub broker: BrokerAddress,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive: Duration,
    pub last_will: Option<LastWillMessage>,
}

impl SessionOptions {
    pub fn new(client_id: impl Into<String>, broker: BrokerAddress) -> Self {
        Self {
            client_id: client_id.into(),
            broker,
            username: None,
            password: None,
            keepalive: Duration::from_secs(60),
            last_will: None,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_last_will(mut self, last_will: LastWillMessage) -> Self {
        self.last_will = Some(last_will);
        self
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("client_id", &self.client_id)
            .field("broker", &self.broker)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keepalive", &self.keepalive)
            .field("last_will", &self.last_will)
            .finish()
    }
}

/// Opens sessions
#[async_trait::async_trait]
pub trait SessionConnector: Send {
    type Session: Session;

    /// Connect and return once the broker has accepted the session
    async fn connect(&mut self, options: &SessionOptions) -> Result<Self::Session, SessionError>;
}

/// A live broker session
///
/// A session that returned an error must not be used again; the owner
/// disconnects it and opens a fresh one.
#[async_trait::async_trait]
pub trait Session: Send {
    /// Publish; retained messages go out at QoS 1, others at QoS 0
    async fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), SessionError>;

    /// Service the connection for a short bounded window: inbound messages,
    /// acknowledgements and keep-alive
    async fn poll_incoming(&mut self) -> Result<(), SessionError>;

    /// Best-effort clean shutdown
    async fn disconnect(self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_options_builder() {
        let broker = BrokerAddress {
            host: "hub.local".to_string(),
            port: 1883,
        };
        let options = SessionOptions::new("abc123", broker)
            .with_credentials(Some("user".to_string()), Some("secret".to_string()))
            .with_keepalive(Duration::from_secs(30))
            .with_last_will(LastWillMessage {
                topic: "homeassistant/sensor/pico/status".to_string(),
                payload: "offline".to_string(),
                retain: true,
            });

        assert_eq!(options.broker.to_string(), "hub.local:1883");
        assert_eq!(options.keepalive, Duration::from_secs(30));
        assert!(options.last_will.as_ref().is_some_and(|w| w.retain));

        let rendered = format!("{options:?}");
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::broken("connection reset");
        assert_eq!(err.to_string(), "Session broken: connection reset");
        assert!(SessionError::InvalidBrokerUrl("x".into())
            .to_string()
            .contains("x"));
    }
}
