//! Impure I/O operations for the MQTT session
//!
//! The session owns both halves of the rumqttc client: the request handle and
//! the eventloop. There is no background task; the eventloop only makes
//! progress while `connect`, `publish`, `poll_incoming` or `disconnect` drive
//! it, each within a bounded window.

use super::connection::configure_mqtt_options;
use super::message_handler::{EventRoute, MessageHandler};
use crate::transport::{BrokerAddress, Session, SessionConnector, SessionError, SessionOptions};
use async_trait::async_trait;
use rumqttc::v5::{AsyncClient, Event, EventLoop};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Request channel capacity between the client handle and the eventloop
const REQUEST_CAPACITY: usize = 10;

/// Upper bound for flushing our DISCONNECT packet
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Opens MQTT sessions
#[derive(Debug, Clone)]
pub struct MqttConnector {
    connect_timeout: Duration,
    poll_window: Duration,
}

impl MqttConnector {
    pub fn new(connect_timeout: Duration, poll_window: Duration) -> Self {
        Self {
            connect_timeout,
            poll_window,
        }
    }

    /// Drive the eventloop until the broker acknowledges the connection
    async fn wait_for_connection_confirmation(
        event_loop: &mut EventLoop,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let timeout_result = tokio::time::timeout(timeout, async {
            loop {
                let event = event_loop
                    .poll()
                    .await
                    .map_err(|e| SessionError::broken(format!("Connection failed: {e}")))?;

                match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::ConnectionAcknowledged => return Ok(()),
                    EventRoute::Disconnected => {
                        return Err(SessionError::broken(
                            "Broker closed the connection before ConnAck",
                        ));
                    }
                    route => MessageHandler::trace_route(&route),
                }
            }
        })
        .await;

        match timeout_result {
            Ok(result) => result,
            Err(_) => Err(SessionError::broken(
                "ConnAck timeout - no connection confirmation received",
            )),
        }
    }
}

#[async_trait]
impl SessionConnector for MqttConnector {
    type Session = MqttSession;

    async fn connect(&mut self, options: &SessionOptions) -> Result<MqttSession, SessionError> {
        let mqtt_options = configure_mqtt_options(options);
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        info!(
            broker = %options.broker,
            client_id = %options.client_id,
            "Connecting to MQTT broker"
        );
        Self::wait_for_connection_confirmation(&mut event_loop, self.connect_timeout).await?;
        info!(broker = %options.broker, "Connected to MQTT broker");

        Ok(MqttSession {
            client,
            event_loop,
            broker: options.broker.clone(),
            poll_window: self.poll_window,
            publish_timeout: self.connect_timeout,
            broken: false,
        })
    }
}

/// A live MQTT session
pub struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    broker: BrokerAddress,
    poll_window: Duration,
    publish_timeout: Duration,
    broken: bool,
}

impl MqttSession {
    /// Record the failure so `disconnect` does not revive the eventloop
    fn fail(&mut self, message: String) -> SessionError {
        self.broken = true;
        SessionError::broken(message)
    }

    /// React to one eventloop event and hand back its route
    fn handle_event(&mut self, event: &Event) -> Result<EventRoute, SessionError> {
        let route = MessageHandler::route_mqtt_event(event);
        match &route {
            EventRoute::MessageReceived {
                topic,
                payload,
                retain,
            } => {
                info!(
                    topic = %topic,
                    retain = *retain,
                    payload = %MessageHandler::describe_payload(payload),
                    "Message received"
                );
            }
            EventRoute::Disconnected => {
                warn!(broker = %self.broker, "Broker closed the session");
                return Err(self.fail("Broker sent DISCONNECT".to_string()));
            }
            other => MessageHandler::trace_route(other),
        }
        Ok(route)
    }
}

#[async_trait]
impl Session for MqttSession {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), SessionError> {
        let qos = MessageHandler::determine_qos_level(retain);
        if let Err(e) = self.client.publish(topic, qos, retain, payload).await {
            return Err(self.fail(format!("Publishing failed: {e}")));
        }

        // The request only leaves the socket while the eventloop is driven
        let deadline = Instant::now() + self.publish_timeout;
        loop {
            let event = match tokio::time::timeout_at(deadline, self.event_loop.poll()).await {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => return Err(self.fail(format!("Connection lost: {e}"))),
                Err(_) => return Err(self.fail(format!("Publish to {topic} timed out"))),
            };

            if let EventRoute::PublishSent { packet_id } = self.handle_event(&event)? {
                debug!(topic = %topic, retain, packet_id, "Publish written");
                return Ok(());
            }
        }
    }

    async fn poll_incoming(&mut self) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.poll_window;
        loop {
            match tokio::time::timeout_at(deadline, self.event_loop.poll()).await {
                Ok(Ok(event)) => {
                    self.handle_event(&event)?;
                }
                Ok(Err(e)) => return Err(self.fail(format!("Connection lost: {e}"))),
                Err(_) => return Ok(()),
            }
        }
    }

    async fn disconnect(mut self) {
        if self.broken {
            debug!(broker = %self.broker, "Dropping broken MQTT session");
            return;
        }

        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "Disconnect request failed");
            return;
        }

        let event_loop = &mut self.event_loop;
        let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
            loop {
                match event_loop.poll().await {
                    Ok(event) => {
                        if MessageHandler::route_mqtt_event(&event) == EventRoute::DisconnectSent {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }
        })
        .await;

        if flushed.is_err() {
            debug!(broker = %self.broker, "Disconnect not flushed in time");
        }
        info!(broker = %self.broker, "MQTT session closed");
    }
}
