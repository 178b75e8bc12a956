//! Connection-resilience supervisor
//!
//! An explicit state machine over [`SupervisorState`]. [`Supervisor::step`]
//! performs exactly one transition together with its side effects, and
//! [`Supervisor::run`] steps forever. Link and session failures at any point
//! unwind to `Backoff`, which drops the session, waits the retry delay and
//! starts over from the link check. Sensor failures only skip a publish.
//!
//! The supervisor is the sole owner of the session handle, so at most one
//! session exists at any time.

pub mod state;
pub mod stats;

use crate::config::{BridgeConfig, ConfigError};
use crate::discovery::{publish_discovery, DiscoveryDescriptor, PAYLOAD_ONLINE};
use crate::indicator::StatusIndicator;
use crate::link::{Credentials, LinkManager, NetworkInterface};
use crate::sensor::{SensorAdapter, SensorDriver};
use crate::transport::{Session, SessionConnector, SessionError, SessionOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use state::{BackoffCause, FailureLayer, SupervisorState};
pub use stats::{RetryPolicy, SupervisorStats};

/// Static inputs of the supervisor, resolved once at startup
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub credentials: Credentials,
    pub join_timeout_ticks: u32,
    pub session: SessionOptions,
    pub descriptor: DiscoveryDescriptor,
    pub refresh_interval: Duration,
    pub retry: RetryPolicy,
}

impl SupervisorSettings {
    /// Resolve settings from configuration; credentials come from the environment
    pub fn from_config(config: &BridgeConfig, client_id: String) -> Result<Self, ConfigError> {
        let descriptor = DiscoveryDescriptor::for_device(&config.device, &config.topics());
        let session = SessionOptions::new(client_id, config.broker_address()?)
            .with_credentials(config.get_mqtt_username()?, config.get_mqtt_password()?)
            .with_keepalive(config.keepalive())
            .with_last_will(descriptor.last_will());

        Ok(Self {
            credentials: config.network_credentials()?,
            join_timeout_ticks: config.network.join_timeout_ticks,
            session,
            descriptor,
            refresh_interval: config.refresh_interval(),
            retry: RetryPolicy::fixed(config.retry_delay()),
        })
    }
}

pub struct Supervisor<N, C, D, I>
where
    N: NetworkInterface,
    C: SessionConnector,
    D: SensorDriver,
    I: StatusIndicator,
{
    link: LinkManager<N>,
    connector: C,
    sensor: SensorAdapter<D>,
    indicator: I,
    settings: SupervisorSettings,
    session: Option<C::Session>,
    stats: SupervisorStats,
    backoff_attempt: u32,
}

impl<N, C, D, I> Supervisor<N, C, D, I>
where
    N: NetworkInterface,
    C: SessionConnector,
    D: SensorDriver,
    I: StatusIndicator,
{
    pub fn new(
        link: LinkManager<N>,
        connector: C,
        sensor: SensorAdapter<D>,
        indicator: I,
        settings: SupervisorSettings,
    ) -> Self {
        if settings.refresh_interval >= settings.session.keepalive {
            warn!(
                refresh_secs = settings.refresh_interval.as_secs(),
                keepalive_secs = settings.session.keepalive.as_secs(),
                "Refresh interval is not shorter than the keep-alive, the broker may drop the session"
            );
        }

        Self {
            link,
            connector,
            sensor,
            indicator,
            settings,
            session: None,
            stats: SupervisorStats::default(),
            backoff_attempt: 0,
        }
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn link(&self) -> &LinkManager<N> {
        &self.link
    }

    /// Step forever. Runtime failures never escape.
    pub async fn run(&mut self) {
        let mut state = SupervisorState::Idle;
        loop {
            state = self.step(state).await;
        }
    }

    /// Perform one transition
    pub async fn step(&mut self, state: SupervisorState) -> SupervisorState {
        debug_assert!(
            !state.holds_session() || self.session.is_some(),
            "{state} without a live session"
        );

        let next = match state {
            SupervisorState::Idle => {
                match self
                    .link
                    .ensure_up(
                        &self.settings.credentials,
                        self.settings.join_timeout_ticks,
                        &mut self.indicator,
                    )
                    .await
                {
                    Ok(()) => SupervisorState::LinkUp,
                    Err(e) => SupervisorState::Backoff(e.into()),
                }
            }
            SupervisorState::LinkUp => match self.open_session().await {
                Ok(()) => SupervisorState::SessionUp,
                Err(e) => SupervisorState::Backoff(e.into()),
            },
            SupervisorState::SessionUp => match self.announce().await {
                Ok(()) => SupervisorState::DiscoverySent,
                Err(e) => SupervisorState::Backoff(e.into()),
            },
            SupervisorState::DiscoverySent => {
                info!("Starting sensor readings and publishing");
                self.backoff_attempt = 0;
                SupervisorState::Running { cycle: 1 }
            }
            SupervisorState::Running { cycle } => match self.run_cycle(cycle).await {
                Ok(()) => SupervisorState::Running { cycle: cycle + 1 },
                Err(e) => SupervisorState::Backoff(e.into()),
            },
            SupervisorState::Backoff(cause) => {
                self.back_off(cause).await;
                SupervisorState::Idle
            }
        };

        debug!(state = %next, "Supervisor transition");
        next
    }

    async fn open_session(&mut self) -> Result<(), SessionError> {
        if let Some(stale) = self.session.take() {
            stale.disconnect().await;
        }

        let session = self.connector.connect(&self.settings.session).await?;
        self.session = Some(session);
        self.stats.record_session();
        info!(
            broker = %self.settings.session.broker,
            sessions = self.stats.sessions_established,
            "Connected to MQTT Broker"
        );
        Ok(())
    }

    /// Discovery first, then availability
    async fn announce(&mut self) -> Result<(), SessionError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SessionError::broken("no live session"))?;

        publish_discovery(session, &self.settings.descriptor).await?;
        session
            .publish(
                &self.settings.descriptor.availability_topic,
                PAYLOAD_ONLINE.as_bytes().to_vec(),
                true,
            )
            .await?;
        info!(
            topic = %self.settings.descriptor.availability_topic,
            "Published availability online"
        );
        Ok(())
    }

    /// One sensor cycle: heartbeat, read, publish, poll, sleep
    async fn run_cycle(&mut self, cycle: u64) -> Result<(), SessionError> {
        self.indicator.toggle();

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SessionError::broken("no live session"))?;

        match self.sensor.read().await {
            Ok(reading) => {
                self.stats.record_reading();
                let payload = reading.to_state_payload()?;
                session
                    .publish(&self.settings.descriptor.state_topic, payload, false)
                    .await?;
                self.stats.record_publish();
                info!(
                    cycle,
                    "Published: Temp={:.1}°C, Hum={:.1}%",
                    reading.temperature,
                    reading.humidity
                );
            }
            Err(e) => {
                let consecutive = self.stats.record_sensor_failure();
                warn!(cycle, consecutive, error = %e, "Failed to read sensor");
            }
        }

        session.poll_incoming().await?;
        tokio::time::sleep(self.settings.refresh_interval).await;
        Ok(())
    }

    async fn back_off(&mut self, cause: BackoffCause) {
        self.indicator.off();
        if let Some(session) = self.session.take() {
            session.disconnect().await;
        }

        self.stats.record_backoff();
        self.backoff_attempt = self.backoff_attempt.saturating_add(1);
        let delay = self.settings.retry.delay_for(self.backoff_attempt);

        warn!(
            layer = %cause.layer,
            error = %cause.message,
            attempt = self.backoff_attempt,
            "A connection error occurred, resetting connections"
        );
        info!(delay_secs = delay.as_secs(), "Retrying in {} seconds", delay.as_secs());
        tokio::time::sleep(delay).await;
    }
}
