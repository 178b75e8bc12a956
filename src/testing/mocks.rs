//! Mock implementations for testing
//!
//! Scripted network, session, sensor and indicator doubles. All of them write
//! into one shared [`Journal`] so tests can assert on the global order of side
//! effects (discovery before online before state, disconnect before retry).

use crate::indicator::StatusIndicator;
use crate::link::{Credentials, LinkError, NetworkInterface};
use crate::sensor::{RawFrame, SensorDriver, SensorError, TemperatureEncoding};
use crate::transport::{Session, SessionConnector, SessionError, SessionOptions};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;

/// One recorded side effect
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    LinkJoin { ssid: String },
    LinkStatus(i32),
    IndicatorOn,
    IndicatorOff,
    IndicatorToggle,
    Connect { client_id: String, accepted: bool },
    Publish { topic: String, payload: String, retain: bool },
    PublishFailed { topic: String },
    Poll,
    PollFailed,
    Disconnect,
    SensorRead { ok: bool },
}

/// Shared, ordered, timestamped record of side effects
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<(Instant, JournalEntry)>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: JournalEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Instant::now(), entry));
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.timed_entries().into_iter().map(|(_, e)| e).collect()
    }

    pub fn timed_entries(&self) -> Vec<(Instant, JournalEntry)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Successful publishes as `(topic, payload, retain)`
    pub fn publishes(&self) -> Vec<(String, String, bool)> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                JournalEntry::Publish {
                    topic,
                    payload,
                    retain,
                } => Some((topic, payload, retain)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&JournalEntry) -> bool) -> usize {
        self.entries().iter().filter(|e| predicate(e)).count()
    }

    /// Index of the first entry matching `predicate`
    pub fn position(&self, predicate: impl Fn(&JournalEntry) -> bool) -> Option<usize> {
        self.entries().iter().position(predicate)
    }
}

/// Scripted network interface
///
/// Each status poll consumes the next scripted code; once the script is
/// exhausted the last code repeats. Without a script the link is up.
#[derive(Debug)]
pub struct MockNetwork {
    journal: Journal,
    statuses: VecDeque<i32>,
    last: i32,
    address: IpAddr,
}

impl MockNetwork {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            statuses: VecDeque::new(),
            last: 3,
            address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)),
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = i32>) -> Self {
        self.statuses.extend(statuses);
        self
    }
}

#[async_trait]
impl NetworkInterface for MockNetwork {
    async fn begin_join(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        self.journal.record(JournalEntry::LinkJoin {
            ssid: credentials.ssid.clone(),
        });
        Ok(())
    }

    async fn status_code(&mut self) -> i32 {
        if let Some(code) = self.statuses.pop_front() {
            self.last = code;
        }
        self.journal.record(JournalEntry::LinkStatus(self.last));
        self.last
    }

    async fn address(&mut self) -> Option<IpAddr> {
        (self.last == 3).then_some(self.address)
    }
}

/// Recording indicator
#[derive(Debug)]
pub struct MockIndicator {
    journal: Journal,
    lit: bool,
}

impl MockIndicator {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            lit: false,
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl StatusIndicator for MockIndicator {
    fn on(&mut self) {
        self.lit = true;
        self.journal.record(JournalEntry::IndicatorOn);
    }

    fn off(&mut self) {
        self.lit = false;
        self.journal.record(JournalEntry::IndicatorOff);
    }

    fn toggle(&mut self) {
        self.lit = !self.lit;
        self.journal.record(JournalEntry::IndicatorToggle);
    }
}

/// Scripted sensor producing sign-magnitude frames
///
/// Scripted results are consumed first, then every measurement returns the
/// fallback reading (21.5 °C, 45.0 %).
#[derive(Debug)]
pub struct MockSensorDriver {
    journal: Journal,
    script: VecDeque<Result<(f32, f32), SensorError>>,
    fallback: Result<(f32, f32), SensorError>,
}

impl MockSensorDriver {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            script: VecDeque::new(),
            fallback: Ok((21.5, 45.0)),
        }
    }

    pub fn with_readings(
        mut self,
        readings: impl IntoIterator<Item = Result<(f32, f32), SensorError>>,
    ) -> Self {
        self.script.extend(readings);
        self
    }

    /// Every measurement past the script fails
    pub fn always_failing(mut self) -> Self {
        self.fallback = Err(SensorError::timeout());
        self
    }
}

#[async_trait]
impl SensorDriver for MockSensorDriver {
    async fn measure(&mut self) -> Result<RawFrame, SensorError> {
        let next = self
            .script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.journal
            .record(JournalEntry::SensorRead { ok: next.is_ok() });

        next.map(|(temperature, humidity)| {
            RawFrame::from_words(
                (humidity * 10.0).round() as u16,
                TemperatureEncoding::SignMagnitude.encode(temperature),
            )
        })
    }
}

/// Failure points of one scripted session, counted from 1
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionScript {
    pub fail_publish_at: Option<usize>,
    pub fail_poll_at: Option<usize>,
}

/// Result of one scripted connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Refuse(String),
    Accept(SessionScript),
}

/// Scripted connector. Past the script every connect yields a healthy session.
#[derive(Debug)]
pub struct MockConnector {
    journal: Journal,
    script: VecDeque<ConnectOutcome>,
}

impl MockConnector {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            script: VecDeque::new(),
        }
    }

    pub fn with_outcomes(mut self, outcomes: impl IntoIterator<Item = ConnectOutcome>) -> Self {
        self.script.extend(outcomes);
        self
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    type Session = MockSession;

    async fn connect(&mut self, options: &SessionOptions) -> Result<MockSession, SessionError> {
        let outcome = self
            .script
            .pop_front()
            .unwrap_or(ConnectOutcome::Accept(SessionScript::default()));

        let accepted = matches!(outcome, ConnectOutcome::Accept(_));
        self.journal.record(JournalEntry::Connect {
            client_id: options.client_id.clone(),
            accepted,
        });

        match outcome {
            ConnectOutcome::Accept(script) => {
                Ok(MockSession::new(self.journal.clone()).with_script(script))
            }
            ConnectOutcome::Refuse(reason) => Err(SessionError::broken(reason)),
        }
    }
}

/// Recording session with optional scripted failures
#[derive(Debug)]
pub struct MockSession {
    journal: Journal,
    script: SessionScript,
    publishes: usize,
    polls: usize,
}

impl MockSession {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            script: SessionScript::default(),
            publishes: 0,
            polls: 0,
        }
    }

    pub fn with_script(mut self, script: SessionScript) -> Self {
        self.script = script;
        self
    }

    pub fn failing_publish_at(mut self, publish: usize) -> Self {
        self.script.fail_publish_at = Some(publish);
        self
    }

    pub fn failing_poll_at(mut self, poll: usize) -> Self {
        self.script.fail_poll_at = Some(poll);
        self
    }
}

#[async_trait]
impl Session for MockSession {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), SessionError> {
        self.publishes += 1;
        if self.script.fail_publish_at == Some(self.publishes) {
            self.journal.record(JournalEntry::PublishFailed {
                topic: topic.to_string(),
            });
            return Err(SessionError::broken("scripted publish failure"));
        }

        self.journal.record(JournalEntry::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(&payload).into_owned(),
            retain,
        });
        Ok(())
    }

    async fn poll_incoming(&mut self) -> Result<(), SessionError> {
        self.polls += 1;
        if self.script.fail_poll_at == Some(self.polls) {
            self.journal.record(JournalEntry::PollFailed);
            return Err(SessionError::broken("scripted poll failure"));
        }
        self.journal.record(JournalEntry::Poll);
        Ok(())
    }

    async fn disconnect(self) {
        self.journal.record(JournalEntry::Disconnect);
    }
}
