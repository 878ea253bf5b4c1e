#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use weather_station::{
    mqtt::{Transport, TransportError, TransportEvent},
    sink::{PersistError, RecordSink},
    telemetry::{RecordId, SensorRecord},
};

pub enum Step {
    Event(TransportEvent),
    Fail,
    /// The poll never completes.
    Hang,
}

pub fn message(payload: &'static str) -> Step {
    Step::Event(TransportEvent::Message {
        topic: "awsData".to_string(),
        payload: Bytes::from_static(payload.as_bytes()),
    })
}

pub fn connected() -> Step {
    Step::Event(TransportEvent::Connected)
}

pub fn subscribed(granted: bool) -> Step {
    Step::Event(TransportEvent::Subscribed { granted })
}

#[derive(Default)]
pub struct Counters {
    pub polls: AtomicUsize,
    pub subscribes: AtomicUsize,
    pub resets: AtomicUsize,
    pub closes: AtomicUsize,
}

impl Counters {
    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Plays back a fixed sequence of poll results, then hangs.
pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    counters: Arc<Counters>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                steps: steps.into_iter().collect(),
                counters: Arc::clone(&counters),
            },
            counters,
        )
    }
}

impl Transport for ScriptedTransport {
    async fn poll(&mut self) -> Result<TransportEvent, TransportError> {
        self.counters.polls.fetch_add(1, Ordering::SeqCst);

        match self.steps.pop_front() {
            Some(Step::Event(event)) => Ok(event),
            Some(Step::Fail) => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )
            .into()),
            Some(Step::Hang) | None => std::future::pending().await,
        }
    }

    async fn subscribe(&mut self, _topic: &str) -> Result<(), TransportError> {
        self.counters.subscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn reset(&mut self) {
        self.counters.resets.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Keeps persisted records in memory; can be told to fail specific calls.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub stored: Arc<Mutex<Vec<(SensorRecord, DateTime<Utc>)>>>,
    fail_calls: Arc<HashSet<usize>>,
    calls: Arc<AtomicUsize>,
}

impl MemorySink {
    /// Fails the calls with these zero-based indexes.
    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_calls: Arc::new(calls.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<SensorRecord> {
        self.stored.lock().unwrap().iter().map(|(r, _)| *r).collect()
    }
}

impl RecordSink for MemorySink {
    async fn persist(
        &self,
        record: &SensorRecord,
        recorded_at: DateTime<Utc>,
    ) -> Result<RecordId, PersistError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.contains(&call) {
            return Err(PersistError::Unreachable(sqlx::Error::PoolClosed));
        }

        let mut stored = self.stored.lock().unwrap();
        stored.push((*record, recorded_at));
        Ok(RecordId(stored.len() as i64))
    }
}
