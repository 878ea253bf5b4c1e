//! Per-message pipeline: decode, normalize, persist.
//!
//! Failures here never leave the message they belong to. A malformed payload
//! or a failed insert is logged and counted, then the next delivery is
//! handled as if nothing happened.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::sink::{PersistError, RecordSink};
use crate::telemetry::{DecodeError, RecordId, decode_payload, normalize};

/// One inbound publish, stamped with the time the bridge received it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,

    pub payload: Bytes,

    pub received_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Stored(RecordId),

    Malformed(DecodeError),

    Dropped(PersistError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,

    pub stored: u64,

    pub malformed: u64,

    pub dropped: u64,
}

impl IngestStats {
    fn record(&mut self, outcome: &Outcome) {
        self.received += 1;
        match outcome {
            Outcome::Stored(_) => self.stored += 1,
            Outcome::Malformed(_) => self.malformed += 1,
            Outcome::Dropped(_) => self.dropped += 1,
        }
    }
}

pub struct Ingestor<S> {
    sink: S,
}

impl<S: RecordSink> Ingestor<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub async fn handle(&self, delivery: &Delivery) -> Outcome {
        let topic = delivery.topic.as_str();
        let payload_len = delivery.payload.len();

        let raw = match decode_payload(&delivery.payload) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(topic, payload_len, error = %err, "dropping malformed payload");
                return Outcome::Malformed(err);
            }
        };

        let record = normalize(&raw);

        match self.sink.persist(&record, delivery.received_at).await {
            Ok(id) => {
                debug!(topic, payload_len, %id, ?record, "stored sensor record");
                Outcome::Stored(id)
            }
            Err(err) => {
                error!(topic, payload_len, error = %err, "failed to store sensor record, dropping");
                Outcome::Dropped(err)
            }
        }
    }

    /// Handles deliveries one at a time, in queue order, until every sender is gone.
    pub async fn run(self, mut deliveries: mpsc::Receiver<Delivery>) -> IngestStats {
        let mut stats = IngestStats::default();

        while let Some(delivery) = deliveries.recv().await {
            let outcome = self.handle(&delivery).await;
            stats.record(&outcome);
        }

        stats
    }
}
