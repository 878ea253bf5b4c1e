use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::time::timeout;

use crate::db::insert_sensor_record;
use crate::telemetry::{RecordId, SensorRecord};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("store unreachable: {0}")]
    Unreachable(#[source] sqlx::Error),

    #[error("store rejected the record: {0}")]
    Rejected(#[source] sqlx::Error),

    #[error("store did not answer within {0:?}")]
    TimedOut(Duration),
}

impl PersistError {
    pub fn classify(err: sqlx::Error, limit: Duration) -> Self {
        match err {
            sqlx::Error::Database(_) => PersistError::Rejected(err),
            sqlx::Error::PoolTimedOut => PersistError::TimedOut(limit),
            _ => PersistError::Unreachable(err),
        }
    }
}

/// Where normalized records end up. One call appends exactly one row.
pub trait RecordSink: Send + Sync {
    fn persist(
        &self,
        record: &SensorRecord,
        recorded_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<RecordId, PersistError>> + Send;
}

#[derive(Debug, Clone)]
pub struct PgSink {
    pool: PgPool,
    timeout: Duration,
}

impl PgSink {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

impl RecordSink for PgSink {
    async fn persist(
        &self,
        record: &SensorRecord,
        recorded_at: DateTime<Utc>,
    ) -> Result<RecordId, PersistError> {
        match timeout(
            self.timeout,
            insert_sensor_record(&self.pool, record, recorded_at),
        )
        .await
        {
            Ok(Ok(id)) => Ok(id),
            Ok(Err(err)) => Err(PersistError::classify(err, self.timeout)),
            Err(_) => Err(PersistError::TimedOut(self.timeout)),
        }
    }
}
