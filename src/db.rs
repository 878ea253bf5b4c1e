use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::config::StoreConfig;
use crate::telemetry::{RecordId, SensorRecord, StoredRecord};

/// Builds a pool without connecting; an unreachable store shows up on first use.
pub fn new_pool(config: &StoreConfig, acquire_timeout: Duration) -> Result<PgPool> {
    let options: PgConnectOptions = config
        .endpoint
        .parse()
        .context("failed to parse database endpoint")?;
    let options = options.password(&config.key);

    Ok(PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(acquire_timeout)
        .connect_lazy_with(options))
}

pub async fn insert_sensor_record(
    pool: &PgPool,
    record: &SensorRecord,
    created_at: DateTime<Utc>,
) -> Result<RecordId, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO awsdata (temp, rh, wind_direction, wind_speed, pressure, radiation, precipitation, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(record.temperature)
    .bind(record.relative_humidity)
    .bind(record.wind_direction)
    .bind(record.wind_speed)
    .bind(record.pressure)
    .bind(record.radiation)
    .bind(record.precipitation)
    .bind(created_at)
    .fetch_one(pool)
    .await?;

    Ok(RecordId(id))
}

type SensorRow = (
    i64,
    DateTime<Utc>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
);

pub async fn get_sensor_records_since(
    pool: &PgPool,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<StoredRecord>> {
    let rows: Vec<SensorRow> = sqlx::query_as(
        r#"
        SELECT id, created_at, temp, rh, wind_direction, wind_speed, pressure, radiation, precipitation
        FROM awsdata
        WHERE $1::TIMESTAMPTZ IS NULL OR created_at >= $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await
    .context("failed to execute sensor record query")?;

    Ok(rows
        .into_iter()
        .map(
            |(id, created_at, temp, rh, wind_direction, wind_speed, pressure, radiation, precipitation)| {
                StoredRecord {
                    id: RecordId(id),
                    created_at,
                    record: SensorRecord {
                        temperature: temp,
                        relative_humidity: rh,
                        wind_direction,
                        wind_speed,
                        pressure,
                        radiation,
                        precipitation,
                    },
                }
            },
        )
        .collect())
}
