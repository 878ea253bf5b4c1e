mod args;

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use args::Args;
use clap::Parser as _;
use tokio::signal::unix::{self, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use weather_station::{
    config::{BrokerConfig, StoreConfig, credentials},
    db::new_pool,
    ingest::Ingestor,
    mqtt::{Backoff, MqttTransport, Session, SessionConfig},
    sink::PgSink,
};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let store = StoreConfig::new(args.database_url, args.database_key)
        .context("invalid store configuration")?;

    let backoff = Backoff::new(
        Duration::from_millis(args.reconnect_interval_ms),
        Duration::from_millis(args.max_reconnect_interval_ms),
    );
    let broker = BrokerConfig {
        host: args.mqtt_host,
        port: args.mqtt_port,
        credentials: credentials(args.mqtt_username, args.mqtt_password)
            .context("invalid broker configuration")?,
        tls: !args.no_mqtt_tls,
        client_id: args
            .client_id
            .unwrap_or_else(|| format!("weather-station-{}", Uuid::new_v4())),
        keep_alive: Duration::from_secs(args.keep_alive_secs),
        backoff,
    };
    broker.validate().context("invalid broker configuration")?;

    if args.queue_capacity == 0 {
        bail!("ingest queue capacity must be at least 1");
    }

    let persist_timeout = Duration::from_millis(args.persist_timeout_ms);
    let pool = new_pool(&store, persist_timeout).context("failed to configure database pool")?;
    let ingestor = Ingestor::new(PgSink::new(pool, persist_timeout));

    let (tx, rx) = mpsc::channel(args.queue_capacity);
    let worker = tokio::spawn(ingestor.run(rx));

    let session_config = SessionConfig {
        backoff: broker.backoff,
        ..SessionConfig::default()
    };
    let (session, handle) = Session::new(
        MqttTransport::new(broker.mqtt_options()),
        session_config.clone(),
        tx,
    );

    info!(
        host = %broker.host,
        port = broker.port,
        tls = broker.tls,
        client_id = %broker.client_id,
        topic = %session_config.topic,
        "starting ingestion bridge"
    );
    let session = tokio::spawn(session.run());

    tokio::select! {
        result = sigterm() => result.context("failed to listen for SIGTERM")?,
        result = sigint() => result.context("failed to listen for SIGINT")?,
    }

    info!("shutdown requested");
    handle.shutdown();

    session.await.context("session task failed")?;
    let stats = worker.await.context("ingest task failed")?;

    info!(
        received = stats.received,
        stored = stats.stored,
        malformed = stats.malformed,
        dropped = stats.dropped,
        "ingestion bridge stopped"
    );

    Ok(())
}

async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
