//! Subscription session: owns the broker connection for the life of the process.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Subscribed
//!                     ^                          |
//!                     +------ Reconnecting <-----+  (any transport failure)
//! ```
//!
//! Every transport failure, including a missing or refused subscription
//! acknowledgment and a refused login, sends the session to `Reconnecting`
//! and it tries again after a backoff delay. There is no attempt limit.
//! Publishes that arrive while the session is down are lost; nothing is
//! buffered locally.
//!
//! Inbound messages are forwarded in arrival order to a bounded queue drained
//! by a single [`Ingestor`](crate::ingest::Ingestor), so the connection keeps
//! being polled while a record is being written. When the queue is full the
//! message is dropped with a warning rather than stalling the connection.

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ingest::Delivery;
use crate::mqtt::{Backoff, TOPIC, Transport, TransportError, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,

    /// Consecutive failed attempts; drives the backoff and resets once subscribed.
    pub attempt: u32,

    pub total_reconnects: u64,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub topic: String,

    pub backoff: Backoff,

    pub connect_timeout: Duration,

    pub subscribe_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            topic: TOPIC.to_string(),
            backoff: Backoff::default(),
            connect_timeout: Duration::from_secs(10),
            subscribe_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no connection acknowledgment within {0:?}")]
    ConnectTimeout(Duration),

    #[error("no subscription acknowledgment within {0:?}")]
    SubscribeTimeout(Duration),

    #[error("broker refused the subscription to {0}")]
    SubscribeRejected(String),

    #[error("broker closed the connection")]
    BrokerDisconnect,

    /// Not a transport failure: the ingest queue is gone, so there is nothing left to do.
    #[error("ingest queue closed")]
    QueueClosed,
}

/// Lets the owner stop the session and watch its state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shutdown: CancellationToken,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Requests shutdown. Safe to call any number of times, from any state.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}

pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    deliveries: mpsc::Sender<Delivery>,
    shutdown: CancellationToken,
    status: watch::Sender<SessionStatus>,
}

impl<T: Transport> Session<T> {
    pub fn new(
        transport: T,
        config: SessionConfig,
        deliveries: mpsc::Sender<Delivery>,
    ) -> (Self, SessionHandle) {
        let shutdown = CancellationToken::new();
        let (status, status_rx) = watch::channel(SessionStatus {
            state: SessionState::Disconnected,
            attempt: 0,
            total_reconnects: 0,
        });

        let handle = SessionHandle {
            shutdown: shutdown.clone(),
            status: status_rx,
        };

        (
            Self {
                transport,
                config,
                deliveries,
                shutdown,
                status,
            },
            handle,
        )
    }

    /// Runs until shutdown is requested or the ingest queue closes, then closes
    /// the connection exactly once.
    pub async fn run(mut self) {
        let shutdown = self.shutdown.clone();
        let topic = self.config.topic.clone();

        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.connect_and_receive() => result,
            };

            let err = match result {
                Ok(never) => match never {},
                Err(SessionError::QueueClosed) => {
                    info!(topic = %topic, "ingest queue closed, stopping session");
                    break;
                }
                Err(err) => err,
            };

            let attempt = self.begin_reconnect();
            let delay = self.config.backoff.delay(attempt);
            warn!(
                topic = %topic,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "broker session lost, reconnecting"
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }

            self.transport.reset();
        }

        self.close().await;
    }

    /// Returns only on failure; a healthy session stays in the receive loop.
    async fn connect_and_receive(&mut self) -> Result<std::convert::Infallible, SessionError> {
        self.set_state(SessionState::Connecting);
        debug!(topic = %self.config.topic, "connecting to broker");

        let connect_timeout = self.config.connect_timeout;
        timeout(connect_timeout, self.await_connected())
            .await
            .map_err(|_| SessionError::ConnectTimeout(connect_timeout))??;

        self.set_state(SessionState::Connected);
        info!(topic = %self.config.topic, "connected to broker");

        let topic = self.config.topic.clone();
        self.transport.subscribe(&topic).await?;

        let subscribe_timeout = self.config.subscribe_timeout;
        timeout(subscribe_timeout, self.await_subscribed())
            .await
            .map_err(|_| SessionError::SubscribeTimeout(subscribe_timeout))??;

        self.status.send_modify(|status| {
            status.state = SessionState::Subscribed;
            status.attempt = 0;
        });
        info!(topic = %topic, "subscribed");

        loop {
            match self.transport.poll().await? {
                TransportEvent::Message { topic, payload } => self.forward(topic, payload)?,
                TransportEvent::Disconnected => return Err(SessionError::BrokerDisconnect),
                _ => {}
            }
        }
    }

    async fn await_connected(&mut self) -> Result<(), SessionError> {
        loop {
            match self.transport.poll().await? {
                TransportEvent::Connected => return Ok(()),
                TransportEvent::Disconnected => return Err(SessionError::BrokerDisconnect),
                _ => {}
            }
        }
    }

    async fn await_subscribed(&mut self) -> Result<(), SessionError> {
        loop {
            match self.transport.poll().await? {
                TransportEvent::Subscribed { granted: true } => return Ok(()),
                TransportEvent::Subscribed { granted: false } => {
                    return Err(SessionError::SubscribeRejected(self.config.topic.clone()));
                }
                TransportEvent::Message { topic, payload } => self.forward(topic, payload)?,
                TransportEvent::Disconnected => return Err(SessionError::BrokerDisconnect),
                _ => {}
            }
        }
    }

    fn forward(&self, topic: String, payload: Bytes) -> Result<(), SessionError> {
        debug!(topic = %topic, payload_len = payload.len(), "received message");

        let delivery = Delivery {
            topic,
            payload,
            received_at: Utc::now(),
        };

        // Waiting for room would stop the polling that keeps the connection alive.
        match self.deliveries.try_send(delivery) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(delivery)) => {
                warn!(
                    topic = %delivery.topic,
                    payload_len = delivery.payload.len(),
                    "ingest queue full, dropping message"
                );
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(SessionError::QueueClosed),
        }
    }

    fn begin_reconnect(&mut self) -> u32 {
        let mut attempt = 0;
        self.status.send_modify(|status| {
            status.state = SessionState::Reconnecting;
            status.attempt = status.attempt.saturating_add(1);
            status.total_reconnects += 1;
            attempt = status.attempt;
        });
        attempt
    }

    fn set_state(&self, state: SessionState) {
        self.status.send_modify(|status| status.state = state);
    }

    async fn close(&mut self) {
        self.transport.close().await;
        self.set_state(SessionState::Disconnected);
        info!(topic = %self.config.topic, "broker session closed");
    }
}
