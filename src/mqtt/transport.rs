use std::future::Future;

use bytes::Bytes;

/// What the session learns from one poll of the broker connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The broker accepted the connection.
    Connected,

    /// The broker answered a subscribe request.
    Subscribed { granted: bool },

    Message { topic: String, payload: Bytes },

    /// The broker closed the session on its side.
    Disconnected,

    /// Keep-alive traffic, acknowledgments and other packets the session ignores.
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("request failed: {0}")]
    Request(#[from] rumqttc::ClientError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A broker connection as seen by the subscription session.
///
/// The first `poll` after construction or `reset` opens the connection.
pub trait Transport: Send {
    fn poll(&mut self) -> impl Future<Output = Result<TransportEvent, TransportError>> + Send;

    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Drops the current connection so the next `poll` starts a fresh one.
    fn reset(&mut self);

    /// Sends a disconnect to the broker, if connected, and releases the connection.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
