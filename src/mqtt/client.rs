use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeReasonCode};
use tokio::time::timeout;
use tracing::debug;

use crate::mqtt::{Transport, TransportError, TransportEvent};

const REQUEST_CAPACITY: usize = 16;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// [`Transport`] backed by a rumqttc client and event loop.
pub struct MqttTransport {
    options: MqttOptions,
    client: AsyncClient,
    eventloop: EventLoop,
    /// Set by a successful CONNACK, cleared by any poll error or reset.
    connected: bool,
}

impl MqttTransport {
    pub fn new(options: MqttOptions) -> Self {
        let (client, eventloop) = AsyncClient::new(options.clone(), REQUEST_CAPACITY);

        Self {
            options,
            client,
            eventloop,
            connected: false,
        }
    }
}

impl Transport for MqttTransport {
    async fn poll(&mut self) -> Result<TransportEvent, TransportError> {
        // A refused CONNACK comes back from rumqttc as `ConnectionRefused`.
        let event = match self.eventloop.poll().await {
            Ok(event) => event,
            Err(err) => {
                self.connected = false;
                return Err(err.into());
            }
        };

        let event = match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                self.connected = true;
                TransportEvent::Connected
            }
            Event::Incoming(Packet::SubAck(ack)) => TransportEvent::Subscribed {
                granted: ack
                    .return_codes
                    .iter()
                    .all(|code| !matches!(code, SubscribeReasonCode::Failure)),
            },
            Event::Incoming(Packet::Publish(publish)) => TransportEvent::Message {
                topic: publish.topic,
                payload: publish.payload,
            },
            Event::Incoming(Packet::Disconnect) => {
                self.connected = false;
                TransportEvent::Disconnected
            }
            _ => TransportEvent::Other,
        };

        Ok(event)
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client.subscribe(topic, QoS::AtLeastOnce).await?;
        Ok(())
    }

    fn reset(&mut self) {
        let (client, eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        self.client = client;
        self.eventloop = eventloop;
        self.connected = false;
    }

    async fn close(&mut self) {
        // Polling an idle event loop would dial the broker again.
        if !self.connected {
            debug!("no live mqtt connection to close");
            return;
        }
        self.connected = false;

        if let Err(err) = self.client.disconnect().await {
            debug!(error = %err, "failed to queue mqtt disconnect");
            return;
        }

        // The disconnect only reaches the broker once the event loop flushes it.
        let flushed = timeout(CLOSE_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            debug!("mqtt disconnect not flushed before timeout");
        }
    }
}
