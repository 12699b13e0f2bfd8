//! Broker subscription
//!
//! Owns the MQTT client and exposes the rest of the service to a plain
//! stream of `(topic, payload)` messages plus a connection-state signal.
//! No other module sees MQTT types. The event loop reconnects on its own:
//! errors are logged, the state signal flips to `Disconnected`, and polling
//! resumes after a fixed backoff. Subscriptions are re-issued on every
//! connack, so they survive reconnects.

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    /// Topics to subscribe, e.g. `frigate/reviews` and `frigate/events`
    pub topics: Vec<String>,
}

/// Connection-state signal published over the watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// One raw inbound broker message
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 256;

/// Spawn the broker event loop
///
/// Returns the inbound message receiver and the connection-state signal.
/// The loop runs until the message receiver is dropped.
pub fn start(
    config: BrokerConfig,
) -> (
    mpsc::Receiver<InboundMessage>,
    watch::Receiver<ConnectionState>,
) {
    let (message_tx, message_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(username), Some(password)) = (config.username.clone(), config.password.clone()) {
        options.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(options, CHANNEL_CAPACITY);

    tokio::spawn(async move {
        tracing::info!(
            host = %config.host,
            port = config.port,
            topics = ?config.topics,
            "Broker event loop started"
        );

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("Broker connected");
                    let _ = state_tx.send(ConnectionState::Connected);
                    for topic in &config.topics {
                        if let Err(e) = client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                            tracing::error!(topic = %topic, error = %e, "Subscribe failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if message_tx.send(message).await.is_err() {
                        tracing::info!("Inbound receiver dropped, stopping broker loop");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Broker connection error, retrying");
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            }
        }
    });

    (message_rx, state_rx)
}
