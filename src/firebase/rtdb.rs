//! Realtime Database command subscription
//!
//! Holds a streaming (SSE) connection to the command path and turns server
//! `put` events into a channel of [`RtdbEvent`]s. The subscription task owns
//! the connection and reconnects with exponential backoff; the consumer just
//! drains the channel.

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Events produced by the subscription task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtdbEvent {
    /// Stream established
    Connected,
    /// Stream lost; the task will reconnect
    Disconnected { reason: String },
    /// New command value at the subscribed path
    Command(String),
}

/// Receiver half of the subscription channel
pub type CommandEventReceiver = mpsc::Receiver<RtdbEvent>;

/// Errors in the server's streaming payloads
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("invalid put payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Configuration for the command subscription
#[derive(Debug, Clone)]
pub struct RtdbConfig {
    /// Database root URL (e.g. "https://<project>-default-rtdb.firebaseio.com")
    pub database_url: String,
    /// Path of the command node
    pub path: String,
    /// Initial reconnect delay
    pub reconnect_delay: Duration,
    /// Reconnect delay cap
    pub max_reconnect_delay: Duration,
}

impl Default for RtdbConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            path: "realtime/arduinoCommand".into(),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl RtdbConfig {
    /// Config pointing at the default database of the given project
    pub fn for_project(project_id: &str) -> Self {
        Self {
            database_url: format!("https://{project_id}-default-rtdb.firebaseio.com"),
            ..Self::default()
        }
    }
}

/// Start the subscription task and return the event channel
pub fn subscribe(config: RtdbConfig, access_token: Option<String>) -> CommandEventReceiver {
    let (event_tx, event_rx) = mpsc::channel::<RtdbEvent>(100);

    tokio::spawn(async move {
        listen_loop(config, access_token, event_tx).await;
    });

    event_rx
}

/// Subscription loop with reconnection
async fn listen_loop(
    config: RtdbConfig,
    access_token: Option<String>,
    event_tx: mpsc::Sender<RtdbEvent>,
) {
    let client = reqwest::Client::new();
    let url = stream_url(&config, access_token.as_deref());
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        if event_tx.is_closed() {
            return;
        }

        let reason = match EventSource::new(client.get(&url)) {
            Ok(mut source) => {
                let reason =
                    run_stream(&mut source, &event_tx, &mut reconnect_delay, &config).await;
                source.close();
                reason
            }
            Err(e) => format!("failed to start event stream: {e}"),
        };

        let _ = event_tx
            .send(RtdbEvent::Disconnected {
                reason: reason.clone(),
            })
            .await;
        warn!("Command stream lost ({reason}); reconnecting in {reconnect_delay:?}");

        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);
    }
}

/// Drain one stream until it fails or the server ends it; returns the reason
async fn run_stream(
    source: &mut EventSource,
    event_tx: &mpsc::Sender<RtdbEvent>,
    reconnect_delay: &mut Duration,
    config: &RtdbConfig,
) -> String {
    while let Some(item) = source.next().await {
        match item {
            Ok(Event::Open) => {
                *reconnect_delay = config.reconnect_delay;
                let _ = event_tx.send(RtdbEvent::Connected).await;
            }
            Ok(Event::Message(message)) => match message.event.as_str() {
                "put" => match decode_put(&message.data) {
                    Ok(Some(command)) => {
                        let _ = event_tx.send(RtdbEvent::Command(command)).await;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Ignoring malformed put event: {e}"),
                },
                // The command node is a scalar; the server never patches into it
                "patch" => debug!("Ignoring patch event: {}", message.data),
                "keep-alive" => {}
                "cancel" => return "stream cancelled by server".into(),
                "auth_revoked" => return "credentials revoked".into(),
                other => debug!("Unhandled stream event type: {other}"),
            },
            Err(e) => return e.to_string(),
        }
    }
    "event stream ended".into()
}

fn stream_url(config: &RtdbConfig, access_token: Option<&str>) -> String {
    let base = config.database_url.trim_end_matches('/');
    let mut url = format!("{base}/{}.json", config.path);
    if let Some(token) = access_token {
        url.push_str("?access_token=");
        url.push_str(token);
    }
    url
}

/// Wire shape of a `put` event payload
#[derive(Debug, Deserialize)]
struct PutPayload {
    path: String,
    data: Value,
}

/// Extract a command from a `put` payload
///
/// Only whole-node puts carry a command; `null` means the node was deleted.
/// Non-string scalars are forwarded in their JSON text form.
fn decode_put(data: &str) -> Result<Option<String>, StreamError> {
    let payload: PutPayload = serde_json::from_str(data)?;
    if payload.path != "/" {
        return Ok(None);
    }
    match payload.data {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Ok(Some(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url() {
        let config = RtdbConfig::for_project("scoreboard-prod");
        assert_eq!(
            stream_url(&config, None),
            "https://scoreboard-prod-default-rtdb.firebaseio.com/realtime/arduinoCommand.json"
        );
    }

    #[test]
    fn test_stream_url_with_token() {
        let config = RtdbConfig::for_project("scoreboard-prod");
        let url = stream_url(&config, Some("ya29.abc"));
        assert!(url.ends_with(".json?access_token=ya29.abc"));
    }

    #[test]
    fn test_decode_put_string() {
        let command = decode_put(r#"{"path": "/", "data": "open"}"#).unwrap();
        assert_eq!(command, Some("open".into()));
    }

    #[test]
    fn test_decode_put_null() {
        let command = decode_put(r#"{"path": "/", "data": null}"#).unwrap();
        assert_eq!(command, None);
    }

    #[test]
    fn test_decode_put_numeric_scalar() {
        let command = decode_put(r#"{"path": "/", "data": 42}"#).unwrap();
        assert_eq!(command, Some("42".into()));
    }

    #[test]
    fn test_decode_put_non_root_path() {
        let command = decode_put(r#"{"path": "/child", "data": "open"}"#).unwrap();
        assert_eq!(command, None);
    }

    #[test]
    fn test_decode_put_malformed() {
        let result = decode_put("not json");
        assert!(matches!(result, Err(StreamError::InvalidPayload(_))));
    }
}
