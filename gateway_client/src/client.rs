//! Gateway Client Module
//!
//! Issues gateway HTTP calls with reqwest, timing each round trip, and
//! follows the `/ws` push stream with tokio-tungstenite.

use crate::config::Config;
use crate::protocol::{self, Command, HttpMethod, HELP};
use crate::tracker::LatencyTracker;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{message} (HTTP {status})")]
    Gateway { status: u16, message: String },

    #[error("{0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Invalid histogram settings: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
}

pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    tracker: LatencyTracker,
}

impl GatewayClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url(),
            tracker: LatencyTracker::new(config.histogram_significant_figures)?,
        })
    }

    pub fn tracker(&self) -> &LatencyTracker {
        &self.tracker
    }

    /// Run a command and return the text to show the user.
    pub async fn execute(&mut self, command: &Command) -> Result<String, ClientError> {
        match command {
            Command::Stats => return Ok(self.tracker.summary()),
            Command::Help => return Ok(HELP.to_string()),
            _ => {}
        }
        let Some(route) = command.route() else {
            return Ok(String::new());
        };

        let url = format!("{}{}", self.base_url, route.path);
        let request = match route.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => {
                let body = route.body.unwrap_or_else(|| Value::Object(Default::default()));
                self.http.post(&url).json(&body)
            }
        };

        log::debug!("Sending {:?} {}", route.method, url);
        let sent = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        self.tracker.record(command.action(), sent.elapsed());
        log::debug!("Received {}: {}", status, body);

        if !status.is_success() {
            let message = match serde_json::from_str::<Value>(&body) {
                Ok(reply) => protocol::error_message(&reply),
                Err(_) if body.trim().is_empty() => status.to_string(),
                Err(_) => body,
            };
            return Err(ClientError::Gateway {
                status: status.as_u16(),
                message,
            });
        }
        let reply: Value = serde_json::from_str(&body)?;
        Ok(protocol::describe_reply(&reply))
    }
}

/// Follow the gateway push stream until it closes, logging each event.
///
/// `wss://` URLs go through the native-tls connector.
pub async fn stream_push_events(url: &str) -> Result<(), ClientError> {
    log::info!("Connecting to {}", url);
    let (ws_stream, _) = connect_async(url).await?;
    log::info!("Push stream connected");
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg_result) = read.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match protocol::parse_push(&text) {
                Ok(event) => log::info!("{}", event.summary()),
                Err(e) => log::warn!("Failed to parse push event: {} - {}", e, text),
            },
            Ok(Message::Close(frame)) => {
                log::info!("Push stream closed: {:?}", frame);
                break;
            }
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("WebSocket error: {}", e);
                return Err(ClientError::WebSocket(e));
            }
        }
    }

    Ok(())
}
