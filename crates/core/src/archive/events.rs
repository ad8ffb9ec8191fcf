//! Websocket event push channel (`/api/job_results`).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, COOKIE};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::job::{decode_event, Event};

use super::{EventChannel, ServiceError};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of interpreting one websocket message.
#[derive(Debug)]
enum Frame {
    Event(Box<Event>),
    Skip,
    Closed,
}

fn classify(message: Message) -> Frame {
    match message {
        Message::Text(text) => {
            // An empty frame is the server's way of ending the stream
            if text.trim().is_empty() {
                return Frame::Closed;
            }
            match decode_event(text.as_str()) {
                Ok(event) => Frame::Event(Box::new(event)),
                Err(e) => {
                    warn!("Skipping undecodable event frame: {}", e);
                    Frame::Skip
                }
            }
        }
        Message::Close(frame) => {
            info!("Event channel received close frame: {:?}", frame);
            Frame::Closed
        }
        Message::Binary(_) => {
            debug!("Ignoring binary event frame");
            Frame::Skip
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Frame::Skip,
    }
}

/// Websocket connection delivering job state-change events.
pub struct WsEventChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsEventChannel {
    /// Open the websocket, authenticating with an existing session cookie.
    pub async fn connect(config: &Config, cookie: Option<&str>) -> Result<Self, ServiceError> {
        let mut request = config
            .events_url()
            .into_client_request()
            .map_err(|e| ServiceError::Channel(e.to_string()))?;

        if let Some(cookie) = cookie {
            let value =
                HeaderValue::from_str(cookie).map_err(|e| ServiceError::Channel(e.to_string()))?;
            request.headers_mut().insert(COOKIE, value);
        }

        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(!config.ssl_verify)
            .danger_accept_invalid_hostnames(!config.ssl_verify)
            .build()
            .map_err(|e| ServiceError::Channel(e.to_string()))?;

        let (stream, _response) = tokio_tungstenite::connect_async_tls_with_config(
            request,
            None,
            false,
            Some(Connector::NativeTls(tls)),
        )
        .await
        .map_err(|e| ServiceError::Connection(e.to_string()))?;

        info!("Event channel connected to {}", config.events_url());
        Ok(Self {
            stream,
            closed: false,
        })
    }
}

#[async_trait]
impl EventChannel for WsEventChannel {
    async fn receive(&mut self) -> Option<Event> {
        if self.closed {
            return None;
        }
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => match classify(message) {
                    Frame::Event(event) => return Some(*event),
                    Frame::Skip => continue,
                    Frame::Closed => break,
                },
                Some(Err(e)) => {
                    warn!("Event channel error: {}", e);
                    break;
                }
                None => {
                    info!("Event channel stream ended");
                    break;
                }
            }
        }
        self.closed = true;
        None
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            debug!("Event channel close: {}", e);
        }
        // Let the close handshake complete, but don't wait on an unresponsive server
        let stream = &mut self.stream;
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, async move {
            while let Some(Ok(_)) = stream.next().await {}
        })
        .await;
    }
}
