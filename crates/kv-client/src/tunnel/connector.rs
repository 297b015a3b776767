//! WebSocket connection to the Moonraker host

use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use kv_core::config::WebsocketConfig;
use kv_core::error::ConnectionError;
use kv_protocol::{Message, MoonrakerCodec, Request};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound event on an open connection
#[derive(Debug)]
pub enum TunnelEvent {
    /// A decoded text frame
    Message(Message),
    /// A control or binary frame; proves the peer is alive
    Activity,
}

/// An open WebSocket connection
pub struct ActiveConnection {
    url: String,
    sink: SplitSink<WsStream, WsMessage>,
    stream: SplitStream<WsStream>,
    codec: MoonrakerCodec,
    send_timeout: Duration,
}

impl ActiveConnection {
    /// Open a connection, bounded by `connect_timeout`
    pub async fn open(url: &str, config: &WebsocketConfig) -> Result<Self, ConnectionError> {
        tracing::debug!("Opening WebSocket to {}", url);
        let (ws, _response) = tokio::time::timeout(config.connect_timeout, connect_async(url))
            .await
            .map_err(|_| ConnectionError::ConnectFailed {
                url: url.to_string(),
                reason: format!("timed out after {:?}", config.connect_timeout),
            })?
            .map_err(|e| ConnectionError::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let (sink, stream) = ws.split();
        Ok(Self {
            url: url.to_string(),
            sink,
            stream,
            codec: MoonrakerCodec::new(),
            send_timeout: config.send_timeout,
        })
    }

    /// Encode and send a request
    pub async fn send_request(&mut self, request: &Request) -> Result<(), ConnectionError> {
        let text = self
            .codec
            .encode(request)
            .map_err(|e| ConnectionError::SendFailed(e.to_string()))?;
        tracing::debug!("Sending {} ({})", request.kind.method(), request.id);
        self.send(WsMessage::Text(text.into())).await
    }

    /// Send a keepalive ping
    pub async fn send_ping(&mut self) -> Result<(), ConnectionError> {
        tracing::trace!("Sending ping");
        self.send(WsMessage::Ping(Vec::new().into())).await
    }

    async fn send(&mut self, message: WsMessage) -> Result<(), ConnectionError> {
        match tokio::time::timeout(self.send_timeout, self.sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::SendFailed(e.to_string())),
            Err(_) => Err(ConnectionError::SendTimeout(self.send_timeout)),
        }
    }

    /// Receive the next event.
    ///
    /// A close frame, a read error or the end of the stream all end the
    /// connection and come back as an error.
    pub async fn recv(&mut self) -> Result<TunnelEvent, ConnectionError> {
        let frame = match self.stream.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(ConnectionError::Closed(e.to_string())),
            None => return Err(ConnectionError::Closed("stream ended".to_string())),
        };

        match frame {
            WsMessage::Text(text) => {
                tracing::trace!("Received: {}", text.as_str());
                Ok(TunnelEvent::Message(self.codec.decode(text.as_str())))
            }
            WsMessage::Close(frame) => {
                let reason = match frame {
                    Some(frame) => format!(
                        "closed by peer ({}: {})",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ),
                    None => "closed by peer".to_string(),
                };
                Err(ConnectionError::Closed(reason))
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) | WsMessage::Frame(_) => {
                Ok(TunnelEvent::Activity)
            }
        }
    }

    /// Close gracefully, giving up after `timeout`
    pub async fn close(mut self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.sink.close()).await {
            Ok(Ok(())) => tracing::debug!("Closed connection to {}", self.url),
            Ok(Err(e)) => tracing::debug!("Error closing connection to {}: {}", self.url, e),
            Err(_) => tracing::warn!(
                "Graceful close of {} did not finish within {:?}, dropping socket",
                self.url,
                timeout
            ),
        }
    }
}
