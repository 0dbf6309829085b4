//! Socket factory seam for the push channel.
//!
//! The sync service only sees `FrameSink`/`FrameStream` halves, so tests can
//! drive it with in-memory sockets. `WsConnector` is the real implementation
//! over tokio-tungstenite.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("WebSocket connect failed: {0}")]
    Connect(String),

    #[error("WebSocket send failed: {0}")]
    Send(String),
}

/// What the read half yields. `Closed` and `Error` end the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketFrame {
    Text(String),
    Closed(Option<u16>),
    Error(String),
}

#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    /// Send a close frame. Errors are ignored; the socket is going away anyway.
    async fn close(&mut self);
}

#[async_trait]
pub trait FrameStream: Send {
    async fn next_frame(&mut self) -> SocketFrame;
}

pub type SocketPair = (Box<dyn FrameSink>, Box<dyn FrameStream>);

#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<SocketPair, ChannelError>;
}

/// tokio-tungstenite connector; `wss://` URLs go over rustls.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl SocketConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<SocketPair, ChannelError> {
        let (ws, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        debug!(url = url, status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = ws.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsFrames { stream })))
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}

struct WsFrames {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> SocketFrame {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketFrame::Text(text.as_str().to_string()),
                Some(Ok(Message::Close(frame))) => {
                    return SocketFrame::Closed(frame.map(|f| u16::from(f.code)))
                }
                Some(Err(e)) => return SocketFrame::Error(e.to_string()),
                None => return SocketFrame::Closed(None),
                // Protocol pings are answered by tungstenite; binary is unused
                Some(Ok(_)) => continue,
            }
        }
    }
}
