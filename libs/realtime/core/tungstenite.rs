//! tokio-tungstenite backed transport

use crate::traits::*;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector dialing the endpoint with tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &str) -> Result<Transport> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| RealtimeError::WebSocket(e.to_string()))?;

        let (write, read) = ws_stream.split();
        Ok(Transport::new(
            TungsteniteSink { write },
            TungsteniteSource { read, done: false },
        ))
    }
}

struct TungsteniteSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSink for TungsteniteSink {
    async fn send(&mut self, message: WsMessage) -> Result<()> {
        self.write
            .send(ws_message_to_tungstenite(message))
            .await
            .map_err(|e| RealtimeError::WebSocket(e.to_string()))
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.write
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| RealtimeError::WebSocket(e.to_string()))?;
        self.write
            .close()
            .await
            .map_err(|e| RealtimeError::WebSocket(e.to_string()))
    }
}

struct TungsteniteSource {
    read: SplitStream<WsStream>,
    done: bool,
}

#[async_trait]
impl TransportSource for TungsteniteSource {
    async fn recv(&mut self) -> Option<Result<WsMessage>> {
        while !self.done {
            match self.read.next().await {
                Some(Ok(Message::Close(frame))) => {
                    debug!("Close frame received: {:?}", frame);
                    self.done = true;
                }
                Some(Ok(msg)) => {
                    if let Some(ws_msg) = tungstenite_to_ws_message(msg) {
                        return Some(Ok(ws_msg));
                    }
                }
                Some(Err(e)) => {
                    // tungstenite does not recover from read errors
                    self.done = true;
                    return Some(Err(RealtimeError::WebSocket(e.to_string())));
                }
                None => self.done = true,
            }
        }
        None
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

/// Convert tungstenite Message to WsMessage
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
