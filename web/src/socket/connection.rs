use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use ws::{Connection, Error, FrameReader, FrameWriter};

/// An upgraded axum WebSocket, ready to be handed to the hub.
pub struct WebSocketConnection {
    socket: WebSocket,
    remote_addr: SocketAddr,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, remote_addr: SocketAddr) -> Self {
        Self {
            socket,
            remote_addr,
        }
    }
}

impl Connection for WebSocketConnection {
    type Reader = WebSocketReader;
    type Writer = WebSocketWriter;

    fn remote_addr(&self) -> String {
        self.remote_addr.to_string()
    }

    fn split(self) -> (WebSocketReader, WebSocketWriter) {
        let (sink, stream) = self.socket.split();
        (WebSocketReader(stream), WebSocketWriter(sink))
    }
}

pub struct WebSocketReader(SplitStream<WebSocket>);

#[async_trait]
impl FrameReader for WebSocketReader {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, Error>> {
        loop {
            match self.0.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().as_bytes().to_vec())),
                Ok(Message::Binary(bytes)) => return Some(Ok(bytes.to_vec())),
                Ok(Message::Close(_)) => return None,
                // axum answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => return Some(Err(Error::transport(e))),
            }
        }
    }
}

pub struct WebSocketWriter(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameWriter for WebSocketWriter {
    async fn send_frame(&mut self, frame: &str) -> Result<(), Error> {
        self.0
            .send(Message::Text(frame.into()))
            .await
            .map_err(Error::transport)
    }

    async fn close(&mut self) {
        // The peer may already be gone; there is nobody left to tell.
        let _ = self.0.close().await;
    }
}
