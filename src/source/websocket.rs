// WebSocket stream source
//
// Connects to an endpoint of the form ws://<host>/sensors/stream/<device-id>
// and forwards each text frame, in arrival order, to the ingestion channel.

use super::{Backoff, StreamSource};
use crate::types::StreamResult;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub struct WebSocketSource {
    url: String,
}

impl WebSocketSource {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl StreamSource for WebSocketSource {
    async fn run(&mut self, sender: mpsc::Sender<String>) -> StreamResult<()> {
        let mut backoff = Backoff::new();

        loop {
            let ws_stream = match connect_async(&self.url).await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    log::warn!("WebSocket connect to {} failed: {}", self.url, e);
                    if sender.is_closed() {
                        return Ok(());
                    }
                    backoff.wait().await;
                    continue;
                }
            };

            log::info!("WebSocket connected: {}", self.url);
            backoff.reset();

            let (_write, mut read) = ws_stream.split();

            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if sender.send(text.to_string()).await.is_err() {
                            log::debug!("Ingestion channel closed, stopping WebSocket source");
                            return Ok(());
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        log::warn!("Ignoring binary WebSocket frame");
                    }
                    Ok(Message::Close(_)) => {
                        log::info!("WebSocket closed by server");
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        log::error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }

            if sender.is_closed() {
                return Ok(());
            }

            log::info!("WebSocket disconnected, reconnecting");
            backoff.wait().await;
        }
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
