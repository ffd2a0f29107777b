// TCP stream source
//
// Connects to the sensor server's raw broadcast socket and forwards each
// newline-delimited JSON message to the ingestion channel.

use super::{Backoff, StreamSource};
use crate::types::StreamResult;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

pub struct TcpSource {
    host: String,
    port: u16,
}

impl TcpSource {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl StreamSource for TcpSource {
    async fn run(&mut self, sender: mpsc::Sender<String>) -> StreamResult<()> {
        let mut backoff = Backoff::new();

        loop {
            let stream = match TcpStream::connect(self.addr()).await {
                Ok(stream) => stream,
                Err(e) => {
                    log::warn!("TCP connect to {} failed: {}", self.addr(), e);
                    if sender.is_closed() {
                        return Ok(());
                    }
                    backoff.wait().await;
                    continue;
                }
            };

            log::info!("TCP connected: {}", self.addr());
            backoff.reset();

            let mut reader = BufReader::new(stream);
            let mut line = String::new();

            loop {
                line.clear();

                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        log::info!("TCP connection closed by server");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        if sender.send(trimmed.to_string()).await.is_err() {
                            log::debug!("Ingestion channel closed, stopping TCP source");
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        log::error!("TCP read error: {}", e);
                        break;
                    }
                }
            }

            if sender.is_closed() {
                return Ok(());
            }

            log::info!("TCP disconnected, reconnecting");
            backoff.wait().await;
        }
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr())
    }
}
