//! TCP telemetry transport.
//!
//! Listens for inbound connections and feeds every peer's data into the
//! same event stream; peers are not multiplexed into distinct record
//! streams. Per-connection end/close is reported as informational `Peer`
//! events only.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{EventSender, LogTransport, TransportEvent};

#[derive(Debug, Default)]
pub struct TcpLogTransport {
    accept_task: Option<JoinHandle<()>>,
}

impl TcpLogTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogTransport for TcpLogTransport {
    async fn connect(&mut self, port: u16, host: &str, events: EventSender) {
        self.disconnect();
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                match listener.local_addr() {
                    Ok(addr) => {
                        let _ = events.send(TransportEvent::Connected(addr));
                    }
                    Err(e) => {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
                self.accept_task = Some(tokio::spawn(accept_loop(listener, events)));
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string()));
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

impl Drop for TcpLogTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn accept_loop(listener: TcpListener, events: EventSender) {
    loop {
        match listener.accept().await {
            Ok((mut socket, peer)) => {
                debug!(%peer, "Telemetry peer connected");
                let events = events.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 64 * 1024];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) => {
                                let _ =
                                    events.send(TransportEvent::Peer(format!("done: {peer}")));
                                break;
                            }
                            Ok(n) => {
                                if events.send(TransportEvent::Data(buf[..n].to_vec())).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                let _ = events.send(TransportEvent::Peer(format!(
                                    "disconnected: {peer}, error {e}"
                                )));
                                break;
                            }
                        }
                    }
                });
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string()));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn delivers_payloads_and_peer_notices() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = TcpLogTransport::new();
        transport.connect(0, "127.0.0.1", tx).await;

        let Some(TransportEvent::Connected(addr)) = rx.recv().await else {
            panic!("expected Connected first");
        };

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"hello over tcp").await.unwrap();
        stream.shutdown().await.unwrap();
        drop(stream);

        let Some(TransportEvent::Data(payload)) = rx.recv().await else {
            panic!("expected Data");
        };
        assert_eq!(payload, b"hello over tcp");

        let Some(TransportEvent::Peer(notice)) = rx.recv().await else {
            panic!("expected Peer notice");
        };
        assert!(notice.starts_with("done:"));

        transport.disconnect();
    }

    #[tokio::test]
    async fn bind_failure_reports_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut occupant = TcpLogTransport::new();
        occupant.connect(0, "127.0.0.1", tx).await;
        let Some(TransportEvent::Connected(addr)) = rx.recv().await else {
            panic!("expected Connected");
        };

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let mut transport = TcpLogTransport::new();
        transport.connect(addr.port(), "127.0.0.1", tx2).await;
        let Some(TransportEvent::Error(_)) = rx2.recv().await else {
            panic!("expected Error on bind conflict");
        };
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut transport = TcpLogTransport::new();
        transport.disconnect();
        transport.disconnect();
    }
}
