//! UDP telemetry transport. One datagram = one payload.

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{EventSender, LogTransport, TransportEvent};

#[derive(Debug, Default)]
pub struct UdpLogTransport {
    recv_task: Option<JoinHandle<()>>,
}

impl UdpLogTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogTransport for UdpLogTransport {
    async fn connect(&mut self, port: u16, host: &str, events: EventSender) {
        self.disconnect();
        match UdpSocket::bind((host, port)).await {
            Ok(socket) => {
                match socket.local_addr() {
                    Ok(addr) => {
                        let _ = events.send(TransportEvent::Connected(addr));
                    }
                    Err(e) => {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
                self.recv_task = Some(tokio::spawn(recv_loop(socket, events)));
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string()));
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(task) = self.recv_task.take() {
            task.abort();
        }
    }
}

impl Drop for UdpLogTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn recv_loop(socket: UdpSocket, events: EventSender) {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, peer)) => {
                debug!(%peer, bytes = n, "Telemetry datagram received");
                if events.send(TransportEvent::Data(buf[..n].to_vec())).is_err() {
                    break;
                }
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
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn delivers_one_event_per_datagram() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = UdpLogTransport::new();
        transport.connect(0, "127.0.0.1", tx).await;

        let Some(TransportEvent::Connected(addr)) = rx.recv().await else {
            panic!("expected Connected first");
        };

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"first", addr).await.unwrap();
        sender.send_to(b"second", addr).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Data(b"first".to_vec()))
        );
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Data(b"second".to_vec()))
        );

        transport.disconnect();
    }

    #[tokio::test]
    async fn reconnect_requires_full_disconnect_connect_cycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = UdpLogTransport::new();
        transport.connect(0, "127.0.0.1", tx).await;
        let Some(TransportEvent::Connected(first)) = rx.recv().await else {
            panic!("expected Connected");
        };
        transport.disconnect();

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        transport.connect(0, "127.0.0.1", tx2).await;
        let Some(TransportEvent::Connected(second)) = rx2.recv().await else {
            panic!("expected Connected after reconnect");
        };
        assert_ne!(first.port(), 0);
        assert_ne!(second.port(), 0);
    }
}
