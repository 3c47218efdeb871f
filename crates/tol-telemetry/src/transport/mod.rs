//! Telemetry transports.
//!
//! A transport owns exactly one bound network endpoint and forwards every
//! received payload upward as an event. Binding errors leave the endpoint
//! non-functional until the next `connect`; `disconnect` is idempotent.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::sync::mpsc;

mod tcp;
mod udp;

pub use tcp::TcpLogTransport;
pub use udp::UdpLogTransport;

/// Events a transport reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The endpoint is bound and listening.
    Connected(SocketAddr),
    /// One received payload (a TCP read or a UDP datagram).
    Data(Vec<u8>),
    /// Informational per-peer lifecycle notice (TCP only).
    Peer(String),
    /// Bind or socket failure; the endpoint is dead until reconnected.
    Error(String),
}

/// Sender half used by transports to report events.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// A bound network endpoint feeding raw payloads to the log parser.
#[async_trait]
pub trait LogTransport: Send {
    /// Bind to `host:port`. Emits `Connected` on success or `Error` on
    /// failure; on failure the endpoint is non-functional until the next
    /// `connect` call.
    async fn connect(&mut self, port: u16, host: &str, events: EventSender);

    /// Close the endpoint. Safe to call when not connected.
    fn disconnect(&mut self);
}
