//! Telemetry log ingestion for the tol server toolkit.
//!
//! An always-on listener accepts structured log records over TCP or UDP,
//! classifies them against a syslog-like grammar and renders them onto an
//! output surface. Malformed payloads are never fatal; they pass through
//! as raw text.

pub mod console;
pub mod parse;
pub mod transport;

pub use console::ConsoleController;
pub use parse::{LogRecord, ParsedLine, Severity, parse_line};
pub use transport::{
    EventSender, LogTransport, TcpLogTransport, TransportEvent, UdpLogTransport,
};
