//! # wsengine: a delegate-driven WebSocket protocol engine
//!
//! `wsengine` implements the framing and message layer of RFC 6455 between
//! two injected boundaries: a byte [`Transport`] below, and application
//! [`Delegates`] above. It performs no I/O and runs no tasks of its own; it
//! reacts to bytes the transport delivers and to calls on the
//! [`WebSocket`] façade.
//!
//! ## What it does
//!
//! - Frame encode/decode with role-correct masking
//! - Fragmented-message reassembly, with control frames interleaving freely
//! - UTF-8 validation of text messages and close reasons
//! - The two-phase close handshake, including the failure escape hatch
//! - Opening-handshake policy over [`http`] request/response objects
//!
//! Extension and subprotocol negotiation are deliberately absent; a peer
//! advertising either is rejected.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wsengine::{Delegates, WebSocket};
//!
//! let ws = WebSocket::new();
//! ws.set_delegates(
//!     Delegates::new()
//!         .on_text(|text| println!("<- {text}"))
//!         .on_close(|code, reason| println!("closed {code} ({reason})")),
//! );
//!
//! let mut request = http::Request::builder().uri("/chat").body(())?;
//! ws.start_open_as_client(&mut request);
//! // transmit `request`, read the peer's response, then:
//! if ws.finish_open_as_client(transport, &response) {
//!     ws.send_text("hello", true);
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transport;

pub use config::Config;
pub use diagnostics::{DiagnosticSink, SubscriptionId, LEVEL_ERROR, LEVEL_INFO, LEVEL_WARNING};
pub use engine::{Role, WebSocket};
pub use error::{Error, HandshakeError, Result};
pub use event::{Delegates, Event};
pub use transport::{BrokenHandler, DataReceivedHandler, Transport};
