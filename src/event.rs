//! Events surfaced to the application, and the delegate table that
//! receives them.

use std::fmt;
use std::sync::Arc;

/// Something that happened on the connection.
///
/// Events are queued in decode order and handed to the matching delegate; a
/// `Close`, once emitted, is always the last event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A complete text message, already validated as UTF-8.
    Text(String),
    /// A complete binary message.
    Binary(Vec<u8>),
    /// A ping arrived; the engine has already answered it with a pong.
    Ping(Vec<u8>),
    /// A pong arrived.
    Pong(Vec<u8>),
    /// The close handshake progressed or the connection failed.
    Close {
        /// Status code from the peer's close frame, or 1005/1006 when none
        /// was carried.
        code: u16,
        /// Reason text, possibly empty.
        reason: String,
    },
}

/// Callback invoked with each completed text message.
pub type TextDelegate = Arc<dyn Fn(String) + Send + Sync>;
/// Callback invoked with each completed binary message.
pub type BinaryDelegate = Arc<dyn Fn(Vec<u8>) + Send + Sync>;
/// Callback invoked with each ping payload.
pub type PingDelegate = Arc<dyn Fn(Vec<u8>) + Send + Sync>;
/// Callback invoked with each pong payload.
pub type PongDelegate = Arc<dyn Fn(Vec<u8>) + Send + Sync>;
/// Callback invoked once with the close code and reason.
pub type CloseDelegate = Arc<dyn Fn(u16, String) + Send + Sync>;

/// Per-event-variant callbacks.
///
/// Until a table is installed the engine holds events back; a variant with no
/// callback drops its events silently. Delegates may call back into the
/// engine: they are always invoked outside the engine lock.
#[derive(Clone, Default)]
pub struct Delegates {
    pub(crate) text: Option<TextDelegate>,
    pub(crate) binary: Option<BinaryDelegate>,
    pub(crate) ping: Option<PingDelegate>,
    pub(crate) pong: Option<PongDelegate>,
    pub(crate) close: Option<CloseDelegate>,
}

impl Delegates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_text(mut self, delegate: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.text = Some(Arc::new(delegate));
        self
    }

    #[must_use]
    pub fn on_binary(mut self, delegate: impl Fn(Vec<u8>) + Send + Sync + 'static) -> Self {
        self.binary = Some(Arc::new(delegate));
        self
    }

    #[must_use]
    pub fn on_ping(mut self, delegate: impl Fn(Vec<u8>) + Send + Sync + 'static) -> Self {
        self.ping = Some(Arc::new(delegate));
        self
    }

    #[must_use]
    pub fn on_pong(mut self, delegate: impl Fn(Vec<u8>) + Send + Sync + 'static) -> Self {
        self.pong = Some(Arc::new(delegate));
        self
    }

    #[must_use]
    pub fn on_close(mut self, delegate: impl Fn(u16, String) + Send + Sync + 'static) -> Self {
        self.close = Some(Arc::new(delegate));
        self
    }

    /// Routes one event to its callback, if one is installed.
    pub(crate) fn dispatch(&self, event: Event) {
        match event {
            Event::Text(text) => {
                if let Some(delegate) = &self.text {
                    delegate(text);
                }
            }
            Event::Binary(data) => {
                if let Some(delegate) = &self.binary {
                    delegate(data);
                }
            }
            Event::Ping(data) => {
                if let Some(delegate) = &self.ping {
                    delegate(data);
                }
            }
            Event::Pong(data) => {
                if let Some(delegate) = &self.pong {
                    delegate(data);
                }
            }
            Event::Close { code, reason } => {
                if let Some(delegate) = &self.close {
                    delegate(code, reason);
                }
            }
        }
    }
}

impl fmt::Debug for Delegates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegates")
            .field("text", &self.text.is_some())
            .field("binary", &self.binary.is_some())
            .field("ping", &self.ping.is_some())
            .field("pong", &self.pong.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}
