//! Shared test harness: a scripted in-memory transport and event recording.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use wsengine::{BrokenHandler, DataReceivedHandler, Delegates, Event, Role, Transport, WebSocket};

/// In-memory transport: records outbound bytes and break requests, and lets
/// tests inject inbound bytes or a broken notification.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    breaks: Mutex<Vec<bool>>,
    data_handler: Mutex<Option<DataReceivedHandler>>,
    broken_handler: Mutex<Option<BrokenHandler>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Injects bytes as if read off the wire.
    pub fn deliver(&self, bytes: &[u8]) {
        let handler = self.data_handler.lock().unwrap();
        if let Some(handler) = handler.as_ref() {
            handler(bytes);
        }
    }

    /// Injects a connection-broken notification.
    pub fn break_from_peer(&self, graceful: bool) {
        let handler = self.broken_handler.lock().unwrap();
        if let Some(handler) = handler.as_ref() {
            handler(graceful);
        }
    }

    /// Everything the engine sent, one entry per `send_data` call.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// `break_link` calls, in order, with their `clean` flag.
    pub fn breaks(&self) -> Vec<bool> {
        self.breaks.lock().unwrap().clone()
    }

    pub fn has_data_handler(&self) -> bool {
        self.data_handler.lock().unwrap().is_some()
    }
}

impl Transport for MockTransport {
    fn send_data(&self, data: Vec<u8>) {
        self.sent.lock().unwrap().push(data);
    }

    fn set_data_received_handler(&self, handler: DataReceivedHandler) {
        *self.data_handler.lock().unwrap() = Some(handler);
    }

    fn set_broken_handler(&self, handler: BrokenHandler) {
        *self.broken_handler.lock().unwrap() = Some(handler);
    }

    fn break_link(&self, clean: bool) {
        self.breaks.lock().unwrap().push(clean);
    }

    fn peer_id(&self) -> String {
        "mock-peer".to_string()
    }
}

/// A delegate table that records every event in arrival order.
pub fn recording_delegates() -> (Delegates, Arc<Mutex<Vec<Event>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let text_log = events.clone();
    let binary_log = events.clone();
    let ping_log = events.clone();
    let pong_log = events.clone();
    let close_log = events.clone();
    let delegates = Delegates::new()
        .on_text(move |text| text_log.lock().unwrap().push(Event::Text(text)))
        .on_binary(move |data| binary_log.lock().unwrap().push(Event::Binary(data)))
        .on_ping(move |data| ping_log.lock().unwrap().push(Event::Ping(data)))
        .on_pong(move |data| pong_log.lock().unwrap().push(Event::Pong(data)))
        .on_close(move |code, reason| {
            close_log.lock().unwrap().push(Event::Close { code, reason });
        });
    (delegates, events)
}

/// An engine opened over a fresh mock transport with recording delegates.
pub fn open_engine(role: Role) -> (WebSocket, Arc<MockTransport>, Arc<Mutex<Vec<Event>>>) {
    let ws = WebSocket::new();
    let transport = MockTransport::new();
    ws.open(transport.clone(), role);
    let (delegates, events) = recording_delegates();
    ws.set_delegates(delegates);
    (ws, transport, events)
}

/// Snapshot of recorded events.
pub fn events_of(log: &Arc<Mutex<Vec<Event>>>) -> Vec<Event> {
    log.lock().unwrap().clone()
}
