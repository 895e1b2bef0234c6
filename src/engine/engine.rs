//! The engine façade and its guarded state.
//!
//! One non-reentrant mutex guards all protocol state. Nothing user-visible
//! runs under it: decode paths and façade operations stage events and
//! diagnostic messages, and each entry point flushes both after releasing
//! the lock. Delegates and diagnostic sinks may therefore call straight back
//! into the engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::{Buf, BytesMut};
use http::{Request, Response, StatusCode};

use crate::config::Config;
use crate::diagnostics::{
    DiagnosticSink, DiagnosticsHub, SubscriptionId, LEVEL_INFO, LEVEL_WARNING,
};
use crate::engine::Role;
use crate::error::{Error, HandshakeError};
use crate::event::{Delegates, Event};
use crate::protocol::frame::{self, Frame, MAX_CONTROL_PAYLOAD};
use crate::protocol::handshake;
use crate::protocol::{close, AssembledMessage, MessageAssembler, MessageKind, OpCode};
use crate::transport::Transport;

/// Fills `dest` from the OS entropy source, falling back to a time-seeded
/// xorshift stream if that source is unavailable.
fn fill_random(dest: &mut [u8]) {
    if getrandom::getrandom(dest).is_ok() {
        return;
    }
    use std::time::{SystemTime, UNIX_EPOCH};
    let mut seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15);
    for byte in dest {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        *byte = seed as u8;
    }
}

/// Transport binding, fixed at open time.
struct Link {
    transport: Arc<dyn Transport>,
    role: Role,
}

/// Everything the engine lock guards.
struct EngineState {
    config: Config,
    link: Option<Link>,
    /// Sec-WebSocket-Key in wire form, kept between the two client-open steps.
    key: String,
    close_sent: bool,
    close_received: bool,
    /// Kind of the outbound message currently mid-fragmentation.
    sending: Option<MessageKind>,
    /// Inbound bytes not yet forming a complete frame.
    frame_buffer: BytesMut,
    assembler: MessageAssembler,
    delegates: Option<Delegates>,
    events: VecDeque<Event>,
    /// Diagnostics staged under the lock, published after release.
    staged_diags: Vec<(usize, String)>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            config: Config::default(),
            link: None,
            key: String::new(),
            close_sent: false,
            close_received: false,
            sending: None,
            frame_buffer: BytesMut::new(),
            assembler: MessageAssembler::new(),
            delegates: None,
            events: VecDeque::new(),
            staged_diags: Vec::new(),
        }
    }

    fn diag(&mut self, level: usize, message: String) {
        self.staged_diags.push((level, message));
    }

    fn peer(&self) -> String {
        self.link
            .as_ref()
            .map(|link| link.transport.peer_id())
            .unwrap_or_default()
    }

    /// Frames `payload` and hands it to the transport, masking per role.
    fn send_frame(&mut self, fin: bool, opcode: OpCode, payload: &[u8]) {
        let Some(link) = &self.link else { return };
        let mask = link.role.must_mask().then(|| {
            let mut key = [0u8; 4];
            fill_random(&mut key);
            key
        });
        link.transport
            .send_data(frame::encode(fin, opcode, payload, mask));
    }

    /// Initiates the local side of the close handshake.
    ///
    /// `fail` short-circuits the handshake: the Close event is surfaced
    /// immediately and the transport dropped without waiting for the peer.
    fn close(&mut self, code: u16, reason: &str, fail: bool) {
        if self.close_sent {
            return;
        }
        self.close_sent = true;
        if code == close::ABNORMAL {
            // 1006 is never put on the wire.
            self.finish_failed_close(code, reason);
            return;
        }
        let mut payload = Vec::new();
        if code != close::NO_STATUS {
            payload.extend_from_slice(&code.to_be_bytes());
            payload.extend_from_slice(reason.as_bytes());
        }
        self.send_frame(true, OpCode::Close, &payload);
        if fail {
            self.finish_failed_close(code, reason);
        } else if self.close_received {
            if let Some(link) = &self.link {
                link.transport.break_link(true);
            }
        }
        let peer = self.peer();
        self.diag(LEVEL_INFO, format!("Connection to {peer} closed ({reason})"));
    }

    /// Failure path: surface the close now and drop the transport hard.
    fn finish_failed_close(&mut self, code: u16, reason: &str) {
        self.close_received = true;
        self.events.push_back(Event::Close {
            code,
            reason: reason.to_string(),
        });
        if let Some(link) = &self.link {
            link.transport.break_link(false);
        }
    }

    fn fail(&mut self, error: Error) {
        self.close(error.close_code(), &error.to_string(), true);
    }

    /// Buffers inbound bytes and drains every complete frame.
    fn receive_data(&mut self, data: &[u8]) {
        if self.link.is_none() {
            return;
        }
        if self
            .config
            .frame_cap_exceeded(self.frame_buffer.len(), data.len())
        {
            self.fail(Error::FrameTooLarge);
            return;
        }
        self.frame_buffer.extend_from_slice(data);
        while let Some((header_len, payload_len)) = frame::probe(&self.frame_buffer) {
            let Some(total) = header_len.checked_add(payload_len) else {
                return;
            };
            if self.frame_buffer.len() < total {
                return;
            }
            self.receive_frame(header_len, total);
            self.frame_buffer.advance(total);
        }
    }

    /// Handles the complete frame occupying `..total` of the buffer.
    fn receive_frame(&mut self, header_len: usize, total: usize) {
        if self.close_received {
            return;
        }
        let Some(role) = self.link.as_ref().map(|link| link.role) else {
            return;
        };
        let decoded = Frame::decode(&self.frame_buffer[..total], header_len, role);
        let frame = match decoded {
            Ok(frame) => frame,
            Err(error) => {
                self.fail(error);
                return;
            }
        };
        match frame.opcode {
            OpCode::Continuation | OpCode::Text | OpCode::Binary => {
                match self.assembler.push(frame.opcode, frame.fin, &frame.payload) {
                    Ok(Some(AssembledMessage::Text(text))) => {
                        self.events.push_back(Event::Text(text));
                    }
                    Ok(Some(AssembledMessage::Binary(data))) => {
                        self.events.push_back(Event::Binary(data));
                    }
                    Ok(None) => {}
                    Err(error) => self.fail(error),
                }
            }
            OpCode::Close => self.receive_close(frame.payload),
            OpCode::Ping => {
                self.send_frame(true, OpCode::Pong, &frame.payload);
                self.events.push_back(Event::Ping(frame.payload));
            }
            OpCode::Pong => self.events.push_back(Event::Pong(frame.payload)),
        }
    }

    /// A close frame arrived from the peer.
    fn receive_close(&mut self, payload: Vec<u8>) {
        let mut code = close::NO_STATUS;
        let mut reason = String::new();
        if payload.len() >= 2 {
            code = u16::from_be_bytes([payload[0], payload[1]]);
            match String::from_utf8(payload[2..].to_vec()) {
                Ok(text) => reason = text,
                Err(_) => {
                    self.fail(Error::InvalidCloseReasonUtf8);
                    return;
                }
            }
        }
        self.close_received = true;
        let handshake_complete = self.close_sent;
        self.events.push_back(Event::Close { code, reason });
        if handshake_complete {
            if let Some(link) = &self.link {
                link.transport.break_link(true);
            }
        }
        let peer = self.peer();
        self.diag(LEVEL_INFO, format!("Connection to {peer} closed by peer"));
    }

    /// The transport reported the connection gone without a close handshake.
    fn connection_broken(&mut self) {
        if self.link.is_none() {
            return;
        }
        let peer = self.peer();
        self.close(close::ABNORMAL, "connection broken by peer", true);
        self.diag(LEVEL_INFO, format!("Connection to {peer} broken by peer"));
    }
}

struct Inner {
    diagnostics: DiagnosticsHub,
    state: Mutex<EngineState>,
}

impl Inner {
    /// The state is a plain protocol machine; a panicking delegate cannot
    /// tear an invariant, so a poisoned lock is simply recovered.
    fn locked(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes staged diagnostics, then drains the event queue.
    ///
    /// Both the delegate table and the queue are copied out under the lock
    /// and consumed after it is released. Events produced by a reentrant
    /// delegate call are drained by that call's own flush.
    fn flush(&self) {
        let (staged, delegates, events) = {
            let mut state = self.locked();
            let staged = std::mem::take(&mut state.staged_diags);
            let delegates = state.delegates.clone();
            let events = if delegates.is_some() {
                std::mem::take(&mut state.events)
            } else {
                VecDeque::new()
            };
            (staged, delegates, events)
        };
        for (level, message) in staged {
            self.diagnostics.publish(level, &message);
        }
        if let Some(delegates) = delegates {
            for event in events {
                delegates.dispatch(event);
            }
        }
    }
}

/// A WebSocket protocol engine bound to one connection.
///
/// The engine reacts to two stimulus sources: bytes delivered by the
/// [`Transport`] it is opened on, and calls through this façade. Inbound
/// traffic becomes [`Event`]s handed to the installed [`Delegates`];
/// outbound calls become framed bytes on the transport.
///
/// All operations are callable from any thread, and from inside delegate
/// callbacks.
///
/// ```rust,ignore
/// let ws = WebSocket::new();
/// ws.set_delegates(
///     Delegates::new()
///         .on_text(|text| println!("peer says {text}"))
///         .on_close(|code, reason| println!("closed {code}: {reason}")),
/// );
///
/// let mut request = http::Request::builder().uri("/chat").body(())?;
/// ws.start_open_as_client(&mut request);
/// // ... send the request, read the response ...
/// if ws.finish_open_as_client(transport, &response) {
///     ws.send_text("hello", true);
/// }
/// ```
pub struct WebSocket {
    inner: Arc<Inner>,
}

impl Default for WebSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocket {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                diagnostics: DiagnosticsHub::new(),
                state: Mutex::new(EngineState::new()),
            }),
        }
    }

    /// Replaces the configuration. Meant to be called before a transport is
    /// bound; the new values apply to traffic from this point on.
    pub fn configure(&self, config: Config) {
        self.inner.locked().config = config;
    }

    /// Registers `sink` for diagnostics at `min_level` and above.
    pub fn subscribe_to_diagnostics(
        &self,
        sink: DiagnosticSink,
        min_level: usize,
    ) -> SubscriptionId {
        self.inner.diagnostics.subscribe(sink, min_level)
    }

    /// Removes a diagnostics subscription.
    pub fn unsubscribe_from_diagnostics(&self, id: SubscriptionId) {
        self.inner.diagnostics.unsubscribe(id);
    }

    /// Prepares `request` to initiate the opening handshake as a client.
    ///
    /// Generates a fresh nonce for `Sec-WebSocket-Key` and remembers it for
    /// [`finish_open_as_client`](Self::finish_open_as_client).
    pub fn start_open_as_client<B>(&self, request: &mut Request<B>) {
        let mut nonce = [0u8; 16];
        fill_random(&mut nonce);
        let key = handshake::encode_key(&nonce);
        handshake::prepare_request(request, &key);
        self.inner.locked().key = key;
    }

    /// Validates the server's answer to a request prepared with
    /// [`start_open_as_client`](Self::start_open_as_client); on success binds
    /// `transport` in the client role and returns `true`.
    pub fn finish_open_as_client<B>(
        &self,
        transport: Arc<dyn Transport>,
        response: &Response<B>,
    ) -> bool {
        let key = self.inner.locked().key.clone();
        match handshake::validate_response(response, &key) {
            Ok(()) => {
                self.open(transport, Role::Client);
                true
            }
            Err(error) => {
                self.inner
                    .diagnostics
                    .publish(LEVEL_WARNING, &format!("handshake rejected: {error}"));
                false
            }
        }
    }

    /// Validates an inbound upgrade `request` and answers it in `response`.
    ///
    /// On success the response becomes 101 Switching Protocols, `transport`
    /// is bound in the server role, and `true` is returned. `trailer` is any
    /// payload that followed the request headers; it must be empty.
    /// Rejections either leave `response` untouched (the request was not an
    /// upgrade attempt) or set 400 Bad Request.
    pub fn open_as_server<B, B2>(
        &self,
        transport: Arc<dyn Transport>,
        request: &Request<B>,
        response: &mut Response<B2>,
        trailer: &[u8],
    ) -> bool {
        let checked = handshake::validate_request(request).and_then(|key| {
            if trailer.is_empty() {
                Ok(key)
            } else {
                Err(HandshakeError::TrailingData)
            }
        });
        match checked {
            Ok(key) => {
                handshake::accept_request(response, &key);
                self.inner.locked().key = key;
                self.open(transport, Role::Server);
                true
            }
            Err(error) => {
                if error.wants_bad_request() {
                    *response.status_mut() = StatusCode::BAD_REQUEST;
                }
                self.inner
                    .diagnostics
                    .publish(LEVEL_WARNING, &format!("handshake rejected: {error}"));
                false
            }
        }
    }

    /// Binds `transport` and takes over its callback slots.
    ///
    /// The registered callbacks hold only a weak handle to the engine; once
    /// the [`WebSocket`] is dropped they go quiet, so the transport never
    /// extends the engine's lifetime.
    pub fn open(&self, transport: Arc<dyn Transport>, role: Role) {
        self.inner.locked().link = Some(Link {
            transport: transport.clone(),
            role,
        });

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        transport.set_data_received_handler(Box::new(move |data| {
            if let Some(inner) = weak.upgrade() {
                inner.locked().receive_data(data);
                inner.flush();
            }
        }));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        transport.set_broken_handler(Box::new(move |_graceful| {
            if let Some(inner) = weak.upgrade() {
                inner.locked().connection_broken();
                inner.flush();
            }
        }));
    }

    /// Initiates (or completes) the close handshake with `code` and `reason`.
    ///
    /// Repeated calls are no-ops. Use code 1005 to send a close frame with no
    /// status payload.
    pub fn close(&self, code: u16, reason: &str) {
        {
            let mut state = self.inner.locked();
            if state.link.is_none() {
                return;
            }
            state.close(code, reason, false);
        }
        self.inner.flush();
    }

    /// Variant of [`close`](Self::close) that fails the connection: the Close
    /// event is surfaced immediately and the transport dropped without
    /// waiting for the peer's close frame.
    pub fn close_with_failure(&self, code: u16, reason: &str) {
        {
            let mut state = self.inner.locked();
            if state.link.is_none() {
                return;
            }
            state.close(code, reason, true);
        }
        self.inner.flush();
    }

    /// Sends a ping. Dropped silently when no transport is bound, a close was
    /// already sent, or `data` exceeds 125 bytes.
    pub fn ping(&self, data: impl Into<Vec<u8>>) {
        self.send_control(OpCode::Ping, data.into());
    }

    /// Sends an unsolicited pong. Same drop rules as [`ping`](Self::ping).
    pub fn pong(&self, data: impl Into<Vec<u8>>) {
        self.send_control(OpCode::Pong, data.into());
    }

    fn send_control(&self, opcode: OpCode, data: Vec<u8>) {
        {
            let mut state = self.inner.locked();
            if state.link.is_none() || state.close_sent {
                return;
            }
            if data.len() > MAX_CONTROL_PAYLOAD {
                state.diag(
                    LEVEL_WARNING,
                    format!("dropping oversize {opcode} frame ({} bytes)", data.len()),
                );
            } else {
                state.send_frame(true, opcode, &data);
            }
        }
        self.inner.flush();
    }

    /// Sends `data` as a text message or fragment.
    ///
    /// With `last_fragment == false` the message stays open and subsequent
    /// calls emit continuation frames. Dropped silently when no transport is
    /// bound, a close was sent, or a binary message is mid-fragmentation.
    pub fn send_text(&self, data: &str, last_fragment: bool) {
        self.send_message(MessageKind::Text, data.as_bytes(), last_fragment);
    }

    /// Sends `data` as a binary message or fragment; mirror of
    /// [`send_text`](Self::send_text).
    pub fn send_binary(&self, data: &[u8], last_fragment: bool) {
        self.send_message(MessageKind::Binary, data, last_fragment);
    }

    fn send_message(&self, kind: MessageKind, data: &[u8], last_fragment: bool) {
        {
            let mut state = self.inner.locked();
            if state.link.is_none() || state.close_sent {
                return;
            }
            if matches!(state.sending, Some(current) if current != kind) {
                return;
            }
            let opcode = if state.sending == Some(kind) {
                OpCode::Continuation
            } else if kind == MessageKind::Text {
                OpCode::Text
            } else {
                OpCode::Binary
            };
            state.send_frame(last_fragment, opcode, data);
            state.sending = (!last_fragment).then_some(kind);
        }
        self.inner.flush();
    }

    /// Installs the delegate table and drains any queued events.
    ///
    /// Events arriving before this call are held back, so nothing is lost by
    /// opening first and installing delegates later.
    pub fn set_delegates(&self, delegates: Delegates) {
        self.inner.locked().delegates = Some(delegates);
        self.inner.flush();
    }
}
