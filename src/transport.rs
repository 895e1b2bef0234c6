//! The byte-transport contract the engine drives.

/// Callback invoked with bytes read off the wire.
pub type DataReceivedHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Callback invoked when the connection drops; `true` means the peer shut
/// down cleanly.
pub type BrokenHandler = Box<dyn Fn(bool) + Send + Sync>;

/// A reliable, ordered byte stream carrying WebSocket traffic.
///
/// The engine owns both callback slots from
/// [`open`](crate::WebSocket::open) until teardown. Implementations must not
/// assume anything about frame boundaries: the engine reassembles frames from
/// arbitrary chunking, and hands `send_data` fully framed bytes.
///
/// The handlers installed by the engine hold only a weak reference back to
/// it, so a transport outliving its engine delivers into the void rather
/// than keeping it alive.
pub trait Transport: Send + Sync {
    /// Queues `data` for transmission, preserving order.
    ///
    /// Called while the engine lock is held; implementations that may block
    /// should hand the bytes to their own write queue.
    fn send_data(&self, data: Vec<u8>);

    /// Installs the inbound-data callback, replacing any previous one.
    fn set_data_received_handler(&self, handler: DataReceivedHandler);

    /// Installs the connection-broken callback, replacing any previous one.
    fn set_broken_handler(&self, handler: BrokenHandler);

    /// Tears the connection down. `clean` requests that pending outbound
    /// data be flushed first.
    fn break_link(&self, clean: bool);

    /// Identifies the remote peer in diagnostics, e.g. an address.
    fn peer_id(&self) -> String;
}
