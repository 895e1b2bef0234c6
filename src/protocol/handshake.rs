//! Opening-handshake policy (RFC 6455 §4) over parsed HTTP messages.
//!
//! Header parsing and serialization happen outside the engine; this module
//! only applies WebSocket upgrade policy to [`http`] request and response
//! objects. The `http` crate does not model reason phrases, so the canonical
//! reasons of [`StatusCode`] stand in for "Switching Protocols" and
//! "Bad Request".

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use sha1::{Digest, Sha1};

use crate::error::HandshakeError;

/// GUID appended to the client key before hashing (RFC 6455 §1.3).
const KEY_SALT: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this engine speaks.
const SUPPORTED_VERSION: &str = "13";

/// Length the Sec-WebSocket-Key must have once Base64-decoded.
const KEY_LENGTH: usize = 16;

/// Computes the Sec-WebSocket-Accept value for a client key:
/// `Base64(SHA-1(key + GUID))`.
///
/// # Example
///
/// ```
/// use wsengine::protocol::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(KEY_SALT.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Base64-encodes a nonce into the Sec-WebSocket-Key wire form.
#[must_use]
pub fn encode_key(nonce: &[u8]) -> String {
    BASE64.encode(nonce)
}

/// Splits a header into trimmed, lowercased comma-separated tokens, across
/// all of its occurrences.
fn header_tokens(headers: &HeaderMap, name: HeaderName) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn has_header_token(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    header_tokens(headers, name).iter().any(|t| t == token)
}

/// Appends `token` to a comma-separated header, preserving existing tokens.
fn append_header_token(headers: &mut HeaderMap, name: HeaderName, token: &str) {
    let mut tokens: Vec<String> = headers
        .get_all(&name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    tokens.push(token.to_string());
    if let Ok(value) = HeaderValue::from_str(&tokens.join(", ")) {
        headers.insert(name, value);
    }
}

fn header_equals(headers: &HeaderMap, name: HeaderName, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}

/// Fills in the upgrade headers of an outbound client request.
///
/// Sets `Sec-WebSocket-Version`, `Sec-WebSocket-Key`, `Upgrade`, and appends
/// the `upgrade` token to `Connection`. `key` must already be in wire form
/// (see [`encode_key`]); the caller keeps it for [`validate_response`].
pub fn prepare_request<B>(request: &mut Request<B>, key: &str) {
    let headers = request.headers_mut();
    headers.insert(
        header::SEC_WEBSOCKET_VERSION,
        HeaderValue::from_static(SUPPORTED_VERSION),
    );
    if let Ok(value) = HeaderValue::from_str(key) {
        headers.insert(header::SEC_WEBSOCKET_KEY, value);
    }
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    append_header_token(headers, header::CONNECTION, "upgrade");
}

/// Checks a server's answer to a request prepared with [`prepare_request`].
///
/// Any advertised extension or subprotocol is a rejection: the engine offers
/// none, so the peer accepting one would desynchronize the framing layer.
///
/// # Errors
///
/// One [`HandshakeError`] per violated requirement, first failure wins.
pub fn validate_response<B>(response: &Response<B>, key: &str) -> Result<(), HandshakeError> {
    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        return Err(HandshakeError::UnexpectedStatus(response.status().as_u16()));
    }
    let headers = response.headers();
    if !has_header_token(headers, header::CONNECTION, "upgrade") {
        return Err(HandshakeError::MissingUpgradeToken);
    }
    if !header_equals(headers, header::UPGRADE, "websocket") {
        return Err(HandshakeError::InvalidUpgradeHeader);
    }
    let accept = headers
        .get(header::SEC_WEBSOCKET_ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if accept != compute_accept_key(key) {
        return Err(HandshakeError::AcceptMismatch);
    }
    if !header_tokens(headers, header::SEC_WEBSOCKET_EXTENSIONS).is_empty() {
        return Err(HandshakeError::ExtensionAdvertised);
    }
    if !header_tokens(headers, header::SEC_WEBSOCKET_PROTOCOL).is_empty() {
        return Err(HandshakeError::ProtocolAdvertised);
    }
    Ok(())
}

/// Checks an inbound upgrade request and extracts the client key.
///
/// # Errors
///
/// Failures before the version check mean "not an upgrade request" and leave
/// the response alone; later ones report
/// [`wants_bad_request`](HandshakeError::wants_bad_request).
pub fn validate_request<B>(request: &Request<B>) -> Result<String, HandshakeError> {
    if request.method() != Method::GET {
        return Err(HandshakeError::InvalidMethod);
    }
    let headers = request.headers();
    if !has_header_token(headers, header::CONNECTION, "upgrade") {
        return Err(HandshakeError::MissingUpgradeToken);
    }
    if !header_equals(headers, header::UPGRADE, "websocket") {
        return Err(HandshakeError::InvalidUpgradeHeader);
    }
    if !header_equals(headers, header::SEC_WEBSOCKET_VERSION, SUPPORTED_VERSION) {
        return Err(HandshakeError::UnsupportedVersion);
    }
    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    match BASE64.decode(&key) {
        Ok(decoded) if decoded.len() == KEY_LENGTH => Ok(key),
        _ => Err(HandshakeError::InvalidKey),
    }
}

/// Turns `response` into the 101 Switching Protocols answer for `key`.
///
/// Merges the `upgrade` token into any existing `Connection` value and sets
/// `Upgrade` and `Sec-WebSocket-Accept`.
pub fn accept_request<B>(response: &mut Response<B>, key: &str) {
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    append_header_token(headers, header::CONNECTION, "upgrade");
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    if let Ok(value) = HeaderValue::from_str(&compute_accept_key(key)) {
        headers.insert(header::SEC_WEBSOCKET_ACCEPT, value);
    }
}
