//! Wire framing consumed and produced by the tunnel.
//!
//! The tunnel does not parse HTTP. It captures the raw request prefix up to
//! [`HEADER_TERMINATOR`] and only asks one question of it: does the client want
//! a WebSocket upgrade? The answer picks one of two literal response payloads.

// ---------------------------------------------------------------------------
// Header frame
// ---------------------------------------------------------------------------

/// Blank-line sequence that ends an HTTP request head.
pub const HEADER_TERMINATOR: &[u8; 4] = b"\r\n\r\n";

/// Upper bound on the number of bytes captured from a client before the
/// response decision is made, terminator or not.
pub const MAX_HEADER_SIZE: usize = 16 * 1024;

/// Returns `true` when `frame` ends with [`HEADER_TERMINATOR`].
pub fn is_frame_complete(frame: &[u8]) -> bool {
    frame.ends_with(HEADER_TERMINATOR)
}

// ---------------------------------------------------------------------------
// Response selection
// ---------------------------------------------------------------------------

/// Response written to clients asking for a WebSocket upgrade.
pub const SWITCHING_PROTOCOLS: &[u8] =
    b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";

/// Response written to every other client (plain `CONNECT` style tunnels).
pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Markers whose presence anywhere in the header frame signals upgrade intent.
const UPGRADE_MARKERS: [&[u8]; 2] = [b"websocket", b"upgrade"];

/// What the client appears to be asking for, judged from its header frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The frame mentions `websocket` or `Upgrade`.
    Upgrade,
    /// Anything else, including an empty or truncated frame.
    Tunnel,
}

impl Intent {
    /// Classify a captured header frame.
    ///
    /// Matching is ASCII case-insensitive, so `UPGRADE` and `WebSocket` count.
    pub fn detect(frame: &[u8]) -> Self {
        if UPGRADE_MARKERS
            .iter()
            .any(|marker| contains_ignore_ascii_case(frame, marker))
        {
            Intent::Upgrade
        } else {
            Intent::Tunnel
        }
    }

    /// The literal response payload for this intent.
    pub fn response(self) -> &'static [u8] {
        match self {
            Intent::Upgrade => SWITCHING_PROTOCOLS,
            Intent::Tunnel => CONNECTION_ESTABLISHED,
        }
    }
}

fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_request_is_upgrade() {
        let frame = b"GET /chat HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
        assert_eq!(Intent::detect(frame), Intent::Upgrade);
        assert_eq!(Intent::detect(frame).response(), SWITCHING_PROTOCOLS);
    }

    #[test]
    fn plain_get_is_tunnel() {
        let frame = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        assert_eq!(Intent::detect(frame), Intent::Tunnel);
        assert_eq!(Intent::detect(frame).response(), CONNECTION_ESTABLISHED);
    }

    #[test]
    fn connect_is_tunnel() {
        let frame = b"CONNECT 127.0.0.1:22 HTTP/1.1\r\n\r\n";
        assert_eq!(Intent::detect(frame), Intent::Tunnel);
    }

    #[test]
    fn detection_ignores_case() {
        assert_eq!(Intent::detect(b"UPGRADE: x\r\n\r\n"), Intent::Upgrade);
        assert_eq!(Intent::detect(b"x: WebSocket\r\n\r\n"), Intent::Upgrade);
    }

    #[test]
    fn marker_may_appear_anywhere() {
        assert_eq!(Intent::detect(b"GET /websocket HTTP/1.1\r\n\r\n"), Intent::Upgrade);
        assert_eq!(Intent::detect(b"upgrad"), Intent::Tunnel);
    }

    #[test]
    fn empty_frame_is_tunnel() {
        assert_eq!(Intent::detect(b""), Intent::Tunnel);
    }

    #[test]
    fn frame_completion() {
        assert!(is_frame_complete(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(!is_frame_complete(b"GET / HTTP/1.1\r\n"));
        assert!(!is_frame_complete(b"\r\n\r"));
    }

    #[test]
    fn responses_end_with_blank_line() {
        assert!(is_frame_complete(SWITCHING_PROTOCOLS));
        assert!(is_frame_complete(CONNECTION_ESTABLISHED));
        assert!(SWITCHING_PROTOCOLS.starts_with(b"HTTP/1.1 101 "));
        assert!(CONNECTION_ESTABLISHED.starts_with(b"HTTP/1.1 200 "));
    }
}
