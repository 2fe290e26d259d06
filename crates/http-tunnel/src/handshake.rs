//! Header sniffing and the single response written before relaying.
//!
//! The sniffer reads one byte at a time so it never consumes anything past the
//! blank line. Whatever the client sends after its request head belongs to the
//! relay and must reach the backend untouched.

use std::io;

use bytes::{BufMut, BytesMut};
use common::{
    protocol::{is_frame_complete, MAX_HEADER_SIZE},
    Intent, TunnelError,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Raw request prefix captured from a client.
#[derive(Debug)]
pub struct HeaderFrame {
    bytes: BytesMut,
}

impl HeaderFrame {
    /// Whether the frame ended on the blank-line terminator rather than the cap.
    pub fn is_complete(&self) -> bool {
        is_frame_complete(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn intent(&self) -> Intent {
        Intent::detect(self.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read a header frame from `reader`.
///
/// Stops after `\r\n\r\n` or once [`MAX_HEADER_SIZE`] bytes are held. A peer
/// that closes before either happens yields [`TunnelError::HeaderIncomplete`].
pub async fn read_header<R>(reader: &mut R) -> Result<HeaderFrame, TunnelError>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = BytesMut::with_capacity(MAX_HEADER_SIZE);

    while bytes.len() < MAX_HEADER_SIZE {
        match reader.read_u8().await {
            Ok(byte) => bytes.put_u8(byte),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(TunnelError::HeaderIncomplete {
                    received: bytes.len(),
                });
            }
            Err(e) => return Err(TunnelError::HeaderRead(e)),
        }
        if is_frame_complete(&bytes) {
            break;
        }
    }

    Ok(HeaderFrame { bytes })
}

/// Write the response payload selected by `intent`, in full.
pub async fn write_response<W>(writer: &mut W, intent: Intent) -> Result<(), TunnelError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(intent.response())
        .await
        .map_err(TunnelError::ResponseWrite)?;
    writer.flush().await.map_err(TunnelError::ResponseWrite)
}
