//! Fixed-layout encoding helpers and frame I/O
//!
//! USB/IP messages are fixed-width records in network byte order. Every
//! message type in this crate encodes and decodes itself field by field with
//! `byteorder`; this module holds the shared pieces: length checks, fixed-size
//! string fields, the return-frame filler, and single-read frame I/O.
//!
//! # Framing
//!
//! USB/IP carries no length prefix. Control messages and URB commands are
//! small, so the server treats one transport read as one complete frame:
//! ```text
//! read(buf) -> n      decode(&buf[..n])      no partial-frame buffering
//! ```

use crate::error::{ProtocolError, Result};
use std::io::Read;

#[cfg(feature = "async")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Conventional USB/IP TCP port
pub const USBIP_PORT: u16 = 3240;

/// Status value for success, used unconditionally by the emulator
pub const USBIP_STATUS_OK: u32 = 0;

/// Size of a URB command or return message without payload
pub const URB_MESSAGE_SIZE: usize = 48;

/// Size of the buffer used for every frame of the URB exchange
///
/// A return frame is always exactly this long: the 48-byte message followed
/// by filler.
pub const URB_FRAME_SIZE: usize = 1500;

/// Bytes added to the requested transfer length in every return message
pub const OVERFLOW_SIZE: u32 = 512;

/// Filler repeated after the return message
pub const URB_DATA_PATTERN: [u8; 4] = [0xDE, 0xAD, 0xC0, 0xDE];

/// Fail with [`ProtocolError::Truncated`] unless `frame` holds `needed` bytes
pub fn ensure_len(message: &'static str, frame: &[u8], needed: usize) -> Result<()> {
    if frame.len() < needed {
        return Err(ProtocolError::Truncated {
            message,
            needed,
            available: frame.len(),
        });
    }
    Ok(())
}

/// Copy `s` into a NUL-padded fixed-size field, truncating if too long
pub fn fixed_str<const N: usize>(s: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let len = s.len().min(N);
    field[..len].copy_from_slice(&s.as_bytes()[..len]);
    field
}

/// Read a NUL-padded fixed-size field back as a string
///
/// Stops at the first NUL; invalid UTF-8 is replaced rather than rejected.
pub fn str_from_fixed(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Read an exact-size byte array
pub fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut field = [0u8; N];
    reader.read_exact(&mut field)?;
    Ok(field)
}

/// Fill `buf` with [`URB_DATA_PATTERN`] repeated from its first byte
///
/// A trailing partial pattern is cut short to fit.
pub fn fill_pattern(buf: &mut [u8]) {
    for chunk in buf.chunks_mut(URB_DATA_PATTERN.len()) {
        chunk.copy_from_slice(&URB_DATA_PATTERN[..chunk.len()]);
    }
}

/// Async: read one frame into `buf`, returning the number of bytes read
///
/// A zero-length read means the peer closed the stream and is reported as
/// [`ProtocolError::ConnectionClosed`].
#[cfg(feature = "async")]
pub async fn read_frame_async<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncReadExt + Unpin,
{
    let n = reader.read(buf).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    Ok(n)
}

/// Async: write a complete frame in one send
#[cfg(feature = "async")]
pub async fn write_frame_async<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ensure_len() {
        assert!(ensure_len("op header", &[0u8; 8], 8).is_ok());

        let result = ensure_len("op header", &[0u8; 7], 8);
        let Err(ProtocolError::Truncated {
            needed, available, ..
        }) = result
        else {
            panic!("Expected Truncated error, got {:?}", result);
        };
        assert_eq!(needed, 8);
        assert_eq!(available, 7);
    }

    #[test]
    fn test_fixed_str_pads_with_nul() {
        let field: [u8; 32] = fixed_str("1-1");
        assert_eq!(&field[..3], b"1-1");
        assert!(field[3..].iter().all(|&b| b == 0));
        assert_eq!(str_from_fixed(&field), "1-1");
    }

    #[test]
    fn test_fixed_str_truncates() {
        let field: [u8; 4] = fixed_str("abcdefgh");
        assert_eq!(&field, b"abcd");
        assert_eq!(str_from_fixed(&field), "abcd");
    }

    #[test]
    fn test_read_array() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3, 4, 5]);
        let arr: [u8; 4] = read_array(&mut cursor).unwrap();
        assert_eq!(arr, [1, 2, 3, 4]);

        let short: Result<[u8; 4]> = read_array(&mut cursor);
        assert!(short.is_err());
    }

    #[test]
    fn test_fill_pattern_whole_and_partial() {
        let mut buf = [0u8; 10];
        fill_pattern(&mut buf);
        assert_eq!(
            buf,
            [0xDE, 0xAD, 0xC0, 0xDE, 0xDE, 0xAD, 0xC0, 0xDE, 0xDE, 0xAD]
        );
    }

    #[test]
    fn test_filler_region_is_whole_patterns() {
        // 1452 bytes of filler follow the return message
        assert_eq!((URB_FRAME_SIZE - URB_MESSAGE_SIZE) % URB_DATA_PATTERN.len(), 0);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_read_frame_async_eof() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let mut buf = [0u8; 16];
        let result = read_frame_async(&mut server, &mut buf).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_write_then_read_frame_async() {
        let (mut client, mut server) = tokio::io::duplex(64);

        write_frame_async(&mut client, &[1, 2, 3]).await.unwrap();

        let mut buf = [0u8; 16];
        let n = read_frame_async(&mut server, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
    }
}
