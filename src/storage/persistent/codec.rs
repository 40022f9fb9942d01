//! Framing for log entries.
//!
//! Each frame is self-checking:
//! ```text
//! [version: 1 byte][length: 4 bytes LE][payload: N bytes JSON][crc32: 4 bytes LE]
//! ```
//! A log file starts with `MAGIC` followed by the codec version byte.

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

/// Current codec version.
pub const CODEC_VERSION: u8 = 1;

/// Magic bytes identifying a bitempo log.
pub const MAGIC: [u8; 4] = *b"BTMP";

/// Length of the log header in bytes.
pub const HEADER_LEN: u64 = MAGIC.len() as u64 + 1;

/// Upper bound on a single payload (16 MiB).
const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

fn invalid(message: String) -> IoError {
    IoError::new(ErrorKind::InvalidData, message)
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Serializes `value` into one checksummed frame.
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let payload =
        serde_json::to_vec(value).map_err(|e| invalid(format!("serialization failed: {e}")))?;
    if payload.len() > MAX_PAYLOAD {
        return Err(invalid(format!(
            "payload of {} bytes exceeds maximum {MAX_PAYLOAD}",
            payload.len()
        )));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| invalid("payload length does not fit in u32".to_string()))?;

    let mut frame = Vec::with_capacity(payload.len() + 9);
    frame.push(CODEC_VERSION);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&checksum(&payload).to_le_bytes());
    Ok(frame)
}

/// Reads one frame and deserializes its payload.
///
/// # Errors
/// - `UnexpectedEof` if the frame is cut short (torn write)
/// - `InvalidData` on version mismatch, oversized length, CRC mismatch,
///   or undecodable payload
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> IoResult<T> {
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported codec version: {} (expected {CODEC_VERSION})",
            version[0]
        )));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_PAYLOAD {
        return Err(invalid(format!("entry size {len} exceeds maximum {MAX_PAYLOAD}")));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(&payload);
    if stored != computed {
        return Err(invalid(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x}"
        )));
    }

    serde_json::from_slice(&payload).map_err(|e| invalid(format!("deserialization failed: {e}")))
}

/// Writes the log header.
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION])
}

/// Reads and checks the log header, returning its codec version.
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut header = [0u8; 5];
    reader.read_exact(&mut header)?;
    if header[..4] != MAGIC {
        return Err(invalid(format!(
            "invalid magic bytes: expected {MAGIC:?}, got {:?}",
            &header[..4]
        )));
    }
    if header[4] != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported log version: {} (expected {CODEC_VERSION})",
            header[4]
        )));
    }
    Ok(header[4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame_round_trip() {
        let value = serde_json::json!({"entity-id": "acct-1", "balance": 100});
        let frame = encode(&value).unwrap();
        assert_eq!(frame[0], CODEC_VERSION);

        let decoded: serde_json::Value = decode(&mut Cursor::new(frame)).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_detects_corruption() {
        let mut frame = encode(&"some payload".to_string()).unwrap();
        frame[7] ^= 0xFF;

        let err = decode::<String>(&mut Cursor::new(frame)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_frame_is_eof() {
        let frame = encode(&"some payload".to_string()).unwrap();
        let torn = frame[..frame.len() - 2].to_vec();

        let err = decode::<String>(&mut Cursor::new(torn)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_rejects_oversized_length() {
        let mut bad = vec![CODEC_VERSION];
        bad.extend_from_slice(&200_000_000u32.to_le_bytes());

        let err = decode::<String>(&mut Cursor::new(bad)).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_header_round_trip_and_bad_magic() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        assert_eq!(read_header(&mut Cursor::new(buf)).unwrap(), CODEC_VERSION);

        let err = read_header(&mut Cursor::new(b"KYRO\x01".to_vec())).unwrap_err();
        assert!(err.to_string().contains("invalid magic"));
    }
}
