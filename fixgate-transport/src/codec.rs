/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message framing.
//!
//! [`FixCodec`] implements the `tokio_util` codec traits. The gateway drives it
//! synchronously from its receiver thread: bytes read from a non-blocking
//! socket are appended to a `BytesMut` and `decode` is called until it yields
//! `None`.

use crate::checksum::{TRAILER_LEN, calculate_checksum, parse_checksum};
use bytes::{BufMut, Bytes, BytesMut};
use memchr::memchr;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// SOH delimiter.
pub const SOH: u8 = 0x01;

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// Framing failures. Any of these ends the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The frame does not start with `8=`.
    #[error("frame must start with 8=")]
    InvalidBeginString,

    /// Tag 9 is missing or not the second field.
    #[error("missing body length field (tag 9)")]
    MissingBodyLength,

    /// Tag 9 is not a number.
    #[error("invalid body length value")]
    InvalidBodyLength,

    /// Tag 35 is missing.
    #[error("missing msg type field (tag 35)")]
    MissingMsgType,

    /// The trailer is not `10=NNN<SOH>`.
    #[error("malformed checksum trailer")]
    InvalidTrailer,

    /// Declared and calculated checksums differ.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum.
        calculated: u8,
        /// Declared checksum.
        declared: u8,
    },

    /// The frame would exceed the configured maximum.
    #[error("frame too large: {size} bytes exceeds maximum {max_size}")]
    FrameTooLarge {
        /// Frame size.
        size: usize,
        /// Configured maximum.
        max_size: usize,
    },

    /// I/O error surfaced through the codec traits.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Splits a byte stream into complete FIX frames.
#[derive(Debug, Clone)]
pub struct FixCodec {
    max_frame_size: usize,
    validate_checksum: bool,
}

impl FixCodec {
    /// Creates a codec with checksum validation and the default size limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            validate_checksum: true,
        }
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets whether checksums are verified.
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Returns the length of the first frame in `src` if it is complete.
    fn frame_length(&self, src: &[u8]) -> Result<Option<usize>, CodecError> {
        if src.len() < 2 {
            return Ok(None);
        }
        if &src[..2] != b"8=" {
            return Err(CodecError::InvalidBeginString);
        }
        let Some(begin_end) = memchr(SOH, src) else {
            return Ok(None);
        };

        let length_start = begin_end + 1;
        let rest = &src[length_start..];
        if rest.len() < 2 {
            return Ok(None);
        }
        if &rest[..2] != b"9=" {
            return Err(CodecError::MissingBodyLength);
        }
        let Some(length_end) = memchr(SOH, rest) else {
            if rest.len() > 12 {
                return Err(CodecError::InvalidBodyLength);
            }
            return Ok(None);
        };
        let body_length = parse_length(&rest[2..length_end])?;

        let body_start = length_start + length_end + 1;
        let total = body_start + body_length + TRAILER_LEN;
        if total > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: total,
                max_size: self.max_frame_size,
            });
        }
        if src.len() < total {
            return Ok(None);
        }
        Ok(Some(total))
    }

    fn verify_trailer(&self, frame: &[u8]) -> Result<(), CodecError> {
        let trailer_start = frame.len() - TRAILER_LEN;
        let trailer = &frame[trailer_start..];
        if &trailer[..3] != b"10=" || trailer[TRAILER_LEN - 1] != SOH {
            return Err(CodecError::InvalidTrailer);
        }
        if self.validate_checksum {
            let declared = parse_checksum(&trailer[3..6]).ok_or(CodecError::InvalidTrailer)?;
            let calculated = calculate_checksum(&frame[..trailer_start]);
            if declared != calculated {
                return Err(CodecError::ChecksumMismatch {
                    calculated,
                    declared,
                });
            }
        }
        Ok(())
    }
}

fn parse_length(digits: &[u8]) -> Result<usize, CodecError> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(CodecError::InvalidBodyLength);
    }
    digits.iter().try_fold(0usize, |acc, &d| {
        acc.checked_mul(10)
            .and_then(|v| v.checked_add(usize::from(d - b'0')))
            .ok_or(CodecError::InvalidBodyLength)
    })
}

impl Default for FixCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FixCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(total) = self.frame_length(src)? else {
            return Ok(None);
        };
        self.verify_trailer(&src[..total])?;
        Ok(Some(src.split_to(total).freeze()))
    }
}

impl Encoder<&[u8]> for FixCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: item.len(),
                max_size: self.max_frame_size,
            });
        }
        dst.reserve(item.len());
        dst.put_slice(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::format_checksum;

    fn frame(body: &str) -> Vec<u8> {
        let mut out = format!("8=FIX.4.4\x019={}\x01{}", body.len(), body).into_bytes();
        let checksum = format_checksum(calculate_checksum(&out));
        out.extend_from_slice(b"10=");
        out.extend_from_slice(&checksum);
        out.push(SOH);
        out
    }

    #[test]
    fn test_decode_complete_frame() {
        let mut codec = FixCodec::new();
        let bytes = frame("35=0\x0134=2\x01");
        let mut buf = BytesMut::from(&bytes[..]);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &bytes[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_across_partial_reads() {
        let mut codec = FixCodec::new();
        let bytes = frame("35=A\x0134=1\x01");
        let mut buf = BytesMut::new();

        for chunk in bytes.chunks(5) {
            assert!(buf.is_empty() || codec.decode(&mut buf).unwrap().is_none());
            buf.extend_from_slice(chunk);
        }
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &bytes[..]);
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut codec = FixCodec::new();
        let first = frame("35=A\x01");
        let second = frame("35=5\x01");
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&first);
        buf.extend_from_slice(&second);

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &first[..]);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &second[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut codec = FixCodec::new();
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        assert_eq!(codec.decode(&mut buf), Err(CodecError::InvalidBeginString));

        let mut buf = BytesMut::from(&b"8=FIX.4.4\x0135=A\x01"[..]);
        assert_eq!(codec.decode(&mut buf), Err(CodecError::MissingBodyLength));

        let mut buf = BytesMut::from(&b"8=FIX.4.4\x019=x\x01"[..]);
        assert_eq!(codec.decode(&mut buf), Err(CodecError::InvalidBodyLength));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut codec = FixCodec::new();
        let mut buf = BytesMut::from(&b"8=FIX.4.4\x019=5\x0135=0\x0110=000\x01"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::ChecksumMismatch { declared: 0, .. })
        ));

        let mut lenient = FixCodec::new().with_checksum_validation(false);
        let mut buf = BytesMut::from(&b"8=FIX.4.4\x019=5\x0135=0\x0110=000\x01"[..]);
        assert!(lenient.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn test_decode_frame_too_large() {
        let mut codec = FixCodec::new().with_max_frame_size(32);
        let bytes = frame("35=0\x0158=a long free text field\x01");
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::FrameTooLarge { max_size: 32, .. })
        ));
    }

    #[test]
    fn test_encode_copies_bytes() {
        let mut codec = FixCodec::new();
        let bytes = frame("35=0\x01");
        let mut dst = BytesMut::new();
        codec.encode(&bytes[..], &mut dst).unwrap();
        assert_eq!(&dst[..], &bytes[..]);
    }
}
