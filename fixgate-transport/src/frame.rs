/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Admin frame encoding and header inspection.
//!
//! The gateway only needs to understand the session level messages that drive
//! its lifecycle (Logon and Logout). Everything else is passed through as
//! opaque framed bytes.

use crate::checksum::{calculate_checksum, format_checksum};
use crate::codec::{CodecError, SOH};
use bytes::{BufMut, Bytes, BytesMut};
use fixgate_core::clock::format_sending_time;
use fixgate_core::types::{CompId, SeqNum};
use memchr::memchr;

/// Tag numbers the gateway reads or writes.
pub mod tags {
    /// BeginString.
    pub const BEGIN_STRING: u32 = 8;
    /// BodyLength.
    pub const BODY_LENGTH: u32 = 9;
    /// CheckSum.
    pub const CHECKSUM: u32 = 10;
    /// MsgSeqNum.
    pub const MSG_SEQ_NUM: u32 = 34;
    /// MsgType.
    pub const MSG_TYPE: u32 = 35;
    /// SenderCompID.
    pub const SENDER_COMP_ID: u32 = 49;
    /// SendingTime.
    pub const SENDING_TIME: u32 = 52;
    /// TargetCompID.
    pub const TARGET_COMP_ID: u32 = 56;
    /// Text.
    pub const TEXT: u32 = 58;
    /// EncryptMethod.
    pub const ENCRYPT_METHOD: u32 = 98;
    /// HeartBtInt.
    pub const HEART_BT_INT: u32 = 108;
    /// ResetSeqNumFlag.
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
}

/// Message types the gateway distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    /// `35=A`
    Logon,
    /// `35=5`
    Logout,
    /// `35=0`
    Heartbeat,
    /// Any other message type.
    Other,
}

impl MsgKind {
    fn from_value(value: &[u8]) -> Self {
        match value {
            b"A" => Self::Logon,
            b"5" => Self::Logout,
            b"0" => Self::Heartbeat,
            _ => Self::Other,
        }
    }

    const fn wire_value(self) -> &'static [u8] {
        match self {
            Self::Logon => b"A",
            Self::Logout => b"5",
            Self::Heartbeat | Self::Other => b"0",
        }
    }
}

/// Iterates `(tag, value)` pairs of a frame.
///
/// Malformed fields end the iteration.
pub fn fields(frame: &[u8]) -> impl Iterator<Item = (u32, &[u8])> {
    let mut rest = frame;
    std::iter::from_fn(move || {
        let eq = memchr(b'=', rest)?;
        let end = memchr(SOH, &rest[eq..]).map_or(rest.len(), |pos| eq + pos);
        let tag = parse_u64(&rest[..eq]).and_then(|t| u32::try_from(t).ok())?;
        let value = &rest[eq + 1..end];
        rest = rest.get(end + 1..).unwrap_or(&[]);
        Some((tag, value))
    })
}

fn parse_u64(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() || digits.len() > 19 {
        return None;
    }
    digits.iter().try_fold(0u64, |acc, &d| {
        d.is_ascii_digit().then(|| acc * 10 + u64::from(d - b'0'))
    })
}

/// The header fields of an inbound frame that the gateway acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// BeginString (tag 8).
    pub begin_string: Option<String>,
    /// Message type.
    pub msg_kind: MsgKind,
    /// MsgSeqNum (tag 34), if present.
    pub msg_seq_num: Option<SeqNum>,
    /// SenderCompID (tag 49) of the counterparty.
    pub sender_comp_id: Option<CompId>,
    /// TargetCompID (tag 56), which should be us.
    pub target_comp_id: Option<CompId>,
    /// HeartBtInt (tag 108) in seconds, Logon only.
    pub heartbeat_interval_secs: Option<u64>,
}

impl FrameHeader {
    /// Reads the header of a complete frame.
    ///
    /// # Errors
    /// Returns `CodecError::MissingMsgType` if tag 35 is absent.
    pub fn parse(frame: &[u8]) -> Result<Self, CodecError> {
        let mut msg_kind = None;
        let mut header = Self {
            begin_string: None,
            msg_kind: MsgKind::Other,
            msg_seq_num: None,
            sender_comp_id: None,
            target_comp_id: None,
            heartbeat_interval_secs: None,
        };
        for (tag, value) in fields(frame) {
            match tag {
                tags::BEGIN_STRING => {
                    header.begin_string = std::str::from_utf8(value).ok().map(str::to_string);
                }
                tags::MSG_TYPE => msg_kind = Some(MsgKind::from_value(value)),
                tags::MSG_SEQ_NUM => header.msg_seq_num = parse_u64(value).map(SeqNum::new),
                tags::SENDER_COMP_ID => header.sender_comp_id = comp_id(value),
                tags::TARGET_COMP_ID => header.target_comp_id = comp_id(value),
                tags::HEART_BT_INT => header.heartbeat_interval_secs = parse_u64(value),
                tags::CHECKSUM => break,
                _ => {}
            }
        }
        header.msg_kind = msg_kind.ok_or(CodecError::MissingMsgType)?;
        Ok(header)
    }
}

fn comp_id(value: &[u8]) -> Option<CompId> {
    std::str::from_utf8(value).ok().and_then(CompId::new)
}

/// Standard header values of an outbound admin frame.
#[derive(Debug, Clone, Copy)]
pub struct HeaderFields<'a> {
    /// BeginString, e.g. `FIX.4.4`.
    pub begin_string: &'a str,
    /// Our CompID.
    pub sender_comp_id: &'a str,
    /// The counterparty's CompID.
    pub target_comp_id: &'a str,
    /// Sequence number of this message.
    pub msg_seq_num: SeqNum,
    /// SendingTime in epoch milliseconds.
    pub sending_time_ms: u64,
}

/// Encodes Logon and Logout frames.
///
/// Reuses one body buffer across calls.
#[derive(Debug)]
pub struct AdminEncoder {
    body: BytesMut,
}

impl AdminEncoder {
    /// Creates an encoder with the given initial buffer capacity.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            body: BytesMut::with_capacity(buffer_size),
        }
    }

    /// Encodes a Logon.
    ///
    /// # Arguments
    /// * `header` - Standard header values
    /// * `heartbeat_interval_secs` - HeartBtInt (tag 108)
    /// * `reset_seq_num` - Adds `141=Y` when true
    pub fn logon(
        &mut self,
        header: &HeaderFields<'_>,
        heartbeat_interval_secs: u64,
        reset_seq_num: bool,
    ) -> Bytes {
        self.begin_body(MsgKind::Logon, header);
        self.put_field(tags::ENCRYPT_METHOD, b"0");
        self.put_int(tags::HEART_BT_INT, heartbeat_interval_secs);
        if reset_seq_num {
            self.put_field(tags::RESET_SEQ_NUM_FLAG, b"Y");
        }
        self.finish(header.begin_string)
    }

    /// Encodes a Logout with optional text.
    pub fn logout(&mut self, header: &HeaderFields<'_>, text: Option<&str>) -> Bytes {
        self.begin_body(MsgKind::Logout, header);
        if let Some(text) = text {
            self.put_field(tags::TEXT, text.as_bytes());
        }
        self.finish(header.begin_string)
    }

    fn begin_body(&mut self, kind: MsgKind, header: &HeaderFields<'_>) {
        self.body.clear();
        self.put_field(tags::MSG_TYPE, kind.wire_value());
        self.put_field(tags::SENDER_COMP_ID, header.sender_comp_id.as_bytes());
        self.put_field(tags::TARGET_COMP_ID, header.target_comp_id.as_bytes());
        self.put_int(tags::MSG_SEQ_NUM, header.msg_seq_num.value());
        let sending_time = format_sending_time(header.sending_time_ms);
        self.put_field(tags::SENDING_TIME, sending_time.as_bytes());
    }

    fn put_field(&mut self, tag: u32, value: &[u8]) {
        let mut tag_buf = itoa::Buffer::new();
        self.body.put_slice(tag_buf.format(tag).as_bytes());
        self.body.put_u8(b'=');
        self.body.put_slice(value);
        self.body.put_u8(SOH);
    }

    fn put_int(&mut self, tag: u32, value: u64) {
        let mut value_buf = itoa::Buffer::new();
        let formatted = value_buf.format(value);
        self.put_field(tag, formatted.as_bytes());
    }

    fn finish(&mut self, begin_string: &str) -> Bytes {
        let mut length_buf = itoa::Buffer::new();
        let body_length = length_buf.format(self.body.len());

        let mut out = BytesMut::with_capacity(self.body.len() + begin_string.len() + 24);
        out.put_slice(b"8=");
        out.put_slice(begin_string.as_bytes());
        out.put_u8(SOH);
        out.put_slice(b"9=");
        out.put_slice(body_length.as_bytes());
        out.put_u8(SOH);
        out.put_slice(&self.body);

        let checksum = format_checksum(calculate_checksum(&out));
        out.put_slice(b"10=");
        out.put_slice(&checksum);
        out.put_u8(SOH);
        out.freeze()
    }
}

impl Default for AdminEncoder {
    fn default() -> Self {
        Self::new(512)
    }
}
