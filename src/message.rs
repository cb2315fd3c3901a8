//! Application messages, outbound queue items and close codes (RFC 6455).

use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away (e.g., server shutdown, browser navigating away).
    GoingAway,
    /// Protocol error (1002). Endpoint received a malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Endpoint received data type it cannot handle.
    UnsupportedData,
    /// Invalid payload (1007). Endpoint received a message with invalid data (e.g., non-UTF-8 in text).
    InvalidPayload,
    /// Policy violation (1008). Endpoint received a message that violates its policy.
    PolicyViolation,
    /// Message too big (1009). Endpoint received a message too large to process.
    MessageTooBig,
    /// Mandatory extension (1010). Client expected server to negotiate an extension.
    MandatoryExtension,
    /// Internal error (1011). Endpoint encountered an unexpected condition.
    InternalError,
    /// Custom close code (3000-4999 for applications, 1012-1014 for registered codes).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code may appear in a Close frame.
    ///
    /// Valid codes are 1000-1003, 1007-1014 and the 3000-4999 range reserved
    /// for libraries and applications.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Check if this close code is reserved and MUST NOT be sent in a Close frame.
    ///
    /// 1004 is reserved; 1005, 1006 and 1015 are local-only indications.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1004..=1006 | 1015)
    }
}

/// Close frame containing status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing (UTF-8, max 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode the payload of a received Close frame.
    ///
    /// An empty payload carries no status (`Ok(None)`).
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a one-byte payload
    /// - `Error::InvalidCloseCode` for codes that must not appear on the wire
    /// - `Error::InvalidUtf8` if the reason is not UTF-8
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(Error::ProtocolViolation("Truncated close frame".into())),
            _ => {
                let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
                if !code.is_valid() {
                    return Err(Error::InvalidCloseCode(code.as_u16()));
                }
                let reason = std::str::from_utf8(&payload[2..])?;
                Ok(Some(Self::new(code, reason)))
            }
        }
    }
}

/// A complete message delivered to, or sent by, the application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// Returns `true` if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Returns `true` if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the raw payload regardless of representation.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Consume and return the raw payload regardless of representation.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Message::Text(s) => s.into_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Consume and return the text content, if this is a text message.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }

    /// Borrow the text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }

    /// Borrow the binary content, if this is a binary message.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Message::Binary(data) => Some(data),
            Message::Text(_) => None,
        }
    }

    pub(crate) const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message::Binary(data)
    }
}

/// A control frame waiting in the send queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Ping with its application data.
    Ping(Vec<u8>),
    /// Pong echoing a ping's application data.
    Pong(Vec<u8>),
    /// Close with an optional status.
    Close(Option<CloseFrame>),
}

impl Control {
    /// Returns `true` for a Close item.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Control::Close(_))
    }
}

impl From<Control> for Frame {
    fn from(control: Control) -> Self {
        match control {
            Control::Ping(data) => Frame::ping(data),
            Control::Pong(data) => Frame::pong(data),
            Control::Close(Some(cf)) => Frame::close(Some(cf.code.as_u16()), &cf.reason),
            Control::Close(None) => Frame::close(None, ""),
        }
    }
}

/// An item in the send queue, owned by the writer task once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendItem {
    /// Application data, fragmented and possibly coalesced by the writer.
    Data(Message),
    /// Control frame, written promptly and never batched.
    Control(Control),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_creation() {
        let msg = Message::text("hello");
        assert!(matches!(msg, Message::Text(s) if s == "hello"));

        let msg = Message::text(String::from("world"));
        assert!(matches!(msg, Message::Text(s) if s == "world"));
    }

    #[test]
    fn test_message_binary_creation() {
        let msg = Message::binary(vec![1, 2, 3]);
        assert!(matches!(msg, Message::Binary(ref d) if d == &[1, 2, 3]));

        let msg = Message::binary([4, 5, 6]);
        assert!(matches!(msg, Message::Binary(ref d) if d == &[4, 5, 6]));
    }

    #[test]
    fn test_message_size_and_bytes() {
        let msg = Message::text("héllo");
        assert_eq!(msg.len(), 6);
        assert!(!msg.is_empty());
        assert_eq!(msg.as_bytes(), "héllo".as_bytes());
        assert_eq!(msg.into_bytes(), "héllo".as_bytes().to_vec());

        assert!(Message::binary(Vec::new()).is_empty());
    }

    #[test]
    fn test_message_accessors() {
        let msg = Message::text("hello");
        assert!(msg.is_text());
        assert_eq!(msg.as_text(), Some("hello"));
        assert_eq!(msg.as_binary(), None);
        assert_eq!(msg.into_text(), Some(String::from("hello")));

        let msg = Message::binary(vec![1, 2, 3]);
        assert!(msg.is_binary());
        assert_eq!(msg.as_binary(), Some([1, 2, 3].as_slice()));
        assert_eq!(msg.into_text(), None);
    }

    #[test]
    fn test_message_from_conversions() {
        assert_eq!(Message::from("a"), Message::text("a"));
        assert_eq!(Message::from(String::from("b")), Message::text("b"));
        assert_eq!(Message::from(vec![7u8]), Message::binary(vec![7]));
    }

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1001), CloseCode::GoingAway);
        assert_eq!(CloseCode::from_u16(1009), CloseCode::MessageTooBig);
        assert_eq!(CloseCode::from_u16(1011), CloseCode::InternalError);
        assert_eq!(CloseCode::from_u16(3000), CloseCode::Other(3000));
    }

    #[test]
    fn test_close_code_validity() {
        assert!(CloseCode::Normal.is_valid());
        assert!(CloseCode::MessageTooBig.is_valid());
        assert!(CloseCode::Other(1012).is_valid());
        assert!(CloseCode::Other(4999).is_valid());

        assert!(!CloseCode::Other(999).is_valid());
        assert!(!CloseCode::Other(1005).is_valid());
        assert!(!CloseCode::Other(1006).is_valid());
        assert!(!CloseCode::Other(2999).is_valid());
        assert!(!CloseCode::Other(5000).is_valid());
    }

    #[test]
    fn test_close_code_reserved() {
        assert!(CloseCode::Other(1004).is_reserved());
        assert!(CloseCode::Other(1005).is_reserved());
        assert!(CloseCode::Other(1006).is_reserved());
        assert!(CloseCode::Other(1015).is_reserved());
        assert!(!CloseCode::Normal.is_reserved());
    }

    #[test]
    fn test_close_frame_parse() {
        assert_eq!(CloseFrame::parse(&[]).unwrap(), None);

        let mut payload = 1000u16.to_be_bytes().to_vec();
        payload.extend_from_slice(b"bye");
        let cf = CloseFrame::parse(&payload).unwrap().unwrap();
        assert_eq!(cf.code, CloseCode::Normal);
        assert_eq!(cf.reason, "bye");
    }

    #[test]
    fn test_close_frame_parse_rejects_bad_payloads() {
        assert!(matches!(
            CloseFrame::parse(&[0x03]),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(
            CloseFrame::parse(&1005u16.to_be_bytes()),
            Err(Error::InvalidCloseCode(1005))
        ));

        assert!(matches!(
            CloseFrame::parse(&5000u16.to_be_bytes()),
            Err(Error::InvalidCloseCode(5000))
        ));
        assert!(CloseFrame::parse(&4999u16.to_be_bytes()).is_ok());

        let mut payload = 1000u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            CloseFrame::parse(&payload),
            Err(Error::InvalidUtf8)
        ));
    }

    #[test]
    fn test_control_into_frame() {
        let frame = Frame::from(Control::Ping(b"hi".to_vec()));
        assert_eq!(frame.opcode, OpCode::Ping);
        assert_eq!(frame.payload(), b"hi");

        let frame = Frame::from(Control::Close(Some(CloseFrame::new(
            CloseCode::GoingAway,
            "later",
        ))));
        assert_eq!(frame.opcode, OpCode::Close);
        assert_eq!(&frame.payload()[..2], &1001u16.to_be_bytes());
        assert_eq!(&frame.payload()[2..], b"later");

        assert!(Control::Close(None).is_close());
        assert!(!Control::Pong(Vec::new()).is_close());
    }
}
