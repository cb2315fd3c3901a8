//! Reassembly of data frames into complete messages.

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// Builds [`Message`]s from one initiating data frame plus any number of
/// continuation frames.
///
/// The cumulative size is checked on every fragment, so an oversized message
/// fails as soon as the limit is crossed rather than after the final frame.
/// Text payloads are validated as UTF-8 once the message is complete.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    opcode: Option<OpCode>,
    fragment_count: usize,
    limits: Limits,
}

impl MessageAssembler {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            opcode: None,
            fragment_count: 0,
            limits,
        }
    }

    /// Feed one data frame.
    ///
    /// Returns `Some(message)` when the frame carried the final flag.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation without a started
    ///   message, a new data frame while one is in progress, or a control frame
    /// - `Error::MessageTooLarge` once the cumulative size exceeds the limit
    /// - `Error::TooManyFragments` when the fragment cap is crossed
    /// - `Error::InvalidUtf8` for a completed text message that is not UTF-8
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "Continuation frame without a message in progress".into(),
                ));
            }
            (OpCode::Continuation, Some(_)) => {}
            (OpCode::Text | OpCode::Binary, None) => self.opcode = Some(frame.opcode),
            (OpCode::Text | OpCode::Binary, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "New data frame while a fragmented message is in progress".into(),
                ));
            }
            (other, _) => {
                return Err(Error::ProtocolViolation(format!(
                    "{other} frame cannot be assembled into a message"
                )));
            }
        }

        self.fragment_count += 1;
        self.limits.check_fragment_count(self.fragment_count)?;

        let size = self.buffer.len() + frame.payload().len();
        self.limits.check_message_size(size)?;
        self.buffer.extend_from_slice(frame.payload());

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().to_vec();
        let opcode = self.opcode.take();
        self.fragment_count = 0;

        match opcode {
            Some(OpCode::Text) => String::from_utf8(payload)
                .map(|text| Some(Message::Text(text)))
                .map_err(|_| Error::InvalidUtf8),
            _ => Ok(Some(Message::Binary(payload))),
        }
    }

    /// Returns `true` while a fragmented message is in progress.
    #[must_use]
    pub const fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Bytes buffered for the message in progress.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
