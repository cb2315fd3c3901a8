//! Splitting outgoing messages into frames.

use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// Iterator over the frames of one outgoing message.
///
/// A payload no larger than the fragment size becomes a single final frame
/// that takes ownership of the payload without copying. Larger payloads
/// become an initial Text/Binary frame followed by Continuation frames, the
/// last of which carries the final flag.
#[derive(Debug)]
pub struct MessageFragmenter {
    payload: Vec<u8>,
    opcode: OpCode,
    fragment_size: usize,
    offset: usize,
    started: bool,
}

impl MessageFragmenter {
    #[must_use]
    pub fn new(message: Message, fragment_size: usize) -> Self {
        Self {
            opcode: message.opcode(),
            payload: message.into_bytes(),
            fragment_size: fragment_size.max(1),
            offset: 0,
            started: false,
        }
    }

    /// Number of frames this message will produce.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.payload.len().div_ceil(self.fragment_size).max(1)
    }
}

impl Iterator for MessageFragmenter {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if !self.started && self.payload.len() <= self.fragment_size {
            self.started = true;
            self.offset = self.payload.len();
            return Some(Frame::new(
                true,
                self.opcode,
                std::mem::take(&mut self.payload),
            ));
        }
        if self.offset >= self.payload.len() {
            return None;
        }

        let end = (self.offset + self.fragment_size).min(self.payload.len());
        let chunk = self.payload[self.offset..end].to_vec();
        self.offset = end;

        let opcode = if self.started {
            OpCode::Continuation
        } else {
            self.started = true;
            self.opcode
        };
        Some(Frame::new(end == self.payload.len(), opcode, chunk))
    }
}
