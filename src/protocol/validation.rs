//! Header checks applied to every incoming frame before its payload is
//! buffered (RFC 6455 Sections 5.1 and 5.2).
//!
//! Checks run in a fixed order so the first violation reported is stable:
//! masking, then reserved bits, then frame size.

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::FrameHeader;

/// Role-aware validator for incoming frame headers.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    limits: Limits,
    accept_unmasked_frames: bool,
}

impl FrameValidator {
    #[must_use]
    pub const fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            limits,
            accept_unmasked_frames: false,
        }
    }

    /// Let a server accept unmasked frames. Useful against test peers only.
    #[must_use]
    pub const fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Validate a parsed header.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` when a server receives an unmasked frame
    /// - `Error::MaskedServerFrame` when a client receives a masked frame
    /// - `Error::ReservedBitsSet` when any RSV bit is set
    /// - `Error::FrameTooLarge` when the payload exceeds `max_frame_size`
    pub fn validate(&self, header: &FrameHeader) -> Result<()> {
        let masked = header.mask.is_some();
        if masked != self.role.expects_masked() {
            match self.role {
                Role::Server if !self.accept_unmasked_frames => {
                    return Err(Error::UnmaskedClientFrame);
                }
                Role::Client => return Err(Error::MaskedServerFrame),
                Role::Server => {}
            }
        }

        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        self.limits.check_frame_size(header.payload_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;

    fn header(masked: bool, rsv1: bool, payload_len: usize) -> FrameHeader {
        FrameHeader {
            fin: true,
            rsv1,
            rsv2: false,
            rsv3: false,
            opcode: OpCode::Binary,
            mask: masked.then_some([1, 2, 3, 4]),
            payload_len,
            header_len: if masked { 6 } else { 2 },
        }
    }

    #[test]
    fn test_server_requires_masked_frames() {
        let validator = FrameValidator::new(Role::Server, Limits::default());
        assert!(validator.validate(&header(true, false, 10)).is_ok());
        assert_eq!(
            validator.validate(&header(false, false, 10)),
            Err(Error::UnmaskedClientFrame)
        );

        let lenient = validator.with_accept_unmasked(true);
        assert!(lenient.validate(&header(false, false, 10)).is_ok());
    }

    #[test]
    fn test_client_rejects_masked_frames() {
        let validator = FrameValidator::new(Role::Client, Limits::default());
        assert!(validator.validate(&header(false, false, 10)).is_ok());
        assert_eq!(
            validator.validate(&header(true, false, 10)),
            Err(Error::MaskedServerFrame)
        );
    }

    #[test]
    fn test_rejects_reserved_bits() {
        let validator = FrameValidator::new(Role::Client, Limits::default());
        assert_eq!(
            validator.validate(&header(false, true, 10)),
            Err(Error::ReservedBitsSet)
        );
    }

    #[test]
    fn test_frame_size_limit() {
        let validator = FrameValidator::new(Role::Client, Limits::new(1024, 4096, 10));
        assert!(validator.validate(&header(false, false, 1024)).is_ok());
        assert_eq!(
            validator.validate(&header(false, false, 1025)),
            Err(Error::FrameTooLarge {
                size: 1025,
                max: 1024
            })
        );
    }

    #[test]
    fn test_check_order() {
        let validator = FrameValidator::new(Role::Server, Limits::new(100, 1000, 10));
        // Unmasked, RSV1 and oversized: masking wins.
        assert_eq!(
            validator.validate(&header(false, true, 200)),
            Err(Error::UnmaskedClientFrame)
        );
        // Masked, RSV1 and oversized: reserved bits win.
        assert_eq!(
            validator.validate(&header(true, true, 200)),
            Err(Error::ReservedBitsSet)
        );
    }
}
