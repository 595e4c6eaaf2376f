//! Attribute Protocol pieces shared by the delegator and the assistant.
//!
//! The ATT bearer itself (PDU framing, MTU exchange, request queueing) belongs to the host stack.
//! This module only defines the vocabulary both sides speak: attribute handles, handle ranges, and
//! the error codes sent in *Error Response* PDUs.

use crate::{bytes::*, Error};
use core::fmt;

/// A 16-bit handle uniquely identifying an attribute on an ATT server.
///
/// The `0x0000` handle (`NULL`) is invalid and must not be used.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttHandle(u16);

impl AttHandle {
    /// The `0x0000` handle is not used for actual attributes, but as a special placeholder when no
    /// attribute handle is valid (eg. in error responses).
    pub const NULL: Self = AttHandle(0x0000);

    /// Returns the raw 16-bit integer representing this handle.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Create an attribute handle from a raw u16
    pub fn from_raw(raw: u16) -> Self {
        AttHandle(raw)
    }

    /// Returns the handle `n` positions after `self`.
    pub(crate) fn offset(&self, n: u16) -> Self {
        AttHandle(self.0.wrapping_add(n))
    }
}

impl fmt::Debug for AttHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl FromBytes<'_> for AttHandle {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(AttHandle(bytes.read_u16_le()?))
    }
}

impl ToBytes for AttHandle {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u16_le(self.0)
    }
}

/// An inclusive range of attribute handles, as returned by service discovery.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HandleRange {
    start: AttHandle,
    end: AttHandle,
}

impl HandleRange {
    /// Creates a handle range, checking that it is valid.
    ///
    /// Returns `None` if `start` is the `NULL` handle or `end` comes before `start`.
    pub fn new(start: AttHandle, end: AttHandle) -> Option<Self> {
        if start == AttHandle::NULL || start > end {
            None
        } else {
            Some(Self { start, end })
        }
    }

    pub(crate) fn new_unchecked(start: AttHandle, end: AttHandle) -> Self {
        Self { start, end }
    }

    /// Checks if `handle` is in this range.
    pub fn contains(&self, handle: AttHandle) -> bool {
        self.start <= handle && handle <= self.end
    }

    pub fn start(&self) -> AttHandle {
        self.start
    }

    pub fn end(&self) -> AttHandle {
        self.end
    }
}

enum_with_unknown! {
    /// Error codes that can be sent from the ATT server to the client in response to a request.
    ///
    /// Besides the core ATT errors, this includes the application errors defined by the Broadcast
    /// Audio Scan Service and the common profile error codes.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum ErrorCode(u8) {
        /// Attempted to use an `AttHandle` that isn't valid on this server.
        InvalidHandle = 0x01,
        /// Attribute isn't readable.
        ReadNotPermitted = 0x02,
        /// Attribute isn't writable.
        WriteNotPermitted = 0x03,
        /// Attribute PDU is invalid.
        InvalidPdu = 0x04,
        /// Authentication needed before attribute can be read/written.
        InsufficientAuthentication = 0x05,
        /// Server doesn't support this operation.
        RequestNotSupported = 0x06,
        /// Offset was past the end of the attribute.
        InvalidOffset = 0x07,
        /// Authorization needed before attribute can be read/written.
        InsufficientAuthorization = 0x08,
        /// No attribute found within the specified attribute handle range.
        AttributeNotFound = 0x0A,
        /// Attribute can't be read/written using *Read Key Blob* request.
        AttributeNotLong = 0x0B,
        /// Attribute value has an incorrect length for the operation.
        InvalidAttributeValueLength = 0x0D,
        /// Request has encountered an "unlikely" error and could not be completed.
        UnlikelyError = 0x0E,
        /// Attribute cannot be read/written without an encrypted connection.
        InsufficientEncryption = 0x0F,
        /// Server didn't have enough resources to complete a request.
        InsufficientResources = 0x11,
        /// BASS: the Control Point opcode is not supported.
        OpcodeNotSupported = 0x80,
        /// BASS: the Source_ID does not match any Receive State.
        InvalidSourceId = 0x81,
        /// BASS: the change counter in the write does not match the Receive State.
        InvalidChangeCounter = 0x82,
        /// The write request was rejected by the profile.
        WriteRequestRejected = 0xFC,
        /// A Client Characteristic Configuration descriptor is not configured as required.
        CccdImproperlyConfigured = 0xFD,
        /// A request is already in progress.
        ProcedureAlreadyInProgress = 0xFE,
        /// An attribute value is out of range.
        OutOfRange = 0xFF,
    }
}

/// An ATT error paired with the handle it applies to, ready to be sent as an *Error Response*.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttError {
    code: ErrorCode,
    handle: AttHandle,
}

impl AttError {
    pub fn new(code: ErrorCode, handle: AttHandle) -> Self {
        Self { code, handle }
    }

    /// Creates an error for a handle that does not exist on this server.
    pub fn attribute_not_found() -> Self {
        Self::new(ErrorCode::AttributeNotFound, AttHandle::NULL)
    }

    /// Returns the error code to send.
    pub fn error_code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the handle of the attribute that caused the error.
    pub fn handle(&self) -> AttHandle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(ErrorCode::from(0x81), ErrorCode::InvalidSourceId);
        assert_eq!(u8::from(ErrorCode::InvalidChangeCounter), 0x82);
        assert_eq!(ErrorCode::from(0x42), ErrorCode::Unknown(0x42));
        assert!(!ErrorCode::from(0x42).is_known());
    }

    #[test]
    fn handle_range() {
        let h = AttHandle::from_raw;
        assert!(HandleRange::new(AttHandle::NULL, h(5)).is_none());
        assert!(HandleRange::new(h(6), h(5)).is_none());

        let range = HandleRange::new(h(1), h(5)).unwrap();
        assert!(range.contains(h(1)));
        assert!(range.contains(h(5)));
        assert!(!range.contains(h(6)));
    }
}
