use crate::att::ErrorCode;
use core::fmt;

/// Errors returned by the BASS delegator, assistant and wire codec.
///
/// Everything except [`Error::Att`] is produced locally. `Att` carries an error code reported by
/// the peer's ATT server untouched.
///
/// [`Error::Att`]: #variant.Att
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Packet specified an invalid length value or was too short.
    InvalidLength,

    /// Invalid value supplied for field.
    InvalidValue,

    /// Unexpectedly reached EOF while reading or writing data.
    ///
    /// This is returned when the application tries to fit too much data into a fixed-size buffer,
    /// and also when reaching EOF prematurely while reading data from a buffer.
    Eof,

    /// Parsing didn't consume the entire buffer.
    IncompleteParse,

    /// A Receive State value could not be decoded. Nothing was applied.
    MalformedRecord,

    /// A command field is outside of its allowed range.
    InvalidParameter,

    /// No free Receive State slot, or more subgroups or metadata than fit in one.
    ResourceExhausted,

    /// The command referenced a source ID with no Receive State.
    UnknownSourceId,

    /// The Control Point opcode is not known.
    OpcodeNotSupported,

    /// The assistant instance already has an operation outstanding.
    Busy,

    /// The change counter in a Control Point write did not match the Receive State.
    StaleCounter,

    /// The synchronization engine could not establish PA or BIG sync.
    SyncFailed,

    /// PA sync was not established before the wait timer expired.
    SyncTimeout,

    /// The broadcast code did not decrypt the BIG.
    BadBroadcastCode,

    /// A BIG sync attempt is already in progress for this source.
    AlreadySyncing,

    /// The peer does not expose the Broadcast Audio Scan Service, or it lacks a characteristic.
    NotFound,

    /// The connection is unknown or was lost while an operation was pending.
    NotConnected,

    /// A long read returned more data than the reassembly buffer holds.
    InsufficientResources,

    /// The peer's ATT server rejected the request with this error code.
    Att(ErrorCode),
}

impl Error {
    /// Maps a locally produced error to the ATT error code sent in the write response.
    pub fn to_att_code(self) -> ErrorCode {
        match self {
            Error::OpcodeNotSupported => ErrorCode::OpcodeNotSupported,
            Error::UnknownSourceId => ErrorCode::InvalidSourceId,
            Error::StaleCounter => ErrorCode::InvalidChangeCounter,
            Error::InvalidLength | Error::Eof | Error::IncompleteParse => {
                ErrorCode::InvalidAttributeValueLength
            }
            Error::InvalidParameter | Error::InvalidValue | Error::MalformedRecord => {
                ErrorCode::WriteRequestRejected
            }
            Error::ResourceExhausted | Error::InsufficientResources => {
                ErrorCode::InsufficientResources
            }
            Error::Att(code) => code,
            _ => ErrorCode::UnlikelyError,
        }
    }

    /// Interprets an ATT error code received from a peer.
    ///
    /// The BASS application error codes become their protocol errors; everything else is passed
    /// through as `Error::Att`.
    pub fn from_att_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::OpcodeNotSupported => Error::OpcodeNotSupported,
            ErrorCode::InvalidSourceId => Error::UnknownSourceId,
            ErrorCode::InvalidChangeCounter => Error::StaleCounter,
            other => Error::Att(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidLength => "invalid length value specified",
            Error::InvalidValue => "invalid value for field",
            Error::Eof => "end of buffer",
            Error::IncompleteParse => "excess data in buffer",
            Error::MalformedRecord => "malformed receive state",
            Error::InvalidParameter => "invalid control point parameter",
            Error::ResourceExhausted => "out of receive state resources",
            Error::UnknownSourceId => "unknown source id",
            Error::OpcodeNotSupported => "control point opcode not supported",
            Error::Busy => "operation already in progress",
            Error::StaleCounter => "stale change counter",
            Error::SyncFailed => "synchronization failed",
            Error::SyncTimeout => "synchronization timed out",
            Error::BadBroadcastCode => "bad broadcast code",
            Error::AlreadySyncing => "already synchronizing",
            Error::NotFound => "service or characteristic not found",
            Error::NotConnected => "not connected",
            Error::InsufficientResources => "long read exceeds buffer",
            Error::Att(code) => return write!(f, "ATT error {:?}", code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bass_codes_round_trip() {
        for err in &[
            Error::OpcodeNotSupported,
            Error::UnknownSourceId,
            Error::StaleCounter,
        ] {
            assert_eq!(Error::from_att_code(err.to_att_code()), *err);
        }
    }

    #[test]
    fn transport_codes_pass_through() {
        assert_eq!(
            Error::from_att_code(ErrorCode::InsufficientEncryption),
            Error::Att(ErrorCode::InsufficientEncryption)
        );
        assert_eq!(
            Error::from_att_code(ErrorCode::Unknown(0x9A)),
            Error::Att(ErrorCode::Unknown(0x9A))
        );
        assert_eq!(
            Error::Att(ErrorCode::WriteNotPermitted).to_att_code(),
            ErrorCode::WriteNotPermitted
        );
    }

    #[test]
    fn validation_errors_map_to_write_responses() {
        assert_eq!(
            Error::InvalidLength.to_att_code(),
            ErrorCode::InvalidAttributeValueLength
        );
        assert_eq!(
            Error::InvalidParameter.to_att_code(),
            ErrorCode::WriteRequestRejected
        );
        assert_eq!(
            Error::ResourceExhausted.to_att_code(),
            ErrorCode::InsufficientResources
        );
    }
}
