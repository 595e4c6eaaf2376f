//! 16-bit UUIDs used by the Broadcast Audio Scan Service.
//!
//! Bluetooth assigns UUIDs to identify services and characteristics. Every UUID used by BASS is a
//! SIG-assigned 16-bit alias of a full 128-bit UUID built from the Bluetooth Base UUID
//! `00000000-0000-1000-8000-00805F9B34FB`.

use crate::{bytes::*, Error};
use core::fmt;

/// A 16-bit UUID alias.
#[derive(PartialEq, Eq, Copy, Clone)]
pub struct Uuid16(pub u16);

/// Broadcast Audio Scan Service.
pub const BROADCAST_AUDIO_SCAN_SERVICE: Uuid16 = Uuid16(0x184F);

/// Broadcast Audio Scan Control Point characteristic.
pub const BROADCAST_AUDIO_SCAN_CONTROL_POINT: Uuid16 = Uuid16(0x2BC7);

/// Broadcast Receive State characteristic.
pub const BROADCAST_RECEIVE_STATE: Uuid16 = Uuid16(0x2BC8);

/// Basic Audio Announcement service, whose service data carries the BASE on the PA train.
pub const BASIC_AUDIO_ANNOUNCEMENT: Uuid16 = Uuid16(0x1851);

/// Broadcast Audio Announcement service, whose service data carries the Broadcast ID.
pub const BROADCAST_AUDIO_ANNOUNCEMENT: Uuid16 = Uuid16(0x1852);

/// Client Characteristic Configuration descriptor.
pub const CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid16 = Uuid16(0x2902);

/// Primary service declaration attribute type.
pub const PRIMARY_SERVICE: Uuid16 = Uuid16(0x2800);

/// Characteristic declaration attribute type.
pub const CHARACTERISTIC: Uuid16 = Uuid16(0x2803);

impl ToBytes for Uuid16 {
    fn to_bytes(&self, buffer: &mut ByteWriter<'_>) -> Result<(), Error> {
        buffer.write_u16_le(self.0)
    }
}

impl FromBytes<'_> for Uuid16 {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(Uuid16(bytes.read_u16_le()?))
    }
}

impl fmt::Debug for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}
