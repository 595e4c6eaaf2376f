//! Bluetooth device addresses of broadcast sources.

use core::fmt;

/// Specifies whether a device address is randomly generated or a LAN MAC address.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AddressKind {
    /// Publicly registered IEEE 802-2001 LAN MAC address.
    Public,
    /// Randomly generated address.
    Random,
}

impl AddressKind {
    /// Decodes the address type byte used in Receive States and Add-Source commands.
    ///
    /// Returns `None` for the reserved values `0x02..=0xFF`.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(AddressKind::Public),
            0x01 => Some(AddressKind::Random),
            _ => None,
        }
    }

    /// Returns the address type byte.
    pub fn as_raw(&self) -> u8 {
        match self {
            AddressKind::Public => 0x00,
            AddressKind::Random => 0x01,
        }
    }
}

/// A Bluetooth device address.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    bytes: [u8; 6],
    kind: AddressKind,
}

impl DeviceAddress {
    /// Create a new device address from 6 raw Bytes and an address kind specifier.
    ///
    /// The `raw` array contains the address Bytes as they are sent over the air (LSB first).
    pub const fn new(bytes: [u8; 6], kind: AddressKind) -> Self {
        DeviceAddress { bytes, kind }
    }

    /// Returns the address kind.
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Returns the raw bytes making up this address.
    pub fn raw(&self) -> &[u8; 6] {
        &self.bytes
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Most significant byte first, the way addresses are usually written down.
        for (i, b) in self.bytes.iter().rev().enumerate() {
            if i != 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", b)?;
        }

        write!(f, "({:?})", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_bytes() {
        assert_eq!(AddressKind::from_raw(0), Some(AddressKind::Public));
        assert_eq!(AddressKind::from_raw(1), Some(AddressKind::Random));
        assert_eq!(AddressKind::from_raw(2), None);
        assert_eq!(AddressKind::Random.as_raw(), 1);
    }

    #[test]
    fn debug_is_msb_first() {
        let addr = DeviceAddress::new([0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA], AddressKind::Public);
        assert_eq!(format!("{:?}", addr), "AA:BB:CC:DD:EE:FF(Public)");
    }
}
