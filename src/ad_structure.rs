//! Advertising Data structures.
//!
//! Only the structures BASS cares about are decoded: Flags and 16-bit Service Data (which carries
//! Broadcast IDs on extended advertising and the BASE on the PA train). Everything else is kept as
//! raw bytes.
//!
//! Also see the [assigned numbers document][gap] hosted by the SIG.
//!
//! [gap]: https://www.bluetooth.com/specifications/assigned-numbers/generic-access-profile

use crate::uuid::Uuid16;
use crate::{bytes::*, Error};
use bitflags::bitflags;

/// One AD structure out of an advertising or periodic advertising payload.
#[derive(Debug, Copy, Clone)]
pub enum AdStructure<'a> {
    /// Device flags and baseband capabilities.
    Flags(Flags),

    /// Service data with 16-bit service UUID.
    ServiceData16 {
        /// The 16-bit service UUID.
        uuid: Uuid16,
        /// The associated service data. May be empty.
        data: &'a [u8],
    },

    /// An unknown or unimplemented AD structure stored as raw bytes.
    Unknown {
        /// Type byte.
        ty: u8,
        /// Raw data transmitted after the type.
        data: &'a [u8],
    },
}

impl<'a> AdStructure<'a> {
    /// Parses a whole advertising payload into AD structures.
    ///
    /// Iteration stops at the end of the significant part (a zero length byte) and yields an error
    /// (and then stops) on a malformed structure.
    pub fn iter(data: &'a [u8]) -> AdStructureIter<'a> {
        AdStructureIter { rest: data }
    }
}

impl<'a> ToBytes for AdStructure<'a> {
    fn to_bytes(&self, buf: &mut ByteWriter<'_>) -> Result<(), Error> {
        // First Byte = Length of record. Start encoding at offset 1, write length later.
        let first = buf.split_next_mut().ok_or(Error::Eof)?;

        let left_before = buf.space_left();
        match self {
            AdStructure::Flags(flags) => {
                buf.write_u8(Type::FLAGS)?;
                buf.write_u8(flags.bits())?;
            }
            AdStructure::ServiceData16 { uuid, data } => {
                buf.write_u8(Type::SERVICE_DATA_16BIT_UUID)?;
                uuid.to_bytes(buf)?;
                buf.write_slice(data)?;
            }
            AdStructure::Unknown { ty, data } => {
                buf.write_u8(*ty)?;
                buf.write_slice(data)?;
            }
        }
        let len = left_before - buf.space_left();
        if len > 255 {
            return Err(Error::InvalidLength);
        }

        *first = len as u8;
        Ok(())
    }
}

impl<'a> FromBytes<'a> for AdStructure<'a> {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        let len = bytes.read_u8()?;
        if len == 0 {
            // Must be at least 1 for the type
            return Err(Error::InvalidLength);
        }

        let ty_and_data = bytes.read_slice(usize::from(len))?;
        let ty = ty_and_data[0];
        let data = &ty_and_data[1..];

        Ok(match ty {
            Type::FLAGS => {
                if data.len() != 1 {
                    return Err(Error::InvalidLength);
                }
                AdStructure::Flags(Flags::from_bits_truncate(data[0]))
            }
            Type::SERVICE_DATA_16BIT_UUID => {
                let mut data = ByteReader::new(data);
                let uuid = Uuid16::from_bytes(&mut data).map_err(|_| Error::InvalidLength)?;
                AdStructure::ServiceData16 {
                    uuid,
                    data: data.read_rest(),
                }
            }
            _ => AdStructure::Unknown { ty, data },
        })
    }
}

/// Iterator over the AD structures of a payload, created by [`AdStructure::iter`].
///
/// [`AdStructure::iter`]: enum.AdStructure.html#method.iter
pub struct AdStructureIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for AdStructureIter<'a> {
    type Item = Result<AdStructure<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rest.first() {
            // A zero length byte ends the significant part, the rest is padding.
            None | Some(0) => {
                self.rest = &[];
                return None;
            }
            Some(_) => {}
        }

        let mut reader = ByteReader::new(self.rest);
        let result = AdStructure::from_bytes(&mut reader);
        self.rest = match result {
            Ok(_) => reader.read_rest(),
            Err(_) => &[],
        };
        Some(result)
    }
}

bitflags! {
    /// BR/EDR and LE compatibility flags.
    pub struct Flags: u8 {
        const LE_LIMITED_DISCOVERABLE = 0b00000001;
        const LE_GENERAL_DISCOVERABLE = 0b00000010;
        const BR_EDR_NOT_SUPPORTED    = 0b00000100;
        const SIMUL_LE_BR_CONTROLLER  = 0b00001000;
        const SIMUL_LE_BR_HOST        = 0b00010000;
    }
}

/// Data Type constants.
enum Type {}

impl Type {
    const FLAGS: u8 = 0x01;
    const SERVICE_DATA_16BIT_UUID: u8 = 0x16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_data_round_trip() {
        let mut buf = [0; 16];
        let mut writer = ByteWriter::new(&mut buf);
        AdStructure::Flags(Flags::BR_EDR_NOT_SUPPORTED)
            .to_bytes(&mut writer)
            .unwrap();
        AdStructure::ServiceData16 {
            uuid: Uuid16(0x1852),
            data: &[0x03, 0x02, 0x01],
        }
        .to_bytes(&mut writer)
        .unwrap();
        let used = 16 - writer.space_left();
        assert_eq!(
            buf[..used],
            [0x02, 0x01, 0x04, 0x06, 0x16, 0x52, 0x18, 0x03, 0x02, 0x01]
        );

        let mut iter = AdStructure::iter(&buf);
        match iter.next() {
            Some(Ok(AdStructure::Flags(flags))) => assert_eq!(flags, Flags::BR_EDR_NOT_SUPPORTED),
            other => panic!("unexpected {:?}", other),
        }
        match iter.next() {
            Some(Ok(AdStructure::ServiceData16 { uuid, data })) => {
                assert_eq!(uuid, Uuid16(0x1852));
                assert_eq!(data, &[0x03, 0x02, 0x01]);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Zero padding ends the payload.
        assert!(iter.next().is_none());
    }

    #[test]
    fn truncated_structure_stops_iteration() {
        let data = [0x02, 0x01, 0x06, 0x09, 0x16, 0x52];
        let mut iter = AdStructure::iter(&data);
        assert!(matches!(iter.next(), Some(Ok(AdStructure::Flags(_)))));
        assert_eq!(iter.next().map(|r| r.err()), Some(Some(Error::Eof)));
        assert!(iter.next().is_none());
    }

    #[test]
    fn service_data_without_uuid() {
        let data = [0x02, 0x16, 0x52];
        let mut reader = ByteReader::new(&data);
        assert_eq!(
            AdStructure::from_bytes(&mut reader).err(),
            Some(Error::InvalidLength)
        );
    }
}
