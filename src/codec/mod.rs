//! Wire format of the Broadcast Receive State and the Control Point.
//!
//! All multi-byte fields are Little Endian. Broadcast IDs are 24-bit.
//!
//! The types in this module are shared by both sides: the delegator encodes Receive States and
//! decodes commands, the assistant does the opposite. Decoding is all-or-nothing. A value that
//! fails to decode produces an error and nothing else.

mod control_point;
mod receive_state;

pub use self::control_point::*;
pub use self::receive_state::*;

use crate::{
    address::{AddressKind, DeviceAddress},
    bytes::*,
    config::{MAX_METADATA_LEN, MAX_SUBGROUPS},
    utils::HexSlice,
    Error,
};
use core::fmt;
use heapless::Vec;

/// Identifies a Receive State on a delegator. Assigned by the delegator.
pub type SourceId = u8;

/// Subgroup metadata (LTV-formatted, but treated as opaque bytes).
pub type Metadata = Vec<u8, MAX_METADATA_LEN>;

/// The subgroups of one source.
pub type Subgroups = Vec<Subgroup, MAX_SUBGROUPS>;

/// The PA interval value meaning "unknown".
pub const PA_INTERVAL_UNKNOWN: u16 = 0xFFFF;

/// Highest valid advertising set ID.
pub const MAX_ADV_SID: u8 = 0x0F;

/// A 24-bit Broadcast ID.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct BroadcastId(u32);

impl BroadcastId {
    /// Largest Broadcast ID.
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Creates a Broadcast ID, returning `None` if `raw` does not fit in 24 bits.
    pub fn new(raw: u32) -> Option<Self> {
        if raw > Self::MAX {
            None
        } else {
            Some(BroadcastId(raw))
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BroadcastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BroadcastId({:#08X})", self.0)
    }
}

/// A BIS synchronization bitfield.
///
/// Bit `n` stands for BIS index `n + 1`. In commands, [`NO_PREFERENCE`] lets the delegator pick.
/// In a Receive State the same value means the last BIG sync attempt failed.
///
/// [`NO_PREFERENCE`]: #associatedconstant.NO_PREFERENCE
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct BisSync(u32);

impl BisSync {
    /// No BIS.
    pub const NONE: Self = BisSync(0);

    /// Any BIS the delegator sees fit (commands only).
    pub const NO_PREFERENCE: Self = BisSync(0xFFFF_FFFF);

    /// The BIG sync attempt failed (Receive States only). Same encoding as `NO_PREFERENCE`.
    pub const FAILED: Self = BisSync(0xFFFF_FFFF);

    pub fn from_raw(raw: u32) -> Self {
        BisSync(raw)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the bitfield containing only BIS index `index` (1-based).
    ///
    /// Returns `None` unless `1 <= index <= 31`.
    pub fn from_index(index: u8) -> Option<Self> {
        if index == 0 || index > 31 {
            None
        } else {
            Some(BisSync(1 << (index - 1)))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_no_preference(&self) -> bool {
        *self == Self::NO_PREFERENCE
    }

    /// Returns whether this is a valid value to appear in a command.
    ///
    /// Bit 31 is reserved unless it is part of the no-preference value.
    pub fn is_valid(&self) -> bool {
        self.is_no_preference() || self.0 & 0x8000_0000 == 0
    }

    /// Returns whether the bits of `self` and `other` collide.
    ///
    /// Two no-preference values never collide. Anything else is compared bit by bit.
    pub fn overlaps(&self, other: BisSync) -> bool {
        if self.is_no_preference() && other.is_no_preference() {
            false
        } else {
            self.0 & other.0 != 0
        }
    }
}

impl fmt::Debug for BisSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_no_preference() {
            f.write_str("BisSync(any)")
        } else {
            write!(f, "BisSync({:#010b})", self.0)
        }
    }
}

/// A 16-byte broadcast code.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct BroadcastCode(pub [u8; 16]);

impl fmt::Debug for BroadcastCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BroadcastCode({:?})", HexSlice(&self.0[..]))
    }
}

/// The identity of a broadcast source: its advertiser address, advertising set, and Broadcast ID.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BroadcastSource {
    pub address: DeviceAddress,
    pub adv_sid: u8,
    pub broadcast_id: BroadcastId,
}

/// Raw layout of a broadcast source as it appears in Add-Source and Receive State.
#[derive(zerocopy::FromBytes, zerocopy::AsBytes, zerocopy::Unaligned)]
#[repr(C)]
struct RawSource {
    addr_type: u8,
    addr: [u8; 6],
    adv_sid: u8,
    broadcast_id: [u8; 3],
}

impl BroadcastSource {
    /// Reads and validates the address type, address, SID and Broadcast ID.
    ///
    /// An out-of-range address type or SID is `InvalidValue`.
    fn read(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        let raw = bytes.read_obj::<RawSource>()?;
        let kind = AddressKind::from_raw(raw.addr_type).ok_or(Error::InvalidValue)?;
        if raw.adv_sid > MAX_ADV_SID {
            return Err(Error::InvalidValue);
        }
        let broadcast_id = ByteReader::new(&raw.broadcast_id).read_u24_le()?;
        Ok(Self {
            address: DeviceAddress::new(raw.addr, kind),
            adv_sid: raw.adv_sid,
            broadcast_id: BroadcastId(broadcast_id),
        })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        let mut raw = RawSource {
            addr_type: self.address.kind().as_raw(),
            addr: *self.address.raw(),
            adv_sid: self.adv_sid,
            broadcast_id: [0; 3],
        };
        ByteWriter::new(&mut raw.broadcast_id).write_u24_le(self.broadcast_id.0)?;
        writer.write_obj(&raw)
    }
}

/// One subgroup of a source: a BIS bitfield and its metadata.
///
/// In commands, `bis_sync` is what the assistant requests. In a Receive State, it is what the
/// delegator is actually synchronized to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subgroup {
    pub bis_sync: BisSync,
    pub metadata: Metadata,
}

impl Subgroup {
    pub fn new(bis_sync: BisSync) -> Self {
        Self {
            bis_sync,
            metadata: Metadata::new(),
        }
    }
}

impl ToBytes for Subgroup {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u32_le(self.bis_sync.0)?;
        writer.write_u8(self.metadata.len() as u8)?;
        writer.write_slice(&self.metadata)
    }
}

/// Decodes a subgroup.
///
/// Metadata longer than `MAX_METADATA_LEN` is `ResourceExhausted`, metadata running past the end of
/// the buffer is `Eof`.
impl FromBytes<'_> for Subgroup {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        let bis_sync = BisSync(bytes.read_u32_le()?);
        let len = usize::from(bytes.read_u8()?);
        let data = bytes.read_slice(len)?;
        let metadata = Metadata::from_slice(data).map_err(|()| Error::ResourceExhausted)?;
        Ok(Self { bis_sync, metadata })
    }
}

/// Reads a subgroup count followed by that many subgroups.
fn read_subgroups(bytes: &mut ByteReader<'_>) -> Result<Subgroups, Error> {
    let count = usize::from(bytes.read_u8()?);
    if count > MAX_SUBGROUPS {
        return Err(Error::ResourceExhausted);
    }
    let mut subgroups = Subgroups::new();
    for _ in 0..count {
        subgroups
            .push(Subgroup::from_bytes(bytes)?)
            .map_err(|_| Error::ResourceExhausted)?;
    }
    Ok(subgroups)
}

fn write_subgroups(subgroups: &[Subgroup], writer: &mut ByteWriter<'_>) -> Result<(), Error> {
    writer.write_u8(subgroups.len() as u8)?;
    for subgroup in subgroups {
        subgroup.to_bytes(writer)?;
    }
    Ok(())
}

/// Checks that no two subgroups request the same BIS.
///
/// Two no-preference requests may coexist. A no-preference request next to a specific one is an
/// overlap.
pub fn bis_requests_unique(subgroups: &[Subgroup]) -> bool {
    let mut seen = BisSync::NONE;
    let mut seen_no_pref = false;
    for subgroup in subgroups {
        let bis = subgroup.bis_sync;
        if bis.is_empty() {
            continue;
        }
        if bis.is_no_preference() {
            if !seen.is_empty() {
                return false;
            }
            seen_no_pref = true;
        } else {
            if seen_no_pref || seen.overlaps(bis) {
                return false;
            }
            seen = BisSync(seen.0 | bis.0);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sg(bits: u32) -> Subgroup {
        Subgroup::new(BisSync::from_raw(bits))
    }

    #[test]
    fn bis_uniqueness() {
        assert!(bis_requests_unique(&[]));
        assert!(bis_requests_unique(&[sg(0b01), sg(0b10), sg(0)]));
        assert!(bis_requests_unique(&[sg(0xFFFF_FFFF), sg(0xFFFF_FFFF)]));
        assert!(bis_requests_unique(&[sg(0), sg(0xFFFF_FFFF)]));
        assert!(!bis_requests_unique(&[sg(0b011), sg(0b110)]));
        assert!(!bis_requests_unique(&[sg(0b1), sg(0xFFFF_FFFF)]));
        assert!(!bis_requests_unique(&[sg(0xFFFF_FFFF), sg(0b100)]));
    }

    #[test]
    fn bis_validity() {
        assert!(BisSync::NO_PREFERENCE.is_valid());
        assert!(BisSync::from_raw(0x7FFF_FFFF).is_valid());
        assert!(!BisSync::from_raw(0x8000_0001).is_valid());
        assert_eq!(BisSync::from_index(1), Some(BisSync::from_raw(1)));
        assert_eq!(BisSync::from_index(31), Some(BisSync::from_raw(0x4000_0000)));
        assert_eq!(BisSync::from_index(0), None);
        assert_eq!(BisSync::from_index(32), None);
    }

    #[test]
    fn broadcast_id_is_24_bit() {
        assert_eq!(BroadcastId::new(0x00FF_FFFF).map(|id| id.as_u32()), Some(0xFF_FFFF));
        assert_eq!(BroadcastId::new(0x0100_0000), None);
    }

    #[test]
    fn subgroup_metadata_limits() {
        let mut too_long = [0u8; 5 + MAX_METADATA_LEN + 1];
        too_long[4] = (MAX_METADATA_LEN + 1) as u8;
        assert_eq!(
            Subgroup::from_bytes(&mut ByteReader::new(&too_long)),
            Err(Error::ResourceExhausted)
        );

        let past_end = [0, 0, 0, 0, 4, 1, 2];
        assert_eq!(
            Subgroup::from_bytes(&mut ByteReader::new(&past_end)),
            Err(Error::Eof)
        );
    }
}
