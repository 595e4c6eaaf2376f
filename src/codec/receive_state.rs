//! The Broadcast Receive State record.
//!
//! ```notrust
//! source_id(1) | addr_type(1) | addr(6) | adv_sid(1) | broadcast_id(3)
//! | pa_sync_state(1) | big_encryption(1) | [bad_code(16)]
//! | num_subgroups(1) | num_subgroups * { bis_sync(4) | metadata_len(1) | metadata }
//! ```
//!
//! `bad_code` is only present when `big_encryption` is `BadCode`. An empty attribute value means
//! the slot holds no source.

use super::{read_subgroups, write_subgroups, BroadcastCode, BroadcastSource, SourceId, Subgroups};
use crate::{bytes::*, Error};

enum_with_unknown! {
    /// PA synchronization state reported by the delegator.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum PaSyncState(u8) {
        /// Not synchronized to the PA.
        NotSynced = 0x00,
        /// Waiting for the assistant to transfer its PA sync (PAST).
        SyncInfoRequest = 0x01,
        /// Synchronized to the PA.
        Synced = 0x02,
        /// PA sync could not be established.
        Failed = 0x03,
        /// The PA sync transfer did not arrive; retry without PAST.
        NoPast = 0x04,
    }
}

/// BIG encryption state reported by the delegator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EncryptState {
    /// The BIG is not encrypted.
    NotEncrypted,
    /// The BIG is encrypted and no broadcast code has been received.
    BroadcastCodeRequired,
    /// A broadcast code was handed to the synchronization engine.
    Decrypting,
    /// The broadcast code failed to decrypt the BIG. Carries the offending code.
    BadCode(BroadcastCode),
}

impl EncryptState {
    fn raw(&self) -> u8 {
        match self {
            EncryptState::NotEncrypted => 0x00,
            EncryptState::BroadcastCodeRequired => 0x01,
            EncryptState::Decrypting => 0x02,
            EncryptState::BadCode(_) => 0x03,
        }
    }
}

/// The contents of a non-empty Broadcast Receive State characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveState {
    pub source_id: SourceId,
    pub source: BroadcastSource,
    pub pa_sync_state: PaSyncState,
    pub encrypt_state: EncryptState,
    pub subgroups: Subgroups,
}

impl ReceiveState {
    /// Number of bytes in the shortest possible record.
    pub const MIN_LEN: usize = 15;
}

impl ToBytes for ReceiveState {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u8(self.source_id)?;
        self.source.write(writer)?;
        writer.write_u8(self.pa_sync_state.into())?;
        writer.write_u8(self.encrypt_state.raw())?;
        if let EncryptState::BadCode(code) = &self.encrypt_state {
            writer.write_slice(&code.0)?;
        }
        write_subgroups(&self.subgroups, writer)
    }
}

impl FromBytes<'_> for ReceiveState {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        if bytes.bytes_left() < Self::MIN_LEN {
            return Err(Error::InvalidLength);
        }

        let source_id = bytes.read_u8()?;
        let source = BroadcastSource::read(bytes)?;
        let pa_sync_state = PaSyncState::from(bytes.read_u8()?);
        if !pa_sync_state.is_known() {
            return Err(Error::InvalidValue);
        }
        let encrypt_state = match bytes.read_u8()? {
            0x00 => EncryptState::NotEncrypted,
            0x01 => EncryptState::BroadcastCodeRequired,
            0x02 => EncryptState::Decrypting,
            0x03 => EncryptState::BadCode(BroadcastCode(bytes.read_array()?)),
            _ => return Err(Error::InvalidValue),
        };
        let subgroups = read_subgroups(bytes)?;

        Ok(Self {
            source_id,
            source,
            pa_sync_state,
            encrypt_state,
            subgroups,
        })
    }
}

/// A whole Receive State attribute value: the record (if any) and an optional change counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveStateValue {
    pub state: Option<ReceiveState>,
    pub change_counter: Option<u8>,
}

impl ReceiveStateValue {
    /// Decodes an attribute value.
    ///
    /// If `with_counter` is set, a non-empty value must end in a change counter byte. Any failure
    /// is reported as `MalformedRecord`.
    pub fn decode(value: &[u8], with_counter: bool) -> Result<Self, Error> {
        if value.is_empty() {
            return Ok(Self {
                state: None,
                change_counter: None,
            });
        }

        let (record, change_counter) = match (with_counter, value.split_last()) {
            (true, Some((counter, record))) => (record, Some(*counter)),
            _ => (value, None),
        };

        let mut bytes = ByteReader::new(record);
        let state = ReceiveState::from_bytes(&mut bytes).map_err(|e| {
            warn!("malformed receive state ({:?}): {:?}", e, crate::utils::HexSlice(value));
            Error::MalformedRecord
        })?;
        if !bytes.is_empty() {
            warn!("{} trailing bytes after receive state", bytes.bytes_left());
            return Err(Error::MalformedRecord);
        }

        Ok(Self {
            state: Some(state),
            change_counter,
        })
    }
}

impl ToBytes for ReceiveStateValue {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        if let Some(state) = &self.state {
            state.to_bytes(writer)?;
            if let Some(counter) = self.change_counter {
                writer.write_u8(counter)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressKind, DeviceAddress};
    use crate::codec::{BisSync, BroadcastId, Metadata, Subgroup};
    use crate::config::{MAX_RECEIVE_STATE_VALUE_LEN, MAX_SUBGROUPS};

    fn state() -> ReceiveState {
        let mut subgroups = Subgroups::new();
        subgroups
            .push(Subgroup {
                bis_sync: BisSync::from_raw(0b11),
                metadata: Metadata::from_slice(&[0x03, 0x02, 0x04, 0x00]).unwrap(),
            })
            .unwrap();
        subgroups.push(Subgroup::new(BisSync::NONE)).unwrap();
        ReceiveState {
            source_id: 1,
            source: BroadcastSource {
                address: DeviceAddress::new([1, 2, 3, 4, 5, 6], AddressKind::Random),
                adv_sid: 3,
                broadcast_id: BroadcastId::new(0x010203).unwrap(),
            },
            pa_sync_state: PaSyncState::Synced,
            encrypt_state: EncryptState::Decrypting,
            subgroups,
        }
    }

    fn encode(value: &ReceiveStateValue) -> heapless::Vec<u8, MAX_RECEIVE_STATE_VALUE_LEN> {
        to_vec(value).unwrap()
    }

    #[test]
    fn encoding() {
        let value = ReceiveStateValue {
            state: Some(state()),
            change_counter: None,
        };
        #[rustfmt::skip]
        assert_eq!(encode(&value), [
            0x01,
            0x01, 1, 2, 3, 4, 5, 6,
            0x03,
            0x03, 0x02, 0x01,
            0x02,
            0x02,
            0x02,
            0x03, 0x00, 0x00, 0x00, 0x04, 0x03, 0x02, 0x04, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00,
        ]);
    }

    #[test]
    fn round_trip() {
        let mut bad = state();
        bad.encrypt_state = EncryptState::BadCode(BroadcastCode([0xAB; 16]));
        bad.pa_sync_state = PaSyncState::NoPast;
        let mut empty = state();
        empty.subgroups.clear();

        for (state, counter) in &[(state(), None), (bad, Some(7)), (empty, Some(0))] {
            let value = ReceiveStateValue {
                state: Some(state.clone()),
                change_counter: *counter,
            };
            let decoded = ReceiveStateValue::decode(&encode(&value), counter.is_some()).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn empty_value_is_empty_slot() {
        let value = ReceiveStateValue::decode(&[], true).unwrap();
        assert_eq!(value.state, None);
        assert_eq!(value.change_counter, None);
    }

    #[test]
    fn malformed() {
        let good = encode(&ReceiveStateValue {
            state: Some(state()),
            change_counter: None,
        });

        // Shorter than the fixed header.
        assert_eq!(
            ReceiveStateValue::decode(&good[..14], false),
            Err(Error::MalformedRecord)
        );
        // Metadata runs past the end.
        assert_eq!(
            ReceiveStateValue::decode(&good[..good.len() - 6], false),
            Err(Error::MalformedRecord)
        );
        // Trailing byte.
        let mut long = good.clone();
        long.push(0).unwrap();
        assert_eq!(
            ReceiveStateValue::decode(&long, false),
            Err(Error::MalformedRecord)
        );

        // Unknown PA sync state, unknown encryption, bad address type.
        for &(index, byte) in &[(12, 0x05), (13, 0x04), (1, 0x02), (8, 0x10)] {
            let mut bad = good.clone();
            bad[index] = byte;
            assert_eq!(
                ReceiveStateValue::decode(&bad, false),
                Err(Error::MalformedRecord),
                "byte {} = {:#x}",
                index,
                byte
            );
        }

        // Too many subgroups.
        let mut many = good.clone();
        many[14] = (MAX_SUBGROUPS + 1) as u8;
        assert_eq!(
            ReceiveStateValue::decode(&many, false),
            Err(Error::MalformedRecord)
        );
    }

    #[test]
    fn bad_code_needs_code_bytes() {
        let mut bytes = encode(&ReceiveStateValue {
            state: Some(state()),
            change_counter: None,
        });
        bytes[13] = 0x03;
        assert_eq!(
            ReceiveStateValue::decode(&bytes, false),
            Err(Error::MalformedRecord)
        );
    }
}
