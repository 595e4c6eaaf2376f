//! Broadcast Audio Scan Control Point commands.
//!
//! | Opcode | Command             | Parameters                                                  |
//! |--------|---------------------|-------------------------------------------------------------|
//! | `0x00` | Remote Scan Stopped | -                                                           |
//! | `0x01` | Remote Scan Started | -                                                           |
//! | `0x02` | Add Source          | address, sid, broadcast_id, pa_sync, pa_interval, subgroups |
//! | `0x03` | Modify Source       | source_id, pa_sync, pa_interval, subgroups                  |
//! | `0x04` | Set Broadcast Code  | source_id, code                                             |
//! | `0x05` | Remove Source       | source_id                                                   |
//!
//! When change counters are in use, the source-targeted commands (`0x03` to `0x05`) carry one more
//! byte at the end: the counter of the Receive State they were based on.

use super::{
    bis_requests_unique, read_subgroups, write_subgroups, BroadcastCode, BroadcastSource, SourceId,
    Subgroup, Subgroups, MAX_ADV_SID,
};
use crate::{bytes::*, Error};

enum_with_unknown! {
    /// Control Point opcodes.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Opcode(u8) {
        RemoteScanStopped = 0x00,
        RemoteScanStarted = 0x01,
        AddSource = 0x02,
        ModifySource = 0x03,
        SetBroadcastCode = 0x04,
        RemoveSource = 0x05,
    }
}

impl Opcode {
    /// Minimum length of a command with this opcode (including the opcode), ignoring counters.
    fn min_len(&self) -> usize {
        match self {
            Opcode::RemoteScanStopped | Opcode::RemoteScanStarted => 1,
            Opcode::AddSource => 16,
            Opcode::ModifySource => 6,
            Opcode::SetBroadcastCode => 18,
            Opcode::RemoveSource => 2,
            Opcode::Unknown(_) => 1,
        }
    }

    /// Returns whether commands with this opcode target an existing Receive State.
    pub fn targets_source(&self) -> bool {
        match self {
            Opcode::ModifySource | Opcode::SetBroadcastCode | Opcode::RemoveSource => true,
            _ => false,
        }
    }
}

enum_with_unknown! {
    /// What the assistant asks the delegator to do about PA sync.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum PaSync(u8) {
        /// Do not synchronize (or stop synchronizing) to the PA.
        DoNotSync = 0x00,
        /// Synchronize, and the assistant can transfer its own PA sync (PAST).
        SyncPastAvailable = 0x01,
        /// Synchronize by scanning for the PA directly.
        SyncPastNotAvailable = 0x02,
    }
}

impl PaSync {
    /// Returns whether PA sync is requested at all.
    pub fn is_requested(&self) -> bool {
        match self {
            PaSync::SyncPastAvailable | PaSync::SyncPastNotAvailable => true,
            _ => false,
        }
    }
}

/// Parameters of an Add-Source command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSource {
    pub source: BroadcastSource,
    pub pa_sync: PaSync,
    /// PA interval in units of 1.25 ms, or `PA_INTERVAL_UNKNOWN`.
    pub pa_interval: u16,
    pub subgroups: Subgroups,
}

/// Parameters of a Modify-Source command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifySource {
    pub source_id: SourceId,
    pub pa_sync: PaSync,
    pub pa_interval: u16,
    pub subgroups: Subgroups,
}

/// A Control Point command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The assistant stopped scanning on behalf of the delegator.
    ScanStop,
    /// The assistant started scanning on behalf of the delegator.
    ScanStart,
    AddSource(AddSource),
    ModifySource(ModifySource),
    SetBroadcastCode {
        source_id: SourceId,
        code: BroadcastCode,
    },
    RemoveSource {
        source_id: SourceId,
    },
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::ScanStop => Opcode::RemoteScanStopped,
            Command::ScanStart => Opcode::RemoteScanStarted,
            Command::AddSource(_) => Opcode::AddSource,
            Command::ModifySource(_) => Opcode::ModifySource,
            Command::SetBroadcastCode { .. } => Opcode::SetBroadcastCode,
            Command::RemoveSource { .. } => Opcode::RemoveSource,
        }
    }

    /// Returns the source the command targets, if any.
    pub fn source_id(&self) -> Option<SourceId> {
        match self {
            Command::ModifySource(m) => Some(m.source_id),
            Command::SetBroadcastCode { source_id, .. } | Command::RemoveSource { source_id } => {
                Some(*source_id)
            }
            _ => None,
        }
    }

    /// Checks the field values of a structurally valid command.
    fn validate(&self) -> Result<(), Error> {
        match self {
            Command::AddSource(add) => add.validate(),
            Command::ModifySource(modify) => modify.validate(),
            _ => Ok(()),
        }
    }
}

impl AddSource {
    /// Checks the fields the type system does not constrain.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.source.adv_sid > MAX_ADV_SID {
            return Err(Error::InvalidParameter);
        }
        validate_request(self.pa_sync, &self.subgroups)
    }
}

impl ModifySource {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        validate_request(self.pa_sync, &self.subgroups)
    }
}

/// Checks a PA sync request and the BIS requests that come with it.
fn validate_request(pa_sync: PaSync, subgroups: &[Subgroup]) -> Result<(), Error> {
    if !pa_sync.is_known() {
        return Err(Error::InvalidParameter);
    }
    if subgroups.iter().any(|sg| !sg.bis_sync.is_valid()) {
        return Err(Error::InvalidParameter);
    }
    if !bis_requests_unique(subgroups) {
        return Err(Error::InvalidParameter);
    }
    // BIS sync cannot be requested without PA sync.
    if !pa_sync.is_requested()
        && subgroups
            .iter()
            .any(|sg| !sg.bis_sync.is_empty() && !sg.bis_sync.is_no_preference())
    {
        return Err(Error::InvalidParameter);
    }
    Ok(())
}

impl ToBytes for Command {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u8(self.opcode().into())?;
        match self {
            Command::ScanStop | Command::ScanStart => Ok(()),
            Command::AddSource(add) => {
                add.source.write(writer)?;
                writer.write_u8(add.pa_sync.into())?;
                writer.write_u16_le(add.pa_interval)?;
                write_subgroups(&add.subgroups, writer)
            }
            Command::ModifySource(modify) => {
                writer.write_u8(modify.source_id)?;
                writer.write_u8(modify.pa_sync.into())?;
                writer.write_u16_le(modify.pa_interval)?;
                write_subgroups(&modify.subgroups, writer)
            }
            Command::SetBroadcastCode { source_id, code } => {
                writer.write_u8(*source_id)?;
                writer.write_slice(&code.0)
            }
            Command::RemoveSource { source_id } => writer.write_u8(*source_id),
        }
    }
}

/// A complete Control Point write: a command and, for source-targeted commands, the change counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPointWrite {
    pub command: Command,
    pub change_counter: Option<u8>,
}

impl ControlPointWrite {
    /// Decodes a Control Point write.
    ///
    /// Checks happen in a fixed order, and the first failure is returned:
    ///
    /// 1. The opcode must be known (`OpcodeNotSupported`).
    /// 2. The length must match the opcode and the declared subgroups (`InvalidLength`).
    /// 3. Field values must be in range (`InvalidParameter`), subgroup and metadata counts within
    ///    the static limits (`ResourceExhausted`).
    ///
    /// If `with_counter` is set, source-targeted commands must end in a change counter byte.
    pub fn decode(value: &[u8], with_counter: bool) -> Result<Self, Error> {
        let mut bytes = ByteReader::new(value);
        let opcode = Opcode::from(bytes.read_u8().map_err(|_| Error::InvalidLength)?);
        if !opcode.is_known() {
            return Err(Error::OpcodeNotSupported);
        }

        let counted = with_counter && opcode.targets_source();
        let min_len = opcode.min_len() + counted as usize;
        if value.len() < min_len {
            return Err(Error::InvalidLength);
        }
        let expected_len = Self::structural_len(opcode, value)? + counted as usize;
        if value.len() != expected_len {
            return Err(Error::InvalidLength);
        }

        let command = Self::read_command(opcode, &mut bytes).map_err(|e| match e {
            Error::Eof => Error::InvalidLength,
            Error::InvalidValue => Error::InvalidParameter,
            other => other,
        })?;
        let change_counter = if counted {
            Some(bytes.read_u8()?)
        } else {
            None
        };

        command.validate()?;
        Ok(Self {
            command,
            change_counter,
        })
    }

    /// Walks the subgroup tail of Add-Source and Modify-Source to find the length the command
    /// claims to have, without looking at any field values.
    fn structural_len(opcode: Opcode, value: &[u8]) -> Result<usize, Error> {
        let fixed = opcode.min_len();
        match opcode {
            Opcode::AddSource | Opcode::ModifySource => {}
            _ => return Ok(fixed),
        }

        // The subgroup count is the last byte of the fixed part.
        let mut bytes = ByteReader::new(&value[fixed - 1..]);
        let count = bytes.read_u8()?;
        let mut len = fixed;
        for _ in 0..count {
            bytes.read_slice(4).map_err(|_| Error::InvalidLength)?;
            let metadata_len = usize::from(bytes.read_u8().map_err(|_| Error::InvalidLength)?);
            bytes
                .read_slice(metadata_len)
                .map_err(|_| Error::InvalidLength)?;
            len += 5 + metadata_len;
        }
        Ok(len)
    }

    fn read_command(opcode: Opcode, bytes: &mut ByteReader<'_>) -> Result<Command, Error> {
        Ok(match opcode {
            Opcode::RemoteScanStopped => Command::ScanStop,
            Opcode::RemoteScanStarted => Command::ScanStart,
            Opcode::AddSource => Command::AddSource(AddSource {
                source: BroadcastSource::read(bytes)?,
                pa_sync: PaSync::from(bytes.read_u8()?),
                pa_interval: bytes.read_u16_le()?,
                subgroups: read_subgroups(bytes)?,
            }),
            Opcode::ModifySource => Command::ModifySource(ModifySource {
                source_id: bytes.read_u8()?,
                pa_sync: PaSync::from(bytes.read_u8()?),
                pa_interval: bytes.read_u16_le()?,
                subgroups: read_subgroups(bytes)?,
            }),
            Opcode::SetBroadcastCode => Command::SetBroadcastCode {
                source_id: bytes.read_u8()?,
                code: BroadcastCode(bytes.read_array()?),
            },
            Opcode::RemoveSource => Command::RemoveSource {
                source_id: bytes.read_u8()?,
            },
            Opcode::Unknown(_) => return Err(Error::OpcodeNotSupported),
        })
    }
}

impl ToBytes for ControlPointWrite {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        self.command.to_bytes(writer)?;
        if let Some(counter) = self.change_counter {
            writer.write_u8(counter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressKind, DeviceAddress};
    use crate::codec::{BisSync, BroadcastId, Metadata, Subgroup, PA_INTERVAL_UNKNOWN};
    use crate::config::{MAX_CONTROL_POINT_LEN, MAX_METADATA_LEN};

    fn add_source(subgroups: &[Subgroup]) -> Command {
        Command::AddSource(AddSource {
            source: BroadcastSource {
                address: DeviceAddress::new(
                    [0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA],
                    AddressKind::Public,
                ),
                adv_sid: 3,
                broadcast_id: BroadcastId::new(0x010203).unwrap(),
            },
            pa_sync: PaSync::SyncPastNotAvailable,
            pa_interval: PA_INTERVAL_UNKNOWN,
            subgroups: Subgroups::from_slice(subgroups).unwrap(),
        })
    }

    fn encode(
        command: Command,
        change_counter: Option<u8>,
    ) -> heapless::Vec<u8, MAX_CONTROL_POINT_LEN> {
        to_vec(&ControlPointWrite {
            command,
            change_counter,
        })
        .unwrap()
    }

    #[test]
    fn add_source_encoding() {
        let bytes = encode(add_source(&[Subgroup::new(BisSync::NO_PREFERENCE)]), None);
        #[rustfmt::skip]
        assert_eq!(bytes, [
            0x02,
            0x00, 0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA,
            0x03,
            0x03, 0x02, 0x01,
            0x02,
            0xFF, 0xFF,
            0x01,
            0xFF, 0xFF, 0xFF, 0xFF, 0x00,
        ]);

        let decoded = ControlPointWrite::decode(&bytes, true).unwrap();
        assert_eq!(decoded.command, add_source(&[Subgroup::new(BisSync::NO_PREFERENCE)]));
        assert_eq!(decoded.change_counter, None);
    }

    #[test]
    fn targeted_commands_round_trip_with_counter() {
        let commands = [
            Command::ModifySource(ModifySource {
                source_id: 7,
                pa_sync: PaSync::DoNotSync,
                pa_interval: 0x0040,
                subgroups: Subgroups::new(),
            }),
            Command::SetBroadcastCode {
                source_id: 7,
                code: BroadcastCode([0x42; 16]),
            },
            Command::RemoveSource { source_id: 7 },
        ];
        for command in commands.iter() {
            let bytes = encode(command.clone(), Some(9));
            let decoded = ControlPointWrite::decode(&bytes, true).unwrap();
            assert_eq!(&decoded.command, command);
            assert_eq!(decoded.change_counter, Some(9));

            // Without counters, the extra byte is trailing garbage.
            assert_eq!(
                ControlPointWrite::decode(&bytes, false),
                Err(Error::InvalidLength)
            );
        }
    }

    #[test]
    fn scan_commands() {
        assert_eq!(
            ControlPointWrite::decode(&[0x00], true).unwrap().command,
            Command::ScanStop
        );
        assert_eq!(
            ControlPointWrite::decode(&[0x01], false).unwrap().command,
            Command::ScanStart
        );
        assert_eq!(
            ControlPointWrite::decode(&[0x01, 0x00], false),
            Err(Error::InvalidLength)
        );
    }

    #[test]
    fn opcode_checked_before_length() {
        assert_eq!(
            ControlPointWrite::decode(&[0x06], false),
            Err(Error::OpcodeNotSupported)
        );
        assert_eq!(
            ControlPointWrite::decode(&[0xFF, 1, 2, 3], false),
            Err(Error::OpcodeNotSupported)
        );
        assert_eq!(ControlPointWrite::decode(&[], false), Err(Error::InvalidLength));
        assert_eq!(
            ControlPointWrite::decode(&[0x02, 0x00], false),
            Err(Error::InvalidLength)
        );
        assert_eq!(
            ControlPointWrite::decode(&[0x05], false),
            Err(Error::InvalidLength)
        );
        assert_eq!(
            ControlPointWrite::decode(&[0x05, 0x01], true),
            Err(Error::InvalidLength)
        );
    }

    #[test]
    fn length_checked_before_fields() {
        // Bad address type, but also truncated: length wins.
        let mut bytes = encode(add_source(&[Subgroup::new(BisSync::NO_PREFERENCE)]), None);
        bytes[1] = 0x05;
        bytes.pop();
        assert_eq!(
            ControlPointWrite::decode(&bytes, false),
            Err(Error::InvalidLength)
        );
    }

    #[test]
    fn field_checks() {
        let good = encode(add_source(&[]), None);

        for &(index, byte) in &[(1, 0x02), (8, 0x10), (12, 0x03)] {
            let mut bad = good.clone();
            bad[index] = byte;
            assert_eq!(
                ControlPointWrite::decode(&bad, false),
                Err(Error::InvalidParameter),
                "byte {} = {:#x}",
                index,
                byte
            );
        }
    }

    #[test]
    fn subgroup_checks() {
        let overlapping = encode(
            add_source(&[
                Subgroup::new(BisSync::from_raw(0b011)),
                Subgroup::new(BisSync::from_raw(0b110)),
            ]),
            None,
        );
        assert_eq!(
            ControlPointWrite::decode(&overlapping, false),
            Err(Error::InvalidParameter)
        );

        let reserved_bit = encode(
            add_source(&[Subgroup::new(BisSync::from_raw(0x8000_0000))]),
            None,
        );
        assert_eq!(
            ControlPointWrite::decode(&reserved_bit, false),
            Err(Error::InvalidParameter)
        );

        let mut no_pa = add_source(&[Subgroup::new(BisSync::from_raw(0b1))]);
        if let Command::AddSource(add) = &mut no_pa {
            add.pa_sync = PaSync::DoNotSync;
        }
        assert_eq!(
            ControlPointWrite::decode(&encode(no_pa, None), false),
            Err(Error::InvalidParameter)
        );

        let mut metadata = Subgroup::new(BisSync::NONE);
        metadata.metadata = Metadata::from_slice(&[0; MAX_METADATA_LEN]).unwrap();
        let mut long_metadata = encode(add_source(&[metadata]), None);
        long_metadata[20] += 1;
        long_metadata.push(0).unwrap();
        assert_eq!(
            ControlPointWrite::decode(&long_metadata, false),
            Err(Error::ResourceExhausted)
        );

        let mut too_many = encode(add_source(&[]), None);
        too_many[15] = 5;
        for _ in 0..5 {
            too_many.extend_from_slice(&[0, 0, 0, 0, 0]).unwrap();
        }
        assert_eq!(
            ControlPointWrite::decode(&too_many, false),
            Err(Error::ResourceExhausted)
        );
    }
}
