//! GATT layout of the Broadcast Audio Scan Service.
//!
//! The service is laid out as one primary service declaration, the Control Point, and a fixed
//! number of Receive State characteristics:
//!
//! ```notrust
//! +0             Primary Service             0x184F
//! +1, +2         Control Point decl + value  0x2BC7  write, write without response
//! +3, +4, +5     Receive State #0 decl, value, CCCD  0x2BC8  read, notify
//! +6, +7, +8     Receive State #1 ...
//! ```

use crate::{
    att::{AttHandle, HandleRange},
    config::MAX_RECEIVE_STATES,
    uuid::{self, Uuid16},
};
use bitflags::bitflags;

bitflags! {
    /// Characteristic properties, as found in a characteristic declaration.
    pub struct Properties: u8 {
        const BROADCAST    = 0x01;
        const READ         = 0x02;
        const WRITE_NO_RSP = 0x04;
        const WRITE        = 0x08;
        const NOTIFY       = 0x10;
        const INDICATE     = 0x20;
        const AUTH_WRITES  = 0x40;
        const EXTENDED     = 0x80;
    }
}

/// A characteristic type defined by BASS.
pub trait CharacteristicType {
    /// The UUID assigned to the characteristic type.
    const UUID: Uuid16;

    /// Properties the server exposes.
    fn properties() -> Properties;
}

/// The Broadcast Audio Scan Control Point.
pub enum ControlPoint {}

impl CharacteristicType for ControlPoint {
    const UUID: Uuid16 = uuid::BROADCAST_AUDIO_SCAN_CONTROL_POINT;

    fn properties() -> Properties {
        Properties::WRITE | Properties::WRITE_NO_RSP
    }
}

/// A Broadcast Receive State.
pub enum ReceiveState {}

impl CharacteristicType for ReceiveState {
    const UUID: Uuid16 = uuid::BROADCAST_RECEIVE_STATE;

    fn properties() -> Properties {
        Properties::READ | Properties::NOTIFY
    }
}

/// A characteristic found during discovery (or declared by a local server).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid16,
    pub properties: Properties,
    /// Handle of the characteristic value.
    pub value_handle: AttHandle,
    /// Handle of the Client Characteristic Configuration descriptor, if it has one.
    pub ccc_handle: Option<AttHandle>,
}

/// The role a discovered characteristic plays in the service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    ControlPoint,
    ReceiveState,
    Other,
}

impl Characteristic {
    /// Classifies `self` by its UUID.
    pub fn role(&self) -> Role {
        if self.uuid == ControlPoint::UUID {
            Role::ControlPoint
        } else if self.uuid == ReceiveState::UUID {
            Role::ReceiveState
        } else {
            Role::Other
        }
    }
}

/// Attribute handles of a locally hosted Broadcast Audio Scan Service.
#[derive(Debug, Copy, Clone)]
pub struct ServiceLayout {
    first: AttHandle,
}

impl ServiceLayout {
    /// Handles used per Receive State: declaration, value and CCCD.
    const HANDLES_PER_RECEIVE_STATE: u16 = 3;

    /// Lays out the service starting at `first`.
    ///
    /// Returns `None` if `first` is `NULL` or the service would not fit below `0xFFFF`.
    pub fn new(first: AttHandle) -> Option<Self> {
        let len = 3 + Self::HANDLES_PER_RECEIVE_STATE * MAX_RECEIVE_STATES as u16;
        if first == AttHandle::NULL || first.as_u16().checked_add(len - 1).is_none() {
            None
        } else {
            Some(Self { first })
        }
    }

    /// The handle range covered by the service.
    pub fn range(&self) -> HandleRange {
        let last = self
            .first
            .offset(2 + Self::HANDLES_PER_RECEIVE_STATE * MAX_RECEIVE_STATES as u16);
        HandleRange::new_unchecked(self.first, last)
    }

    /// Value handle of the Control Point.
    pub fn control_point(&self) -> AttHandle {
        self.first.offset(2)
    }

    /// Value handle of Receive State `index`.
    pub fn receive_state(&self, index: usize) -> AttHandle {
        self.first
            .offset(4 + Self::HANDLES_PER_RECEIVE_STATE * index as u16)
    }

    /// CCCD handle of Receive State `index`.
    pub fn receive_state_ccc(&self, index: usize) -> AttHandle {
        self.receive_state(index).offset(1)
    }

    /// Maps a value handle back to its Receive State index.
    pub fn receive_state_index(&self, handle: AttHandle) -> Option<usize> {
        (0..MAX_RECEIVE_STATES).find(|&i| self.receive_state(i) == handle)
    }

    /// Returns the characteristics of the service, in handle order.
    pub fn characteristics(&self) -> impl Iterator<Item = Characteristic> + '_ {
        let cp = Characteristic {
            uuid: ControlPoint::UUID,
            properties: ControlPoint::properties(),
            value_handle: self.control_point(),
            ccc_handle: None,
        };
        let states = (0..MAX_RECEIVE_STATES).map(move |i| Characteristic {
            uuid: ReceiveState::UUID,
            properties: ReceiveState::properties(),
            value_handle: self.receive_state(i),
            ccc_handle: Some(self.receive_state_ccc(i)),
        });
        core::iter::once(cp).chain(states)
    }
}
