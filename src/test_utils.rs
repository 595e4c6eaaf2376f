//! Fakes for driving the delegator and the assistant in unit tests.

use crate::{
    address::{AddressKind, DeviceAddress},
    assistant::{AssistantCallbacks, GattClient},
    att::{AttHandle, HandleRange},
    bytes::to_vec,
    codec::{
        AddSource, BisSync, BroadcastId, BroadcastSource, Command, ControlPointWrite, Opcode,
        PaSync, ReceiveState, Subgroup, Subgroups,
    },
    config::{Config, DelegatorConfig, MAX_CONTROL_POINT_LEN, MAX_RECEIVE_STATES},
    delegator::{
        BigHandle, BigSyncParams, Notifier, PaSyncParams, ScanDelegator, SyncEngine, SyncHandle,
    },
    gatt::ServiceLayout,
    time::{Duration, Timer},
    uuid::Uuid16,
    ConnHandle, Error,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateSync(PaSyncParams),
    DeleteSync(SyncHandle),
    TransferSubscribe(ConnHandle, PaSyncParams),
    TransferUnsubscribe(ConnHandle),
    BigSync(BigSyncParams),
    BigTerminate(BigHandle),
}

/// Records every call and hands out increasing handles.
#[derive(Default)]
pub struct FakeEngine {
    pub calls: Vec<EngineCall>,
    pub fail_create: bool,
    pub fail_transfer: bool,
    pub fail_big: bool,
    next_sync: u16,
    next_big: u8,
}

impl FakeEngine {
    /// Returns and forgets the calls recorded so far.
    pub fn take(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }
}

impl SyncEngine for FakeEngine {
    fn create_sync(&mut self, params: &PaSyncParams) -> Result<SyncHandle, Error> {
        self.calls.push(EngineCall::CreateSync(*params));
        if self.fail_create {
            return Err(Error::SyncFailed);
        }
        let handle = SyncHandle(self.next_sync);
        self.next_sync += 1;
        Ok(handle)
    }

    fn delete_sync(&mut self, handle: SyncHandle) {
        self.calls.push(EngineCall::DeleteSync(handle));
    }

    fn transfer_subscribe(
        &mut self,
        conn: ConnHandle,
        params: &PaSyncParams,
    ) -> Result<(), Error> {
        self.calls.push(EngineCall::TransferSubscribe(conn, *params));
        if self.fail_transfer {
            Err(Error::SyncFailed)
        } else {
            Ok(())
        }
    }

    fn transfer_unsubscribe(&mut self, conn: ConnHandle) {
        self.calls.push(EngineCall::TransferUnsubscribe(conn));
    }

    fn big_sync(&mut self, params: &BigSyncParams) -> Result<BigHandle, Error> {
        self.calls.push(EngineCall::BigSync(*params));
        if self.fail_big {
            return Err(Error::SyncFailed);
        }
        let handle = BigHandle(self.next_big);
        self.next_big += 1;
        Ok(handle)
    }

    fn big_terminate(&mut self, handle: BigHandle) {
        self.calls.push(EngineCall::BigTerminate(handle));
    }
}

pub struct FakeTimer {
    pub armed: [Option<Duration>; MAX_RECEIVE_STATES],
}

impl Default for FakeTimer {
    fn default() -> Self {
        Self {
            armed: [None; MAX_RECEIVE_STATES],
        }
    }
}

impl Timer for FakeTimer {
    fn start(&mut self, slot: usize, after: Duration) {
        self.armed[slot] = Some(after);
    }

    fn cancel(&mut self, slot: usize) {
        self.armed[slot] = None;
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Vec<(AttHandle, Vec<u8>)>,
}

impl FakeNotifier {
    pub fn take(&mut self) -> Vec<(AttHandle, Vec<u8>)> {
        std::mem::take(&mut self.sent)
    }
}

impl Notifier for FakeNotifier {
    fn notify(&mut self, handle: AttHandle, value: &[u8]) {
        self.sent.push((handle, value.to_vec()));
    }
}

pub enum TestConfig {}

impl Config for TestConfig {
    type SyncEngine = FakeEngine;
    type Timer = FakeTimer;
    type Notifier = FakeNotifier;
}

/// The service layout used by every test delegator: Control Point at `0x12`, Receive States at
/// `0x14`, `0x17` and `0x1A`.
pub fn layout() -> ServiceLayout {
    ServiceLayout::new(AttHandle::from_raw(0x10)).unwrap()
}

pub fn delegator(config: DelegatorConfig) -> ScanDelegator<TestConfig> {
    ScanDelegator::new(
        config,
        layout(),
        FakeEngine::default(),
        FakeTimer::default(),
        FakeNotifier::default(),
    )
}

/// `AA:BB:CC:DD:EE:FF`, SID 3, Broadcast ID `0x010203`.
pub fn source() -> BroadcastSource {
    BroadcastSource {
        address: DeviceAddress::new([0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA], AddressKind::Public),
        adv_sid: 3,
        broadcast_id: BroadcastId::new(0x010203).unwrap(),
    }
}

pub fn subgroups(bis: &[BisSync]) -> Subgroups {
    bis.iter().map(|&bis| Subgroup::new(bis)).collect()
}

/// Adds `source()` with a 100 ms PA interval.
pub fn add_source(pa_sync: PaSync, bis: &[BisSync]) -> AddSource {
    AddSource {
        source: source(),
        pa_sync,
        pa_interval: 80,
        subgroups: subgroups(bis),
    }
}

/// Encodes a Control Point write.
pub fn cp_bytes(command: Command, change_counter: Option<u8>) -> Vec<u8> {
    let write = ControlPointWrite {
        command,
        change_counter,
    };
    to_vec::<_, MAX_CONTROL_POINT_LEN>(&write).unwrap().to_vec()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattCall {
    DiscoverService(ConnHandle, Uuid16),
    DiscoverCharacteristics(ConnHandle, HandleRange),
    Read(ConnHandle, AttHandle, u16),
    Write(ConnHandle, AttHandle, Vec<u8>),
    Subscribe(ConnHandle, AttHandle),
    Unsubscribe(ConnHandle, AttHandle),
}

#[derive(Default)]
pub struct FakeGatt {
    pub calls: Vec<GattCall>,
}

impl FakeGatt {
    pub fn take(&mut self) -> Vec<GattCall> {
        std::mem::take(&mut self.calls)
    }

    /// The value of the most recent write.
    pub fn last_write(&self) -> Option<&[u8]> {
        self.calls.iter().rev().find_map(|call| match call {
            GattCall::Write(_, _, value) => Some(&value[..]),
            _ => None,
        })
    }
}

impl GattClient for FakeGatt {
    fn discover_primary_service(&mut self, conn: ConnHandle, uuid: Uuid16) -> Result<(), Error> {
        self.calls.push(GattCall::DiscoverService(conn, uuid));
        Ok(())
    }

    fn discover_characteristics(
        &mut self,
        conn: ConnHandle,
        range: HandleRange,
    ) -> Result<(), Error> {
        self.calls.push(GattCall::DiscoverCharacteristics(conn, range));
        Ok(())
    }

    fn read(&mut self, conn: ConnHandle, handle: AttHandle, offset: u16) -> Result<(), Error> {
        self.calls.push(GattCall::Read(conn, handle, offset));
        Ok(())
    }

    fn write(&mut self, conn: ConnHandle, handle: AttHandle, value: &[u8]) -> Result<(), Error> {
        self.calls.push(GattCall::Write(conn, handle, value.to_vec()));
        Ok(())
    }

    fn subscribe(&mut self, conn: ConnHandle, ccc_handle: AttHandle) -> Result<(), Error> {
        self.calls.push(GattCall::Subscribe(conn, ccc_handle));
        Ok(())
    }

    fn unsubscribe(&mut self, conn: ConnHandle, ccc_handle: AttHandle) -> Result<(), Error> {
        self.calls.push(GattCall::Unsubscribe(conn, ccc_handle));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Discovered(ConnHandle, Result<usize, Error>),
    Changed(ConnHandle, usize, ReceiveState),
    Removed(ConnHandle, usize),
    Read(ConnHandle, usize, Result<Option<ReceiveState>, Error>),
    CpAck(ConnHandle, Opcode, Result<(), Error>),
}

/// Records assistant callbacks as `Event`s.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl Recorder {
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

impl AssistantCallbacks for Recorder {
    fn discovered(&mut self, conn: ConnHandle, result: Result<usize, Error>) {
        self.events.push(Event::Discovered(conn, result));
    }

    fn recv_state_changed(&mut self, conn: ConnHandle, index: usize, state: &ReceiveState) {
        self.events.push(Event::Changed(conn, index, state.clone()));
    }

    fn recv_state_removed(&mut self, conn: ConnHandle, index: usize) {
        self.events.push(Event::Removed(conn, index));
    }

    fn recv_state_read(
        &mut self,
        conn: ConnHandle,
        index: usize,
        result: Result<Option<&ReceiveState>, Error>,
    ) {
        self.events
            .push(Event::Read(conn, index, result.map(|state| state.cloned())));
    }

    fn cp_ack(&mut self, conn: ConnHandle, opcode: Opcode, result: Result<(), Error>) {
        self.events.push(Event::CpAck(conn, opcode, result));
    }
}
