//! The Broadcast Assistant (BASS client).
//!
//! A [`BroadcastAssistant`] keeps one instance per connected delegator. Each instance discovers
//! the service, subscribes to and mirrors the Receive States, and writes Control Point commands.
//!
//! Every instance runs at most one operation at a time, since the ATT bearer underneath allows one
//! outstanding request per connection. A new request while an operation is pending fails with
//! `Busy` instead of being queued. Notifications are handled regardless of pending operations,
//! except during discovery, when they are dropped.
//!
//! Discovery runs in these steps, each started from the completion of the previous one:
//!
//! 1. Primary service discovery for the Broadcast Audio Scan Service.
//! 2. Characteristic discovery in the service's handle range. Receive States are subscribed to as
//!    soon as they are found.
//! 3. One (long) read of every Receive State, in handle order, to seed the mirror.
//!
//! When change counters are enabled, a write rejected because of a stale counter is retried once
//! after re-reading the Receive State it targets.
//!
//! [`BroadcastAssistant`]: struct.BroadcastAssistant.html

mod read;

use self::read::LongRead;
use crate::{
    att::{AttHandle, ErrorCode, HandleRange},
    bytes::to_vec,
    codec::{
        AddSource, BroadcastCode, Command, ControlPointWrite, ModifySource, Opcode, PaSync,
        ReceiveState, ReceiveStateValue, SourceId,
    },
    config::{AssistantConfig, MAX_CONNECTIONS, MAX_CONTROL_POINT_LEN, MAX_RECEIVE_STATES},
    gatt::{Characteristic, Role},
    utils::HexSlice,
    uuid::{Uuid16, BROADCAST_AUDIO_SCAN_SERVICE},
    ConnHandle, Error,
};
use core::mem;
use heapless::Vec;

/// The GATT client procedures the assistant needs.
///
/// Every method starts a procedure and returns. Its outcome must be fed back into the matching
/// `BroadcastAssistant` method (`service_discovered`, `read_rsp`, ...).
pub trait GattClient {
    /// Looks for a primary service by UUID.
    fn discover_primary_service(&mut self, conn: ConnHandle, uuid: Uuid16) -> Result<(), Error>;

    /// Enumerates the characteristics (with their CCCDs) in `range`.
    fn discover_characteristics(
        &mut self,
        conn: ConnHandle,
        range: HandleRange,
    ) -> Result<(), Error>;

    /// Reads an attribute value, starting at `offset`.
    fn read(&mut self, conn: ConnHandle, handle: AttHandle, offset: u16) -> Result<(), Error>;

    /// Writes an attribute value with a Write Request.
    fn write(&mut self, conn: ConnHandle, handle: AttHandle, value: &[u8]) -> Result<(), Error>;

    /// Enables notifications by writing the CCCD at `ccc_handle`.
    fn subscribe(&mut self, conn: ConnHandle, ccc_handle: AttHandle) -> Result<(), Error>;

    /// Disables notifications by writing the CCCD at `ccc_handle`.
    fn unsubscribe(&mut self, conn: ConnHandle, ccc_handle: AttHandle) -> Result<(), Error>;
}

/// Application callbacks of a `BroadcastAssistant`.
pub trait AssistantCallbacks {
    /// Discovery finished, with the number of Receive States the delegator has.
    ///
    /// A delegator without the service (or without a Control Point) yields `NotFound`.
    fn discovered(&mut self, conn: ConnHandle, result: Result<usize, Error>);

    /// A Receive State changed (through a notification or a refresh).
    fn recv_state_changed(&mut self, conn: ConnHandle, index: usize, state: &ReceiveState);

    /// A Receive State became empty.
    fn recv_state_removed(&mut self, conn: ConnHandle, index: usize);

    /// A Receive State was read, during discovery or through `read_receive_state`.
    fn recv_state_read(
        &mut self,
        conn: ConnHandle,
        index: usize,
        result: Result<Option<&ReceiveState>, Error>,
    );

    /// A Control Point write completed.
    fn cp_ack(&mut self, conn: ConnHandle, opcode: Opcode, result: Result<(), Error>);
}

/// A Receive State characteristic on the delegator and our copy of its value.
#[derive(Debug)]
struct RemoteState {
    handle: AttHandle,
    ccc_handle: Option<AttHandle>,
    state: Option<ReceiveState>,
    change_counter: Option<u8>,
}

impl RemoteState {
    /// Replaces the mirrored value. Returns whether the record changed.
    fn update(&mut self, value: ReceiveStateValue) -> bool {
        self.change_counter = value.change_counter;
        let changed = self.state != value.state;
        self.state = value.state;
        changed
    }
}

#[derive(Debug)]
enum Discovery {
    Service,
    Characteristics,
    ReceiveStates(LongRead),
}

/// The operation an instance is waiting on.
#[derive(Debug)]
enum Pending {
    Idle,
    Discovering(Discovery),
    /// Reading a Receive State. Not `requested` when re-reading after a truncated notification.
    Reading { read: LongRead, requested: bool },
    Writing {
        write: ControlPointWrite,
        retried: bool,
    },
    /// Re-reading the target of `write` after a stale change counter, before the retry.
    Refreshing {
        write: ControlPointWrite,
        read: LongRead,
    },
}

/// Per-connection client state.
struct Instance {
    conn: ConnHandle,
    /// Both we and the delegator support PA sync transfer.
    past_available: bool,
    control_point: Option<AttHandle>,
    states: Vec<RemoteState, MAX_RECEIVE_STATES>,
    pending: Pending,
}

impl Instance {
    fn new(conn: ConnHandle, past_available: bool) -> Self {
        Self {
            conn,
            past_available,
            control_point: None,
            states: Vec::new(),
            pending: Pending::Idle,
        }
    }

    fn is_busy(&self) -> bool {
        match self.pending {
            Pending::Idle => false,
            _ => true,
        }
    }

    fn index_of(&self, source_id: SourceId) -> Option<usize> {
        self.states.iter().position(|remote| {
            remote
                .state
                .as_ref()
                .map_or(false, |state| state.source_id == source_id)
        })
    }

    /// The PA sync value to send for a request.
    ///
    /// A transfer offer is withdrawn when PAST is not available on this connection. An explicit
    /// request for direct sync is sent as is, which is how a `NoPast` report gets retried.
    fn pa_sync(&self, requested: PaSync) -> PaSync {
        match requested {
            PaSync::SyncPastAvailable if !self.past_available => PaSync::SyncPastNotAvailable,
            requested => requested,
        }
    }
}

/// A BASS client talking to up to `MAX_CONNECTIONS` delegators.
pub struct BroadcastAssistant<G: GattClient, C: AssistantCallbacks> {
    config: AssistantConfig,
    gatt: G,
    callbacks: C,
    instances: [Option<Instance>; MAX_CONNECTIONS],
}

impl<G: GattClient, C: AssistantCallbacks> BroadcastAssistant<G, C> {
    pub fn new(config: AssistantConfig, gatt: G, callbacks: C) -> Self {
        Self {
            config,
            gatt,
            callbacks,
            instances: Default::default(),
        }
    }

    pub fn gatt_mut(&mut self) -> &mut G {
        &mut self.gatt
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    /// Returns whether the instance for `conn` has an operation pending.
    pub fn is_busy(&self, conn: ConnHandle) -> bool {
        self.instances
            .iter()
            .flatten()
            .find(|inst| inst.conn == conn)
            .map_or(false, Instance::is_busy)
    }

    /// Returns our copy of Receive State `index` on `conn`.
    pub fn receive_state(&self, conn: ConnHandle, index: usize) -> Option<&ReceiveState> {
        self.instances
            .iter()
            .flatten()
            .find(|inst| inst.conn == conn)?
            .states
            .get(index)?
            .state
            .as_ref()
    }

    // Connection events

    /// Creates an instance for a new connection.
    ///
    /// A known `conn` gets a fresh instance, and its pending operation fails with `NotConnected`.
    ///
    /// `past_available` tells whether the local controller and the peer both support PA sync
    /// transfer.
    pub fn connected(&mut self, conn: ConnHandle, past_available: bool) -> Result<(), Error> {
        if let Ok(inst) = instance(&mut self.instances, conn) {
            let old = mem::replace(inst, Instance::new(conn, past_available));
            fail(&mut self.callbacks, conn, old.pending, Error::NotConnected);
            return Ok(());
        }
        let free = self
            .instances
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(Error::InsufficientResources)?;
        *free = Some(Instance::new(conn, past_available));
        Ok(())
    }

    /// Drops the instance of `conn`. A pending operation fails with `NotConnected`.
    pub fn disconnected(&mut self, conn: ConnHandle) {
        let slot = self
            .instances
            .iter_mut()
            .find(|slot| slot.as_ref().map_or(false, |inst| inst.conn == conn));
        if let Some(inst) = slot.and_then(Option::take) {
            fail(&mut self.callbacks, conn, inst.pending, Error::NotConnected);
        }
    }

    // Application requests

    /// Discovers the service on `conn`. Completion is reported through `discovered`.
    ///
    /// Rediscovering drops the previous subscriptions and mirrored values.
    pub fn discover(&mut self, conn: ConnHandle) -> Result<(), Error> {
        let inst = idle_instance(&mut self.instances, conn)?;
        for ccc in inst.states.iter().filter_map(|remote| remote.ccc_handle) {
            if let Err(e) = self.gatt.unsubscribe(conn, ccc) {
                warn!("{:?}: could not unsubscribe {:?}: {}", conn, ccc, e);
            }
        }
        inst.states.clear();
        inst.control_point = None;

        self.gatt
            .discover_primary_service(conn, BROADCAST_AUDIO_SCAN_SERVICE)?;
        inst.pending = Pending::Discovering(Discovery::Service);
        Ok(())
    }

    /// Tells the delegator we started scanning on its behalf.
    pub fn scan_start(&mut self, conn: ConnHandle) -> Result<(), Error> {
        self.command(conn, Command::ScanStart)
    }

    /// Tells the delegator we stopped scanning on its behalf.
    pub fn scan_stop(&mut self, conn: ConnHandle) -> Result<(), Error> {
        self.command(conn, Command::ScanStop)
    }

    /// Asks the delegator to add a source.
    ///
    /// An offered transfer is turned into a direct sync request when PAST is not available on this
    /// connection.
    pub fn add_source(&mut self, conn: ConnHandle, add: AddSource) -> Result<(), Error> {
        add.validate()?;
        self.command(conn, Command::AddSource(add))
    }

    pub fn modify_source(&mut self, conn: ConnHandle, modify: ModifySource) -> Result<(), Error> {
        modify.validate()?;
        self.command(conn, Command::ModifySource(modify))
    }

    pub fn set_broadcast_code(
        &mut self,
        conn: ConnHandle,
        source_id: SourceId,
        code: BroadcastCode,
    ) -> Result<(), Error> {
        self.command(conn, Command::SetBroadcastCode { source_id, code })
    }

    pub fn remove_source(&mut self, conn: ConnHandle, source_id: SourceId) -> Result<(), Error> {
        self.command(conn, Command::RemoveSource { source_id })
    }

    /// Reads Receive State `index` from the delegator. The result goes to `recv_state_read`.
    pub fn read_receive_state(&mut self, conn: ConnHandle, index: usize) -> Result<(), Error> {
        let inst = idle_instance(&mut self.instances, conn)?;
        let handle = inst.states.get(index).ok_or(Error::NotFound)?.handle;
        self.gatt.read(conn, handle, 0)?;
        inst.pending = Pending::Reading {
            read: LongRead::new(index),
            requested: true,
        };
        Ok(())
    }

    fn command(&mut self, conn: ConnHandle, command: Command) -> Result<(), Error> {
        let inst = idle_instance(&mut self.instances, conn)?;
        let command = match command {
            Command::AddSource(mut add) => {
                add.pa_sync = inst.pa_sync(add.pa_sync);
                Command::AddSource(add)
            }
            Command::ModifySource(mut modify) => {
                modify.pa_sync = inst.pa_sync(modify.pa_sync);
                Command::ModifySource(modify)
            }
            other => other,
        };
        let write = ControlPointWrite {
            command,
            change_counter: None,
        };
        send_write(&mut self.gatt, &self.config, inst, write, false)
    }

    // GATT client completions

    /// Primary service discovery finished.
    ///
    /// `Ok(None)` and `AttributeNotFound` both mean the peer has no Broadcast Audio Scan Service.
    pub fn service_discovered(
        &mut self,
        conn: ConnHandle,
        result: Result<Option<HandleRange>, ErrorCode>,
    ) {
        let inst = match discovering(&mut self.instances, conn) {
            Some(inst) => inst,
            None => return,
        };
        match &inst.pending {
            Pending::Discovering(Discovery::Service) => {}
            _ => return,
        }

        let outcome = match result {
            Ok(Some(range)) => self
                .gatt
                .discover_characteristics(conn, range)
                .map(|()| Pending::Discovering(Discovery::Characteristics)),
            Ok(None) | Err(ErrorCode::AttributeNotFound) => Err(Error::NotFound),
            Err(code) => Err(Error::from_att_code(code)),
        };
        match outcome {
            Ok(pending) => inst.pending = pending,
            Err(e) => {
                inst.pending = Pending::Idle;
                self.callbacks.discovered(conn, Err(e));
            }
        }
    }

    /// A characteristic was found in the service.
    pub fn characteristic_discovered(&mut self, conn: ConnHandle, characteristic: Characteristic) {
        let inst = match discovering(&mut self.instances, conn) {
            Some(inst) => inst,
            None => return,
        };
        match &inst.pending {
            Pending::Discovering(Discovery::Characteristics) => {}
            _ => return,
        }

        match characteristic.role() {
            Role::ControlPoint => inst.control_point = Some(characteristic.value_handle),
            Role::ReceiveState => {
                let remote = RemoteState {
                    handle: characteristic.value_handle,
                    ccc_handle: characteristic.ccc_handle,
                    state: None,
                    change_counter: None,
                };
                if inst.states.push(remote).is_err() {
                    warn!(
                        "{:?}: ignoring receive state at {:?}",
                        conn, characteristic.value_handle
                    );
                    return;
                }
                if let Some(ccc) = characteristic.ccc_handle {
                    if let Err(e) = self.gatt.subscribe(conn, ccc) {
                        warn!("{:?}: could not subscribe {:?}: {}", conn, ccc, e);
                    }
                }
            }
            Role::Other => {}
        }
    }

    /// Characteristic discovery finished.
    ///
    /// `AttributeNotFound` is the regular end of the procedure.
    pub fn characteristic_discovery_complete(
        &mut self,
        conn: ConnHandle,
        result: Result<(), ErrorCode>,
    ) {
        let inst = match discovering(&mut self.instances, conn) {
            Some(inst) => inst,
            None => return,
        };
        match &inst.pending {
            Pending::Discovering(Discovery::Characteristics) => {}
            _ => return,
        }

        let outcome = match result {
            Ok(()) | Err(ErrorCode::AttributeNotFound) if inst.control_point.is_none() => {
                Err(Error::NotFound)
            }
            Ok(()) | Err(ErrorCode::AttributeNotFound) => match inst.states.first() {
                Some(first) => self
                    .gatt
                    .read(conn, first.handle, 0)
                    .map(|()| Some(LongRead::new(0))),
                None => Ok(None),
            },
            Err(code) => Err(Error::from_att_code(code)),
        };
        match outcome {
            Ok(Some(read)) => inst.pending = Pending::Discovering(Discovery::ReceiveStates(read)),
            Ok(None) => {
                inst.pending = Pending::Idle;
                self.callbacks.discovered(conn, Ok(0));
            }
            Err(e) => {
                inst.pending = Pending::Idle;
                self.callbacks.discovered(conn, Err(e));
            }
        }
    }

    /// A read (or one part of a long read) completed.
    ///
    /// An empty response ends a long read.
    pub fn read_rsp(&mut self, conn: ConnHandle, result: Result<&[u8], ErrorCode>) {
        let inst = match instance(&mut self.instances, conn) {
            Ok(inst) => inst,
            Err(_) => return,
        };
        let callbacks = &mut self.callbacks;

        match mem::replace(&mut inst.pending, Pending::Idle) {
            Pending::Discovering(Discovery::ReceiveStates(mut read)) => {
                let value = match continue_read(
                    &mut self.gatt,
                    &self.config,
                    inst,
                    &mut read,
                    result,
                ) {
                    None => {
                        inst.pending = Pending::Discovering(Discovery::ReceiveStates(read));
                        return;
                    }
                    Some(Ok(value)) => value,
                    Some(Err(e)) => {
                        callbacks.discovered(conn, Err(e));
                        return;
                    }
                };

                let index = read.index();
                inst.states[index].update(value);
                callbacks.recv_state_read(conn, index, Ok(inst.states[index].state.as_ref()));

                let next = index + 1;
                match inst.states.get(next) {
                    None => callbacks.discovered(conn, Ok(inst.states.len())),
                    Some(remote) => match self.gatt.read(conn, remote.handle, 0) {
                        Ok(()) => {
                            inst.pending =
                                Pending::Discovering(Discovery::ReceiveStates(LongRead::new(next)))
                        }
                        Err(e) => callbacks.discovered(conn, Err(e)),
                    },
                }
            }
            Pending::Reading {
                mut read,
                requested,
            } => {
                let index = read.index();
                match continue_read(&mut self.gatt, &self.config, inst, &mut read, result) {
                    None => inst.pending = Pending::Reading { read, requested },
                    Some(Ok(value)) => {
                        let changed = inst.states[index].update(value);
                        if requested {
                            callbacks.recv_state_read(
                                conn,
                                index,
                                Ok(inst.states[index].state.as_ref()),
                            );
                        } else if changed {
                            report(callbacks, conn, index, &inst.states[index]);
                        }
                    }
                    Some(Err(e)) if requested => callbacks.recv_state_read(conn, index, Err(e)),
                    Some(Err(e)) => warn!("{:?}: re-reading receive state failed: {}", conn, e),
                }
            }
            Pending::Refreshing { write, mut read } => {
                let index = read.index();
                match continue_read(&mut self.gatt, &self.config, inst, &mut read, result) {
                    None => inst.pending = Pending::Refreshing { write, read },
                    Some(Ok(value)) => {
                        if inst.states[index].update(value) {
                            report(callbacks, conn, index, &inst.states[index]);
                        }
                        let opcode = write.command.opcode();
                        if let Err(e) = send_write(&mut self.gatt, &self.config, inst, write, true)
                        {
                            callbacks.cp_ack(conn, opcode, Err(e));
                        }
                    }
                    Some(Err(e)) => callbacks.cp_ack(conn, write.command.opcode(), Err(e)),
                }
            }
            other => {
                warn!("{:?}: unexpected read response", conn);
                inst.pending = other;
            }
        }
    }

    /// A Control Point write completed.
    pub fn write_rsp(&mut self, conn: ConnHandle, result: Result<(), ErrorCode>) {
        let inst = match instance(&mut self.instances, conn) {
            Ok(inst) => inst,
            Err(_) => return,
        };
        let (write, retried) = match mem::replace(&mut inst.pending, Pending::Idle) {
            Pending::Writing { write, retried } => (write, retried),
            other => {
                warn!("{:?}: unexpected write response", conn);
                inst.pending = other;
                return;
            }
        };
        let opcode = write.command.opcode();

        let error = match result {
            Ok(()) => {
                debug!("{:?}: {:?} accepted", conn, opcode);
                self.callbacks.cp_ack(conn, opcode, Ok(()));
                return;
            }
            Err(code) => Error::from_att_code(code),
        };

        if error == Error::StaleCounter && !retried {
            let target = write.command.source_id().and_then(|id| inst.index_of(id));
            if let Some(index) = target {
                debug!("{:?}: stale change counter, re-reading {}", conn, index);
                let result = self.gatt.read(conn, inst.states[index].handle, 0);
                match result {
                    Ok(()) => {
                        inst.pending = Pending::Refreshing {
                            write,
                            read: LongRead::new(index),
                        };
                    }
                    Err(e) => self.callbacks.cp_ack(conn, opcode, Err(e)),
                }
                return;
            }
        }

        warn!("{:?}: {:?} rejected: {}", conn, opcode, error);
        self.callbacks.cp_ack(conn, opcode, Err(error));
    }

    /// A notification arrived.
    ///
    /// A notification filling a whole ATT PDU may have been truncated. If nothing else is pending,
    /// the Receive State is re-read instead of decoding it.
    pub fn notification(&mut self, conn: ConnHandle, handle: AttHandle, value: &[u8]) {
        let inst = match instance(&mut self.instances, conn) {
            Ok(inst) => inst,
            Err(_) => return,
        };
        if let Pending::Discovering(_) = inst.pending {
            trace!("{:?}: dropping notification during discovery", conn);
            return;
        }
        let index = match inst.states.iter().position(|remote| remote.handle == handle) {
            Some(index) => index,
            None => return,
        };
        trace!("{:?}: notification {:?}: {:?}", conn, handle, HexSlice(value));

        let max_len = usize::from(self.config.att_mtu).saturating_sub(3);
        if value.len() >= max_len && !inst.is_busy() {
            match self.gatt.read(conn, handle, 0) {
                Ok(()) => {
                    inst.pending = Pending::Reading {
                        read: LongRead::new(index),
                        requested: false,
                    };
                    return;
                }
                Err(e) => warn!("{:?}: could not re-read {:?}: {}", conn, handle, e),
            }
        }

        match ReceiveStateValue::decode(value, self.config.change_counter) {
            Ok(value) => {
                if inst.states[index].update(value) {
                    report(&mut self.callbacks, conn, index, &inst.states[index]);
                }
            }
            Err(e) => warn!("{:?}: dropping notification: {}", conn, e),
        }
    }
}

fn instance(
    instances: &mut [Option<Instance>],
    conn: ConnHandle,
) -> Result<&mut Instance, Error> {
    instances
        .iter_mut()
        .flatten()
        .find(|inst| inst.conn == conn)
        .ok_or(Error::NotConnected)
}

fn idle_instance(
    instances: &mut [Option<Instance>],
    conn: ConnHandle,
) -> Result<&mut Instance, Error> {
    let inst = instance(instances, conn)?;
    if inst.is_busy() {
        Err(Error::Busy)
    } else {
        Ok(inst)
    }
}

/// Returns the instance of `conn` if it is in the middle of a discovery.
fn discovering(instances: &mut [Option<Instance>], conn: ConnHandle) -> Option<&mut Instance> {
    let inst = instance(instances, conn).ok()?;
    match inst.pending {
        Pending::Discovering(_) => Some(inst),
        _ => {
            warn!("{:?}: unexpected discovery response", conn);
            None
        }
    }
}

/// Encodes and sends a Control Point write, stamped with the counter of the Receive State it
/// targets.
fn send_write<G: GattClient>(
    gatt: &mut G,
    config: &AssistantConfig,
    inst: &mut Instance,
    mut write: ControlPointWrite,
    retried: bool,
) -> Result<(), Error> {
    let cp = inst.control_point.ok_or(Error::NotFound)?;
    write.change_counter = match write.command.source_id() {
        Some(id) if config.change_counter => Some(
            inst.index_of(id)
                .and_then(|index| inst.states[index].change_counter)
                .unwrap_or(0),
        ),
        _ => None,
    };

    let bytes: Vec<u8, MAX_CONTROL_POINT_LEN> = to_vec(&write)?;
    trace!("{:?}: writing {:?}", inst.conn, HexSlice(&bytes[..]));
    gatt.write(inst.conn, cp, &bytes)?;
    inst.pending = Pending::Writing { write, retried };
    Ok(())
}

/// Feeds one read response into `read`.
///
/// Returns `None` if the next part was requested, or the decoded value once the read is over.
fn continue_read<G: GattClient>(
    gatt: &mut G,
    config: &AssistantConfig,
    inst: &Instance,
    read: &mut LongRead,
    result: Result<&[u8], ErrorCode>,
) -> Option<Result<ReceiveStateValue, Error>> {
    let part = match result {
        Ok(part) => part,
        Err(code) => return Some(Err(Error::from_att_code(code))),
    };
    match read.push(part) {
        Ok(true) => Some(ReceiveStateValue::decode(
            read.value(),
            config.change_counter,
        )),
        Ok(false) => {
            let handle = inst.states[read.index()].handle;
            match gatt.read(inst.conn, handle, read.offset()) {
                Ok(()) => None,
                Err(e) => Some(Err(e)),
            }
        }
        Err(e) => Some(Err(e)),
    }
}

fn report<C: AssistantCallbacks>(
    callbacks: &mut C,
    conn: ConnHandle,
    index: usize,
    remote: &RemoteState,
) {
    match &remote.state {
        Some(state) => callbacks.recv_state_changed(conn, index, state),
        None => callbacks.recv_state_removed(conn, index),
    }
}

/// Reports the failure of a pending operation.
fn fail<C: AssistantCallbacks>(
    callbacks: &mut C,
    conn: ConnHandle,
    pending: Pending,
    error: Error,
) {
    match pending {
        Pending::Idle => {}
        Pending::Discovering(_) => callbacks.discovered(conn, Err(error)),
        Pending::Reading {
            read,
            requested: true,
        } => callbacks.recv_state_read(conn, read.index(), Err(error)),
        Pending::Reading { .. } => {}
        Pending::Writing { write, .. } | Pending::Refreshing { write, .. } => {
            callbacks.cp_ack(conn, write.command.opcode(), Err(error))
        }
    }
}
