//! The Scan Delegator (BASS server).
//!
//! A [`ScanDelegator`] owns a fixed number of Receive State slots and the Control Point. It drives
//! the synchronization of every slot it holds:
//!
//! ```notrust
//!             Add-Source / Modify-Source with PA sync requested
//!                               |
//!          peer can transfer    |     otherwise
//!         +---------------------+--------------------+
//!         v                                          v
//!  SyncInfoRequest ---(timer)---> NoPast       NotSynced (pending) ---(timer/failure)---> Failed
//!         |                                          |
//!         +------------- transfer / sync ------------+
//!                               v
//!                             Synced ---(BIGInfo)---> BIG sync (lowest requested BIS)
//! ```
//!
//! Encryption is handled once BIGInfo arrives: an encrypted BIG needs a broadcast code before the
//! BIG sync is attempted (`BroadcastCodeRequired`), a code handed to the engine puts the slot in
//! `Decrypting`, and only the engine can report a `BadCode`.
//!
//! Every mutation ends in a commit that compares the encoded record with the last published one.
//! Subscribed peers are notified only when something actually changed.
//!
//! [`ScanDelegator`]: struct.ScanDelegator.html

mod base;
mod registry;
mod store;
mod sync;

pub use self::base::{Base, BaseSubgroup};
pub use self::registry::AssistantRegistry;
pub use self::sync::{select_bis, sync_timeout, MAX_SYNC_TIMEOUT, MIN_SYNC_TIMEOUT, PA_SYNC_SKIP};

use self::store::{PaPending, ReceiveStateStore, Slot};
use crate::{
    ad_structure::AdStructure,
    address::DeviceAddress,
    att::{AttError, AttHandle, ErrorCode},
    bytes::*,
    codec::{
        AddSource, BisSync, BroadcastCode, BroadcastSource, Command, ControlPointWrite,
        EncryptState, ModifySource, PaSync, PaSyncState, ReceiveState, SourceId,
    },
    config::{Config, DelegatorConfig, RemovalPolicy, MAX_RECEIVE_STATES},
    gatt::ServiceLayout,
    time::{Duration, Timer},
    utils::HexSlice,
    uuid::BROADCAST_AUDIO_SCAN_SERVICE,
    ConnHandle, Error,
};
use core::cmp;

/// Handle of a PA sync, assigned by the synchronization engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SyncHandle(pub u16);

/// Handle of a BIG sync, assigned by the synchronization engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BigHandle(pub u8);

/// Parameters for establishing a PA sync, directly or through a transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PaSyncParams {
    pub address: DeviceAddress,
    pub adv_sid: u8,
    /// Number of PA events that may be skipped.
    pub skip: u16,
    /// Sync timeout in 10 ms units.
    pub timeout: u16,
}

/// Parameters for synchronizing to a BIG.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BigSyncParams {
    /// The PA sync carrying the BIGInfo.
    pub pa_sync: SyncHandle,
    /// The BIS to synchronize to.
    pub bis: BisSync,
    /// Broadcast code, for encrypted BIGs.
    pub code: Option<BroadcastCode>,
}

/// The part of a BIGInfo report the delegator needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BigInfo {
    /// Number of BISes in the BIG. BIS indices run from 1 to `num_bis`.
    pub num_bis: u8,
    pub encrypted: bool,
}

/// Describes an established PA sync.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PaSyncedInfo {
    pub address: DeviceAddress,
    pub adv_sid: u8,
    /// PA interval in 1.25 ms units.
    pub interval: u16,
}

/// Why a BIG sync ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BigTerminateReason {
    /// The BIG could not be decrypted with the broadcast code.
    MicFailure,
    /// Any other reason (sync lost, terminated by the source).
    Other,
}

/// The PA and BIG synchronization engine, usually the controller.
///
/// All methods only start an operation. Completion is reported back through the `ScanDelegator`
/// event methods (`pa_synced`, `big_synced`, ...).
pub trait SyncEngine {
    /// Starts synchronizing to a periodic advertising train.
    fn create_sync(&mut self, params: &PaSyncParams) -> Result<SyncHandle, Error>;

    /// Terminates an established or pending PA sync.
    fn delete_sync(&mut self, handle: SyncHandle);

    /// Accepts PA sync transfers (PAST) from `conn` for the given train.
    fn transfer_subscribe(&mut self, conn: ConnHandle, params: &PaSyncParams) -> Result<(), Error>;

    /// Stops accepting PA sync transfers from `conn`.
    fn transfer_unsubscribe(&mut self, conn: ConnHandle);

    /// Starts synchronizing to a BIG.
    fn big_sync(&mut self, params: &BigSyncParams) -> Result<BigHandle, Error>;

    /// Terminates an established or pending BIG sync.
    fn big_terminate(&mut self, handle: BigHandle);
}

/// Sends notifications of a Receive State value to every peer that enabled them.
pub trait Notifier {
    fn notify(&mut self, handle: AttHandle, value: &[u8]);
}

/// A BASS server.
pub struct ScanDelegator<C: Config> {
    config: DelegatorConfig,
    layout: ServiceLayout,
    store: ReceiveStateStore,
    registry: AssistantRegistry,
    engine: C::SyncEngine,
    timer: C::Timer,
    notifier: C::Notifier,
}

impl<C: Config> ScanDelegator<C> {
    /// Creates a delegator with empty Receive States, its service placed at `layout`.
    pub fn new(
        config: DelegatorConfig,
        layout: ServiceLayout,
        engine: C::SyncEngine,
        timer: C::Timer,
        notifier: C::Notifier,
    ) -> Self {
        Self {
            store: ReceiveStateStore::new(config.change_counter),
            registry: AssistantRegistry::new(),
            config,
            layout,
            engine,
            timer,
            notifier,
        }
    }

    pub fn layout(&self) -> &ServiceLayout {
        &self.layout
    }

    pub fn engine(&self) -> &C::SyncEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut C::SyncEngine {
        &mut self.engine
    }

    pub fn timer(&self) -> &C::Timer {
        &self.timer
    }

    pub fn notifier_mut(&mut self) -> &mut C::Notifier {
        &mut self.notifier
    }

    pub fn registry(&self) -> &AssistantRegistry {
        &self.registry
    }

    /// Writes the AD structure that lets assistants find this delegator.
    pub fn advertising_data(&self, buf: &mut ByteWriter<'_>) -> Result<(), Error> {
        AdStructure::ServiceData16 {
            uuid: BROADCAST_AUDIO_SCAN_SERVICE,
            data: &[],
        }
        .to_bytes(buf)
    }

    /// Returns the Receive State with the given source ID.
    pub fn receive_state(&self, source_id: SourceId) -> Option<&ReceiveState> {
        let index = self.store.index_of(source_id)?;
        self.store.get(index).map(|slot| &slot.state)
    }

    /// Iterates over all non-empty Receive States.
    pub fn receive_states(&self) -> impl Iterator<Item = &ReceiveState> + '_ {
        self.store
            .occupied()
            .filter_map(move |i| self.store.get(i))
            .map(|slot| &slot.state)
    }

    // Connection events

    /// Registers a connected peer. `past_capable` tells whether it can send PA sync transfers.
    pub fn connected(&mut self, conn: ConnHandle, past_capable: bool) -> Result<(), Error> {
        debug!("{:?} connected, PAST: {}", conn, past_capable);
        self.registry.connect(conn, past_capable)
    }

    /// Forgets a peer and applies the removal policy to the sources it added.
    ///
    /// Pending PA sync transfers from the peer are left to time out.
    pub fn disconnected(&mut self, conn: ConnHandle) {
        debug!("{:?} disconnected", conn);
        self.registry.disconnect(conn);

        if self.config.removal_policy == RemovalPolicy::RemoveOnDisconnect {
            for index in 0..MAX_RECEIVE_STATES {
                let added_by_conn = self
                    .store
                    .get(index)
                    .map_or(false, |slot| slot.initiator == Some(conn));
                if added_by_conn {
                    self.remove(index);
                }
            }
        }
    }

    // ATT access

    /// Serves a read of the attribute at `handle`, starting at `offset`.
    ///
    /// Copies as much of the value as fits into `out`. Reading at an offset equal to the value
    /// length returns no data.
    pub fn read(
        &self,
        handle: AttHandle,
        offset: u16,
        out: &mut ByteWriter<'_>,
    ) -> Result<(), AttError> {
        if handle == self.layout.control_point() {
            return Err(AttError::new(ErrorCode::ReadNotPermitted, handle));
        }
        let index = self
            .layout
            .receive_state_index(handle)
            .ok_or_else(|| AttError::new(ErrorCode::InvalidHandle, handle))?;

        let value = self.store.value(index);
        let offset = usize::from(offset);
        if offset > value.len() {
            return Err(AttError::new(ErrorCode::InvalidOffset, handle));
        }
        let rest = &value[offset..];
        let len = cmp::min(rest.len(), out.space_left());
        out.write_slice(&rest[..len])
            .map_err(|_| AttError::new(ErrorCode::UnlikelyError, handle))
    }

    /// Serves a write from `conn` to the attribute at `handle`.
    ///
    /// Only the Control Point is writable. A rejected command leaves all Receive States untouched
    /// and yields the error to send back.
    pub fn write(
        &mut self,
        conn: ConnHandle,
        handle: AttHandle,
        value: &[u8],
    ) -> Result<(), AttError> {
        if handle != self.layout.control_point() {
            let code = if self.layout.range().contains(handle) {
                ErrorCode::WriteNotPermitted
            } else {
                ErrorCode::InvalidHandle
            };
            return Err(AttError::new(code, handle));
        }

        self.control_point(conn, value).map_err(|e| {
            warn!(
                "rejecting control point write from {:?} ({}): {:?}",
                conn,
                e,
                HexSlice(value)
            );
            AttError::new(e.to_att_code(), handle)
        })
    }

    fn control_point(&mut self, conn: ConnHandle, value: &[u8]) -> Result<(), Error> {
        let write = ControlPointWrite::decode(value, self.config.change_counter)?;
        trace!("{:?} control point: {:?}", conn, write);

        match write.command {
            Command::ScanStop => self.remote_scan(conn, false),
            Command::ScanStart => self.remote_scan(conn, true),
            Command::AddSource(add) => self.add(add, Some(conn)).map(drop),
            Command::ModifySource(modify) => {
                let index = self.resolve(modify.source_id, write.change_counter)?;
                self.modify(index, modify, Some(conn));
                Ok(())
            }
            Command::SetBroadcastCode { source_id, code } => {
                let index = self.resolve(source_id, write.change_counter)?;
                self.set_code(index, code);
                Ok(())
            }
            Command::RemoveSource { source_id } => {
                let index = self.resolve(source_id, write.change_counter)?;
                self.remove(index);
                Ok(())
            }
        }
    }

    fn remote_scan(&mut self, conn: ConnHandle, scanning: bool) -> Result<(), Error> {
        debug!("{:?} remote scan: {}", conn, scanning);
        if self.registry.set_scanning(conn, scanning).is_err() {
            warn!("remote scan state from unregistered {:?}", conn);
        }
        Ok(())
    }

    /// Finds the slot targeted by a command and checks the change counter the writer based it on.
    fn resolve(&self, source_id: SourceId, change_counter: Option<u8>) -> Result<usize, Error> {
        let index = self
            .store
            .index_of(source_id)
            .ok_or(Error::UnknownSourceId)?;
        if let Some(counter) = change_counter {
            if counter != self.store.counter(index) {
                return Err(Error::StaleCounter);
            }
        }
        Ok(index)
    }

    // Local application API

    /// Adds a source without an assistant. Returns the assigned source ID.
    pub fn add_source(&mut self, add: AddSource) -> Result<SourceId, Error> {
        add.validate()?;
        self.add(add, None)
    }

    /// Modifies a source without an assistant.
    pub fn modify_source(&mut self, modify: ModifySource) -> Result<(), Error> {
        modify.validate()?;
        let index = self.resolve(modify.source_id, None)?;
        self.modify(index, modify, None);
        Ok(())
    }

    /// Hands a broadcast code for a source to the delegator.
    pub fn set_broadcast_code(
        &mut self,
        source_id: SourceId,
        code: BroadcastCode,
    ) -> Result<(), Error> {
        let index = self.resolve(source_id, None)?;
        self.set_code(index, code);
        Ok(())
    }

    /// Removes a source, tearing down its syncs.
    pub fn remove_source(&mut self, source_id: SourceId) -> Result<(), Error> {
        let index = self.resolve(source_id, None)?;
        self.remove(index);
        Ok(())
    }

    /// Overrides the reported synchronization state of a source.
    ///
    /// For hosts that track synchronization themselves. `bis_synced` holds one entry per subgroup
    /// (missing entries are treated as not synced). Each entry must be `BisSync::FAILED` or within
    /// what the subgroup requested.
    pub fn set_sync_state(
        &mut self,
        source_id: SourceId,
        pa_sync_state: PaSyncState,
        bis_synced: &[BisSync],
        encrypt_state: EncryptState,
    ) -> Result<(), Error> {
        let index = self.resolve(source_id, None)?;
        let slot = self.store.get_mut(index).ok_or(Error::UnknownSourceId)?;

        if !pa_sync_state.is_known() || bis_synced.len() > slot.requested.len() {
            return Err(Error::InvalidParameter);
        }
        let within_request = bis_synced.iter().zip(&slot.requested).all(|(bis, req)| {
            *bis == BisSync::FAILED
                || req.is_no_preference()
                || bis.as_u32() & !req.as_u32() == 0
        });
        if !within_request {
            return Err(Error::InvalidParameter);
        }

        slot.state.pa_sync_state = pa_sync_state;
        slot.state.encrypt_state = encrypt_state;
        for (i, subgroup) in slot.state.subgroups.iter_mut().enumerate() {
            subgroup.bis_sync = bis_synced.get(i).copied().unwrap_or(BisSync::NONE);
        }
        self.commit(index, false);
        Ok(())
    }

    // Synchronization engine events

    /// A PA sync was established, either directly or through a transfer.
    pub fn pa_synced(&mut self, handle: SyncHandle, info: &PaSyncedInfo) {
        let index = match self
            .store
            .by_pa_handle(handle)
            .or_else(|| self.store.awaiting_transfer(&info.address, info.adv_sid))
        {
            Some(index) => index,
            None => {
                debug!("PA sync {:?} is not for any receive state", handle);
                return;
            }
        };

        self.timer.cancel(index);
        if let Some(slot) = self.store.get_mut(index) {
            if let PaPending::Transfer(conn) = slot.pa_pending {
                self.engine.transfer_unsubscribe(conn);
            }
            if slot.pa_handle != Some(handle) {
                slot.biginfo = None;
            }
            slot.pa_handle = Some(handle);
            slot.pa_pending = PaPending::Idle;
            slot.pa_interval = info.interval;
            slot.state.pa_sync_state = PaSyncState::Synced;
            debug!("source {} PA synced ({:?})", slot.state.source_id, handle);
        }
        self.commit(index, false);
    }

    /// A PA sync ended, or could not be established.
    ///
    /// A running BIG sync is left alone. The cached BIGInfo is dropped, so the next PA sync
    /// attempts a BIG sync again.
    pub fn pa_terminated(&mut self, handle: SyncHandle) {
        let index = match self.store.by_pa_handle(handle) {
            Some(index) => index,
            None => return,
        };

        self.timer.cancel(index);
        if let Some(slot) = self.store.get_mut(index) {
            let establishing = slot.pa_pending == PaPending::Direct;
            slot.pa_handle = None;
            slot.biginfo = None;
            slot.pa_pending = PaPending::Idle;
            slot.state.pa_sync_state = if establishing {
                PaSyncState::Failed
            } else {
                PaSyncState::NotSynced
            };
            debug!(
                "source {} PA sync ended: {:?}",
                slot.state.source_id, slot.state.pa_sync_state
            );
        }
        self.commit(index, false);
    }

    /// Periodic advertising data arrived on a PA sync.
    ///
    /// Fills in subgroup metadata the assistant did not provide from the source's BASE.
    pub fn pa_data_received(&mut self, handle: SyncHandle, data: &[u8]) {
        let index = match self.store.by_pa_handle(handle) {
            Some(index) => index,
            None => return,
        };
        let base = match Base::find(data) {
            Some(base) => base,
            None => return,
        };

        if let Some(slot) = self.store.get_mut(index) {
            for (subgroup, announced) in slot.state.subgroups.iter_mut().zip(&base.subgroups) {
                if subgroup.metadata.is_empty() {
                    subgroup.metadata = announced.metadata.clone();
                }
            }
        }
        self.commit(index, false);
    }

    /// A BIGInfo report arrived on a PA sync.
    ///
    /// Engines deliver one per PA event. Only a new or changed report triggers a BIG sync attempt.
    pub fn biginfo_received(&mut self, handle: SyncHandle, info: BigInfo) {
        let index = match self.store.by_pa_handle(handle) {
            Some(index) => index,
            None => return,
        };
        let fresh = match self.store.get_mut(index) {
            Some(slot) if slot.biginfo != Some(info) => {
                slot.biginfo = Some(info);
                true
            }
            _ => false,
        };
        if !fresh {
            return;
        }

        debug!("BIGInfo for {:?}: {:?}", handle, info);
        if let Err(e) = self.try_big_sync(index) {
            debug!("not syncing to BIG: {}", e);
        }
        self.commit(index, false);
    }

    /// A BIG sync was established.
    pub fn big_synced(&mut self, handle: BigHandle) {
        let index = match self.store.by_big_handle(handle) {
            Some(index) => index,
            None => return,
        };
        if let Some(slot) = self.store.get_mut(index) {
            slot.big_pending = false;
            report_bis(slot);
            debug!("source {} BIG synced to {:?}", slot.state.source_id, slot.bis);
        }
        self.commit(index, false);
    }

    /// A BIG sync could not be established.
    pub fn big_sync_failed(&mut self, handle: BigHandle) {
        let index = match self.store.by_big_handle(handle) {
            Some(index) => index,
            None => return,
        };
        if let Some(slot) = self.store.get_mut(index) {
            slot.big_handle = None;
            slot.big_pending = false;
            slot.bis = BisSync::NONE;
            report_bis_failed(slot);
        }
        self.commit(index, false);
    }

    /// An established BIG sync ended.
    pub fn big_terminated(&mut self, handle: BigHandle, reason: BigTerminateReason) {
        let index = match self.store.by_big_handle(handle) {
            Some(index) => index,
            None => return,
        };
        if let Some(slot) = self.store.get_mut(index) {
            slot.big_handle = None;
            slot.big_pending = false;
            slot.bis = BisSync::NONE;
            slot.clear_bis_sync();
            if reason == BigTerminateReason::MicFailure {
                if let Some(code) = slot.code.take() {
                    slot.state.encrypt_state = EncryptState::BadCode(code);
                }
            }
            debug!("source {} BIG ended: {:?}", slot.state.source_id, reason);
        }
        self.commit(index, false);
    }

    /// The PA sync wait timer of slot `index` expired.
    pub fn sync_timeout(&mut self, index: usize) {
        let slot = match self.store.get_mut(index) {
            Some(slot) => slot,
            None => return,
        };
        match slot.pa_pending {
            PaPending::Idle => return,
            PaPending::Transfer(conn) => {
                self.engine.transfer_unsubscribe(conn);
                slot.state.pa_sync_state = PaSyncState::NoPast;
            }
            PaPending::Direct => {
                if let Some(handle) = slot.pa_handle.take() {
                    self.engine.delete_sync(handle);
                }
                slot.biginfo = None;
                slot.state.pa_sync_state = PaSyncState::Failed;
            }
        }
        slot.pa_pending = PaPending::Idle;
        debug!(
            "source {} PA sync timed out: {:?}",
            slot.state.source_id, slot.state.pa_sync_state
        );
        self.commit(index, false);
    }

    // State machine

    fn add(&mut self, add: AddSource, initiator: Option<ConnHandle>) -> Result<SourceId, Error> {
        if let Some(existing) = self.find_source(&add.source) {
            debug!("{:?} already added as source {}", add.source, existing);
            return Ok(existing);
        }

        let index = self.store.free_index()?;
        let source_id = self.store.next_source_id();
        let state = ReceiveState {
            source_id,
            source: add.source,
            pa_sync_state: PaSyncState::NotSynced,
            encrypt_state: EncryptState::NotEncrypted,
            subgroups: add.subgroups,
        };
        let mut slot = Slot::new(state, add.pa_sync, add.pa_interval);
        slot.initiator = initiator;
        self.store.insert(index, slot);
        info!("added source {} in slot {}", source_id, index);

        if add.pa_sync.is_requested() {
            self.start_pa_sync(index, initiator);
        }
        self.commit(index, true);
        Ok(source_id)
    }

    fn find_source(&self, source: &BroadcastSource) -> Option<SourceId> {
        self.receive_states()
            .find(|state| state.source == *source)
            .map(|state| state.source_id)
    }

    fn modify(&mut self, index: usize, modify: ModifySource, conn: Option<ConnHandle>) {
        let switch_to_direct = match self.store.get_mut(index) {
            Some(slot) => {
                slot.set_subgroups(modify.subgroups);
                slot.pa_sync = modify.pa_sync;
                slot.pa_interval = modify.pa_interval;
                matches!(slot.pa_pending, PaPending::Transfer(_))
                    && modify.pa_sync == PaSync::SyncPastNotAvailable
            }
            None => return,
        };

        if !modify.pa_sync.is_requested() || switch_to_direct {
            self.stop_pa_sync(index);
        }
        if modify.pa_sync.is_requested() {
            self.start_pa_sync(index, conn);
            self.update_big_sync(index);
        }
        if let Some(slot) = self.store.get_mut(index) {
            report_bis(slot);
        }
        self.commit(index, true);
    }

    fn set_code(&mut self, index: usize, code: BroadcastCode) {
        let retry = match self.store.get_mut(index) {
            Some(slot) => {
                slot.code = Some(code);
                slot.big_handle.is_none() && slot.biginfo.map_or(false, |info| info.encrypted)
            }
            None => return,
        };
        if retry {
            if let Err(e) = self.try_big_sync(index) {
                debug!("not syncing to BIG: {}", e);
            }
        }
        self.commit(index, true);
    }

    fn remove(&mut self, index: usize) {
        self.stop_pa_sync(index);
        if let Some(slot) = self.store.take(index) {
            info!("removed source {} from slot {}", slot.state.source_id, index);
        }
        self.commit(index, true);
    }

    /// Starts establishing a PA sync for slot `index`, unless one is established or pending.
    ///
    /// A transfer is requested when both sides support it and the assistant offered one.
    fn start_pa_sync(&mut self, index: usize, conn: Option<ConnHandle>) {
        let past_conn =
            conn.filter(|&conn| self.config.past_supported && self.registry.past_capable(conn));
        let slot = match self.store.get_mut(index) {
            Some(slot) => slot,
            None => return,
        };
        if slot.pa_handle.is_some() || slot.pa_pending != PaPending::Idle {
            return;
        }

        let timeout = sync_timeout(slot.pa_interval);
        let params = PaSyncParams {
            address: slot.state.source.address,
            adv_sid: slot.state.source.adv_sid,
            skip: PA_SYNC_SKIP,
            timeout,
        };
        let past_conn = past_conn.filter(|_| slot.pa_sync == PaSync::SyncPastAvailable);

        if let Some(conn) = past_conn {
            match self.engine.transfer_subscribe(conn, &params) {
                Ok(()) => {
                    slot.pa_pending = PaPending::Transfer(conn);
                    slot.state.pa_sync_state = PaSyncState::SyncInfoRequest;
                    self.timer.start(index, self.config.past_wait);
                    debug!("source {}: waiting for PAST from {:?}", slot.state.source_id, conn);
                    return;
                }
                Err(e) => warn!("PAST subscription failed ({}), syncing directly", e),
            }
        }

        match self.engine.create_sync(&params) {
            Ok(handle) => {
                slot.pa_handle = Some(handle);
                slot.pa_pending = PaPending::Direct;
                slot.state.pa_sync_state = PaSyncState::NotSynced;
                self.timer.start(index, Duration::from_10ms_ticks(timeout));
                debug!("source {}: syncing to PA ({:?})", slot.state.source_id, handle);
            }
            Err(e) => {
                warn!("could not start PA sync: {}", e);
                slot.state.pa_sync_state = PaSyncState::Failed;
            }
        }
    }

    /// Tears down every sync of slot `index`, pending or established.
    fn stop_pa_sync(&mut self, index: usize) {
        self.terminate_big(index);
        self.timer.cancel(index);
        if let Some(slot) = self.store.get_mut(index) {
            if let PaPending::Transfer(conn) = slot.pa_pending {
                self.engine.transfer_unsubscribe(conn);
            }
            if let Some(handle) = slot.pa_handle.take() {
                self.engine.delete_sync(handle);
            }
            slot.pa_pending = PaPending::Idle;
            slot.biginfo = None;
            slot.state.pa_sync_state = PaSyncState::NotSynced;
        }
    }

    fn terminate_big(&mut self, index: usize) {
        if let Some(slot) = self.store.get_mut(index) {
            if let Some(handle) = slot.big_handle.take() {
                self.engine.big_terminate(handle);
            }
            slot.big_pending = false;
            slot.bis = BisSync::NONE;
            slot.clear_bis_sync();
        }
    }

    /// Restarts the BIG sync of slot `index` if the requested BIS no longer match it.
    fn update_big_sync(&mut self, index: usize) {
        let stale = match self.store.get(index) {
            Some(slot) => match slot.biginfo {
                Some(info) if slot.big_handle.is_some() => {
                    select_bis(&slot.requested, info.num_bis) != slot.bis
                }
                Some(_) => true,
                None => false,
            },
            None => false,
        };
        if stale {
            self.terminate_big(index);
            if let Err(e) = self.try_big_sync(index) {
                debug!("not syncing to BIG: {}", e);
            }
        }
    }

    /// Attempts to synchronize slot `index` to its BIG, using the cached BIGInfo.
    ///
    /// Updates the encryption state. An encrypted BIG without a broadcast code is not synced to,
    /// and neither is a BIG none of whose BIS are requested.
    fn try_big_sync(&mut self, index: usize) -> Result<(), Error> {
        let slot = self.store.get_mut(index).ok_or(Error::NotFound)?;
        if slot.big_pending || slot.big_handle.is_some() {
            return Err(Error::AlreadySyncing);
        }
        let (pa_sync, info) = match (slot.pa_handle, slot.biginfo) {
            (Some(handle), Some(info)) if slot.pa_pending == PaPending::Idle => (handle, info),
            _ => return Err(Error::NotFound),
        };

        let code = if info.encrypted {
            match slot.code {
                Some(code) => {
                    slot.state.encrypt_state = EncryptState::Decrypting;
                    Some(code)
                }
                None => {
                    slot.state.encrypt_state = EncryptState::BroadcastCodeRequired;
                    return Ok(());
                }
            }
        } else {
            slot.state.encrypt_state = EncryptState::NotEncrypted;
            None
        };

        let bis = select_bis(&slot.requested, info.num_bis);
        if bis.is_empty() {
            return Ok(());
        }

        let params = BigSyncParams { pa_sync, bis, code };
        match self.engine.big_sync(&params) {
            Ok(handle) => {
                slot.big_handle = Some(handle);
                slot.big_pending = true;
                slot.bis = bis;
                debug!("source {}: syncing to {:?}", slot.state.source_id, bis);
                Ok(())
            }
            Err(e) => {
                report_bis_failed(slot);
                Err(e)
            }
        }
    }

    /// Publishes slot `index` if it changed.
    fn commit(&mut self, index: usize, accepted_write: bool) {
        match self.store.commit(index, accepted_write) {
            Ok(true) => {
                let handle = self.layout.receive_state(index);
                let value = self.store.value(index);
                trace!("notify {:?}: {:?}", handle, HexSlice(&value[..]));
                self.notifier.notify(handle, &value);
            }
            Ok(false) => {}
            Err(e) => error!("could not encode receive state {}: {}", index, e),
        }
    }
}

/// Reports the synced BIS of an established BIG in the subgroups that requested them.
///
/// Each BIS is reported in the first subgroup asking for it.
fn report_bis(slot: &mut Slot) {
    let mut left = if slot.big_handle.is_some() && !slot.big_pending {
        slot.bis
    } else {
        BisSync::NONE
    };
    for (subgroup, requested) in slot.state.subgroups.iter_mut().zip(&slot.requested) {
        let share = sync::synced_for_subgroup(*requested, left);
        subgroup.bis_sync = share;
        left = BisSync::from_raw(left.as_u32() & !share.as_u32());
    }
}

/// Reports a failed BIG sync in every subgroup that requested a BIS.
fn report_bis_failed(slot: &mut Slot) {
    for (subgroup, requested) in slot.state.subgroups.iter_mut().zip(&slot.requested) {
        subgroup.bis_sync = if requested.is_empty() {
            BisSync::NONE
        } else {
            BisSync::FAILED
        };
    }
}
