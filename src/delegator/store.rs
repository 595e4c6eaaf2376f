//! The pool of Receive State slots.

use super::{BigHandle, BigInfo, SyncHandle};
use crate::{
    bytes::to_vec,
    codec::{BisSync, BroadcastCode, PaSync, ReceiveState, SourceId, Subgroups},
    config::{MAX_RECEIVE_STATES, MAX_RECEIVE_STATE_LEN, MAX_RECEIVE_STATE_VALUE_LEN, MAX_SUBGROUPS},
    ConnHandle, Error,
};
use heapless::Vec;

/// How a pending PA sync is being established.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaPending {
    /// No PA sync establishment in progress.
    Idle,
    /// Scanning for the PA ourselves (`create_sync`).
    Direct,
    /// Waiting for an assistant to transfer its PA sync.
    Transfer(ConnHandle),
}

/// One occupied Receive State slot: the visible record and the synchronization state behind it.
#[derive(Debug)]
pub struct Slot {
    /// The record exposed to clients.
    pub state: ReceiveState,
    /// What each subgroup asked for. Parallel to `state.subgroups`.
    pub requested: Vec<BisSync, MAX_SUBGROUPS>,
    pub pa_sync: PaSync,
    pub pa_interval: u16,
    pub pa_handle: Option<SyncHandle>,
    pub pa_pending: PaPending,
    pub big_handle: Option<BigHandle>,
    pub big_pending: bool,
    /// The BIS asked of the engine for the current BIG sync.
    pub bis: BisSync,
    pub code: Option<BroadcastCode>,
    pub biginfo: Option<BigInfo>,
    /// The connection that added the source, if it came over the air.
    pub initiator: Option<ConnHandle>,
}

impl Slot {
    pub fn new(state: ReceiveState, pa_sync: PaSync, pa_interval: u16) -> Self {
        let requested = state.subgroups.iter().map(|sg| sg.bis_sync).collect();
        let mut slot = Self {
            state,
            requested,
            pa_sync,
            pa_interval,
            pa_handle: None,
            pa_pending: PaPending::Idle,
            big_handle: None,
            big_pending: false,
            bis: BisSync::NONE,
            code: None,
            biginfo: None,
            initiator: None,
        };
        slot.clear_bis_sync();
        slot
    }

    /// Replaces the subgroups with requested ones, marking none of them synchronized.
    pub fn set_subgroups(&mut self, subgroups: Subgroups) {
        self.requested = subgroups.iter().map(|sg| sg.bis_sync).collect();
        self.state.subgroups = subgroups;
        self.clear_bis_sync();
    }

    /// Marks every subgroup as not synchronized to any BIS.
    pub fn clear_bis_sync(&mut self) {
        for subgroup in self.state.subgroups.iter_mut() {
            subgroup.bis_sync = BisSync::NONE;
        }
    }
}

/// Fixed-size arena of Receive State slots.
///
/// Slot indices double as Receive State characteristic indices. Each index also keeps its change
/// counter and the last encoded record, which survive the slot being emptied.
pub struct ReceiveStateStore {
    slots: [Option<Slot>; MAX_RECEIVE_STATES],
    records: [Vec<u8, MAX_RECEIVE_STATE_LEN>; MAX_RECEIVE_STATES],
    counters: [u8; MAX_RECEIVE_STATES],
    last_source_id: SourceId,
    change_counter: bool,
}

impl ReceiveStateStore {
    pub fn new(change_counter: bool) -> Self {
        Self {
            slots: Default::default(),
            records: Default::default(),
            counters: [0; MAX_RECEIVE_STATES],
            last_source_id: 0,
            change_counter,
        }
    }

    /// Returns the index of a free slot.
    pub fn free_index(&self) -> Result<usize, Error> {
        self.slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::ResourceExhausted)
    }

    /// Picks the next source ID, round-robin over `1..=255`, skipping IDs in use.
    pub fn next_source_id(&mut self) -> SourceId {
        loop {
            let id = match self.last_source_id.wrapping_add(1) {
                0 => 1,
                id => id,
            };
            self.last_source_id = id;
            if self.index_of(id).is_none() {
                return id;
            }
        }
    }

    /// Puts `slot` into the free index `index`. Call `commit` afterwards.
    pub fn insert(&mut self, index: usize, slot: Slot) {
        debug_assert!(self.slots[index].is_none());
        self.slots[index] = Some(slot);
    }

    /// Empties slot `index`, returning what it held. Call `commit` afterwards.
    pub fn take(&mut self, index: usize) -> Option<Slot> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Iterates over the indices of occupied slots.
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_RECEIVE_STATES).filter(move |&i| self.slots[i].is_some())
    }

    fn find(&self, mut pred: impl FnMut(&Slot) -> bool) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(false, |s| pred(s)))
    }

    pub fn index_of(&self, source_id: SourceId) -> Option<usize> {
        self.find(|s| s.state.source_id == source_id)
    }

    pub fn by_pa_handle(&self, handle: SyncHandle) -> Option<usize> {
        self.find(|s| s.pa_handle == Some(handle))
    }

    pub fn by_big_handle(&self, handle: BigHandle) -> Option<usize> {
        self.find(|s| s.big_handle == Some(handle))
    }

    /// Finds the slot waiting for a PA sync transfer of the given advertising set.
    pub fn awaiting_transfer(
        &self,
        address: &crate::address::DeviceAddress,
        adv_sid: u8,
    ) -> Option<usize> {
        self.find(|s| {
            matches!(s.pa_pending, PaPending::Transfer(_))
                && s.state.source.address == *address
                && s.state.source.adv_sid == adv_sid
        })
    }

    /// Returns the change counter of slot `index`.
    pub fn counter(&self, index: usize) -> u8 {
        self.counters[index]
    }

    /// Re-encodes slot `index` and compares it with the last published record.
    ///
    /// If the record changed, or `accepted_write` is set, the change counter advances. Returns
    /// whether the record changed, in which case the caller must notify.
    pub fn commit(&mut self, index: usize, accepted_write: bool) -> Result<bool, Error> {
        let record: Vec<u8, MAX_RECEIVE_STATE_LEN> = match &self.slots[index] {
            Some(slot) => to_vec(&slot.state)?,
            None => Vec::new(),
        };
        let changed = record != self.records[index];
        if changed || accepted_write {
            self.counters[index] = self.counters[index].wrapping_add(1);
        }
        if changed {
            self.records[index] = record;
        }
        Ok(changed)
    }

    /// Returns the attribute value of slot `index`: the record plus, if enabled, the change
    /// counter.
    ///
    /// Empty slots have an empty value.
    pub fn value(&self, index: usize) -> Vec<u8, MAX_RECEIVE_STATE_VALUE_LEN> {
        let record = &self.records[index];
        let mut value = Vec::new();
        // Capacity is the record's plus one, so neither push can fail.
        let _ = value.extend_from_slice(record);
        if self.change_counter && !record.is_empty() {
            let _ = value.push(self.counters[index]);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressKind, DeviceAddress};
    use crate::codec::{BroadcastId, BroadcastSource, EncryptState, PaSyncState, Subgroup};

    fn slot(source_id: SourceId) -> Slot {
        let mut subgroups = crate::codec::Subgroups::new();
        subgroups
            .push(Subgroup::new(BisSync::NO_PREFERENCE))
            .unwrap();
        Slot::new(
            ReceiveState {
                source_id,
                source: BroadcastSource {
                    address: DeviceAddress::new([1; 6], AddressKind::Public),
                    adv_sid: 0,
                    broadcast_id: BroadcastId::new(1).unwrap(),
                },
                pa_sync_state: PaSyncState::NotSynced,
                encrypt_state: EncryptState::NotEncrypted,
                subgroups,
            },
            PaSync::SyncPastNotAvailable,
            0x40,
        )
    }

    #[test]
    fn requested_is_split_from_reported() {
        let slot = slot(1);
        assert_eq!(slot.requested[0], BisSync::NO_PREFERENCE);
        assert_eq!(slot.state.subgroups[0].bis_sync, BisSync::NONE);
    }

    #[test]
    fn source_ids_round_robin() {
        let mut store = ReceiveStateStore::new(false);
        assert_eq!(store.next_source_id(), 1);
        store.insert(0, slot(1));
        assert_eq!(store.next_source_id(), 2);

        store.last_source_id = 254;
        assert_eq!(store.next_source_id(), 255);
        // Wraps past the reserved 0 and skips 1, which is in use.
        assert_eq!(store.next_source_id(), 2);
    }

    #[test]
    fn full_store() {
        let mut store = ReceiveStateStore::new(false);
        for i in 0..MAX_RECEIVE_STATES {
            let index = store.free_index().unwrap();
            assert_eq!(index, i);
            store.insert(index, slot(i as u8 + 1));
        }
        assert_eq!(store.free_index(), Err(Error::ResourceExhausted));
        assert_eq!(store.index_of(2), Some(1));

        store.take(1);
        assert_eq!(store.free_index(), Ok(1));
        assert_eq!(store.occupied().collect::<std::vec::Vec<_>>(), [0, 2]);
    }

    #[test]
    fn commit_detects_changes() {
        let mut store = ReceiveStateStore::new(true);
        assert!(store.value(0).is_empty());

        store.insert(0, slot(1));
        assert_eq!(store.commit(0, false), Ok(true));
        assert_eq!(store.counter(0), 1);
        assert_eq!(store.value(0).last(), Some(&1));

        // Same contents: nothing to publish.
        assert_eq!(store.commit(0, false), Ok(false));
        assert_eq!(store.counter(0), 1);

        // An accepted write advances the counter even without a change.
        assert_eq!(store.commit(0, true), Ok(false));
        assert_eq!(store.counter(0), 2);

        store.get_mut(0).unwrap().state.pa_sync_state = PaSyncState::Synced;
        assert_eq!(store.commit(0, true), Ok(true));
        assert_eq!(store.counter(0), 3);

        store.take(0);
        assert_eq!(store.commit(0, true), Ok(true));
        assert!(store.value(0).is_empty());
    }
}
