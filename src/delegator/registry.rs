//! Per-connection bookkeeping of the assistants talking to a delegator.

use crate::{config::MAX_CONNECTIONS, ConnHandle, Error};

#[derive(Debug, Copy, Clone)]
struct Entry {
    conn: ConnHandle,
    /// The peer reported it is scanning on our behalf.
    scanning: bool,
    /// The peer can send PA sync transfers.
    past_capable: bool,
}

/// Fixed pool of connected assistants.
///
/// This is informational only. Remote scan state never affects a Receive State.
pub struct AssistantRegistry {
    entries: [Option<Entry>; MAX_CONNECTIONS],
}

impl AssistantRegistry {
    pub fn new() -> Self {
        Self {
            entries: [None; MAX_CONNECTIONS],
        }
    }

    fn entry_mut(&mut self, conn: ConnHandle) -> Option<&mut Entry> {
        self.entries
            .iter_mut()
            .filter_map(Option::as_mut)
            .find(|e| e.conn == conn)
    }

    fn entry(&self, conn: ConnHandle) -> Option<&Entry> {
        self.entries
            .iter()
            .filter_map(Option::as_ref)
            .find(|e| e.conn == conn)
    }

    /// Registers a new connection.
    ///
    /// Registering a known connection again resets its entry.
    pub fn connect(&mut self, conn: ConnHandle, past_capable: bool) -> Result<(), Error> {
        let entry = Entry {
            conn,
            scanning: false,
            past_capable,
        };
        if let Some(existing) = self.entry_mut(conn) {
            *existing = entry;
            return Ok(());
        }

        let free = self
            .entries
            .iter_mut()
            .find(|e| e.is_none())
            .ok_or(Error::InsufficientResources)?;
        *free = Some(entry);
        Ok(())
    }

    /// Forgets a connection. Returns whether it was known.
    pub fn disconnect(&mut self, conn: ConnHandle) -> bool {
        for slot in self.entries.iter_mut() {
            if slot.map_or(false, |e| e.conn == conn) {
                *slot = None;
                return true;
            }
        }
        false
    }

    /// Records a Remote Scan Started/Stopped from `conn`.
    pub fn set_scanning(&mut self, conn: ConnHandle, scanning: bool) -> Result<(), Error> {
        let entry = self.entry_mut(conn).ok_or(Error::NotConnected)?;
        entry.scanning = scanning;
        Ok(())
    }

    pub fn is_scanning(&self, conn: ConnHandle) -> bool {
        self.entry(conn).map_or(false, |e| e.scanning)
    }

    /// Returns whether any connected assistant is scanning on our behalf.
    pub fn any_scanning(&self) -> bool {
        self.entries.iter().flatten().any(|e| e.scanning)
    }

    /// Returns whether `conn` is known and can transfer PA syncs.
    pub fn past_capable(&self, conn: ConnHandle) -> bool {
        self.entry(conn).map_or(false, |e| e.past_capable)
    }
}

impl Default for AssistantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanning_is_per_connection() {
        let mut registry = AssistantRegistry::new();
        registry.connect(ConnHandle(1), true).unwrap();
        registry.connect(ConnHandle(2), false).unwrap();
        assert!(!registry.any_scanning());

        registry.set_scanning(ConnHandle(1), true).unwrap();
        assert!(registry.is_scanning(ConnHandle(1)));
        assert!(!registry.is_scanning(ConnHandle(2)));
        assert!(registry.any_scanning());

        assert!(registry.disconnect(ConnHandle(1)));
        assert!(!registry.any_scanning());
        assert!(!registry.disconnect(ConnHandle(1)));
    }

    #[test]
    fn past_capability() {
        let mut registry = AssistantRegistry::new();
        registry.connect(ConnHandle(1), true).unwrap();
        assert!(registry.past_capable(ConnHandle(1)));
        assert!(!registry.past_capable(ConnHandle(9)));

        // Reconnecting resets the entry.
        registry.set_scanning(ConnHandle(1), true).unwrap();
        registry.connect(ConnHandle(1), false).unwrap();
        assert!(!registry.past_capable(ConnHandle(1)));
        assert!(!registry.is_scanning(ConnHandle(1)));
    }

    #[test]
    fn pool_is_bounded() {
        let mut registry = AssistantRegistry::new();
        for i in 0..MAX_CONNECTIONS as u16 {
            registry.connect(ConnHandle(i), false).unwrap();
        }
        assert_eq!(
            registry.connect(ConnHandle(100), false),
            Err(Error::InsufficientResources)
        );
        assert_eq!(
            registry.set_scanning(ConnHandle(100), true),
            Err(Error::NotConnected)
        );
    }
}
