//! Parameters handed to the synchronization engine.

use crate::codec::{BisSync, PA_INTERVAL_UNKNOWN};

/// Number of PA events to skip when synchronized.
pub const PA_SYNC_SKIP: u16 = 0;

/// Number of PA intervals to wait for a sync before giving up.
const PA_SYNC_RETRY_COUNT: u32 = 6;

/// Shortest allowed sync timeout, in 10 ms units.
pub const MIN_SYNC_TIMEOUT: u16 = 0x000A;

/// Longest allowed sync timeout, in 10 ms units.
pub const MAX_SYNC_TIMEOUT: u16 = 0x4000;

/// Computes the PA sync timeout (10 ms units) for a PA interval (1.25 ms units).
///
/// An unknown interval gets the longest timeout, since a too-short timeout would make the sync fail
/// for a slow advertiser.
pub fn sync_timeout(pa_interval: u16) -> u16 {
    if pa_interval == PA_INTERVAL_UNKNOWN {
        return MAX_SYNC_TIMEOUT;
    }

    let interval_ms = u32::from(pa_interval) * 5 / 4;
    let timeout = interval_ms * PA_SYNC_RETRY_COUNT / 10;
    if timeout < u32::from(MIN_SYNC_TIMEOUT) {
        MIN_SYNC_TIMEOUT
    } else if timeout > u32::from(MAX_SYNC_TIMEOUT) {
        MAX_SYNC_TIMEOUT
    } else {
        timeout as u16
    }
}

/// Picks the BIS to synchronize to.
///
/// The requests of all subgroups are combined. A no-preference request stands for every BIS the
/// BIG has (`num_bis`), other requests are limited to those. Only one BIS is synchronized: the
/// lowest one left. Returns `BisSync::NONE` if nothing is requested or nothing is possible.
// TODO: synchronize to every selected BIS once the engine supports more than one per BIG.
pub fn select_bis(requested: &[BisSync], num_bis: u8) -> BisSync {
    let union = requested.iter().fold(0, |acc, bis| acc | bis.as_u32());
    if union == 0 {
        return BisSync::NONE;
    }

    let present = if num_bis >= 31 {
        0x7FFF_FFFF
    } else {
        (1u32 << num_bis) - 1
    };
    let mask = if union == BisSync::NO_PREFERENCE.as_u32() {
        present
    } else {
        union & present
    };

    BisSync::from_raw(mask & mask.wrapping_neg())
}

/// Returns the bits of `synced` that belong to a subgroup's request.
pub fn synced_for_subgroup(requested: BisSync, synced: BisSync) -> BisSync {
    BisSync::from_raw(requested.as_u32() & synced.as_u32())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts() {
        assert_eq!(sync_timeout(PA_INTERVAL_UNKNOWN), MAX_SYNC_TIMEOUT);
        // 100 ms interval: 6 * 100 ms = 60 ticks.
        assert_eq!(sync_timeout(80), 60);
        assert_eq!(sync_timeout(0x0006), MIN_SYNC_TIMEOUT);
        assert_eq!(sync_timeout(0xFFFE), MAX_SYNC_TIMEOUT);
    }

    #[test]
    fn no_preference_picks_first_bis() {
        assert_eq!(
            select_bis(&[BisSync::NO_PREFERENCE], 2),
            BisSync::from_raw(0b01)
        );
    }

    #[test]
    fn request_masked_by_big() {
        let requested = [BisSync::from_raw(0b1100), BisSync::from_raw(0b0010)];
        assert_eq!(select_bis(&requested, 4), BisSync::from_raw(0b0010));
        assert_eq!(select_bis(&requested, 1), BisSync::NONE);
        assert_eq!(
            select_bis(&[BisSync::from_raw(0b1000)], 4),
            BisSync::from_raw(0b1000)
        );
    }

    #[test]
    fn nothing_requested() {
        assert_eq!(select_bis(&[], 4), BisSync::NONE);
        assert_eq!(select_bis(&[BisSync::NONE, BisSync::NONE], 4), BisSync::NONE);
    }

    #[test]
    fn subgroup_share() {
        let synced = BisSync::from_raw(0b01);
        assert_eq!(
            synced_for_subgroup(BisSync::NO_PREFERENCE, synced),
            BisSync::from_raw(0b01)
        );
        assert_eq!(
            synced_for_subgroup(BisSync::from_raw(0b10), synced),
            BisSync::NONE
        );
    }
}
