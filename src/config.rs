//! Static limits and configuration for the delegator and the assistant.

use crate::{
    delegator::{Notifier, SyncEngine},
    time::{Duration, Timer},
};

/// Number of Receive State characteristics exposed by a delegator (and mirrored by an assistant).
pub const MAX_RECEIVE_STATES: usize = 3;

/// Maximum number of subgroups in one Receive State.
pub const MAX_SUBGROUPS: usize = 4;

/// Maximum metadata length of one subgroup.
pub const MAX_METADATA_LEN: usize = 32;

/// Number of simultaneously connected peers tracked on either side.
pub const MAX_CONNECTIONS: usize = 4;

/// Largest encoded Receive State record: fixed part, bad code, and `MAX_SUBGROUPS` full subgroups.
pub const MAX_RECEIVE_STATE_LEN: usize = 15 + 16 + MAX_SUBGROUPS * (4 + 1 + MAX_METADATA_LEN);

/// Largest Receive State attribute value, including the trailing change counter.
pub const MAX_RECEIVE_STATE_VALUE_LEN: usize = MAX_RECEIVE_STATE_LEN + 1;

/// Largest Control Point write (a full Add-Source), including a change counter.
pub const MAX_CONTROL_POINT_LEN: usize = 16 + MAX_SUBGROUPS * (4 + 1 + MAX_METADATA_LEN) + 1;

/// Trait for delegator configurations.
///
/// Bundles the collaborators a `ScanDelegator` drives. Every application defines a type
/// implementing this and supplies it to the delegator.
pub trait Config {
    /// The PA and BIG synchronization engine (usually the controller via HCI).
    type SyncEngine: SyncEngine;

    /// One-shot timers for the PA sync wait.
    type Timer: Timer;

    /// Sends Receive State notifications to subscribed peers.
    type Notifier: Notifier;
}

/// What happens to a Receive State when the assistant that added it disconnects.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Keep the source. Synchronization state belongs to the broadcast source, and other assistants
    /// may still be managing it.
    Persist,

    /// Remove every source added by the disconnected peer, tearing down its syncs.
    RemoveOnDisconnect,
}

/// Runtime settings of a `ScanDelegator`.
#[derive(Debug, Copy, Clone)]
pub struct DelegatorConfig {
    /// Whether the local controller can receive PA sync transfers (PAST).
    pub past_supported: bool,

    /// Whether Receive State values carry, and source-targeted Control Point writes must match, a
    /// trailing change counter.
    pub change_counter: bool,

    /// Behaviour on disconnection of the assistant that added a source.
    pub removal_policy: RemovalPolicy,

    /// How long to wait for a PA sync transfer after entering `SyncInfoRequest`.
    pub past_wait: Duration,
}

impl Default for DelegatorConfig {
    fn default() -> Self {
        Self {
            past_supported: true,
            change_counter: false,
            removal_policy: RemovalPolicy::Persist,
            past_wait: Duration::from_secs(10),
        }
    }
}

/// Runtime settings of a `BroadcastAssistant`.
#[derive(Debug, Copy, Clone)]
pub struct AssistantConfig {
    /// Whether the peer's Receive State values and Control Point writes carry a change counter.
    pub change_counter: bool,

    /// Negotiated ATT MTU. Notifications of `att_mtu - 3` bytes may be truncated.
    pub att_mtu: u16,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            change_counter: false,
            att_mtu: 23,
        }
    }
}
