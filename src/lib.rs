//! Broadcast Audio Scan Service (BASS) for LE Audio.
//!
//! BASS lets a *Broadcast Assistant* (a phone, say) help a *Scan Delegator* (a hearing aid with a
//! single low-power radio) find, synchronize to and decrypt a broadcast audio stream it could not
//! discover on its own.
//!
//! # Using the crate
//!
//! This crate is runtime and hardware-agnostic. It does not own a radio
//! or an ATT bearer. Instead, it is driven by events and calls out to collaborators you provide:
//!
//! * The [`delegator`] implements the server side. It needs a [`SyncEngine`] that can create
//!   periodic advertising (PA) and BIG syncs, a one-shot [`Timer`] for the PA sync wait, and a
//!   [`Notifier`] that sends ATT notifications to subscribed peers.
//! * The [`assistant`] implements the client side on top of a [`GattClient`], reporting results
//!   through [`AssistantCallbacks`].
//! * The [`observer`] filters advertising reports for broadcast sources.
//!
//! Everything happens synchronously inside the method that delivered an event. Waiting for a peer
//! or the radio is represented as pending state, never as a blocking call.
//!
//! [`delegator`]: delegator/index.html
//! [`assistant`]: assistant/index.html
//! [`observer`]: observer/index.html
//! [`SyncEngine`]: delegator/trait.SyncEngine.html
//! [`Timer`]: time/trait.Timer.html
//! [`Notifier`]: delegator/trait.Notifier.html
//! [`GattClient`]: assistant/trait.GattClient.html
//! [`AssistantCallbacks`]: assistant/trait.AssistantCallbacks.html

// We're `#[no_std]`, except when we're testing
#![cfg_attr(not(test), no_std)]
// Deny a few warnings in doctests, since rustdoc `allow`s many warnings by default
#![doc(test(attr(deny(unused_imports, unused_must_use))))]
#![warn(rust_2018_idioms)]
// The claims of this lint are dubious, disable it
#![allow(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
mod log;
#[macro_use]
mod utils;
pub mod ad_structure;
pub mod address;
pub mod assistant;
pub mod att;
pub mod bytes;
pub mod codec;
pub mod config;
pub mod delegator;
mod error;
pub mod gatt;
pub mod observer;
pub mod time;
pub mod uuid;

#[cfg(test)]
mod test_utils;

pub use self::error::Error;

/// Identifies an ACL connection to a peer.
///
/// Handed out by the host stack; this crate only compares them.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

impl core::fmt::Debug for ConnHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}
