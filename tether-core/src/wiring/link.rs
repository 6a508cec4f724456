//! Type-erased capabilities connecting the two sides of the wiring.
//!
//! A slot does not know the argument types of the signals pointing at it,
//! and a signal does not know the state types of every slot it will ever
//! meet. Both directions of the protocol therefore go through object-safe
//! traits:
//!
//! - [`SenderLink`] is the view of a signal from a slot's sender set. Its
//!   two operations mirror the two moments a slot must reach back into its
//!   senders: when the slot is torn down and when it is duplicated.
//!
//! - [`Anchor`] is the view of a slot's sender bookkeeping from a
//!   connection, used by a signal to keep the slot's records consistent
//!   with its own.

use std::any::Any;
use std::sync::{Arc, Weak};

use super::id::{SignalId, SlotId};

/// What a slot can ask of a signal that holds connections to it.
pub(crate) trait SenderLink: Send + Sync {
    /// Remove every connection targeting `slot`.
    ///
    /// Exhaustive and idempotent. Must not call back into the slot: the
    /// slot is the caller and maintains its own sender set.
    fn drop_connections_to(&self, slot: SlotId);

    /// For every connection targeting `source`, append an identical
    /// connection targeting `copy`. Originals are untouched.
    fn duplicate_connections(&self, source: SlotId, copy: &ErasedSlot);
}

/// What a connection can ask of its target's sender bookkeeping.
pub(crate) trait Anchor: Send + Sync {
    /// Record `link` as a sender. Idempotent per signal: registering the
    /// same signal twice keeps a single entry in its original position.
    fn register_sender(&self, id: SignalId, link: Weak<dyn SenderLink>);

    /// Forget a sender. No-op when absent.
    fn unregister_sender(&self, id: SignalId);
}

/// A slot core stripped of its state type so it can travel through
/// [`SenderLink::duplicate_connections`].
///
/// The receiving connection downcasts `core` back to the concrete slot core
/// type it was built for; a mismatch means the caller tried to retarget
/// across slot types and the request is dropped.
pub(crate) struct ErasedSlot {
    pub(crate) id: SlotId,
    pub(crate) core: Arc<dyn Any + Send + Sync>,
}
