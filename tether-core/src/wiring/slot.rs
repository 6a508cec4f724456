//! Slot Implementation
//!
//! A slot is the receiving side of the wiring: a piece of state plus the
//! bookkeeping that keeps every signal pointing at it honest about its
//! lifetime.
//!
//! # How Slots Work
//!
//! 1. `Signal::connect` stores a weak handle to the slot inside the signal
//!    and records the signal in the slot's sender set.
//!
//! 2. When the last handle to a slot is dropped, the slot walks its sender
//!    set and asks each still-live signal to drop every connection to it.
//!    Signals that died first fail the weak upgrade and are skipped.
//!
//! 3. [`Slot::clone_with_rewire`] duplicates the slot's state *and* its
//!    incoming connections: every signal wired to the source gains an
//!    identical connection to the copy. Plain [`Clone`] only produces
//!    another handle to the same slot.
//!
//! # Thread Safety
//!
//! The state and the sender set are protected by separate locks, and
//! neither lock is held across a call into a signal, so a signal and a
//! slot never wait on each other.

use std::fmt::Debug;
use std::sync::{Arc, RwLock, RwLockWriteGuard, Weak};

use indexmap::IndexMap;
use tracing::trace;

use super::id::{SignalId, SlotId};
use super::link::{Anchor, ErasedSlot, SenderLink};

/// Shared core behind one or more [`Slot`] handles.
pub(crate) struct SlotCore<R> {
    /// Unique identifier for this slot.
    id: SlotId,

    /// The receiver's own data, handed to callbacks as `&mut R`.
    state: RwLock<R>,

    /// Signals currently holding at least one connection to this slot, in
    /// the order they first connected. Non-owning: entries are weak and
    /// keyed by signal identity, so registering a sender twice keeps a
    /// single entry.
    senders: RwLock<IndexMap<SignalId, Weak<dyn SenderLink>>>,
}

impl<R> SlotCore<R> {
    pub(crate) fn id(&self) -> SlotId {
        self.id
    }

    /// Lock the state for a callback invocation.
    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, R> {
        self.state.write().expect("slot state lock poisoned")
    }

    /// Copy the sender set out so callers can reach senders without
    /// holding the set's lock.
    fn senders_snapshot(&self) -> Vec<(SignalId, Weak<dyn SenderLink>)> {
        self.senders
            .read()
            .expect("sender set lock poisoned")
            .iter()
            .map(|(id, link)| (*id, link.clone()))
            .collect()
    }

    /// Drain the sender set and tell each live sender to drop its
    /// connections to this slot.
    fn notify_senders_of_teardown(&self) {
        let drained: Vec<Weak<dyn SenderLink>> = self
            .senders
            .write()
            .expect("sender set lock poisoned")
            .drain(..)
            .map(|(_, link)| link)
            .collect();

        for link in drained {
            if let Some(sender) = link.upgrade() {
                sender.drop_connections_to(self.id);
            }
        }
    }
}

impl<R: Send + Sync + 'static> Anchor for SlotCore<R> {
    fn register_sender(&self, id: SignalId, link: Weak<dyn SenderLink>) {
        self.senders
            .write()
            .expect("sender set lock poisoned")
            .entry(id)
            .or_insert(link);
    }

    fn unregister_sender(&self, id: SignalId) {
        self.senders
            .write()
            .expect("sender set lock poisoned")
            .shift_remove(&id);
    }
}

impl<R> Drop for SlotCore<R> {
    fn drop(&mut self) {
        // Last handle is gone. Eagerly clear every connection that still
        // points here so no signal is left aiming at a dead slot.
        trace!(slot = self.id.raw(), "slot dropped, unwiring senders");
        self.notify_senders_of_teardown();
    }
}

/// A shared receiver that signals can be wired to.
///
/// # Type Parameters
///
/// - `R`: The receiver state. Callbacks registered through
///   `Signal::connect` receive it as `&mut R`.
///
/// # Example
///
/// ```rust,ignore
/// let counter = Slot::new(0u32);
///
/// let clicks: Signal<u32> = Signal::new();
/// clicks.connect(&counter, |count, step| *count += *step);
///
/// clicks.emit(&2);
/// assert_eq!(counter.get(), 2);
/// ```
pub struct Slot<R>
where
    R: Send + Sync + 'static,
{
    core: Arc<SlotCore<R>>,
}

impl<R> Slot<R>
where
    R: Send + Sync + 'static,
{
    /// Create a new slot holding the given state, wired to nothing.
    pub fn new(state: R) -> Self {
        Self {
            core: Arc::new(SlotCore {
                id: SlotId::new(),
                state: RwLock::new(state),
                senders: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Get the slot's unique ID.
    pub fn id(&self) -> SlotId {
        self.core.id
    }

    /// Get a clone of the current state.
    pub fn get(&self) -> R
    where
        R: Clone,
    {
        self.core
            .state
            .read()
            .expect("slot state lock poisoned")
            .clone()
    }

    /// Access the state by reference without cloning.
    pub fn with<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.core.state.read().expect("slot state lock poisoned"))
    }

    /// Mutate the state in place.
    pub fn with_mut<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut self.core.state.write().expect("slot state lock poisoned"))
    }

    /// Number of signals currently holding at least one connection to
    /// this slot.
    pub fn sender_count(&self) -> usize {
        self.core
            .senders
            .read()
            .expect("sender set lock poisoned")
            .len()
    }

    /// Sever every incoming connection.
    ///
    /// Each sender is asked to drop all of its connections to this slot,
    /// then the sender set is cleared. Idempotent; also runs automatically
    /// when the last handle to the slot is dropped.
    pub fn disconnect_all(&self) {
        self.core.notify_senders_of_teardown();
    }

    /// Duplicate this slot together with its incoming connections.
    ///
    /// The copy starts with a clone of the state and ends up connected to
    /// every signal the source is connected to, with identical callbacks.
    /// The source's own connections are untouched; afterward both slots
    /// receive independently. Senders that have already been dropped are
    /// skipped.
    pub fn clone_with_rewire(&self) -> Self
    where
        R: Clone,
    {
        let copy = Slot::new(self.get());
        let erased = ErasedSlot {
            id: copy.core.id,
            core: copy.core.clone() as Arc<dyn std::any::Any + Send + Sync>,
        };

        for (sender_id, link) in self.core.senders_snapshot() {
            let Some(sender) = link.upgrade() else { continue };
            sender.duplicate_connections(self.core.id, &erased);
            copy.core.register_sender(sender_id, link);
        }

        trace!(
            source = self.core.id.raw(),
            copy = copy.core.id.raw(),
            senders = copy.sender_count(),
            "slot rewired onto copy"
        );
        copy
    }

    pub(crate) fn core(&self) -> &Arc<SlotCore<R>> {
        &self.core
    }
}

impl<R> Clone for Slot<R>
where
    R: Send + Sync + 'static,
{
    /// Produce another handle to the **same** slot. Both handles share
    /// state and connections; no rewiring happens. Use
    /// [`Slot::clone_with_rewire`] to duplicate the slot itself.
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<R> Debug for Slot<R>
where
    R: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.core.id)
            .field("state", &*self.core.state.read().expect("slot state lock poisoned"))
            .field("sender_count", &self.sender_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
