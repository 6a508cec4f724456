//! Signal Implementation
//!
//! A Signal is the emitting side of the wiring: it owns an ordered list of
//! connections for one fixed argument type and dispatches to every
//! connected slot synchronously, in connection order.
//!
//! # How Signals Work
//!
//! 1. `connect` appends a connection bound to a slot and records the signal
//!    in the slot's sender set. Appending preserves existing order, so new
//!    connections fire last.
//!
//! 2. `emit` prunes connections whose slot is gone, snapshots the list,
//!    releases the lock, and invokes each callback with a borrowed
//!    argument.
//!
//! 3. When the last handle to a signal is dropped, every still-live target
//!    is told to forget it before the connections are released.
//!
//! # Re-entrancy
//!
//! `emit` iterates a snapshot, so callbacks may freely connect and
//! disconnect on the signal that invoked them; changes take effect on the
//! next emission. A callback that re-enters the *same slot's state* — for
//! example by emitting a signal wired back to its own slot — deadlocks on
//! the state lock and is a contract violation.
//!
//! # Thread Safety
//!
//! The connection list is behind an RwLock that is never held across a
//! callback or a call into a slot, so a signal and a slot never wait on
//! each other.

use std::fmt::Debug;
use std::sync::{Arc, RwLock, Weak};

use smallvec::SmallVec;
use tracing::trace;

use super::connection::{Connection, MethodConnection};
use super::id::{SignalId, SlotId};
use super::link::{Anchor, ErasedSlot, SenderLink};
use super::slot::Slot;

/// Owned connection sequence. Fanout is typically tiny, so the first couple
/// of connections live inline.
type ConnectionList<A> = SmallVec<[Arc<dyn Connection<A>>; 2]>;

/// Shared core behind one or more [`Signal`] handles.
pub(crate) struct SignalCore<A>
where
    A: Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: SignalId,

    /// Connections in insertion order. Insertion order is emission order.
    connections: RwLock<ConnectionList<A>>,
}

impl<A> SignalCore<A>
where
    A: Send + Sync + 'static,
{
    fn lock_connections(&self) -> std::sync::RwLockWriteGuard<'_, ConnectionList<A>> {
        self.connections.write().expect("connection list lock poisoned")
    }
}

impl<A> SenderLink for SignalCore<A>
where
    A: Send + Sync + 'static,
{
    fn drop_connections_to(&self, slot: SlotId) {
        // Removed connections must outlive the lock scope: a connection's
        // callback may own the last handle to some other slot, and that
        // slot's teardown re-enters connection lists.
        let removed: Vec<Arc<dyn Connection<A>>> = {
            let mut connections = self.lock_connections();
            let mut kept = ConnectionList::new();
            let mut removed = Vec::new();
            for conn in connections.drain(..) {
                if conn.target() == slot {
                    removed.push(conn);
                } else {
                    kept.push(conn);
                }
            }
            *connections = kept;
            removed
        };
        if !removed.is_empty() {
            trace!(
                signal = self.id.raw(),
                slot = slot.raw(),
                removed = removed.len(),
                "dropped connections to slot"
            );
        }
    }

    fn duplicate_connections(&self, source: SlotId, copy: &ErasedSlot) {
        let mut connections = self.lock_connections();
        let duplicated: Vec<Arc<dyn Connection<A>>> = connections
            .iter()
            .filter(|conn| conn.target() == source)
            .filter_map(|conn| conn.retarget(copy))
            .collect();
        if !duplicated.is_empty() {
            trace!(
                signal = self.id.raw(),
                source = source.raw(),
                copy = copy.id.raw(),
                added = duplicated.len(),
                "duplicated connections onto slot copy"
            );
        }
        connections.extend(duplicated);
    }
}

impl<A> Drop for SignalCore<A>
where
    A: Send + Sync + 'static,
{
    fn drop(&mut self) {
        // Last handle is gone. Tell every still-live target to forget this
        // signal before the connections are released.
        let connections = self
            .connections
            .get_mut()
            .expect("connection list lock poisoned");
        for conn in connections.drain(..) {
            if let Some(anchor) = conn.anchor() {
                anchor.unregister_sender(self.id);
            }
        }
        trace!(signal = self.id.raw(), "signal dropped, targets unwired");
    }
}

/// A synchronous multi-target emitter for one fixed argument type.
///
/// # Type Parameters
///
/// - `A`: The argument passed to every connected callback, by reference.
///   Use a tuple for multi-argument signals.
///
/// # Example
///
/// ```rust,ignore
/// let log = Slot::new(Vec::new());
///
/// let line_read: Signal<String> = Signal::new();
/// line_read.connect(&log, |lines, line| lines.push(line.clone()));
///
/// line_read.emit(&"hello".to_string());
/// assert_eq!(log.get(), vec!["hello".to_string()]);
/// ```
pub struct Signal<A>
where
    A: Send + Sync + 'static,
{
    core: Arc<SignalCore<A>>,
}

impl<A> Signal<A>
where
    A: Send + Sync + 'static,
{
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            core: Arc::new(SignalCore {
                id: SignalId::new(),
                connections: RwLock::new(ConnectionList::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.core.id
    }

    /// Wire a callback on `slot` to this signal.
    ///
    /// The new connection is appended, so it fires after every existing
    /// one. No deduplication: connecting the same slot and callback twice
    /// yields two invocations per emit.
    pub fn connect<R, F>(&self, slot: &Slot<R>, method: F)
    where
        R: Send + Sync + 'static,
        F: Fn(&mut R, &A) + Send + Sync + 'static,
    {
        let connection = MethodConnection::new(slot.core(), Arc::new(method));
        self.core.lock_connections().push(Arc::new(connection));

        let core: Arc<dyn SenderLink> = self.core.clone();
        let link: Weak<dyn SenderLink> = Arc::downgrade(&core);
        slot.core().register_sender(self.core.id, link);
        trace!(
            signal = self.core.id.raw(),
            slot = slot.id().raw(),
            "connected"
        );
    }

    /// Remove the **first** connection targeting `slot`, if any, and forget
    /// this signal in the slot's sender set.
    ///
    /// Removes one matching connection per call even when several exist;
    /// exhaustive removal only happens on slot teardown. No-op when the
    /// slot is not connected.
    pub fn disconnect<R>(&self, slot: &Slot<R>)
    where
        R: Send + Sync + 'static,
    {
        // The removed connection is dropped after the lock is released;
        // see `drop_connections_to` for why.
        let removed = {
            let mut connections = self.core.lock_connections();
            connections
                .iter()
                .position(|conn| conn.target() == slot.id())
                .map(|index| connections.remove(index))
        };
        if removed.is_some() {
            slot.core().unregister_sender(self.core.id);
            trace!(
                signal = self.core.id.raw(),
                slot = slot.id().raw(),
                "disconnected"
            );
        }
    }

    /// Invoke every connection, in connection order, with `args`.
    ///
    /// Dispatch is synchronous: `emit` returns only after every callback
    /// has run. The list is snapshotted first, so callbacks may rewire this
    /// signal mid-emission; such changes apply from the next emit.
    /// Connections whose slot is gone are pruned here.
    pub fn emit(&self, args: &A) {
        // Pruned connections are dropped after the lock is released; see
        // `drop_connections_to` for why.
        let (snapshot, _pruned) = {
            let mut connections = self.core.lock_connections();
            let mut live = ConnectionList::new();
            let mut pruned: Vec<Arc<dyn Connection<A>>> = Vec::new();
            for conn in connections.drain(..) {
                if conn.anchor().is_some() {
                    live.push(conn);
                } else {
                    pruned.push(conn);
                }
            }
            *connections = live.clone();
            (live, pruned)
        };

        trace!(
            signal = self.core.id.raw(),
            fanout = snapshot.len(),
            "emit"
        );
        for conn in &snapshot {
            conn.call(args);
        }
    }

    /// Number of connections currently owned by this signal.
    pub fn connection_count(&self) -> usize {
        self.core
            .connections
            .read()
            .expect("connection list lock poisoned")
            .len()
    }

    /// Sever every connection, telling each still-live target to forget
    /// this signal. Idempotent.
    pub fn disconnect_all(&self) {
        let drained: ConnectionList<A> = {
            let mut connections = self.core.lock_connections();
            std::mem::take(&mut *connections)
        };
        for conn in drained {
            if let Some(anchor) = conn.anchor() {
                anchor.unregister_sender(self.core.id);
            }
        }
    }

    /// Duplicate this signal together with its outgoing connections.
    ///
    /// The copy gets a fresh identity and an independent connection to each
    /// of the source's live targets; those targets record the copy as an
    /// additional sender. Afterward the two signals evolve independently.
    /// Connections whose slot is already gone are not carried over.
    pub fn clone_with_rewire(&self) -> Self {
        let copy = Signal::new();
        let copy_core: Arc<dyn SenderLink> = copy.core.clone();
        let link: Weak<dyn SenderLink> = Arc::downgrade(&copy_core);

        let snapshot: Vec<Arc<dyn Connection<A>>> = {
            let connections = self
                .core
                .connections
                .read()
                .expect("connection list lock poisoned");
            connections.iter().cloned().collect()
        };

        let mut rewired = ConnectionList::new();
        for conn in snapshot {
            let Some(anchor) = conn.anchor() else { continue };
            anchor.register_sender(copy.core.id, link.clone());
            rewired.push(conn.clone_seat());
        }
        *copy.core.lock_connections() = rewired;

        trace!(
            source = self.core.id.raw(),
            copy = copy.core.id.raw(),
            connections = copy.connection_count(),
            "signal rewired onto copy"
        );
        copy
    }
}

impl<A> Default for Signal<A>
where
    A: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Signal<A>
where
    A: Send + Sync + 'static,
{
    /// Produce another handle to the **same** signal. Both handles share
    /// the connection list; no rewiring happens. Use
    /// [`Signal::clone_with_rewire`] to duplicate the signal itself.
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A> Debug for Signal<A>
where
    A: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.core.id)
            .field("connection_count", &self.connection_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_invokes_connected_callback() {
        let slot = Slot::new(0);
        let signal: Signal<i32> = Signal::new();
        signal.connect(&slot, |state, args| *state += *args);

        signal.emit(&5);
        assert_eq!(slot.get(), 5);

        signal.emit(&2);
        assert_eq!(slot.get(), 7);
    }

    #[test]
    fn emit_with_no_connections_is_noop() {
        let signal: Signal<i32> = Signal::new();
        signal.emit(&1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn connections_fire_in_connection_order() {
        let slot = Slot::new(Vec::new());
        let signal: Signal<i32> = Signal::new();
        signal.connect(&slot, |log, _| log.push("first"));
        signal.connect(&slot, |log, _| log.push("second"));
        signal.connect(&slot, |log, _| log.push("third"));

        signal.emit(&0);
        assert_eq!(slot.get(), vec!["first", "second", "third"]);
    }

    #[test]
    fn connecting_twice_invokes_twice() {
        let slot = Slot::new(0);
        let signal: Signal<i32> = Signal::new();
        signal.connect(&slot, |state, args| *state += *args);
        signal.connect(&slot, |state, args| *state += *args);

        signal.emit(&1);
        assert_eq!(slot.get(), 2);
        assert_eq!(signal.connection_count(), 2);
        assert_eq!(slot.sender_count(), 1);
    }

    #[test]
    fn disconnect_removes_first_match_only() {
        let slot = Slot::new(0);
        let signal: Signal<i32> = Signal::new();
        signal.connect(&slot, |state, args| *state += *args);
        signal.connect(&slot, |state, args| *state += *args);

        signal.disconnect(&slot);
        assert_eq!(signal.connection_count(), 1);

        signal.emit(&1);
        assert_eq!(slot.get(), 1);

        signal.disconnect(&slot);
        assert_eq!(signal.connection_count(), 0);

        // Third disconnect is a no-op.
        signal.disconnect(&slot);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn slot_drop_clears_connections_eagerly() {
        let slot = Slot::new(0);
        let signal: Signal<i32> = Signal::new();
        signal.connect(&slot, |state, args| *state += *args);
        assert_eq!(signal.connection_count(), 1);

        drop(slot);
        assert_eq!(signal.connection_count(), 0);

        // Emitting afterward invokes nothing and does not panic.
        signal.emit(&1);
    }

    #[test]
    fn surviving_handle_keeps_slot_wired() {
        let slot = Slot::new(0);
        let other_handle = slot.clone();
        let signal: Signal<i32> = Signal::new();
        signal.connect(&slot, |state, args| *state += *args);

        drop(slot);
        assert_eq!(signal.connection_count(), 1);

        signal.emit(&3);
        assert_eq!(other_handle.get(), 3);
    }

    #[test]
    fn signal_drop_unregisters_from_slot() {
        let slot = Slot::new(0);
        let signal: Signal<i32> = Signal::new();
        signal.connect(&slot, |state, args| *state += *args);
        assert_eq!(slot.sender_count(), 1);

        drop(signal);
        assert_eq!(slot.sender_count(), 0);
    }

    #[test]
    fn disconnect_all_unwires_every_target() {
        let a = Slot::new(0);
        let b = Slot::new(0);
        let signal: Signal<i32> = Signal::new();
        signal.connect(&a, |state, args| *state += *args);
        signal.connect(&b, |state, args| *state += *args);

        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
        assert_eq!(a.sender_count(), 0);
        assert_eq!(b.sender_count(), 0);

        signal.emit(&1);
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 0);
    }

    #[test]
    fn clone_shares_connection_list() {
        let slot = Slot::new(0);
        let signal: Signal<i32> = Signal::new();
        let alias = signal.clone();
        signal.connect(&slot, |state, args| *state += *args);

        assert_eq!(alias.id(), signal.id());
        alias.emit(&4);
        assert_eq!(slot.get(), 4);
    }

    #[test]
    fn connect_during_emit_takes_effect_next_emission() {
        let slot = Slot::new(0);
        let signal: Signal<i32> = Signal::new();

        let signal_inner = signal.clone();
        let slot_inner = slot.clone();
        signal.connect(&slot, move |state, args| {
            *state += *args;
            if *state == 1 {
                signal_inner.connect(&slot_inner, |state, args| *state += 10 * *args);
            }
        });

        // The connection added mid-emit must not fire during this emit.
        signal.emit(&1);
        assert_eq!(slot.get(), 1);
        assert_eq!(signal.connection_count(), 2);

        signal.emit(&1);
        assert_eq!(slot.get(), 12);
    }

    #[test]
    fn rewired_copy_is_independent() {
        let a = Slot::new(0);
        let b = Slot::new(0);
        let signal: Signal<i32> = Signal::new();
        signal.connect(&a, |state, args| *state += *args);
        signal.connect(&b, |state, args| *state += *args);

        let copy = signal.clone_with_rewire();
        assert_ne!(copy.id(), signal.id());
        assert_eq!(copy.connection_count(), 2);
        assert_eq!(a.sender_count(), 2);

        copy.emit(&1);
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 1);

        // Mutating the source does not affect the copy.
        signal.disconnect(&a);
        assert_eq!(copy.connection_count(), 2);
        copy.emit(&1);
        assert_eq!(a.get(), 2);
    }
}
