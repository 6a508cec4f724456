//! Connection Implementation
//!
//! A connection is one bound call: a weak handle to a target slot plus the
//! callback to invoke on it. Connections are owned by exactly one signal;
//! the `Arc` around each one exists so `emit` can snapshot the list and
//! invoke callbacks without holding the list lock, never so two signals can
//! share a connection. Copying a signal goes through
//! [`Connection::clone_seat`], which produces an independent object.
//!
//! # Liveness
//!
//! The target is held weakly. A connection whose slot has been torn down
//! invokes nothing; the owning signal prunes such entries on its next emit.
//! Invoking a live connection is always valid — the weak upgrade is the
//! check, there is no separate validity protocol.

use std::sync::{Arc, Weak};

use tracing::warn;

use super::id::SlotId;
use super::link::{Anchor, ErasedSlot};
use super::slot::SlotCore;

/// One bound (slot, callback) pair, polymorphic over the slot's state type.
pub(crate) trait Connection<A>: Send + Sync {
    /// Invoke the bound callback with `args`. A dead target is skipped.
    fn call(&self, args: &A);

    /// Identity of the target slot, used to find and filter connections
    /// without invoking them.
    fn target(&self) -> SlotId;

    /// Live access to the target's sender bookkeeping, or `None` once the
    /// slot is gone. Doubles as the liveness probe.
    fn anchor(&self) -> Option<Arc<dyn Anchor>>;

    /// An independent connection with the same target and callback.
    fn clone_seat(&self) -> Arc<dyn Connection<A>>;

    /// An independent connection with the same callback bound to `copy`.
    ///
    /// Returns `None` when `copy` is not the concrete slot type this
    /// connection was built for.
    fn retarget(&self, copy: &ErasedSlot) -> Option<Arc<dyn Connection<A>>>;
}

/// A callback bound to a typed slot.
pub(crate) struct MethodConnection<R, A> {
    target: Weak<SlotCore<R>>,
    target_id: SlotId,
    method: Arc<dyn Fn(&mut R, &A) + Send + Sync>,
}

impl<R, A> MethodConnection<R, A> {
    pub(crate) fn new(
        target: &Arc<SlotCore<R>>,
        method: Arc<dyn Fn(&mut R, &A) + Send + Sync>,
    ) -> Self {
        Self {
            target: Arc::downgrade(target),
            target_id: target.id(),
            method,
        }
    }
}

impl<R, A> Connection<A> for MethodConnection<R, A>
where
    R: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    fn call(&self, args: &A) {
        let Some(core) = self.target.upgrade() else {
            return;
        };
        let mut state = core.write_state();
        (self.method)(&mut state, args);
    }

    fn target(&self) -> SlotId {
        self.target_id
    }

    fn anchor(&self) -> Option<Arc<dyn Anchor>> {
        self.target
            .upgrade()
            .map(|core| core as Arc<dyn Anchor>)
    }

    fn clone_seat(&self) -> Arc<dyn Connection<A>> {
        Arc::new(Self {
            target: self.target.clone(),
            target_id: self.target_id,
            method: Arc::clone(&self.method),
        })
    }

    fn retarget(&self, copy: &ErasedSlot) -> Option<Arc<dyn Connection<A>>> {
        let Ok(core) = Arc::clone(&copy.core).downcast::<SlotCore<R>>() else {
            warn!(slot = copy.id.raw(), "retarget across slot types ignored");
            return None;
        };
        Some(Arc::new(Self {
            target: Arc::downgrade(&core),
            target_id: copy.id,
            method: Arc::clone(&self.method),
        }))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::slot::Slot;
    use super::*;

    fn bound_to(slot: &Slot<i32>) -> MethodConnection<i32, i32> {
        MethodConnection::new(slot.core(), Arc::new(|state, args| *state += *args))
    }

    #[test]
    fn call_invokes_bound_callback() {
        let slot = Slot::new(0);
        let conn = bound_to(&slot);

        conn.call(&5);
        conn.call(&2);
        assert_eq!(slot.get(), 7);
    }

    #[test]
    fn call_on_dead_target_is_noop() {
        let slot = Slot::new(0);
        let conn = bound_to(&slot);
        drop(slot);

        conn.call(&5);
        assert!(conn.anchor().is_none());
    }

    #[test]
    fn target_reports_slot_identity() {
        let slot = Slot::new(0);
        let conn = bound_to(&slot);
        assert_eq!(conn.target(), slot.id());
    }

    #[test]
    fn clone_seat_keeps_target_and_callback() {
        let slot = Slot::new(0);
        let conn = bound_to(&slot);
        let cloned = conn.clone_seat();

        assert_eq!(cloned.target(), slot.id());
        cloned.call(&3);
        assert_eq!(slot.get(), 3);
    }

    #[test]
    fn retarget_rebinds_callback_to_copy() {
        let source = Slot::new(0);
        let copy = Slot::new(100);
        let conn = bound_to(&source);

        let erased = ErasedSlot {
            id: copy.id(),
            core: Arc::clone(copy.core()) as Arc<dyn std::any::Any + Send + Sync>,
        };
        let rebound = conn.retarget(&erased).expect("same slot type");

        assert_eq!(rebound.target(), copy.id());
        rebound.call(&5);
        assert_eq!(copy.get(), 105);
        assert_eq!(source.get(), 0);
    }

    #[test]
    fn retarget_across_slot_types_is_rejected() {
        let source = Slot::new(0);
        let other = Slot::new(String::new());
        let conn = bound_to(&source);

        let erased = ErasedSlot {
            id: other.id(),
            core: Arc::clone(other.core()) as Arc<dyn std::any::Any + Send + Sync>,
        };
        assert!(conn.retarget(&erased).is_none());
    }
}
