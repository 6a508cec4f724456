//! Tether Core
//!
//! This crate provides the core wiring machinery for the Tether event
//! library. It implements:
//!
//! - Typed signals with synchronous, ordered multi-target dispatch
//! - Slots: shared receiver state with lifetime-tracked incoming wiring
//! - Automatic unwiring on teardown, in either destruction order
//! - Explicit rewiring when a signal or slot is duplicated
//!
//! Signals and slots may be destroyed or duplicated independently and in
//! any order; the wiring protocol guarantees no connection is ever invoked
//! against, or left dangling toward, an object that no longer exists.
//!
//! # Architecture
//!
//! Everything lives in the [`wiring`] module:
//!
//! - `wiring::Signal` — the emitter, parameterized by one argument type
//! - `wiring::Slot` — the receiver, parameterized by its state type
//! - connection and sender bookkeeping, crate-private
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_core::{Signal, Slot};
//!
//! // A slot holds receiver state.
//! let tally = Slot::new(0u32);
//!
//! // A signal dispatches one argument type to every connected slot.
//! let scored: Signal<u32> = Signal::new();
//! scored.connect(&tally, |total, points| *total += *points);
//!
//! scored.emit(&3);
//! assert_eq!(tally.get(), 3);
//!
//! // Dropping either side unwires automatically.
//! drop(tally);
//! scored.emit(&1); // invokes nothing
//! ```

pub mod wiring;

pub use wiring::{Signal, SignalId, Slot, SlotId};
