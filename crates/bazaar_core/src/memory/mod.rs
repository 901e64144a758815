//! # Memory Management
//!
//! Owned storage with generation-checked handles.
//!
//! ## Design Philosophy
//!
//! Containers own their values outright. Anything outside the container
//! holds a [`SlotId`], never a reference, so removing a value can't leave a
//! dangling pointer behind.

mod slot_arena;

pub use slot_arena::{SlotArena, SlotId};
