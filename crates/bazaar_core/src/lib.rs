//! # BAZAAR Core
//!
//! Building blocks shared by every BAZAAR crate.
//!
//! ## Modules
//!
//! - [`memory`]: generational slot arena for store-local ownership
//! - [`mapping`]: unique-key lookup over catalog lists
//! - [`time`]: injectable UTC clocks
//! - [`persist`]: versioned payloads, migrator chains and save stores
//!
//! ## Rules
//!
//! Nothing in this crate knows about items or transactions. Game rules live
//! in `bazaar_economy`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod mapping;
pub mod memory;
pub mod persist;
pub mod time;

pub use mapping::{KeyedMap, KeyedMapError};
pub use memory::{SlotArena, SlotId};
pub use persist::{
    decode, encode, load, save, FileStore, MemoryStore, Migrator, PersistError, SaveStore,
    VersionTag, Versioned,
};
pub use time::{ManualClock, SystemClock, TimeSource};
