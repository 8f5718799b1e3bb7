#![forbid(unsafe_code)]

//! Store contracts shared across Curfew.
//!
//! The enforcement core talks to the persisted restriction store only through
//! [`RegistryStore`], so the rest of the workspace can swap the Windows
//! registry for the in-memory store without touching orchestration.

pub mod memory;
pub mod registry;

pub use memory::{MemoryStore, StoredValue};
pub use registry::{Hive, RegistryKey, RegistryStore, StoreError};
