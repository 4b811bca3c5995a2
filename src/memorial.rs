//! Pet memorials: the records, their side ledgers (candles, tributes,
//! locked calendar dates), and export/import of the whole feature.
//!
//! Everything persists through a [`NamespacedStorage`](crate::storage::NamespacedStorage),
//! so the memorial list inherits backup rotation and recovery from the
//! storage engine.

/// Record types: the memorial itself, drafts, and patches.
pub mod record;
/// Persistence verbs over a namespaced storage facade.
pub mod store;

pub use record::{Memorial, MemorialDraft, MemorialPatch, Species};
pub use store::{LockedDate, MemorialExport, MemorialStore, Tribute};
