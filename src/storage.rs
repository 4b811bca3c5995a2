//! Resilient storage system for the DogTale app.
//!
//! This module defines the backend port, the resilient save/load engine,
//! and the namespaced facade the rest of the crate is built on. Every value
//! is stored as a JSON string under a flat key, with up to three rotated
//! backup generations per key and automatic recovery when the primary value
//! no longer parses.
//!
//! # Concepts
//!
//! - **Backend** — A flat key/value store behind the [`StorageBackend`]
//!   trait. Quota exhaustion is reported as its own error variant so the
//!   engine can react to "full" differently from "broken".
//! - **Engine** — [`StorageEngine`] adds backup rotation, write
//!   verification and parse-failure recovery on top of a backend.
//! - **Namespace** — [`NamespacedStorage`] prefixes every key with
//!   `{namespace}-` so independent features share one backend without
//!   colliding.
//!
//! Backups live next to the primary key as `{key}_backup_{index}`, index 0
//! being the newest generation. See [`rotation`] for the slot mechanics and
//! [`monitor`] for quota reporting.
//!
//! # Available types
//!
//! - [`StorageBackend`] — Trait for any storage backend.
//! - [`MemoryBackend`] — In-memory backend, optionally quota-limited.
//! - [`SqliteBackend`] — SQLite-backed persistent backend.
//! - [`StorageEngine`] — Resilient save/load over a backend.
//! - [`NamespacedStorage`] — Key-prefixing facade over a shared engine.
//! - [`LoadResult`], [`SaveOptions`], [`StorageInfo`] — Operation results
//!   and options.
//!
//! # Choosing a backend
//!
//! - For durable app data, use [`SqliteBackend`].
//! - For tests or throwaway sessions, use [`MemoryBackend`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use dogtale_storage::storage::{MemoryBackend, NamespacedStorage, StorageEngine};
//!
//! let engine = Arc::new(StorageEngine::new(Arc::new(MemoryBackend::new())));
//! let storage = NamespacedStorage::new(engine, "dogtale");
//!
//! storage.save("journal", &serde_json::json!({ "entries": 0 })).unwrap();
//! let result = storage.load("journal", serde_json::json!(null));
//! assert_eq!(result.data["entries"], 0);
//! assert!(!result.recovered);
//! ```
//!
//! Durable setup (behind the default-on `sqlite_backend` feature):
//!
//! ```no_run
//! # #[cfg(feature = "sqlite_backend")] {
//! use std::sync::Arc;
//! use dogtale_storage::storage::{NamespacedStorage, SqliteBackend, StorageEngine};
//!
//! let backend = Arc::new(SqliteBackend::new("dogtale.db").unwrap());
//! let engine = Arc::new(StorageEngine::new(backend));
//! let storage = NamespacedStorage::new(engine, "dogtale");
//! # }
//! ```
//!
//! # See also
//!
//! - [`crate::memorial`] — memorial records stored through this module.
//! - [`crate::stats`] — the achievement-stat cache.

/// Backend port, defining the key/value storage interface.
pub mod backend;
/// Engine module, providing resilient save/load over a backend.
pub mod engine;
/// Monitor module, reporting usage against a quota.
pub mod monitor;
/// Namespace module, prefixing keys for a shared backend.
pub mod namespace;
/// Rotation module, managing the backup generations of a key.
pub mod rotation;
/// Operation results and options.
pub mod types;

pub use backend::in_memory::MemoryBackend;
#[cfg(feature = "sqlite_backend")]
pub use backend::sqlite_store::SqliteBackend;
pub use backend::StorageBackend;
pub use engine::StorageEngine;
pub use namespace::{NamespacedStorage, DEFAULT_NAMESPACE};
pub use types::{BackupSlotInfo, LoadResult, SaveOptions, StorageInfo};
