//! # recsync Store
//!
//! Record model and store capabilities for recsync.
//!
//! This crate provides the lowest-level abstraction the synchronizer talks
//! to. Stores are **opaque document collections**: the engine only ever
//! reads from a [`SourceStore`] and only ever writes to a [`TargetStore`].
//!
//! ## Design Principles
//!
//! - A record is a field map plus store-assigned timestamps
//! - One field (configured by the caller) is the business key
//! - Source access is read-only, target access is write-only
//! - Every call is async and may be network-latency bearing
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - In-memory document store for tests and demos
//!
//! ## Example
//!
//! ```rust
//! use recsync_store::{Filter, MemoryStore, Query, Record, SourceStore};
//!
//! # tokio_test_block(async {
//! let store = MemoryStore::new();
//! store
//!     .put(Record::new().with_field("name", "GE").with_field("amount", 1_000_000))
//!     .unwrap();
//!
//! let found = store.find(&Query::all().limit(10)).await.unwrap();
//! assert_eq!(found.len(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod query;
mod record;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{Filter, Patch, Query};
pub use record::{BusinessKey, Record};
pub use store::{SourceStore, TargetStore};
