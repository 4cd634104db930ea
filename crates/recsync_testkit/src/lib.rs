//! # recsync Testkit
//!
//! Test utilities for recsync.
//!
//! This crate provides:
//! - Seeded source stores and record fixtures
//! - Call-counting store wrapper
//! - Fault-injecting and gated store wrappers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn empty_delta_does_no_io() {
//!     let source = CountingStore::new(seeded_store(10));
//!     // ... run a delta pass
//!     assert_eq!(source.calls().reads(), 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod counting;
pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::counting::*;
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use counting::*;
pub use faults::*;
pub use fixtures::*;
pub use generators::*;
