//! Embedded persistence and aggregation service for dials and boards.
//!
//! A dial is a named, token-owned scalar value; a board is a named,
//! token-owned ordered collection of dial references, materialized live
//! on every read. Records are stored durably in an embedded RocksDB
//! key-value store with serialized writers and snapshot readers.

pub mod clock;
pub mod error;
pub mod model;
pub mod service;
pub mod snowflake;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DialError, Result};
pub use model::{Board, BoardId, Dial, DialId};
pub use service::{DialService, ResolutionObserver, TracingObserver};
pub use store::DialStore;
