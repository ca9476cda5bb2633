//! Query cache layer.
//!
//! Memoizes data-source queries by [`QueryDescriptor`], expires them lazily by
//! [`Ttl`], drops them in bulk by [`CacheTag`], and collapses concurrent
//! misses for one descriptor into a single computation.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 512
//! short_ttl = 60
//! medium_ttl = 300
//! long_ttl = 3600
//! ```

mod batch;
mod config;
mod keys;
mod lock;
mod store;

pub use batch::BatchQuery;
pub use config::{CacheConfig, CacheOptions, Ttl, TtlClass};
pub use keys::{CacheTag, Operation, ParamValue, QueryDescriptor, UnknownTag};
pub use store::{CacheError, QueryCache};
