//! Deterministic binary codec for analyzed rule sets.
//!
//! Three pieces: the constant pool (deduplicated, lexicographically indexed
//! string table), the emitter (static tier, dynamic index, dynamic tier,
//! assembled behind a versioned file header) and the loader (validating,
//! lazily parsing reader over a borrowed buffer).
//!
//! Two invocations over semantically equal analyses produce byte-identical
//! files; every sort key and tie-breaker in the emitter is explicit.

#![forbid(unsafe_code)]

pub mod emit;
pub mod error;
pub mod load;
pub mod pool;

pub use emit::emit;
pub use error::{CodecError, Result};
pub use load::{
    BoundaryDep, BoundaryRecord, CompiledStyles, DynamicRecord, LoaderStats,
    NondeterministicRecord, RuleSetRecord, StaticRecord,
};
pub use pool::{ConstantPool, PoolReader, NULL_REF};
