//! Memory primitives for tessera language tooling.
//!
//! This crate provides two building blocks for parsers and compilers:
//!
//! - **Page arena** ([`Arena`]): bump allocation from large pages, bulk
//!   release on drop, and rollback of the most recent allocation
//! - **Symbol pool** ([`SymPool`]): hash-consed string storage producing
//!   pointer-sized [`Sym`] handles with O(1) equality
//!
//! Both are single-threaded. They need external synchronization to be used
//! from more than one thread.
//!
//! Logging goes through `tessera-log`; set `TESSERA_LOG=debug` and call
//! `tessera_log::init_from_env()` to see page and index growth.

pub mod arena;
pub mod error;
pub mod factory;
pub mod pool;
pub mod sym;
mod table;

pub use arena::{Arena, ArenaBox, ArenaState, ArenaStats};
pub use error::ArenaAllocError;
pub use factory::ArenaFactory;
pub use pool::{PoolStats, SymPool};
pub use sym::{Sym, SymBuildHasher, SymMap, SymSet};
