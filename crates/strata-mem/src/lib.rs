//! Region-based arena allocation for `strata`.
//!
//! Memory is handed out from large anonymous OS mappings ("regions") with a
//! bump cursor and reclaimed all at once, never per object:
//!
//! - **[`Arena`]**: a mutex-guarded, append-only chain of regions with
//!   first-fit allocation, copy-based reallocation, bulk reset and teardown
//! - **[`Region`]**: one mapping whose header lives in its first bytes
//! - **[`ArenaVec`] / [`ArenaString`]**: growable containers that double
//!   their capacity through [`Arena::reallocate_aligned`]
//!
//! # Example
//!
//! ```
//! use strata_mem::{Arena, ArenaString};
//!
//! let mut arena = Arena::new(8192);
//!
//! let block = arena.alloc_bytes(100);
//! block[..5].copy_from_slice(b"hello");
//!
//! let mut name = ArenaString::new_in(&arena);
//! name.push_str("worker-");
//! name.push('7');
//! assert_eq!(name.as_str(), "worker-7");
//!
//! print!("{}", arena.dump());
//! arena.reset();
//! ```
//!
//! # Failure Policy
//!
//! Running out of OS memory is fatal: the infallible entry points panic.
//! The `try_*` variants report [`Error`] instead.

#[cfg(not(unix))]
compile_error!("strata-mem maps regions with mmap and only supports Unix targets");

pub mod arena;
pub mod config;
pub mod error;
pub mod os;
pub mod region;
pub mod string;
pub mod vec;

pub use arena::{Arena, ArenaStats, align_size};
pub use config::{ARR_INIT_CAPACITY, ArenaConfig, DEFAULT_REGION_PAGES};
pub use error::{Error, Result};
pub use region::{HEADER_SIZE, Region, RegionInfo};
pub use string::ArenaString;
pub use vec::ArenaVec;
