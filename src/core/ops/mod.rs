//! core::ops
//!
//! Operation locking.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive stamping lock
//!
//! Every stamping command:
//! 1. Acquires the repo lock (blocking)
//! 2. Matches, builds and publishes
//! 3. Releases the lock on every exit path

pub mod lock;

pub use lock::{LockError, RepoLock};
