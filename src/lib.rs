//! weak-hashmap: a single-threaded hash map that holds its keys weakly,
//! so an entry lives only as long as some owner elsewhere keeps its key.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a drop-in associative container whose keys are `Rc<K>` owned
//!   by the caller. The map stores only `Weak<K>`, so dropping the last
//!   `Rc` makes the entry invisible immediately and removable later.
//! - Layers:
//!   - WeakToken<K>: the stored form of a key; a `Weak<K>` plus the hash
//!     computed when the token was minted.
//!   - LivenessComparer<S>: hashing and equality over tokens and borrowed
//!     keys, deciding all alive/dead cross-cases.
//!   - TokenTable<K, V>: structural storage (hashbrown index over a
//!     slotmap) with stable handles; hashes and compares only through
//!     closures supplied by the caller.
//!   - SweepPolicy: decides before each mutation whether to purge dead
//!     entries (epoch-counted, interval-based, or manual).
//!   - WeakMap<K, V, P, S>: public API composed from the above.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` through `Weak<K>`.
//! - O(1) average lookups. A lookup never allocates a token; it probes
//!   with the borrowed key directly.
//! - Lazy reclamation: dead entries are filtered at read time and
//!   physically removed only by a sweep. How long they linger depends on
//!   the policy; only `sweep`, `len` and `retain` guarantee a purge.
//! - Iteration never mutates storage. Sweeps need `&mut self`, so the
//!   borrow checker rules out purging while an iterator is outstanding.
//!
//! Hash stability
//! - A token caches its key's hash once. Rehashing on growth uses only
//!   cached hashes, so `K: Hash` is never called after insertion and dead
//!   tokens (whose key is gone) stay in the right bucket.
//!
//! Dead-token equality
//! - A dead token equals only itself. Two dead tokens minted from equal
//!   keys stay distinct entries until swept; a dead token never matches a
//!   live key, so a fresh insert of an equal key creates a new entry.
//!
//! Notes and non-goals
//! - Values are held strongly. There is no weak-value variant.
//! - `len` sweeps and therefore takes `&mut self`; `raw_len` is the O(1)
//!   upper bound.
//! - Keys are immutable post-insert; re-inserting an equal live key keeps
//!   the stored key and replaces only the value.

mod error;
pub mod liveness;
mod map;
pub mod store;
pub mod sweep;
pub mod token;

// Public surface
pub use error::InsertError;
pub use map::{Iter, IterMut, Keys, Values, ValuesMut, WeakMap};
pub use sweep::{
    Clock, EpochSource, EpochSweep, IntervalSweep, ManualClock, ManualSweep, SharedEpoch,
    SweepPolicy, SystemClock,
};
pub use token::WeakToken;
