//! chained-hashmap: an unordered map built from a forward-linked entry
//! sequence and a bucket index of predecessor positions.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: unique keys with amortized O(1) insert, lookup and removal,
//!   without borrowing a hashtable implementation for storage or indexing.
//! - Layers:
//!   - EntrySequence<K, V>: singly-linked nodes in a `slotmap` arena. The
//!     only edits are "insert after position" and "remove after position";
//!     traversal is forward only. This is the single source of truth for
//!     contents and iteration order.
//!   - BucketIndex: one `Vec` of markers per bucket. A marker is the
//!     position *preceding* an entry (or the before-first sentinel), since
//!     that is what the sequence needs to unlink it.
//!   - ChainedHashMap<K, V, S>: owns both plus the `BuildHasher`, and keeps
//!     them in lockstep.
//!
//! Invariants (hold between public calls)
//! - `len()` equals the number of entries and the number of markers.
//! - Every entry has exactly one marker, in bucket `hash mod bucket_count`,
//!   and that marker is the entry's current predecessor.
//! - `len() <= bucket_count()`; the bucket count starts at 1 and doubles.
//!
//! Maintaining markers
//! - Insert links the new entry at the front. The old first entry's
//!   predecessor changes from the sentinel to the new entry, so its marker
//!   is rewritten; the new entry gets a sentinel marker.
//! - Remove rewrites the follower's marker to the removed entry's
//!   predecessor, drops the removed entry's marker, then unlinks it.
//! - Rehash doubles the bucket array and walks the sequence once, moving
//!   only the markers whose bucket changed. Entries never move.
//!
//! Hashing
//! - Each entry caches its `u64` hash. Rehash and marker relinking use the
//!   cached hash and slot identity, so `K: Hash`/`K: Eq` never run there.
//!
//! Notes and non-goals
//! - Single-threaded: the map is `!Send`/`!Sync`. A debug-only guard
//!   panics if key `Hash`/`Eq` code re-enters the map mid-operation.
//! - Inserting an existing key keeps the first value (`insert` returns
//!   `false`). Use `get_mut` to overwrite.
//! - The table never shrinks; `clear()` keeps the bucket count.
//! - Iteration order is unspecified (most recent insert first, in
//!   practice) but stable while the map is not mutated.

mod bucket_index;
mod chained_hash_map;
#[cfg(test)]
mod chained_hash_map_proptest;
mod entry_sequence;
mod error;
pub mod iter;
mod reentrancy;
#[cfg(feature = "serde")]
mod serde_impls;

// Public surface
pub use chained_hash_map::ChainedHashMap;
pub use error::KeyNotFound;
pub use hashbrown::DefaultHashBuilder;
pub use iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
