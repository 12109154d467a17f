//! ChainedHashMap: an unordered map over a forward-linked entry sequence.
//!
//! Every entry lives in an `EntrySequence`; every bucket of the
//! `BucketIndex` holds, for each key hashing to it, the position *before*
//! that key's entry. New entries are always linked at the front, so an
//! insert only has to repoint the old first entry's marker; an erase only
//! has to repoint the marker of the entry that followed the removed one.

use crate::bucket_index::{bucket_for, BucketIndex, MarkerSlot};
use crate::entry_sequence::{EntrySequence, Position};
use crate::error::KeyNotFound;
use crate::iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::DefaultHashBuilder;
use log::{debug, trace};
use slotmap::DefaultKey;

/// Largest permitted ratio of entries to buckets between public calls.
const MAX_LOAD_FACTOR: f32 = 1.0;

/// Entry storage plus its predecessor index. Kept apart from the hasher
/// and guard so helpers can take `&mut self` while a guard is held.
#[derive(Debug)]
struct Chains<K, V> {
    entries: EntrySequence<K, V>,
    index: BucketIndex,
    len: usize,
}

impl<K, V> Chains<K, V> {
    fn new() -> Self {
        Self {
            entries: EntrySequence::new(),
            index: BucketIndex::new(),
            len: 0,
        }
    }

    /// Bucket, marker slot and predecessor of the entry holding `key`.
    fn locate<Q>(&self, hash: u64, key: &Q) -> Option<(usize, MarkerSlot, Position)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let bucket = self.index.bucket_of(hash);
        let (marker, prev) = self
            .index
            .locate_predecessor(bucket, hash, key, &self.entries)?;
        Some((bucket, marker, prev))
    }

    fn slot_of<Q>(&self, hash: u64, key: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let (_, _, prev) = self.locate(hash, key)?;
        self.entries.successor(prev)
    }

    /// Link a new entry at the front of the sequence and index it. The
    /// caller has checked that `key` is absent.
    fn link_front(&mut self, key: K, value: V, hash: u64) -> DefaultKey {
        // The current first entry is about to gain the new entry as its
        // predecessor; find its marker before anything moves.
        let old_first = self.entries.first().and_then(|slot| {
            let bucket = self.index.bucket_of(self.entries.node(slot)?.hash);
            let marker = self.index.locate_marker(bucket, slot, &self.entries)?;
            Some((bucket, marker))
        });
        debug_assert_eq!(old_first.is_some(), !self.entries.is_empty());

        let slot = self
            .entries
            .insert_after(Position::BeforeFirst, key, value, hash);
        if let Some((bucket, marker)) = old_first {
            self.index.set_marker(bucket, marker, Position::At(slot));
        }
        let bucket = self.index.bucket_of(hash);
        self.index.add_marker(bucket, Position::BeforeFirst);

        self.len += 1;
        if self.load_exceeded() {
            self.grow();
        }
        slot
    }

    /// Remove the entry whose marker is `marker` in `bucket`, with
    /// predecessor `prev`.
    fn unlink(&mut self, bucket: usize, marker: MarkerSlot, prev: Position) -> Option<(K, V)> {
        let target = self.entries.successor(prev)?;

        // The follower's predecessor becomes `prev`.
        if let Some(next) = self.entries.successor(Position::At(target)) {
            let next_bucket = self.index.bucket_of(self.entries.node(next)?.hash);
            let next_marker = self.index.locate_marker(next_bucket, next, &self.entries);
            debug_assert!(next_marker.is_some(), "every live entry has a marker");
            if let Some(next_marker) = next_marker {
                self.index.set_marker(next_bucket, next_marker, prev);
            }
        }

        self.index.remove_marker(bucket, marker);
        let removed = self.entries.remove_after(prev);
        debug_assert!(removed.is_some());
        self.len -= 1;
        removed
    }

    fn load_exceeded(&self) -> bool {
        self.len as f32 > self.index.bucket_count() as f32 * MAX_LOAD_FACTOR
    }

    /// Double the bucket count and move the markers whose bucket changed.
    /// Entries stay where they are.
    fn grow(&mut self) {
        let old_count = self.index.bucket_count();
        let new_count = old_count.saturating_mul(2);
        self.index.resize(new_count);

        let mut moved = 0usize;
        for (slot, node) in self.entries.walk() {
            let from = bucket_for(node.hash, old_count);
            let to = bucket_for(node.hash, new_count);
            if from == to {
                continue;
            }
            let marker = self.index.locate_marker(from, slot, &self.entries);
            debug_assert!(marker.is_some(), "every live entry has a marker");
            if let Some(prev) = marker.and_then(|m| self.index.remove_marker(from, m)) {
                self.index.add_marker(to, prev);
                moved += 1;
            }
        }

        debug!(
            "rehash: {} -> {} buckets, {} entries, {} markers moved",
            old_count, new_count, self.len, moved
        );
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.len = 0;
    }

    /// Panic unless every structural invariant holds.
    #[cfg(test)]
    fn check_invariants(&self) {
        use std::collections::HashMap;

        assert_eq!(self.len, self.entries.len(), "len vs sequence length");
        assert_eq!(self.len, self.index.marker_count(), "len vs marker count");
        assert!(
            self.len <= self.index.bucket_count(),
            "load factor above 1: {} entries, {} buckets",
            self.len,
            self.index.bucket_count()
        );
        assert!(self.index.bucket_count().is_power_of_two());

        let mut pred: HashMap<DefaultKey, Position> = HashMap::new();
        let mut at = Position::BeforeFirst;
        for (slot, _) in self.entries.walk() {
            pred.insert(slot, at);
            at = Position::At(slot);
        }
        assert_eq!(pred.len(), self.len, "sequence links reach every entry");

        let mut seen: HashMap<DefaultKey, usize> = HashMap::new();
        for (bucket, markers) in self.index.buckets() {
            for &marker in markers {
                let slot = self
                    .entries
                    .successor(marker)
                    .expect("marker must have a live successor");
                let node = self.entries.node(slot).expect("successor is live");
                assert_eq!(
                    bucket_for(node.hash, self.index.bucket_count()),
                    bucket,
                    "marker in wrong bucket"
                );
                assert_eq!(pred.get(&slot), Some(&marker), "marker is not the predecessor");
                *seen.entry(slot).or_default() += 1;
            }
        }
        assert_eq!(seen.len(), self.len, "every entry has a marker");
        assert!(seen.values().all(|&n| n == 1), "no entry has two markers");
    }
}

/// An unordered map with unique keys, amortized O(1) insert, lookup and
/// removal, and a table that doubles whenever `len()` would exceed
/// `bucket_count()`.
///
/// Inserting a key that is already present keeps the existing value.
pub struct ChainedHashMap<K, V, S = DefaultHashBuilder> {
    hasher: S,
    chains: Chains<K, V>,
    reentrancy: DebugReentrancy,
}

impl<K, V> ChainedHashMap<K, V, DefaultHashBuilder> {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }
}

impl<K, V> Default for ChainedHashMap<K, V, DefaultHashBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ChainedHashMap<K, V, S> {
    /// An empty map with one bucket using `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            chains: Chains::new(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chains.len
    }

    pub fn is_empty(&self) -> bool {
        self.chains.len == 0
    }

    /// The map's hash builder.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn bucket_count(&self) -> usize {
        self.chains.index.bucket_count()
    }

    /// Number of keys currently indexed in `bucket`; 0 when out of range.
    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.chains.index.bucket_len(bucket)
    }

    pub fn load_factor(&self) -> f32 {
        self.chains.len as f32 / self.chains.index.bucket_count() as f32
    }

    pub fn max_load_factor(&self) -> f32 {
        MAX_LOAD_FACTOR
    }

    /// Remove every entry. The bucket count is kept.
    pub fn clear(&mut self) {
        let _g = self.reentrancy.enter();
        trace!("clear: dropping {} entries", self.chains.len);
        self.chains.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            walk: self.chains.entries.walk(),
        }
    }

    /// Mutable iteration, in the same order as [`iter`](Self::iter).
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            walk: self.chains.entries.walk_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }
}

impl<K, V, S> ChainedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Build a map from `pairs` using `hasher`. Later duplicates of a key
    /// are ignored, as with [`insert`](Self::insert).
    pub fn from_iter_with_hasher<I>(pairs: I, hasher: S) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::with_hasher(hasher);
        map.extend(pairs);
        map
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// The stored key and value for `key`, if present.
    pub fn find<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(key);
        let slot = self.chains.slot_of(hash, key)?;
        self.chains.entries.node(slot).map(|n| (&n.key, &n.value))
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key).map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(key);
        let slot = self.chains.slot_of(hash, key)?;
        self.chains.entries.node_mut(slot).map(|n| &mut n.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key).is_some()
    }

    /// The value for `key`, or `KeyNotFound`. Never inserts.
    pub fn at<Q>(&self, key: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).ok_or(KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(key).ok_or(KeyNotFound)
    }

    /// Insert `key -> value` unless `key` is already present.
    ///
    /// Returns `false`, leaving the stored value untouched and dropping the
    /// arguments, when the key exists.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        if self.chains.locate(hash, &key).is_some() {
            return false;
        }
        self.chains.link_front(key, value, hash);
        true
    }

    /// The value for `key`, inserting `make()` first if it is absent.
    /// `make` runs only when inserting.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        let slot = match self.chains.slot_of(hash, &key) {
            Some(slot) => slot,
            None => self.chains.link_front(key, make(), hash),
        };
        &mut self
            .chains
            .entries
            .node_mut(slot)
            .expect("located or freshly linked entry is live")
            .value
    }

    /// Indexed access: the value for `key`, inserting `V::default()` if
    /// it is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Remove `key`, returning its value. Absent keys leave the map as is.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(key);
        let (bucket, marker, prev) = self.chains.locate(hash, key)?;
        self.chains.unlink(bucket, marker, prev)
    }

    /// Double the bucket count and re-bucket every entry.
    pub fn rehash(&mut self) {
        let _g = self.reentrancy.enter();
        self.chains.grow();
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.chains.check_invariants();
        for (_, node) in self.chains.entries.walk() {
            assert_eq!(node.hash, self.make_hash(&node.key), "stale cached hash");
        }
    }
}

impl<K, V, S> Clone for ChainedHashMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn clone(&self) -> Self {
        let mut map = Self::with_hasher(self.hasher.clone());
        map.extend(self.iter().map(|(k, v)| (k.clone(), v.clone())));
        map
    }

    /// Empties `self`, then inserts every entry of `source` in its
    /// iteration order. `self` keeps its own hasher.
    fn clone_from(&mut self, source: &Self) {
        self.clear();
        self.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

impl<K, V, S> fmt::Debug for ChainedHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for ChainedHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for ChainedHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> Extend<(K, V)> for ChainedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, S> Extend<(&'a K, &'a V)> for ChainedHashMap<K, V, S>
where
    K: Eq + Hash + Copy,
    V: Copy,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: T) {
        for (&k, &v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for ChainedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_iter_with_hasher(iter, S::default())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for ChainedHashMap<K, V, DefaultHashBuilder>
where
    K: Eq + Hash,
{
    fn from(arr: [(K, V); N]) -> Self {
        arr.into_iter().collect()
    }
}

impl<'a, K, V, S> IntoIterator for &'a ChainedHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut ChainedHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> IntoIterator for ChainedHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            entries: self.chains.entries,
        }
    }
}
