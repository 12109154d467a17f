//! BucketIndex: per-bucket predecessor markers into an `EntrySequence`.
//!
//! A marker is the position *before* an entry, because the sequence can
//! only be edited relative to a predecessor. The entry a marker describes
//! is always `successor(marker)`.

use crate::entry_sequence::{EntrySequence, Position};
use core::borrow::Borrow;
use slotmap::DefaultKey;

/// Index of a marker inside its bucket. Invalidated by `remove_marker` on
/// the same bucket.
pub(crate) type MarkerSlot = usize;

/// Bucket for `hash` in a table of `bucket_count` buckets.
#[inline]
pub(crate) fn bucket_for(hash: u64, bucket_count: usize) -> usize {
    debug_assert!(bucket_count > 0);
    // The remainder is below `bucket_count`, so it fits in usize.
    (hash % bucket_count as u64) as usize
}

#[derive(Debug)]
pub(crate) struct BucketIndex {
    buckets: Vec<Vec<Position>>,
}

impl BucketIndex {
    /// A table with a single empty bucket.
    pub(crate) fn new() -> Self {
        Self {
            buckets: vec![Vec::new()],
        }
    }

    #[inline]
    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        bucket_for(hash, self.buckets.len())
    }

    pub(crate) fn bucket_len(&self, bucket: usize) -> usize {
        self.buckets.get(bucket).map_or(0, Vec::len)
    }

    #[cfg(test)]
    pub(crate) fn marker_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Find the marker whose successor holds `key`, returning the marker's
    /// slot and the predecessor position it stores.
    pub(crate) fn locate_predecessor<K, V, Q>(
        &self,
        bucket: usize,
        hash: u64,
        key: &Q,
        entries: &EntrySequence<K, V>,
    ) -> Option<(MarkerSlot, Position)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let markers = self.buckets.get(bucket)?;
        markers.iter().enumerate().find_map(|(i, &prev)| {
            let node = entries.node(entries.successor(prev)?)?;
            (node.hash == hash && node.key.borrow() == key).then_some((i, prev))
        })
    }

    /// Find the marker whose successor is the entry at `slot`. Compares
    /// slots only, so no user `Eq` runs.
    pub(crate) fn locate_marker<K, V>(
        &self,
        bucket: usize,
        slot: DefaultKey,
        entries: &EntrySequence<K, V>,
    ) -> Option<MarkerSlot> {
        let markers = self.buckets.get(bucket)?;
        markers
            .iter()
            .position(|&prev| entries.successor(prev) == Some(slot))
    }

    #[cfg(test)]
    pub(crate) fn marker(&self, bucket: usize, marker: MarkerSlot) -> Option<Position> {
        self.buckets.get(bucket)?.get(marker).copied()
    }

    #[inline]
    pub(crate) fn add_marker(&mut self, bucket: usize, prev: Position) {
        if let Some(markers) = self.buckets.get_mut(bucket) {
            markers.push(prev);
        }
    }

    pub(crate) fn set_marker(&mut self, bucket: usize, marker: MarkerSlot, prev: Position) {
        if let Some(m) = self
            .buckets
            .get_mut(bucket)
            .and_then(|markers| markers.get_mut(marker))
        {
            *m = prev;
        }
    }

    /// Remove a marker in O(1); the bucket's last marker takes its slot.
    pub(crate) fn remove_marker(
        &mut self,
        bucket: usize,
        marker: MarkerSlot,
    ) -> Option<Position> {
        let markers = self.buckets.get_mut(bucket)?;
        (marker < markers.len()).then(|| markers.swap_remove(marker))
    }

    /// Grow to `bucket_count` buckets. Existing markers stay where they
    /// are; the caller moves any whose bucket changed.
    pub(crate) fn resize(&mut self, bucket_count: usize) {
        debug_assert!(bucket_count >= self.buckets.len(), "bucket index never shrinks");
        self.buckets.resize_with(bucket_count, Vec::new);
    }

    /// Drop every marker, keeping the bucket count.
    pub(crate) fn clear(&mut self) {
        for markers in &mut self.buckets {
            markers.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn buckets(&self) -> impl Iterator<Item = (usize, &[Position])> {
        self.buckets
            .iter()
            .enumerate()
            .map(|(i, markers)| (i, markers.as_slice()))
    }
}
