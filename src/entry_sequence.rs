//! EntrySequence: forward-only linked storage for map entries.
//!
//! Nodes live in a `SlotMap` arena and link to their successor by slot
//! key. The only structural edits are "insert after" and "remove after",
//! so a node's slot stays valid until that node itself is removed.

use slotmap::{DefaultKey, SecondaryMap, SlotMap};

/// A location in the sequence from which "insert after" and "remove after"
/// are valid.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Position {
    /// Sentinel preceding the first node. Always valid.
    BeforeFirst,
    /// The node stored at this slot.
    At(DefaultKey),
}

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    // Hash of `key` under the owning map's hasher, cached at insertion.
    pub(crate) hash: u64,
    next: Option<DefaultKey>,
}

#[derive(Debug)]
pub(crate) struct EntrySequence<K, V> {
    nodes: SlotMap<DefaultKey, Node<K, V>>,
    head: Option<DefaultKey>,
}

impl<K, V> EntrySequence<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Slot of the first node, or `None` when the sequence is empty.
    #[inline]
    pub(crate) fn first(&self) -> Option<DefaultKey> {
        self.head
    }

    /// Slot of the node following `pos`; `None` marks the end.
    #[inline]
    pub(crate) fn successor(&self, pos: Position) -> Option<DefaultKey> {
        match pos {
            Position::BeforeFirst => self.head,
            Position::At(slot) => self.nodes.get(slot).and_then(|n| n.next),
        }
    }

    #[inline]
    pub(crate) fn node(&self, slot: DefaultKey) -> Option<&Node<K, V>> {
        self.nodes.get(slot)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, slot: DefaultKey) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(slot)
    }

    /// Link a new node directly after `pos` and return its slot.
    pub(crate) fn insert_after(
        &mut self,
        pos: Position,
        key: K,
        value: V,
        hash: u64,
    ) -> DefaultKey {
        let next = self.successor(pos);
        let slot = self.nodes.insert(Node {
            key,
            value,
            hash,
            next,
        });
        match pos {
            Position::BeforeFirst => self.head = Some(slot),
            Position::At(prev) => {
                debug_assert!(self.nodes.contains_key(prev), "insert after a removed node");
                if let Some(p) = self.nodes.get_mut(prev) {
                    p.next = Some(slot);
                }
            }
        }
        slot
    }

    /// Unlink and return the node directly after `pos`, if there is one.
    pub(crate) fn remove_after(&mut self, pos: Position) -> Option<(K, V)> {
        let target = self.successor(pos)?;
        let node = self.nodes.remove(target)?;
        match pos {
            Position::BeforeFirst => self.head = node.next,
            Position::At(prev) => {
                if let Some(p) = self.nodes.get_mut(prev) {
                    p.next = node.next;
                }
            }
        }
        Some((node.key, node.value))
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
    }

    /// Forward walk from the first node to the end.
    pub(crate) fn walk(&self) -> Walk<'_, K, V> {
        Walk {
            nodes: &self.nodes,
            cursor: self.head,
            remaining: self.nodes.len(),
        }
    }

    /// Forward walk over every node after `pos`.
    #[cfg(test)]
    pub(crate) fn walk_from(&self, pos: Position) -> Walk<'_, K, V> {
        let cursor = self.successor(pos);
        let mut remaining = 0;
        let mut at = cursor;
        while let Some(slot) = at {
            remaining += 1;
            at = self.nodes.get(slot).and_then(|n| n.next);
        }
        Walk {
            nodes: &self.nodes,
            cursor,
            remaining,
        }
    }

    /// Forward walk handing out every node mutably, in link order.
    pub(crate) fn walk_mut(&mut self) -> WalkMut<'_, K, V> {
        let mut rank: SecondaryMap<DefaultKey, usize> =
            SecondaryMap::with_capacity(self.nodes.len());
        for (i, (slot, _)) in self.walk().enumerate() {
            rank.insert(slot, i);
        }
        let mut ordered: Vec<Option<&mut Node<K, V>>> = Vec::new();
        ordered.resize_with(rank.len(), || None);
        for (slot, node) in self.nodes.iter_mut() {
            if let Some(&i) = rank.get(slot) {
                ordered[i] = Some(node);
            }
        }
        WalkMut {
            nodes: ordered.into_iter().flatten().collect::<Vec<_>>().into_iter(),
        }
    }
}

/// Borrowing cursor that follows `next` links.
#[derive(Debug)]
pub(crate) struct Walk<'a, K, V> {
    nodes: &'a SlotMap<DefaultKey, Node<K, V>>,
    cursor: Option<DefaultKey>,
    remaining: usize,
}

impl<K, V> Clone for Walk<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes,
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Walk<'a, K, V> {
    type Item = (DefaultKey, &'a Node<K, V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let node = self.nodes.get(slot)?;
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((slot, node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Walk<'_, K, V> {}

/// Mutable counterpart of [`Walk`]. The link order is resolved up front,
/// since `&mut` borrows cannot follow `next` links through the arena.
pub(crate) struct WalkMut<'a, K, V> {
    nodes: std::vec::IntoIter<&'a mut Node<K, V>>,
}

impl<'a, K, V> Iterator for WalkMut<'a, K, V> {
    type Item = &'a mut Node<K, V>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.nodes.size_hint()
    }
}

impl<K, V> ExactSizeIterator for WalkMut<'_, K, V> {}
