//! TokenTable: structural layer holding `(WeakToken, V)` entries behind
//! stable handles.
//!
//! The table never hashes or compares keys on its own. Lookups take a hash
//! and an equality closure from the caller (the map passes its
//! `LivenessComparer`), and rehashing on growth uses only the hash cached
//! in each token. That keeps dead entries reachable: their key is gone, but
//! the bucket they live in is still known.

use crate::token::WeakToken;
use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }
}

#[derive(Debug)]
struct Entry<K, V> {
    token: WeakToken<K>,
    value: V,
}

pub struct TokenTable<K, V> {
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
}

/// Outcome of [`TokenTable::upsert`].
#[derive(Debug)]
pub enum Upsert<V> {
    /// A matching entry existed; its value was replaced.
    Replaced(Handle, V),
    /// No match; the token was stored as a new entry.
    Inserted(Handle),
}

impl<K, V> Default for TokenTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over every stored entry, dead or alive.
pub struct Iter<'a, K, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Handle, &'a WeakToken<K>, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (Handle::new(k), &e.token, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Mutable iterator over every stored entry, dead or alive.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (Handle, &'a WeakToken<K>, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (Handle::new(k), &e.token, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> TokenTable<K, V> {
    pub fn new() -> Self {
        Self {
            index: HashTable::new(),
            slots: SlotMap::with_key(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashTable::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    /// Number of stored entries, including ones whose key has died.
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Find the entry in bucket `hash` for which `eq` holds.
    pub fn find<F>(&self, hash: u64, mut eq: F) -> Option<Handle>
    where
        F: FnMut(&WeakToken<K>) -> bool,
    {
        self.index
            .find(hash, |&k| self.slots.get(k).map(|e| eq(&e.token)).unwrap_or(false))
            .map(|&k| Handle::new(k))
    }

    /// Replace the value of the entry matching `eq`, or store `token` with
    /// `value` as a new entry. On replace the stored token is kept and
    /// `token` is dropped.
    pub fn upsert<F>(&mut self, token: WeakToken<K>, value: V, mut eq: F) -> Upsert<V>
    where
        F: FnMut(&WeakToken<K>) -> bool,
    {
        let hash = token.hash_code();
        let slots = &mut self.slots;
        match self.index.entry(
            hash,
            |&kk| slots.get(kk).map(|e| eq(&e.token)).unwrap_or(false),
            |&kk| slots.get(kk).map(|e| e.token.hash_code()).unwrap_or(0),
        ) {
            TableEntry::Occupied(o) => {
                let k = *o.get();
                match slots.get_mut(k) {
                    Some(e) => {
                        let old = core::mem::replace(&mut e.value, value);
                        Upsert::Replaced(Handle::new(k), old)
                    }
                    // Only reachable if the index outlived its slot; relink.
                    None => {
                        let (_, vacant) = o.remove();
                        let k = slots.insert(Entry { token, value });
                        let _ = vacant.insert(k);
                        Upsert::Inserted(Handle::new(k))
                    }
                }
            }
            TableEntry::Vacant(v) => {
                let k = slots.insert(Entry { token, value });
                let _ = v.insert(k);
                Upsert::Inserted(Handle::new(k))
            }
        }
    }

    pub fn remove(&mut self, handle: Handle) -> Option<(WeakToken<K>, V)> {
        let k = handle.raw_handle();
        let entry = self.slots.remove(k)?;
        if let Ok(found) = self.index.find_entry(entry.token.hash_code(), |&kk| kk == k) {
            found.remove();
        }
        Some((entry.token, entry.value))
    }

    /// Keep only entries for which `keep` returns true; returns how many
    /// were removed. Runs to completion: the index and slots are consistent
    /// again before it returns.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&WeakToken<K>, &mut V) -> bool,
    {
        let before = self.slots.len();
        let slots = &mut self.slots;
        self.index.retain(|&mut k| {
            let kept = match slots.get_mut(k) {
                Some(e) => keep(&e.token, &mut e.value),
                None => return false,
            };
            if !kept {
                slots.remove(k);
            }
            kept
        });
        before - self.slots.len()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
    }

    pub fn token(&self, h: Handle) -> Option<&WeakToken<K>> {
        self.slots.get(h.raw_handle()).map(|e| &e.token)
    }

    pub fn value(&self, h: Handle) -> Option<&V> {
        self.slots.get(h.raw_handle()).map(|e| &e.value)
    }

    pub fn value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.slots.get_mut(h.raw_handle()).map(|e| &mut e.value)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.slots.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.slots.iter_mut(),
        }
    }
}
