//! WeakMap: the public facade over `TokenTable`, `LivenessComparer` and a
//! `SweepPolicy`.

use crate::error::InsertError;
use crate::liveness::LivenessComparer;
use crate::store::{self, Handle, TokenTable, Upsert};
use crate::sweep::{IntervalSweep, SweepPolicy};
use crate::token::WeakToken;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::collections::hash_map::RandomState;
use std::rc::Rc;

/// A hash map that holds its keys weakly.
///
/// Keys are passed in as `&Rc<K>` and stored as `Weak<K>`. Once every
/// `Rc` to a key is dropped elsewhere, its entry stops being visible to
/// lookups and iteration, and is physically removed by the next sweep.
/// When sweeps run is decided by the policy `P`; `len` always forces one.
///
/// ```
/// use std::rc::Rc;
/// use weak_hashmap::WeakMap;
///
/// let mut m = WeakMap::new();
/// let a = Rc::new("a".to_string());
/// let b = Rc::new("b".to_string());
/// m.insert(&a, 1);
/// m.insert(&b, 2);
/// drop(b);
///
/// assert_eq!(m.get("a"), Some(&1));
/// assert_eq!(m.get("b"), None);
/// assert_eq!(m.len(), 1);
/// ```
pub struct WeakMap<K, V, P = IntervalSweep, S = RandomState> {
    table: TokenTable<K, V>,
    comparer: LivenessComparer<S>,
    policy: P,
}

impl<K, V> WeakMap<K, V>
where
    K: Eq + Hash,
{
    /// Empty map sweeping at most once per
    /// [`DEFAULT_SWEEP_INTERVAL`](crate::sweep::DEFAULT_SWEEP_INTERVAL).
    pub fn new() -> Self {
        Self::with_policy(IntervalSweep::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_policy(capacity, IntervalSweep::new())
    }
}

impl<K, V, P> WeakMap<K, V, P>
where
    K: Eq + Hash,
    P: SweepPolicy,
{
    pub fn with_policy(policy: P) -> Self {
        Self::with_policy_and_hasher(policy, RandomState::new())
    }

    pub fn with_capacity_and_policy(capacity: usize, policy: P) -> Self {
        Self {
            table: TokenTable::with_capacity(capacity),
            comparer: LivenessComparer::new(RandomState::new()),
            policy,
        }
    }
}

impl<K, V, P, S> WeakMap<K, V, P, S>
where
    S: BuildHasher,
{
    pub fn with_policy_and_hasher(policy: P, hasher: S) -> Self {
        Self {
            table: TokenTable::new(),
            comparer: LivenessComparer::new(hasher),
            policy,
        }
    }

    pub fn hasher(&self) -> &S {
        self.comparer.hasher()
    }
}

impl<K, V, P, S> WeakMap<K, V, P, S> {
    /// Stored entries including dead ones not yet swept: an upper bound on
    /// the live count. O(1).
    pub fn raw_len(&self) -> usize {
        self.table.len()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Live entries as `(key, &value)`. Keys are resolved as each entry
    /// is visited; entries whose key died are skipped, not removed.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Live keys. Each yielded `Rc` keeps its key alive while held.
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

impl<K, V, P, S> WeakMap<K, V, P, S>
where
    K: Eq + Hash,
    P: SweepPolicy,
    S: BuildHasher,
{
    fn find_handle<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.comparer.hash_key(q);
        let cmp = &self.comparer;
        self.table.find(hash, |t| cmp.token_matches(t, q))
    }

    fn maybe_sweep(&mut self) {
        if self.policy.should_sweep(self.table.len()) {
            self.sweep();
        }
    }

    // Store without consulting the policy.
    fn put(&mut self, key: &Rc<K>, value: V) -> Option<V> {
        let hash = self.comparer.hash_key(&**key);
        let token = WeakToken::new(key, hash);
        let cmp = &self.comparer;
        match self
            .table
            .upsert(token, value, |t| cmp.token_matches::<K, K>(t, key))
        {
            Upsert::Replaced(_, old) => Some(old),
            Upsert::Inserted(_) => None,
        }
    }

    /// Purge every entry whose key has died. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let removed = self.table.retain(|t, _| t.is_alive());
        self.policy.record_sweep();
        log::debug!(
            "weak map sweep removed {} dead entries, {} remain",
            removed,
            self.table.len()
        );
        removed
    }

    /// Exact number of live entries. Sweeps first, so this is O(n).
    pub fn len(&mut self) -> usize {
        self.sweep();
        self.table.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Map `key` to `value`. If an equal live key is present its value is
    /// replaced and returned; the originally stored key is kept.
    pub fn insert(&mut self, key: &Rc<K>, value: V) -> Option<V> {
        self.maybe_sweep();
        self.put(key, value)
    }

    /// Insert only if no equal live key is present.
    pub fn try_insert(&mut self, key: &Rc<K>, value: V) -> Result<(), InsertError> {
        self.maybe_sweep();
        if self.find_handle::<K>(key).is_some() {
            return Err(InsertError::DuplicateKey);
        }
        self.put(key, value);
        Ok(())
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find_handle(key)?;
        self.table.value(h)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find_handle(key)?;
        self.table.value_mut(h)
    }

    /// The stored key (which may be a different `Rc` than `key` came from)
    /// and its value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(Rc<K>, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find_handle(key)?;
        let k = self.table.token(h)?.try_resolve()?;
        Some((k, self.table.value(h)?))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_handle(key).is_some()
    }

    /// Remove the entry for an equal live key. A key that has already died
    /// is simply not found.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(Rc<K>, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.maybe_sweep();
        let h = self.find_handle(key)?;
        let (token, value) = self.table.remove(h)?;
        Some((token.try_resolve()?, value))
    }

    /// Keep only live entries for which `f` returns true. Doubles as a
    /// sweep: dead entries are dropped without calling `f`.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&Rc<K>, &mut V) -> bool,
    {
        let removed = self.table.retain(|t, v| match t.try_resolve() {
            Some(k) => f(&k, v),
            None => false,
        });
        self.policy.record_sweep();
        log::debug!("weak map retain removed {} entries", removed);
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.policy.record_sweep();
    }
}

impl<K, V, P, S> Default for WeakMap<K, V, P, S>
where
    P: Default,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_policy_and_hasher(P::default(), S::default())
    }
}

impl<K, Q, V, P, S> Index<&Q> for WeakMap<K, V, P, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    P: SweepPolicy,
    S: BuildHasher,
{
    type Output = V;

    /// Panics if no live entry for `key` exists.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no live entry found for key")
    }
}

impl<'a, K, V, P, S> Extend<(&'a Rc<K>, V)> for WeakMap<K, V, P, S>
where
    K: Eq + Hash,
    P: SweepPolicy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (&'a Rc<K>, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, P, S> FromIterator<(&'a Rc<K>, V)> for WeakMap<K, V, P, S>
where
    K: Eq + Hash,
    P: SweepPolicy + Default,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (&'a Rc<K>, V)>>(iter: I) -> Self {
        let mut m = Self::default();
        m.extend(iter);
        m
    }
}

impl<K, V, P, S> fmt::Debug for WeakMap<K, V, P, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, P, S> IntoIterator for &'a WeakMap<K, V, P, S> {
    type Item = (Rc<K>, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, P, S> IntoIterator for &'a mut WeakMap<K, V, P, S> {
    type Item = (Rc<K>, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// Iterator over live entries of a [`WeakMap`].
pub struct Iter<'a, K, V> {
    inner: store::Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Rc<K>, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find_map(|(_h, t, v)| t.try_resolve().map(|k| (k, v)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

/// Mutable iterator over live entries of a [`WeakMap`].
pub struct IterMut<'a, K, V> {
    inner: store::IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (Rc<K>, &'a mut V);
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find_map(|(_h, t, v)| t.try_resolve().map(|k| (k, v)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

/// Live keys of a [`WeakMap`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = Rc<K>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// Values of live entries of a [`WeakMap`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}
