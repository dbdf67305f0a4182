//! Weak key tokens.
//!
//! A token is what the map actually stores in place of a key: a
//! non-owning `Weak<K>` plus the key's hash, computed exactly once when
//! the token is minted. The hash is never recomputed, so a token whose
//! key has been dropped can still be located (and removed) by a sweep.

use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::rc::{Rc, Weak};

/// Non-owning handle to a key with a hash code captured at creation.
pub struct WeakToken<K> {
    key: Weak<K>,
    hash: u64,
}

impl<K> WeakToken<K> {
    /// Mint a token from an owning handle and a precomputed hash.
    pub(crate) fn new(key: &Rc<K>, hash: u64) -> Self {
        Self {
            key: Rc::downgrade(key),
            hash,
        }
    }

    /// Mint a token, hashing the key with `hasher`.
    pub fn with_hasher<S>(key: &Rc<K>, hasher: &S) -> Self
    where
        K: Hash,
        S: BuildHasher,
    {
        let hash = hasher.hash_one(&**key);
        Self::new(key, hash)
    }

    /// The key, if some owner still holds it.
    #[inline]
    pub fn try_resolve(&self) -> Option<Rc<K>> {
        self.key.upgrade()
    }

    /// Hash captured at creation. Independent of liveness.
    #[inline]
    pub fn hash_code(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.key.strong_count() > 0
    }

    /// Identity comparison: true only for the very same token instance.
    #[inline]
    pub fn is_same_token(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }

    /// True if both tokens were minted from the same key allocation.
    ///
    /// Stays meaningful after death: the allocation is kept until the
    /// last `Weak` goes away, so addresses cannot be reused meanwhile.
    #[inline]
    pub fn points_to_same_key(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.key, &other.key)
    }
}

impl<K> fmt::Debug for WeakToken<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakToken")
            .field("hash", &format_args!("{:#018x}", self.hash))
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::RandomState;

    #[test]
    fn resolves_while_owner_lives() {
        let s = RandomState::new();
        let key = Rc::new("k".to_string());
        let t = WeakToken::with_hasher(&key, &s);
        assert!(t.is_alive());
        assert_eq!(t.try_resolve().as_deref(), Some(&"k".to_string()));
        drop(key);
        assert!(!t.is_alive());
        assert!(t.try_resolve().is_none());
    }

    #[test]
    fn token_does_not_keep_key_alive() {
        let s = RandomState::new();
        let key = Rc::new(7u32);
        let t = WeakToken::with_hasher(&key, &s);
        assert_eq!(Rc::strong_count(&key), 1);
        assert_eq!(Rc::weak_count(&key), 1);
        drop(t);
        assert_eq!(Rc::weak_count(&key), 0);
    }

    /// Invariant: the cached hash survives the key's death unchanged.
    #[test]
    fn hash_is_stable_across_death() {
        let s = RandomState::new();
        let key = Rc::new(String::from("stable"));
        let expected = s.hash_one("stable");
        let t = WeakToken::with_hasher(&key, &s);
        let before = t.hash_code();
        drop(key);
        assert_eq!(before, expected);
        assert_eq!(t.hash_code(), before);
    }

    #[test]
    fn identity_versus_allocation() {
        let key = Rc::new(1u8);
        let a = WeakToken::new(&key, 1);
        let b = WeakToken::new(&key, 1);
        assert!(a.is_same_token(&a));
        assert!(!a.is_same_token(&b));
        assert!(a.points_to_same_key(&b));
        drop(key);
        assert!(a.points_to_same_key(&b));
    }
}
