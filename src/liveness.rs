//! LivenessComparer: equality and hashing across tokens and strong keys.
//!
//! The backing store holds only tokens, while callers look things up with
//! ordinary borrowed keys. Both sides are wrapped in a [`Probe`] and
//! compared here, so the alive/dead cross-cases are decided in one place:
//!
//! | x            | y            | equal iff                         |
//! |--------------|--------------|-----------------------------------|
//! | alive token  | alive token  | resolved keys are equal           |
//! | alive token  | dead token   | never                             |
//! | alive token  | strong key   | resolved key equals the strong key|
//! | dead token   | dead token   | same token instance               |
//! | dead token   | strong key   | never                             |
//! | strong key   | strong key   | ordinary `Eq`                     |
//!
//! Dead tokens only ever equal themselves. Without that rule two unrelated
//! dead entries would collapse into one during probing.

use crate::token::WeakToken;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

/// One side of a comparison: a stored token or a caller-supplied key.
pub enum Probe<'a, K, Q: ?Sized = K> {
    Token(&'a WeakToken<K>),
    Strong(&'a Q),
}

impl<'a, K, Q: ?Sized> Clone for Probe<'a, K, Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K, Q: ?Sized> Copy for Probe<'a, K, Q> {}

/// Equality/hash strategy the map hands to its backing store.
#[derive(Clone, Debug, Default)]
pub struct LivenessComparer<S> {
    hasher: S,
}

impl<S: BuildHasher> LivenessComparer<S> {
    pub fn new(hasher: S) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Hash of a strong key; the value a live token for it would cache.
    #[inline]
    pub fn hash_key<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Tokens report their cached hash; strong keys are hashed now.
    #[inline]
    pub fn hash<K, Q>(&self, x: Probe<'_, K, Q>) -> u64
    where
        Q: ?Sized + Hash,
    {
        match x {
            Probe::Token(t) => t.hash_code(),
            Probe::Strong(q) => self.hash_key(q),
        }
    }

    pub fn eq<K, Q>(&self, x: Probe<'_, K, Q>, y: Probe<'_, K, Q>) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        match (x, y) {
            (Probe::Strong(a), Probe::Strong(b)) => a == b,
            (Probe::Token(t), Probe::Strong(q)) | (Probe::Strong(q), Probe::Token(t)) => {
                match t.try_resolve() {
                    Some(k) => <K as Borrow<Q>>::borrow(&k) == q,
                    None => false,
                }
            }
            (Probe::Token(a), Probe::Token(b)) => match (a.try_resolve(), b.try_resolve()) {
                (Some(ka), Some(kb)) => {
                    <K as Borrow<Q>>::borrow(&ka) == <K as Borrow<Q>>::borrow(&kb)
                }
                (None, None) => a.is_same_token(b),
                _ => false,
            },
        }
    }

    /// Shorthand for the common probe shape: stored token vs. caller key.
    #[inline]
    pub fn token_matches<K, Q>(&self, token: &WeakToken<K>, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.eq(Probe::Token(token), Probe::Strong(q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::RandomState;
    use std::rc::Rc;

    fn cmp() -> LivenessComparer<RandomState> {
        LivenessComparer::new(RandomState::new())
    }

    fn tok(c: &LivenessComparer<RandomState>, k: &Rc<String>) -> WeakToken<String> {
        WeakToken::with_hasher(k, c.hasher())
    }

    #[test]
    fn alive_tokens_compare_by_key() {
        let c = cmp();
        let a = Rc::new("x".to_string());
        let b = Rc::new("x".to_string());
        let other = Rc::new("y".to_string());
        let (ta, tb, to) = (tok(&c, &a), tok(&c, &b), tok(&c, &other));
        assert!(c.eq::<String, String>(Probe::Token(&ta), Probe::Token(&tb)));
        assert!(!c.eq::<String, String>(Probe::Token(&ta), Probe::Token(&to)));
    }

    #[test]
    fn alive_and_dead_tokens_never_equal() {
        let c = cmp();
        let a = Rc::new("x".to_string());
        let b = Rc::new("x".to_string());
        let (ta, tb) = (tok(&c, &a), tok(&c, &b));
        drop(b);
        assert!(!c.eq::<String, String>(Probe::Token(&ta), Probe::Token(&tb)));
        assert!(!c.eq::<String, String>(Probe::Token(&tb), Probe::Token(&ta)));
    }

    #[test]
    fn token_against_strong_key() {
        let c = cmp();
        let a = Rc::new("x".to_string());
        let ta = tok(&c, &a);
        assert!(c.token_matches(&ta, "x"));
        assert!(!c.token_matches(&ta, "y"));
        assert!(c.eq::<String, str>(Probe::Strong("x"), Probe::Token(&ta)));
        drop(a);
        assert!(!c.token_matches(&ta, "x"));
        assert!(!c.eq::<String, str>(Probe::Strong("x"), Probe::Token(&ta)));
    }

    /// Invariant: two dead tokens for equal keys do not merge; a dead token
    /// still equals itself so the store can find it for removal.
    #[test]
    fn dead_tokens_compare_by_identity() {
        let c = cmp();
        let a = Rc::new("x".to_string());
        let b = Rc::new("x".to_string());
        let (ta, tb) = (tok(&c, &a), tok(&c, &b));
        drop(a);
        drop(b);
        assert!(!c.eq::<String, String>(Probe::Token(&ta), Probe::Token(&tb)));
        assert!(c.eq::<String, String>(Probe::Token(&ta), Probe::Token(&ta)));
    }

    #[test]
    fn strong_keys_use_plain_equality() {
        let c = cmp();
        assert!(c.eq::<String, str>(Probe::Strong("a"), Probe::Strong("a")));
        assert!(!c.eq::<String, str>(Probe::Strong("a"), Probe::Strong("b")));
    }

    /// Invariant: a strong key hashes to the bucket its token was put in,
    /// before and after the token's key dies.
    #[test]
    fn hashes_agree_between_token_and_key() {
        let c = cmp();
        let a = Rc::new("x".to_string());
        let ta = tok(&c, &a);
        let h_key = c.hash::<String, str>(Probe::Strong("x"));
        assert_eq!(c.hash::<String, str>(Probe::Token(&ta)), h_key);
        drop(a);
        assert_eq!(c.hash::<String, str>(Probe::Token(&ta)), h_key);
    }
}
