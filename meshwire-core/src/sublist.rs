//! Subscription index layered on top of the Subject Tree.

use crate::subject::{validate_filter, SubjectError};
use crate::tree::SubjectTree;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// A single subscription: a filter subject, an optional queue-group label,
/// and an opaque reference to the owning client.
#[derive(Debug, Clone)]
pub struct Subscription<C> {
    pub subject: Box<[u8]>,
    pub queue: Box<[u8]>,
    pub client: C,
}

impl<C> Subscription<C> {
    #[must_use]
    pub fn new(subject: impl Into<Box<[u8]>>, queue: impl Into<Box<[u8]>>, client: C) -> Self {
        Self { subject: subject.into(), queue: queue.into(), client }
    }

    #[must_use]
    pub fn subject(&self) -> &[u8] {
        &self.subject
    }

    #[must_use]
    pub fn queue(&self) -> &[u8] {
        &self.queue
    }
}

/// Maps a concrete subject to the set of subscriptions whose filter matches
/// it. Exact (wildcard-free) subjects are served from a cache keyed directly
/// by subject bytes; everything else walks the Subject Tree.
pub struct Sublist<C: Clone> {
    tree: SubjectTree<SmallVec<[Subscription<C>; 2]>>,
    exact_cache: HashMap<Box<[u8]>, SmallVec<[Subscription<C>; 2]>>,
}

impl<C: Clone> Default for Sublist<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clone> Sublist<C> {
    #[must_use]
    pub fn new() -> Self {
        Self { tree: SubjectTree::new(), exact_cache: HashMap::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Index a subscription under its filter subject.
    pub fn insert(&mut self, sub: Subscription<C>) -> Result<(), SubjectError> {
        validate_filter(&sub.subject)?;
        if !sub.subject.contains(&b'*') && !sub.subject.contains(&b'>') {
            self.exact_cache
                .entry(sub.subject.clone())
                .or_default()
                .push(sub.clone());
        }
        let subject = sub.subject.clone();
        let mut bucket = self.tree.find(&subject).cloned().unwrap_or_default();
        bucket.push(sub);
        self.tree.insert(&subject, bucket)?;
        Ok(())
    }

    /// Remove one indexed entry for `subject`. If several subscriptions share
    /// the same subject, all equal entries for that subject are removed —
    /// the index does not distinguish between clients at this level; callers
    /// wanting per-client removal should filter by client id after matching.
    pub fn remove(&mut self, subject: &[u8]) {
        self.exact_cache.remove(subject);
        self.tree.delete(subject);
    }

    /// Remove a single subscription belonging to `client_eq` (compared with
    /// the supplied predicate) under `subject`, leaving any others in place.
    pub fn remove_one<F: Fn(&C) -> bool>(&mut self, subject: &[u8], client_eq: F) {
        if let Some(bucket) = self.exact_cache.get_mut(subject) {
            if let Some(pos) = bucket.iter().position(|s| client_eq(&s.client)) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.exact_cache.remove(subject);
            }
        }
        if let Some(bucket) = self.tree.find(subject) {
            let mut bucket = bucket.clone();
            if let Some(pos) = bucket.iter().position(|s| client_eq(&s.client)) {
                bucket.remove(pos);
            }
            self.tree.delete(subject);
            if !bucket.is_empty() {
                self.tree.insert(subject, bucket).unwrap();
            }
        }
    }

    /// Subscriptions whose filter matches `subject`, deduplicated across the
    /// exact-cache and tree-walk paths. The exact-cache entry for `subject`
    /// (if any) duplicates the tree's literal-filter entry at the same key,
    /// so the tree walk skips that one key and only contributes wildcard
    /// filters.
    #[must_use]
    pub fn matches(&self, subject: &[u8]) -> Vec<Subscription<C>> {
        let mut out: Vec<Subscription<C>> =
            self.exact_cache.get(subject).map(|bucket| bucket.to_vec()).unwrap_or_default();
        self.tree.match_subject(subject, |filter, bucket| {
            if filter != subject {
                out.extend(bucket.iter().cloned());
            }
            true
        });
        out
    }

    #[must_use]
    pub fn has_interest(&self, subject: &[u8]) -> bool {
        if self.exact_cache.contains_key(subject) {
            return true;
        }
        let mut found = false;
        self.tree.match_subject(subject, |_filter, bucket| {
            if !bucket.is_empty() {
                found = true;
                false
            } else {
                true
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_single_subscriber() {
        let mut sl: Sublist<u64> = Sublist::new();
        sl.insert(Subscription::new(&b"foo.bar"[..], &b""[..], 1)).unwrap();
        let hits = sl.matches(b"foo.bar");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].client, 1);
    }

    #[test]
    fn wildcard_match_dedups_across_paths() {
        let mut sl: Sublist<u64> = Sublist::new();
        sl.insert(Subscription::new(&b"a.*"[..], &b""[..], 1)).unwrap();
        sl.insert(Subscription::new(&b"a.b"[..], &b""[..], 2)).unwrap();
        let mut hits: Vec<u64> = sl.matches(b"a.b").iter().map(|s| s.client).collect();
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);
    }

    #[test]
    fn remove_one_leaves_siblings() {
        let mut sl: Sublist<u64> = Sublist::new();
        sl.insert(Subscription::new(&b"x"[..], &b""[..], 1)).unwrap();
        sl.insert(Subscription::new(&b"x"[..], &b""[..], 2)).unwrap();
        sl.remove_one(b"x", |c| *c == 1);
        let hits: Vec<u64> = sl.matches(b"x").iter().map(|s| s.client).collect();
        assert_eq!(hits, vec![2]);
    }

    #[test]
    fn has_interest_reflects_removal() {
        let mut sl: Sublist<u64> = Sublist::new();
        sl.insert(Subscription::new(&b"y.*"[..], &b""[..], 1)).unwrap();
        assert!(sl.has_interest(b"y.1"));
        sl.remove(b"y.*");
        assert!(!sl.has_interest(b"y.1"));
    }
}
