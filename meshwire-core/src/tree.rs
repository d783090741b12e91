//! Adaptive radix tree keyed by subject bytes, generic over a stored value.
//!
//! Node size classes grow on overflow and shrink on underflow following the
//! thresholds in the data model: node4 <= 4 children, node10 5-10, node16
//! 11-16, node48 17-48, node256 above that. [`RESERVED_BYTE`] is used
//! internally as the discriminator for a value whose subject terminates
//! exactly at an internal node's prefix boundary (no further bytes).

use crate::subject::{is_wild_one, is_wild_tail, tokenize, SubjectError, RESERVED_BYTE, SEPARATOR};

const N4_CAP: usize = 4;
const N10_CAP: usize = 10;
const N16_CAP: usize = 16;
const N48_CAP: usize = 48;

enum Node<T> {
    Leaf(Box<[u8]>, T),
    Internal(Internal<T>),
}

struct Internal<T> {
    prefix: Box<[u8]>,
    children: Children<T>,
}

/// Vec-backed child map, sorted by discriminator byte, used for the 4/10/16/48
/// size classes. The const generic is a logical capacity, not a fixed-size
/// array: growth to the next class is decided by comparing `len()` to `CAP`.
struct SmallChildren<T, const CAP: usize> {
    entries: Vec<(u8, Box<Node<T>>)>,
}

impl<T, const CAP: usize> SmallChildren<T, CAP> {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, disc: u8) -> Option<&Box<Node<T>>> {
        self.entries
            .binary_search_by_key(&disc, |(k, _)| *k)
            .ok()
            .map(|i| &self.entries[i].1)
    }

    fn remove(&mut self, disc: u8) -> Option<Box<Node<T>>> {
        self.entries
            .binary_search_by_key(&disc, |(k, _)| *k)
            .ok()
            .map(|i| self.entries.remove(i).1)
    }

    fn put_existing(&mut self, disc: u8, node: Box<Node<T>>) {
        match self.entries.binary_search_by_key(&disc, |(k, _)| *k) {
            Ok(i) => self.entries[i].1 = node,
            Err(i) => self.entries.insert(i, (disc, node)),
        }
    }

    /// Insert a brand-new key, failing (returning the pieces back) when the
    /// class is already at capacity and the key is not already present.
    fn try_insert_new(
        mut self,
        disc: u8,
        node: Box<Node<T>>,
    ) -> Result<Self, (Self, u8, Box<Node<T>>)> {
        match self.entries.binary_search_by_key(&disc, |(k, _)| *k) {
            Ok(i) => {
                self.entries[i].1 = node;
                Ok(self)
            }
            Err(i) => {
                if self.entries.len() >= CAP {
                    Err((self, disc, node))
                } else {
                    self.entries.insert(i, (disc, node));
                    Ok(self)
                }
            }
        }
    }

    fn into_entries(self) -> Vec<(u8, Box<Node<T>>)> {
        self.entries
    }

    fn iter_sorted(&self) -> impl Iterator<Item = (u8, &Box<Node<T>>)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}

/// Array-backed child map for the 256 class: one slot per possible byte.
struct LargeChildren<T> {
    slots: Box<[Option<Box<Node<T>>>]>,
    count: usize,
}

impl<T> LargeChildren<T> {
    fn new() -> Self {
        let slots = std::iter::repeat_with(|| None).take(256).collect::<Vec<_>>();
        Self { slots: slots.into_boxed_slice(), count: 0 }
    }

    fn len(&self) -> usize {
        self.count
    }

    fn get(&self, disc: u8) -> Option<&Box<Node<T>>> {
        self.slots[disc as usize].as_ref()
    }

    fn remove(&mut self, disc: u8) -> Option<Box<Node<T>>> {
        let slot = self.slots[disc as usize].take();
        if slot.is_some() {
            self.count -= 1;
        }
        slot
    }

    fn put_existing(&mut self, disc: u8, node: Box<Node<T>>) {
        if self.slots[disc as usize].is_none() {
            self.count += 1;
        }
        self.slots[disc as usize] = Some(node);
    }

    fn into_entries(self) -> Vec<(u8, Box<Node<T>>)> {
        self.slots
            .into_vec()
            .into_iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|n| (i as u8, n)))
            .collect()
    }

    fn iter_sorted(&self) -> impl Iterator<Item = (u8, &Box<Node<T>>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|n| (i as u8, n)))
    }
}

enum Children<T> {
    N4(SmallChildren<T, N4_CAP>),
    N10(SmallChildren<T, N10_CAP>),
    N16(SmallChildren<T, N16_CAP>),
    N48(SmallChildren<T, N48_CAP>),
    N256(LargeChildren<T>),
}

impl<T> Children<T> {
    fn new() -> Self {
        Self::N4(SmallChildren::new())
    }

    fn len(&self) -> usize {
        match self {
            Self::N4(c) => c.len(),
            Self::N10(c) => c.len(),
            Self::N16(c) => c.len(),
            Self::N48(c) => c.len(),
            Self::N256(c) => c.len(),
        }
    }

    fn get(&self, disc: u8) -> Option<&Box<Node<T>>> {
        match self {
            Self::N4(c) => c.get(disc),
            Self::N10(c) => c.get(disc),
            Self::N16(c) => c.get(disc),
            Self::N48(c) => c.get(disc),
            Self::N256(c) => c.get(disc),
        }
    }

    fn remove(&mut self, disc: u8) -> Option<Box<Node<T>>> {
        match self {
            Self::N4(c) => c.remove(disc),
            Self::N10(c) => c.remove(disc),
            Self::N16(c) => c.remove(disc),
            Self::N48(c) => c.remove(disc),
            Self::N256(c) => c.remove(disc),
        }
    }

    fn put_existing(&mut self, disc: u8, node: Box<Node<T>>) {
        match self {
            Self::N4(c) => c.put_existing(disc, node),
            Self::N10(c) => c.put_existing(disc, node),
            Self::N16(c) => c.put_existing(disc, node),
            Self::N48(c) => c.put_existing(disc, node),
            Self::N256(c) => c.put_existing(disc, node),
        }
    }

    /// Insert a key that is not expected to already exist, growing the node
    /// to the next size class when the current one is full.
    fn insert_new(self, disc: u8, node: Box<Node<T>>) -> Self {
        match self {
            Self::N4(c) => match c.try_insert_new(disc, node) {
                Ok(c) => Self::N4(c),
                Err((c, disc, node)) => {
                    let mut grown = SmallChildren::<T, N10_CAP>::new();
                    for (k, v) in c.into_entries() {
                        grown.put_existing(k, v);
                    }
                    grown.put_existing(disc, node);
                    Self::N10(grown)
                }
            },
            Self::N10(c) => match c.try_insert_new(disc, node) {
                Ok(c) => Self::N10(c),
                Err((c, disc, node)) => {
                    let mut grown = SmallChildren::<T, N16_CAP>::new();
                    for (k, v) in c.into_entries() {
                        grown.put_existing(k, v);
                    }
                    grown.put_existing(disc, node);
                    Self::N16(grown)
                }
            },
            Self::N16(c) => match c.try_insert_new(disc, node) {
                Ok(c) => Self::N16(c),
                Err((c, disc, node)) => {
                    let mut grown = SmallChildren::<T, N48_CAP>::new();
                    for (k, v) in c.into_entries() {
                        grown.put_existing(k, v);
                    }
                    grown.put_existing(disc, node);
                    Self::N48(grown)
                }
            },
            Self::N48(c) => match c.try_insert_new(disc, node) {
                Ok(c) => Self::N48(c),
                Err((c, disc, node)) => {
                    let mut grown = LargeChildren::new();
                    for (k, v) in c.into_entries() {
                        grown.put_existing(k, v);
                    }
                    grown.put_existing(disc, node);
                    Self::N256(grown)
                }
            },
            Self::N256(mut c) => {
                c.put_existing(disc, node);
                Self::N256(c)
            }
        }
    }

    /// Drop to the previous size class when the count has fallen below its
    /// lower bound. No-op if still within the current class's range.
    fn shrink_if_needed(self) -> Self {
        match self {
            Self::N256(c) if c.len() <= N48_CAP => {
                let mut shrunk = SmallChildren::<T, N48_CAP>::new();
                for (k, v) in c.into_entries() {
                    shrunk.put_existing(k, v);
                }
                Self::N48(shrunk)
            }
            Self::N48(c) if c.len() <= N16_CAP => {
                let mut shrunk = SmallChildren::<T, N16_CAP>::new();
                for (k, v) in c.into_entries() {
                    shrunk.put_existing(k, v);
                }
                Self::N16(shrunk)
            }
            Self::N16(c) if c.len() <= N10_CAP => {
                let mut shrunk = SmallChildren::<T, N10_CAP>::new();
                for (k, v) in c.into_entries() {
                    shrunk.put_existing(k, v);
                }
                Self::N10(shrunk)
            }
            Self::N10(c) if c.len() <= N4_CAP => {
                let mut shrunk = SmallChildren::<T, N4_CAP>::new();
                for (k, v) in c.into_entries() {
                    shrunk.put_existing(k, v);
                }
                Self::N4(shrunk)
            }
            other => other,
        }
    }

    fn iter_sorted(&self) -> Box<dyn Iterator<Item = (u8, &Box<Node<T>>)> + '_> {
        match self {
            Self::N4(c) => Box::new(c.iter_sorted()),
            Self::N10(c) => Box::new(c.iter_sorted()),
            Self::N16(c) => Box::new(c.iter_sorted()),
            Self::N48(c) => Box::new(c.iter_sorted()),
            Self::N256(c) => Box::new(c.iter_sorted()),
        }
    }

    /// Consume a map known to hold exactly one entry.
    fn take_only(self) -> (u8, Box<Node<T>>) {
        match self {
            Self::N4(c) => c.into_entries().pop().expect("exactly one child"),
            Self::N10(c) => c.into_entries().pop().expect("exactly one child"),
            Self::N16(c) => c.into_entries().pop().expect("exactly one child"),
            Self::N48(c) => c.into_entries().pop().expect("exactly one child"),
            Self::N256(c) => c.into_entries().pop().expect("exactly one child"),
        }
    }
}

fn split_disc(rest: &[u8]) -> (u8, &[u8]) {
    if rest.is_empty() {
        (RESERVED_BYTE, rest)
    } else {
        (rest[0], &rest[1..])
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn split_leaf<T>(old_suffix: Box<[u8]>, old_value: T, new_key: &[u8], new_value: T, common: usize) -> Internal<T> {
    let prefix = old_suffix[..common].to_vec().into_boxed_slice();
    let (old_disc, old_rest) = split_disc(&old_suffix[common..]);
    let (new_disc, new_rest) = split_disc(&new_key[common..]);
    let mut children = Children::new();
    children = children.insert_new(old_disc, Box::new(Node::Leaf(old_rest.to_vec().into_boxed_slice(), old_value)));
    children = children.insert_new(new_disc, Box::new(Node::Leaf(new_rest.to_vec().into_boxed_slice(), new_value)));
    Internal { prefix, children }
}

fn split_internal<T>(internal: Internal<T>, key: &[u8], value: T, common: usize) -> Internal<T> {
    let Internal { prefix, children } = internal;
    let new_prefix = prefix[..common].to_vec().into_boxed_slice();
    let (old_disc, old_rest) = split_disc(&prefix[common..]);
    let old_child = Box::new(Node::Internal(Internal { prefix: old_rest.to_vec().into_boxed_slice(), children }));
    let (new_disc, new_rest) = split_disc(&key[common..]);
    let new_leaf = Box::new(Node::Leaf(new_rest.to_vec().into_boxed_slice(), value));
    let mut new_children = Children::new();
    new_children = new_children.insert_new(old_disc, old_child);
    new_children = new_children.insert_new(new_disc, new_leaf);
    Internal { prefix: new_prefix, children: new_children }
}

fn collapse<T>(prefix: Box<[u8]>, disc: u8, child: Box<Node<T>>) -> Box<Node<T>> {
    if disc == RESERVED_BYTE {
        match *child {
            Node::Leaf(_, value) => Box::new(Node::Leaf(prefix, value)),
            Node::Internal(_) => unreachable!("reserved discriminator must point at a terminal leaf"),
        }
    } else {
        match *child {
            Node::Leaf(suffix, value) => {
                let mut merged = Vec::with_capacity(prefix.len() + 1 + suffix.len());
                merged.extend_from_slice(&prefix);
                merged.push(disc);
                merged.extend_from_slice(&suffix);
                Box::new(Node::Leaf(merged.into_boxed_slice(), value))
            }
            Node::Internal(child_internal) => {
                let mut merged = Vec::with_capacity(prefix.len() + 1 + child_internal.prefix.len());
                merged.extend_from_slice(&prefix);
                merged.push(disc);
                merged.extend_from_slice(&child_internal.prefix);
                Box::new(Node::Internal(Internal { prefix: merged.into_boxed_slice(), children: child_internal.children }))
            }
        }
    }
}

fn find_rec<'a, T>(node: &'a Node<T>, key: &[u8]) -> Option<&'a T> {
    match node {
        Node::Leaf(suffix, value) => {
            if suffix.as_ref() == key {
                Some(value)
            } else {
                None
            }
        }
        Node::Internal(internal) => {
            if key.len() < internal.prefix.len() || &key[..internal.prefix.len()] != &internal.prefix[..] {
                return None;
            }
            let (disc, rest) = split_disc(&key[internal.prefix.len()..]);
            find_rec(internal.children.get(disc)?, rest)
        }
    }
}

fn insert_boxed<T>(node: Box<Node<T>>, key: &[u8], value: T) -> (Box<Node<T>>, Option<T>, bool) {
    match *node {
        Node::Leaf(suffix, old_value) => {
            if suffix.as_ref() == key {
                (Box::new(Node::Leaf(suffix, value)), Some(old_value), false)
            } else {
                let common = common_prefix_len(&suffix, key);
                let internal = split_leaf(suffix, old_value, key, value, common);
                (Box::new(Node::Internal(internal)), None, true)
            }
        }
        Node::Internal(internal) => {
            let common = common_prefix_len(&internal.prefix, key);
            if common < internal.prefix.len() {
                let new_internal = split_internal(internal, key, value, common);
                (Box::new(Node::Internal(new_internal)), None, true)
            } else {
                let Internal { prefix, mut children } = internal;
                let (disc, child_key) = split_disc(&key[common..]);
                let (prev, inserted) = match children.remove(disc) {
                    Some(existing) => {
                        let (new_child, prev, inserted) = insert_boxed(existing, child_key, value);
                        children.put_existing(disc, new_child);
                        (prev, inserted)
                    }
                    None => {
                        let leaf = Box::new(Node::Leaf(child_key.to_vec().into_boxed_slice(), value));
                        children = children.insert_new(disc, leaf);
                        (None, true)
                    }
                };
                (Box::new(Node::Internal(Internal { prefix, children })), prev, inserted)
            }
        }
    }
}

fn insert_rec<T>(slot: &mut Option<Box<Node<T>>>, key: &[u8], value: T) -> (Option<T>, bool) {
    match slot.take() {
        None => {
            *slot = Some(Box::new(Node::Leaf(key.to_vec().into_boxed_slice(), value)));
            (None, true)
        }
        Some(node) => {
            let (new_node, prev, inserted) = insert_boxed(node, key, value);
            *slot = Some(new_node);
            (prev, inserted)
        }
    }
}

fn delete_rec<T>(slot: &mut Option<Box<Node<T>>>, key: &[u8]) -> Option<T> {
    let node = slot.take()?;
    match *node {
        Node::Leaf(suffix, value) => {
            if suffix.as_ref() == key {
                Some(value)
            } else {
                *slot = Some(Box::new(Node::Leaf(suffix, value)));
                None
            }
        }
        Node::Internal(internal) => {
            if key.len() < internal.prefix.len() || &key[..internal.prefix.len()] != &internal.prefix[..] {
                *slot = Some(Box::new(Node::Internal(internal)));
                return None;
            }
            let Internal { prefix, mut children } = internal;
            let (disc, child_key) = split_disc(&key[prefix.len()..]);
            let Some(child) = children.remove(disc) else {
                *slot = Some(Box::new(Node::Internal(Internal { prefix, children })));
                return None;
            };
            let mut tmp = Some(child);
            let removed = delete_rec(&mut tmp, child_key);
            match tmp {
                Some(new_child) => {
                    children.put_existing(disc, new_child);
                    *slot = Some(Box::new(Node::Internal(Internal { prefix, children })));
                }
                None => {
                    children = children.shrink_if_needed();
                    if children.len() == 1 {
                        let (d, c) = children.take_only();
                        *slot = Some(collapse(prefix, d, c));
                    } else {
                        *slot = Some(Box::new(Node::Internal(Internal { prefix, children })));
                    }
                }
            }
            removed
        }
    }
}

/// Filter-matching cursor: tracks how much of the current subject token has
/// been consumed and which filter token is being compared against it.
#[derive(Clone)]
struct TokenMatcher<'f> {
    filter_tokens: &'f [&'f [u8]],
    fi: usize,
    cur: Vec<u8>,
    failed: bool,
    satisfied_by_tail: bool,
}

impl<'f> TokenMatcher<'f> {
    fn new(filter_tokens: &'f [&'f [u8]]) -> Self {
        Self { filter_tokens, fi: 0, cur: Vec::new(), failed: false, satisfied_by_tail: false }
    }

    fn feed(&mut self, bytes: &[u8]) {
        if self.failed || self.satisfied_by_tail {
            return;
        }
        for &b in bytes {
            if b == SEPARATOR {
                self.end_token();
                if self.failed || self.satisfied_by_tail {
                    return;
                }
            } else {
                self.cur.push(b);
            }
        }
    }

    fn end_token(&mut self) {
        if self.fi >= self.filter_tokens.len() {
            self.failed = true;
            self.cur.clear();
            return;
        }
        let ftok = self.filter_tokens[self.fi];
        if is_wild_tail(ftok) {
            self.satisfied_by_tail = true;
        } else if is_wild_one(ftok) || ftok == self.cur.as_slice() {
            self.fi += 1;
        } else {
            self.failed = true;
        }
        self.cur.clear();
    }

    fn finish(&self) -> bool {
        if self.failed {
            return false;
        }
        if self.satisfied_by_tail {
            return true;
        }
        if self.fi >= self.filter_tokens.len() {
            return false;
        }
        let ftok = self.filter_tokens[self.fi];
        if is_wild_tail(ftok) {
            return true;
        }
        let matches_last = is_wild_one(ftok) || ftok == self.cur.as_slice();
        matches_last && self.fi + 1 == self.filter_tokens.len()
    }
}

fn match_rec<T>(
    node: &Node<T>,
    matcher: TokenMatcher<'_>,
    path: &mut Vec<u8>,
    cb: &mut dyn FnMut(&[u8], &T) -> bool,
) -> bool {
    match node {
        Node::Leaf(suffix, value) => {
            let start = path.len();
            path.extend_from_slice(suffix);
            let mut m = matcher;
            m.feed(suffix);
            let keep_going = if m.finish() { cb(path, value) } else { true };
            path.truncate(start);
            keep_going
        }
        Node::Internal(internal) => {
            let start = path.len();
            path.extend_from_slice(&internal.prefix);
            let mut m = matcher;
            m.feed(&internal.prefix);
            let mut keep_going = true;
            if !m.failed {
                for (disc, child) in internal.children.iter_sorted() {
                    if !keep_going {
                        break;
                    }
                    if disc == RESERVED_BYTE {
                        if let Node::Leaf(_, value) = &**child {
                            if m.clone().finish() {
                                keep_going = cb(path, value);
                            }
                        }
                    } else {
                        let mut cm = m.clone();
                        cm.feed(&[disc]);
                        if !cm.failed {
                            path.push(disc);
                            keep_going = match_rec(child, cm, path, cb);
                            path.pop();
                        }
                    }
                }
            }
            path.truncate(start);
            keep_going
        }
    }
}

/// Mirror of [`TokenMatcher`] for the opposite calling convention: the bytes
/// walked over the tree are the ones that may carry `*`/`>` wildcards, and
/// `query_tokens` (the caller's argument) is the concrete side. This is what
/// [`crate::sublist::Sublist`] needs, since its tree keys are subscription
/// filters rather than literal subjects.
#[derive(Clone)]
struct ReverseMatcher<'q> {
    query_tokens: &'q [&'q [u8]],
    qi: usize,
    cur: Vec<u8>,
    failed: bool,
    satisfied_by_tail: bool,
}

impl<'q> ReverseMatcher<'q> {
    fn new(query_tokens: &'q [&'q [u8]]) -> Self {
        Self { query_tokens, qi: 0, cur: Vec::new(), failed: false, satisfied_by_tail: false }
    }

    fn feed(&mut self, bytes: &[u8]) {
        if self.failed || self.satisfied_by_tail {
            return;
        }
        for &b in bytes {
            if b == SEPARATOR {
                self.end_token();
                if self.failed || self.satisfied_by_tail {
                    return;
                }
            } else {
                self.cur.push(b);
            }
        }
    }

    fn end_token(&mut self) {
        if is_wild_tail(&self.cur) {
            self.satisfied_by_tail = true;
            self.cur.clear();
            return;
        }
        if self.qi >= self.query_tokens.len() {
            self.failed = true;
            self.cur.clear();
            return;
        }
        if is_wild_one(&self.cur) || self.cur.as_slice() == self.query_tokens[self.qi] {
            self.qi += 1;
        } else {
            self.failed = true;
        }
        self.cur.clear();
    }

    fn finish(&self) -> bool {
        if self.failed {
            return false;
        }
        if self.satisfied_by_tail || is_wild_tail(&self.cur) {
            return true;
        }
        if self.qi >= self.query_tokens.len() {
            return false;
        }
        let matches_last = is_wild_one(&self.cur) || self.cur.as_slice() == self.query_tokens[self.qi];
        matches_last && self.qi + 1 == self.query_tokens.len()
    }
}

fn match_rec_reverse<T>(
    node: &Node<T>,
    matcher: ReverseMatcher<'_>,
    path: &mut Vec<u8>,
    cb: &mut dyn FnMut(&[u8], &T) -> bool,
) -> bool {
    match node {
        Node::Leaf(suffix, value) => {
            let start = path.len();
            path.extend_from_slice(suffix);
            let mut m = matcher;
            m.feed(suffix);
            let keep_going = if m.finish() { cb(path, value) } else { true };
            path.truncate(start);
            keep_going
        }
        Node::Internal(internal) => {
            let start = path.len();
            path.extend_from_slice(&internal.prefix);
            let mut m = matcher;
            m.feed(&internal.prefix);
            let mut keep_going = true;
            if !m.failed {
                for (disc, child) in internal.children.iter_sorted() {
                    if !keep_going {
                        break;
                    }
                    if disc == RESERVED_BYTE {
                        if let Node::Leaf(_, value) = &**child {
                            if m.clone().finish() {
                                keep_going = cb(path, value);
                            }
                        }
                    } else {
                        let mut cm = m.clone();
                        cm.feed(&[disc]);
                        if !cm.failed {
                            path.push(disc);
                            keep_going = match_rec_reverse(child, cm, path, cb);
                            path.pop();
                        }
                    }
                }
            }
            path.truncate(start);
            keep_going
        }
    }
}

fn iter_rec<T>(node: &Node<T>, path: &mut Vec<u8>, cb: &mut dyn FnMut(&[u8], &T) -> bool) -> bool {
    match node {
        Node::Leaf(suffix, value) => {
            let start = path.len();
            path.extend_from_slice(suffix);
            let keep_going = cb(path, value);
            path.truncate(start);
            keep_going
        }
        Node::Internal(internal) => {
            let start = path.len();
            path.extend_from_slice(&internal.prefix);
            let mut keep_going = true;
            for (disc, child) in internal.children.iter_sorted() {
                if !keep_going {
                    break;
                }
                if disc == RESERVED_BYTE {
                    if let Node::Leaf(_, value) = &**child {
                        keep_going = cb(path, value);
                    }
                } else {
                    path.push(disc);
                    keep_going = iter_rec(child, path, cb);
                    path.pop();
                }
            }
            path.truncate(start);
            keep_going
        }
    }
}

/// Adaptive radix tree mapping subject byte strings to values of type `T`.
pub struct SubjectTree<T> {
    root: Option<Box<Node<T>>>,
    size: usize,
}

impl<T> Default for SubjectTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubjectTree<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None, size: 0 }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Insert `value` under `subject`. Fails only when `subject` contains the
    /// reserved byte 127.
    pub fn insert(&mut self, subject: &[u8], value: T) -> Result<(Option<T>, bool), SubjectError> {
        if subject.contains(&RESERVED_BYTE) {
            return Err(SubjectError::ReservedByte);
        }
        let (prev, inserted) = insert_rec(&mut self.root, subject, value);
        if inserted {
            self.size += 1;
        }
        Ok((prev, inserted))
    }

    /// Exact lookup; wildcard bytes in `subject` are treated literally.
    #[must_use]
    pub fn find(&self, subject: &[u8]) -> Option<&T> {
        find_rec(self.root.as_deref()?, subject)
    }

    pub fn delete(&mut self, subject: &[u8]) -> Option<T> {
        let removed = delete_rec(&mut self.root, subject);
        if removed.is_some() {
            self.size -= 1;
        }
        removed
    }

    /// Visit every stored subject matching `filter` (which may contain `*`
    /// and `>` whole-token wildcards). Stops early if `cb` returns `false`.
    pub fn match_filter<F: FnMut(&[u8], &T) -> bool>(&self, filter: &[u8], mut cb: F) {
        let Some(root) = self.root.as_deref() else { return };
        let tokens = tokenize(filter);
        let matcher = TokenMatcher::new(&tokens);
        let mut path = Vec::new();
        match_rec(root, matcher, &mut path, &mut cb);
    }

    /// Visit every stored filter (the tree keys, which may themselves
    /// contain `*` / `>` whole-token wildcards) that matches the concrete
    /// `subject`. The inverse of [`Self::match_filter`]: there the tree
    /// holds literal subjects and the argument carries the wildcards, here
    /// the tree holds filters and `subject` is the literal side.
    pub fn match_subject<F: FnMut(&[u8], &T) -> bool>(&self, subject: &[u8], mut cb: F) {
        let Some(root) = self.root.as_deref() else { return };
        let tokens = tokenize(subject);
        let matcher = ReverseMatcher::new(&tokens);
        let mut path = Vec::new();
        match_rec_reverse(root, matcher, &mut path, &mut cb);
    }

    /// Full traversal in ascending byte order at every branch point.
    pub fn iter_ordered<F: FnMut(&[u8], &T) -> bool>(&self, mut cb: F) {
        let Some(root) = self.root.as_deref() else { return };
        let mut path = Vec::new();
        iter_rec(root, &mut path, &mut cb);
    }

    /// Full traversal; child maps are already stored sorted so this is the
    /// same walk as [`Self::iter_ordered`].
    pub fn iter_fast<F: FnMut(&[u8], &T) -> bool>(&self, cb: F) {
        self.iter_ordered(cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_insert_find_delete() {
        let mut tree = SubjectTree::new();
        assert_eq!(tree.insert(b"foo.bar", 1u32).unwrap(), (None, true));
        assert_eq!(tree.find(b"foo.bar"), Some(&1));
        assert_eq!(tree.delete(b"foo.bar"), Some(1));
        assert_eq!(tree.find(b"foo.bar"), None);
        assert!(tree.is_empty());
    }

    #[test]
    fn rejects_reserved_byte() {
        let mut tree = SubjectTree::new();
        let mut bad = b"a.b".to_vec();
        bad.push(RESERVED_BYTE);
        assert!(tree.insert(&bad, 1u32).is_err());
    }

    #[test]
    fn size_tracks_unique_subjects() {
        let mut tree = SubjectTree::new();
        tree.insert(b"a", 1u32).unwrap();
        tree.insert(b"a.b", 2u32).unwrap();
        tree.insert(b"a.bc", 3u32).unwrap();
        assert_eq!(tree.len(), 3);
        let (prev, inserted) = tree.insert(b"a.b", 20u32).unwrap();
        assert_eq!(prev, Some(2));
        assert!(!inserted);
        assert_eq!(tree.len(), 3);
        tree.delete(b"a.b");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.find(b"a"), Some(&1));
        assert_eq!(tree.find(b"a.bc"), Some(&3));
    }

    #[test]
    fn wildcard_match_single_token() {
        let mut tree = SubjectTree::new();
        tree.insert(b"a.b.c", 1u32).unwrap();
        tree.insert(b"a.x.c", 2u32).unwrap();
        tree.insert(b"a.b.d", 3u32).unwrap();

        let mut hits = Vec::new();
        tree.match_filter(b"a.*.c", |subj, v| {
            hits.push((subj.to_vec(), *v));
            true
        });
        hits.sort();
        assert_eq!(hits, vec![(b"a.b.c".to_vec(), 1), (b"a.x.c".to_vec(), 2)]);
    }

    #[test]
    fn wildcard_match_tail() {
        let mut tree = SubjectTree::new();
        tree.insert(b"a", 1u32).unwrap();
        tree.insert(b"a.b", 2u32).unwrap();
        tree.insert(b"a.b.c", 3u32).unwrap();
        tree.insert(b"z", 4u32).unwrap();

        let mut hits: Vec<Vec<u8>> = Vec::new();
        tree.match_filter(b"a.>", |subj, _| {
            hits.push(subj.to_vec());
            true
        });
        hits.sort();
        assert_eq!(hits, vec![b"a.b".to_vec(), b"a.b.c".to_vec()]);

        let mut all: Vec<Vec<u8>> = Vec::new();
        tree.match_filter(b">", |subj, _| {
            all.push(subj.to_vec());
            true
        });
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn match_subject_resolves_wildcard_filter_key() {
        let mut tree = SubjectTree::new();
        tree.insert(b"a.*.c", 1u32).unwrap();
        tree.insert(b"a.b.d", 2u32).unwrap();

        let mut hits = Vec::new();
        tree.match_subject(b"a.b.c", |filter, v| {
            hits.push((filter.to_vec(), *v));
            true
        });
        assert_eq!(hits, vec![(b"a.*.c".to_vec(), 1)]);

        hits.clear();
        tree.match_subject(b"a.x.y", |filter, v| {
            hits.push((filter.to_vec(), *v));
            true
        });
        assert!(hits.is_empty());
    }

    #[test]
    fn match_subject_resolves_tail_wildcard_filter_key() {
        let mut tree = SubjectTree::new();
        tree.insert(b"a.>", 1u32).unwrap();
        tree.insert(b"z", 2u32).unwrap();

        let mut hits = Vec::new();
        tree.match_subject(b"a.b.c", |filter, v| {
            hits.push((filter.to_vec(), *v));
            true
        });
        assert_eq!(hits, vec![(b"a.>".to_vec(), 1)]);

        hits.clear();
        tree.match_subject(b"q", |filter, v| {
            hits.push((filter.to_vec(), *v));
            true
        });
        assert!(hits.is_empty());
    }

    #[test]
    fn grows_past_node4_threshold() {
        let mut tree = SubjectTree::new();
        for i in 0..20u8 {
            let subject = [b'r', b'.', i];
            tree.insert(&subject, i).unwrap();
        }
        assert_eq!(tree.len(), 20);
        for i in 0..20u8 {
            let subject = [b'r', b'.', i];
            assert_eq!(tree.find(&subject), Some(&i));
        }
        for i in 0..10u8 {
            let subject = [b'r', b'.', i];
            tree.delete(&subject);
        }
        assert_eq!(tree.len(), 10);
        for i in 10..20u8 {
            let subject = [b'r', b'.', i];
            assert_eq!(tree.find(&subject), Some(&i));
        }
    }
}
