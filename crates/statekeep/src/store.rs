//! Arena-backed entry store with two indexes.
//!
//! Entries live in a slot arena addressed by [`Handle`]. A `BTreeMap` from
//! token to handle gives O(log n) lookup, and a handle-linked list threaded
//! through the slots records insertion order for the cleanup sweep with O(1)
//! unlink. Both indexes are updated together in every mutating method.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::trace;

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::token::Token;

/// Stable address of an entry inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Handle(usize);

#[derive(Debug)]
struct Slot {
    entry: Entry,
    prev: Option<Handle>,
    next: Option<Handle>,
}

/// Bounded registry of entries keyed by token.
#[derive(Debug)]
pub(crate) struct Store {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: BTreeMap<Token, Handle>,
    /// Oldest end of the cleanup list.
    head: Option<Handle>,
    tail: Option<Handle>,
    max_sessions: usize,
}

impl Store {
    pub(crate) fn new(max_sessions: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: BTreeMap::new(),
            head: None,
            tail: None,
            max_sessions,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.max_sessions
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len() >= self.max_sessions
    }

    /// Exact-match lookup on raw State octets. Wrong lengths never match.
    pub(crate) fn find(&self, octets: &[u8]) -> Option<Handle> {
        let token = Token::from_slice(octets)?;
        self.find_token(&token)
    }

    pub(crate) fn find_token(&self, token: &Token) -> Option<Handle> {
        self.index.get(token).copied()
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&Entry> {
        self.slot(handle).map(|s| &s.entry)
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut Entry> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .map(|s| &mut s.entry)
    }

    /// Add an entry to both indexes, at the tail of the cleanup list.
    ///
    /// On failure the store is untouched and the entry is dropped.
    pub(crate) fn insert(&mut self, entry: Entry) -> Result<Handle> {
        if self.is_full() {
            return Err(Error::AdmissionDenied {
                max_sessions: self.max_sessions,
            });
        }
        let token = *entry.token();
        if self.index.contains_key(&token) {
            return Err(Error::DuplicateToken(token));
        }

        let slot = Slot {
            entry,
            prev: self.tail,
            next: None,
        };
        let handle = match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(slot);
                Handle(i)
            }
            None => {
                self.slots.push(Some(slot));
                Handle(self.slots.len() - 1)
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(s) = self.slot_mut(tail) {
                    s.next = Some(handle);
                }
            }
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.index.insert(token, handle);

        Ok(handle)
    }

    /// Detach an entry from both indexes and hand it back.
    ///
    /// Dropping the returned entry releases any payload it still owns. A vacant
    /// handle is a no-op.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<Entry> {
        let slot = self.slots.get_mut(handle.0)?.take()?;

        match slot.prev {
            Some(prev) => {
                if let Some(s) = self.slot_mut(prev) {
                    s.next = slot.next;
                }
            }
            None => self.head = slot.next,
        }
        match slot.next {
            Some(next) => {
                if let Some(s) = self.slot_mut(next) {
                    s.prev = slot.prev;
                }
            }
            None => self.tail = slot.prev,
        }

        if self.index.get(slot.entry.token()) == Some(&handle) {
            self.index.remove(slot.entry.token());
        }
        self.free.push(handle.0);

        Some(slot.entry)
    }

    /// Evict the oldest contiguous run of stale entries.
    ///
    /// Walks from the head, skipping `excluding`, and stops at the first entry
    /// that is neither expired nor empty. The evicted entries are returned so
    /// their payloads can be dropped outside the lock.
    pub(crate) fn sweep(&mut self, now: Instant, excluding: Option<Handle>) -> Vec<Entry> {
        let mut removed = Vec::new();
        let mut cursor = self.head;

        while let Some(handle) = cursor {
            let Some(slot) = self.slot(handle) else {
                break;
            };
            cursor = slot.next;

            if Some(handle) == excluding {
                continue;
            }
            if !slot.entry.is_stale(now) {
                break;
            }

            if let Some(entry) = self.remove(handle) {
                trace!(token = %entry.token(), "Swept stale state entry");
                removed.push(entry);
            }
        }

        removed
    }

    /// Detach every entry, handing them back so they can be dropped outside
    /// the lock.
    pub(crate) fn drain(&mut self) -> Vec<Entry> {
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        std::mem::take(&mut self.slots)
            .into_iter()
            .flatten()
            .map(|slot| slot.entry)
            .collect()
    }

    fn slot(&self, handle: Handle) -> Option<&Slot> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        self.slots.get_mut(handle.0).and_then(Option::as_mut)
    }

    /// Handles in cleanup order, oldest first.
    #[cfg(test)]
    fn order(&self) -> Vec<Handle> {
        let mut out = Vec::new();
        let mut cursor = self.head;
        while let Some(h) = cursor {
            out.push(h);
            cursor = self.slot(h).and_then(|s| s.next);
        }
        out
    }

    /// Both indexes describe the same set of entries.
    #[cfg(test)]
    fn assert_consistent(&self) {
        let order = self.order();
        assert_eq!(order.len(), self.index.len());
        for h in &order {
            let entry = self.get(*h).expect("listed handle is live");
            assert_eq!(self.index.get(entry.token()), Some(h));
        }
        let live = self.slots.iter().filter(|s| s.is_some()).count();
        assert_eq!(live, self.index.len());
    }
}
