//! The session-state API used by request handlers.

use std::sync::Arc;

use parking_lot::lock_api::{Mutex, RawMutex};
use tracing::{debug, trace, warn};

use crate::attr::{AttributeList, Packet};
use crate::config::StateConfig;
use crate::entry::{Entry, Payload};
use crate::env::{Environment, SystemEnv};
use crate::error::{Error, Result};
use crate::lock::LocalRawMutex;
use crate::store::{Handle, Store};
use crate::token::Token;

/// Store plus counters, protected by one lock.
struct Inner {
    store: Store,
    swept: u64,
    denied: u64,
}

/// Token-indexed cache of per-exchange state.
///
/// Every method takes the lock once, does one logical operation, and releases
/// it before returning. Entries evicted along the way are dropped after the
/// lock is released, so payload destructors never run inside the critical
/// section.
///
/// Construct one per server and hand clones to the request handlers; clones
/// share the same store.
pub struct StateCache<E: Environment = SystemEnv, R: RawMutex = parking_lot::RawMutex> {
    inner: Arc<Mutex<R, Inner>>,
    env: Arc<E>,
    config: StateConfig,
}

/// The non-threaded configuration: same API, `!Sync`.
pub type LocalStateCache<E = SystemEnv> = StateCache<E, LocalRawMutex>;

impl StateCache {
    /// Create a cache backed by the system clock and RNG.
    pub fn new(config: StateConfig) -> Self {
        Self::with_env(config, SystemEnv)
    }
}

impl<E: Environment, R: RawMutex> StateCache<E, R> {
    /// Create a cache with a custom environment.
    pub fn with_env(config: StateConfig, env: E) -> Self {
        let inner = Inner {
            store: Store::new(config.max_sessions),
            swept: 0,
            denied: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            env: Arc::new(env),
            config,
        }
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove the entry named by `original`'s State, so the exchange cannot be
    /// continued. Returns whether an entry was removed.
    pub fn discard(&self, original: &Packet) -> bool {
        let Some(state) = original.state() else {
            return false;
        };

        let removed = {
            let mut inner = self.inner.lock();
            inner
                .store
                .find(state)
                .and_then(|h| inner.store.remove(h))
        };

        match removed {
            Some(entry) => {
                debug!(token = %entry.token(), "Discarded session state");
                true
            }
            None => false,
        }
    }

    /// Move the cached attributes for `packet`'s State out of the cache.
    ///
    /// Returns an empty list when the packet has no State, no entry matches,
    /// or nothing was cached. The entry itself stays so a later `put_*` can
    /// chain from it.
    pub fn get_attributes(&self, packet: &Packet) -> AttributeList {
        let Some(state) = packet.state() else {
            trace!("No State attribute");
            return AttributeList::new();
        };

        let mut inner = self.inner.lock();
        let store = &mut inner.store;
        match store.find(state).and_then(|h| store.get_mut(h)) {
            Some(entry) => {
                let attrs = entry.attributes_mut().take_all();
                trace!(
                    token = %entry.token(),
                    count = attrs.len(),
                    "Found cached attributes"
                );
                attrs
            }
            None => {
                trace!("No cached attributes");
                AttributeList::new()
            }
        }
    }

    /// Cache `attrs` in a new entry and put its State on `reply`.
    ///
    /// A State already on `reply` is left untouched and keys the entry, after
    /// padding or truncation to the token length.
    ///
    /// When `original` names a live entry the new token is derived from it
    /// and the old entry is retired. An empty `attrs` caches nothing and
    /// succeeds. On success `attrs` is drained; on failure neither `attrs` nor
    /// `reply` is touched.
    pub fn put_attributes(
        &self,
        original: Option<&Packet>,
        reply: &mut Packet,
        attrs: &mut AttributeList,
    ) -> Result<()> {
        if attrs.is_empty() {
            trace!("Nothing to cache");
            return Ok(());
        }

        let mut dead = Vec::new();
        let token = {
            let mut inner = self.inner.lock();
            let old = original
                .and_then(Packet::state)
                .and_then(|s| inner.store.find(s));

            let (handle, token) = self.create(&mut inner, reply.state(), old, &mut dead)?;
            if let Some(entry) = inner.store.get_mut(handle) {
                entry.attributes_mut().extend(attrs.take_all());
            }
            token
        };
        drop(dead);

        debug!(token = %token, "Saved cached attributes");
        Self::issue_state(reply, &token);
        Ok(())
    }

    /// Peek at the payload for `packet`'s State, leaving it in place.
    pub fn find_data(&self, packet: &Packet) -> Option<Payload> {
        let state = packet.state()?;
        let inner = self.inner.lock();
        let handle = inner.store.find(state)?;
        inner.store.get(handle).and_then(Entry::payload).cloned()
    }

    /// Take the payload for `packet`'s State. A second call returns `None`.
    pub fn get_data(&self, packet: &Packet) -> Option<Payload> {
        let state = packet.state()?;
        let mut inner = self.inner.lock();
        let store = &mut inner.store;
        let entry = store.find(state).and_then(|h| store.get_mut(h))?;
        entry.take_payload()
    }

    /// Attach `data` to a new entry and put its State on `reply`.
    ///
    /// If the entry named by `original` already owns `data`, ownership moves:
    /// it is cleared from the old entry first, which lets the old entry be
    /// retired. On failure the old entry keeps its payload.
    pub fn put_data(
        &self,
        original: Option<&Packet>,
        reply: &mut Packet,
        data: Payload,
    ) -> Result<()> {
        let mut dead = Vec::new();
        let token = {
            let mut inner = self.inner.lock();
            let old = original
                .and_then(Packet::state)
                .and_then(|s| inner.store.find(s));

            let moved = old
                .and_then(|h| inner.store.get_mut(h))
                .filter(|e| e.payload().is_some_and(|p| p.ptr_eq(&data)))
                .and_then(Entry::take_payload);

            match self.create(&mut inner, reply.state(), old, &mut dead) {
                Ok((handle, token)) => {
                    if let Some(entry) = inner.store.get_mut(handle) {
                        entry.set_payload(data);
                    }
                    token
                }
                // `data` is dropped on return, after the guard.
                Err(e) => {
                    if let (Some(payload), Some(entry)) =
                        (moved, old.and_then(|h| inner.store.get_mut(h)))
                    {
                        entry.set_payload(payload);
                    }
                    return Err(e);
                }
            }
        };
        drop(dead);

        debug!(token = %token, "Saved session data");
        Self::issue_state(reply, &token);
        Ok(())
    }

    /// Snapshot of the entry for `packet`'s State.
    pub fn peek_entry(&self, packet: &Packet) -> Option<Entry> {
        let state = packet.state()?;
        let inner = self.inner.lock();
        let handle = inner.store.find(state)?;
        inner.store.get(handle).cloned()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let dead = {
            let mut inner = self.inner.lock();
            inner.store.drain()
        };
        debug!(count = dead.len(), "Cleared session state");
    }

    pub fn stats(&self) -> StateStats {
        let inner = self.inner.lock();
        StateStats {
            live: inner.store.len(),
            capacity: inner.store.capacity(),
            swept: inner.swept,
            denied: inner.denied,
        }
    }

    /// Create and insert a new entry. Called with the lock held.
    ///
    /// `supplied` is a State some earlier stage already put on the reply; it
    /// wins over a derived or fresh token. `old` is the entry being continued.
    /// Every failure is decided before the store is changed, apart from the
    /// opportunistic sweep.
    fn create(
        &self,
        inner: &mut Inner,
        supplied: Option<&[u8]>,
        old: Option<Handle>,
        dead: &mut Vec<Entry>,
    ) -> Result<(Handle, Token)> {
        let now = self.env.now();

        let swept = inner.store.sweep(now, old);
        inner.swept += swept.len() as u64;
        dead.extend(swept);

        if inner.store.is_full() {
            inner.denied += 1;
            warn!(
                max_sessions = inner.store.capacity(),
                "Session state store is full"
            );
            return Err(Error::AdmissionDenied {
                max_sessions: inner.store.capacity(),
            });
        }

        let old_entry = old.and_then(|h| inner.store.get(h));
        let tries = old_entry.map_or(0, |e| e.tries().saturating_add(1));
        let token = match (supplied, old_entry) {
            (Some(octets), _) => Token::from_supplied(octets),
            (None, Some(prev)) => prev.token().derive(tries),
            (None, None) => Token::fresh(self.env.as_ref(), self.config.token_seed),
        };
        let retire_old = old_entry.is_some_and(|e| !e.has_payload());

        if let Some(existing) = inner.store.find_token(&token) {
            if !(retire_old && Some(existing) == old) {
                return Err(Error::DuplicateToken(token));
            }
        }

        if retire_old {
            if let Some(prev) = old.and_then(|h| inner.store.remove(h)) {
                trace!(token = %prev.token(), "Retired superseded state entry");
                dead.push(prev);
            }
        }

        let entry = Entry::new(token, now + self.config.lifetime(), tries);
        let handle = inner.store.insert(entry)?;
        debug!(token = %token, tries, live = inner.store.len(), "Created state entry");
        Ok((handle, token))
    }

    /// Put `token` on the reply unless an earlier stage already supplied a
    /// State, which is left exactly as it was.
    fn issue_state(reply: &mut Packet, token: &Token) {
        if reply.state().is_none() {
            reply.set_state(token);
        }
    }
}

impl<E: Environment, R: RawMutex> Clone for StateCache<E, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            env: Arc::clone(&self.env),
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStats {
    /// Current number of live entries.
    pub live: usize,

    /// Maximum number of live entries.
    pub capacity: usize,

    /// Entries reclaimed by sweeps since construction.
    pub swept: u64,

    /// Creation attempts refused because the store was full.
    pub denied: u64,
}
