//! Cached exchange entries and their opaque payloads.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::attr::AttributeList;
use crate::token::Token;

/// Opaque caller data attached to an entry.
///
/// The cache never looks inside; both ends of an exchange agree on the
/// concrete type out of band and recover it with [`Payload::downcast_ref`].
/// Clones share the same allocation, and [`Payload::ptr_eq`] tells whether two
/// handles refer to the same object.
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the payload as `T`, if that is what it holds.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Convert into a typed handle, or give the payload back on mismatch.
    pub fn downcast<T: Any + Send + Sync>(self) -> std::result::Result<Arc<T>, Payload> {
        self.0.downcast::<T>().map_err(Payload)
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Payload) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").finish_non_exhaustive()
    }
}

/// State cached for one in-flight exchange.
#[derive(Debug, Clone)]
pub struct Entry {
    token: Token,
    expiry: Instant,
    tries: u32,
    attributes: AttributeList,
    payload: Option<Payload>,
}

impl Entry {
    pub(crate) fn new(token: Token, expiry: Instant, tries: u32) -> Self {
        Self {
            token,
            expiry,
            tries,
            attributes: AttributeList::new(),
            payload: None,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Deadline after which a sweep may reclaim the entry.
    pub fn expiry(&self) -> Instant {
        self.expiry
    }

    /// How many times the exchange has been continued. Zero for a fresh entry.
    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Past its deadline, or holding nothing worth keeping.
    pub(crate) fn is_stale(&self, now: Instant) -> bool {
        self.expiry < now || (self.attributes.is_empty() && self.payload.is_none())
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeList {
        &mut self.attributes
    }

    pub(crate) fn set_payload(&mut self, payload: Payload) {
        self.payload = Some(payload);
    }

    pub(crate) fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }
}
