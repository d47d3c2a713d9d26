//! Session-state cache for multi-round authentication exchanges.
//!
//! A stateless-per-packet server hands the client a 16-octet State token on
//! each challenge. When the client returns that token on its next packet, the
//! cache gives back whatever the server stashed for the exchange:
//! - attributes moved out of the entry on retrieval
//! - an opaque [`Payload`] with peek/take/move semantics
//! - a bounded store that sweeps stale entries on every creation
//!
//! # Example
//!
//! ```rust,ignore
//! use statekeep::{Attribute, AttributeList, Packet, StateCache, StateConfig};
//!
//! let cache = StateCache::new(StateConfig::new().with_max_sessions(2048));
//!
//! let mut reply = Packet::new();
//! let mut attrs = AttributeList::new();
//! attrs.push(Attribute::new(1, b"alice".to_vec()));
//! cache.put_attributes(None, &mut reply, &mut attrs)?;
//!
//! // `reply` now carries a State attribute; the next request echoes it.
//! let restored = cache.get_attributes(&next_request);
//! ```

mod attr;
mod cache;
mod config;
mod entry;
mod env;
mod error;
mod lock;
mod store;
mod token;

pub use attr::{Attribute, AttributeList, Packet, STATE};
pub use cache::{LocalStateCache, StateCache, StateStats};
pub use config::{
    DEFAULT_MAX_REQUEST_TIME, DEFAULT_MAX_REQUESTS, LIFETIME_FACTOR, StateConfig, StateSection,
};
pub use entry::{Entry, Payload};
pub use env::{Environment, SystemEnv};
pub use error::{Error, Result};
pub use lock::LocalRawMutex;
pub use token::{DERIVED_OFFSETS, SEED_OFFSET, TOKEN_LEN, Token};
