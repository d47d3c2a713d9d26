//! State tokens: fresh, derived across retries, or supplied by another
//! component.

use std::fmt;

use tracing::warn;

use crate::env::Environment;

/// Length of a State token in octets.
pub const TOKEN_LEN: usize = 16;

/// Offset overwritten by the configured token seed on fresh tokens.
pub const SEED_OFFSET: usize = 3;

/// Offsets rewritten when a token is derived from its predecessor.
pub const DERIVED_OFFSETS: [usize; 5] = [0, 1, 8, 10, 12];

/// A fixed-length State token.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    pub const fn from_bytes(bytes: [u8; TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }

    /// Exact-length conversion used for lookups. Any other length is a miss.
    pub fn from_slice(octets: &[u8]) -> Option<Self> {
        <[u8; TOKEN_LEN]>::try_from(octets).ok().map(Self)
    }

    /// Draw a fresh random token.
    ///
    /// When `seed` is set it replaces the octet at [`SEED_OFFSET`], so a
    /// load-balancing proxy can route follow-up packets by looking at one byte.
    pub fn fresh<E: Environment>(env: &E, seed: Option<u8>) -> Self {
        let mut bytes = [0u8; TOKEN_LEN];
        env.fill_random(&mut bytes);
        if let Some(seed) = seed {
            bytes[SEED_OFFSET] = seed;
        }
        Self(bytes)
    }

    /// Derive the token for the next round of an exchange.
    ///
    /// Everything outside [`DERIVED_OFFSETS`] is copied verbatim. The first
    /// octet carries the try count and the rest of the rewritten octets mix in
    /// the build version, so retries are visible on the wire.
    pub fn derive(&self, tries: u32) -> Self {
        let old = self.0;
        let mut bytes = old;
        let tries = tries.min(u32::from(u8::MAX)) as u8;
        let [_, hi, mid, lo] = version_fingerprint().to_be_bytes();

        bytes[0] = tries;
        bytes[1] = old[1] ^ tries;
        bytes[8] = bytes[2] ^ hi;
        bytes[10] = bytes[2] ^ mid;
        bytes[12] = bytes[2] ^ lo;
        Self(bytes)
    }

    /// Adopt a State value some earlier stage already put on the reply.
    ///
    /// Values of the wrong length are tolerated: longer ones are truncated and
    /// shorter ones zero-padded.
    pub fn from_supplied(octets: &[u8]) -> Self {
        if octets.len() != TOKEN_LEN {
            warn!(
                len = octets.len(),
                expected = TOKEN_LEN,
                "Supplied State has the wrong length"
            );
        }
        let mut bytes = [0u8; TOKEN_LEN];
        let n = octets.len().min(TOKEN_LEN);
        bytes[..n].copy_from_slice(&octets[..n]);
        Self(bytes)
    }
}

/// Crate version packed as `major << 16 | minor << 8 | patch`.
fn version_fingerprint() -> u32 {
    let part = |s: &str| s.parse::<u32>().unwrap_or(0) & 0xff;
    (part(env!("CARGO_PKG_VERSION_MAJOR")) << 16)
        | (part(env!("CARGO_PKG_VERSION_MINOR")) << 8)
        | part(env!("CARGO_PKG_VERSION_PATCH"))
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self)
    }
}
