//! Per-server connection token.

use rand_core::{CryptoRng, OsRng, RngCore};
use std::fmt;
use uuid::{Builder, Uuid};

/// Random 128-bit credential a collector must echo back to pass the
/// connectivity check. Generated once per server start, never rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeToken(Uuid);

impl HandshakeToken {
    /// Generates a token from the operating system's entropy source.
    pub fn generate() -> Self {
        Self::from_rng(&mut OsRng)
    }

    /// Generates a token from the given cryptographic RNG.
    pub fn from_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Self(Builder::from_random_bytes(bytes).into_uuid())
    }

    /// True when `candidate` is exactly the token's canonical text form.
    /// Empty candidates never match.
    pub fn matches(&self, candidate: &str) -> bool {
        !candidate.is_empty() && candidate == self.to_string()
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for HandshakeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}
