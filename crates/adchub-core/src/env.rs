//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (wall clock, randomness).
//! Production uses the OS clock and cryptographic RNG; tests substitute
//! deterministic implementations.

use adchub_proto::{BASE32_ALPHABET, Sid};

/// Abstract environment providing time and randomness.
///
/// Implementations MUST use cryptographically secure entropy in production:
/// the random output feeds SID allocation and password-challenge nonces.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    ///
    /// Used only for the hub uptime reported in `IINF`; sub-second precision
    /// is not required.
    fn wall_clock_secs(&self) -> u64;

    /// Fill the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// A random string of `len` characters from the Base32 alphabet.
    ///
    /// Used for password-challenge nonces.
    fn random_base32(&self, len: usize) -> String {
        let mut bytes = vec![0u8; len];
        self.random_bytes(&mut bytes);
        bytes.iter().map(|b| char::from(BASE32_ALPHABET[usize::from(b % 32)])).collect()
    }

    /// A random session identifier.
    ///
    /// Uniqueness against the live roster is the hub's responsibility; this
    /// only provides the raw draw.
    fn random_sid(&self) -> Sid {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        let chars = bytes.map(|b| BASE32_ALPHABET[usize::from(b % 32)]);

        // INVARIANT: alphabet characters always form a valid SID.
        #[allow(clippy::expect_used)]
        Sid::new(chars).expect("invariant: Base32 alphabet characters form a valid SID")
    }
}
