//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` backs the hub with the real wall clock and OS cryptographic
//! randomness. Tests substitute deterministic environments instead.

use adchub_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// The RNG uses getrandom, which provides OS-level cryptographic randomness
/// (/dev/urandom on Linux, `BCryptGenRandom` on Windows). SIDs and
/// password-challenge nonces are drawn from it.
///
/// # Panics
///
/// Panics if the OS RNG fails. This is intentional - a hub that cannot
/// generate unpredictable nonces cannot authenticate clients, and RNG
/// failure indicates OS-level breakage.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - hub cannot operate securely");
    }
}
