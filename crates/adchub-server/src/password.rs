//! Password lookup abstraction.
//!
//! The hub core does not own a password database; it asks a `PasswordStore`
//! for the expected plaintext when a client answers the `IGPA` challenge.
//! The trivial implementation returns one shared password for everybody.

use adchub_proto::FlagMap;

/// Password lookup for the VERIFY stage.
///
/// Must be Send + Sync: the store is consulted from the hub driver, which
/// lives behind the runtime's driver mutex.
pub trait PasswordStore: Send + Sync + 'static {
    /// Expected plaintext password for a client with the given INF record.
    fn password_for(&self, inf: &FlagMap) -> String;
}

/// A store that hands every client the same password.
#[derive(Debug, Clone)]
pub struct ConstPassword {
    password: String,
}

impl ConstPassword {
    /// Create a store around one shared password.
    pub fn new(password: impl Into<String>) -> Self {
        Self { password: password.into() }
    }
}

impl PasswordStore for ConstPassword {
    fn password_for(&self, _inf: &FlagMap) -> String {
        self.password.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_store_ignores_inf() {
        let store = ConstPassword::new("madcap");

        let mut inf = FlagMap::new();
        assert_eq!(store.password_for(&inf), "madcap");

        inf.insert("NI".to_string(), "someone".to_string());
        assert_eq!(store.password_for(&inf), "madcap");
    }
}
