//! Peer identity verification and password hashing.
//!
//! ADC identity is hash-based: a client owns a secret 24-byte PID and
//! presents its Tiger hash as the public CID. A client that presents both
//! must present a matching pair. Passwords are proven by hashing the
//! plaintext with a server-issued nonce.

use adchub_proto::{FlagMap, ProtocolError, b32decode, b32encode};
use tiger::{Digest, Tiger};

use crate::error::IdentityError;

/// Verify that a presented PID hashes to the presented CID.
///
/// If either the `ID` or `PD` flag is absent there is nothing to check and
/// the identity is accepted as asserted.
///
/// # Errors
///
/// - `IdentityError::Mismatch` if `Tiger(PD) != ID`
/// - `IdentityError::Encoding` if either field is not decodable Base32
pub fn verify_identity(inf: &FlagMap) -> Result<(), IdentityError> {
    let (Some(cid), Some(pid)) = (inf.get("ID"), inf.get("PD")) else {
        return Ok(());
    };

    let hashed = b32decode(cid)?;
    let unhashed = b32decode(pid)?;

    if Tiger::digest(&unhashed).as_slice() == hashed.as_slice() {
        Ok(())
    } else {
        Err(IdentityError::Mismatch)
    }
}

/// Hash a password with a Base32 nonce: `b32encode(Tiger(password ‖ nonce))`.
///
/// The client computes the same digest from the `IGPA` challenge; the hub
/// compares the Base32 forms directly.
///
/// # Errors
///
/// - `ProtocolError::Base32` if the nonce is not decodable Base32
pub fn hash_password(password: &str, nonce_b32: &str) -> Result<String, ProtocolError> {
    let nonce = b32decode(nonce_b32)?;

    let mut hasher = Tiger::new();
    hasher.update(password.as_bytes());
    hasher.update(&nonce);

    Ok(b32encode(hasher.finalize().as_slice()))
}
