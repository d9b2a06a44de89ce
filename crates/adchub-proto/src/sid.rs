//! Session identifiers.

use std::{fmt, str::FromStr};

use crate::errors::ProtocolError;

/// A session identifier: exactly four characters from the Base32 alphabet.
///
/// SIDs are allocated by the hub when a connection is accepted and stay
/// constant for the lifetime of the connection. The reserved SID `SERV`
/// names the built-in services pseudo-client.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sid([u8; 4]);

impl Sid {
    /// The reserved SID of the built-in services pseudo-client.
    pub const SERVICES: Self = Self(*b"SERV");

    /// Construct a SID from four raw characters.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidSid` if any character falls outside `A`-`Z`,
    ///   `2`-`7`.
    pub fn new(chars: [u8; 4]) -> Result<Self, ProtocolError> {
        if chars.iter().all(|c| c.is_ascii_uppercase() || (b'2'..=b'7').contains(c)) {
            Ok(Self(chars))
        } else {
            Err(ProtocolError::InvalidSid(String::from_utf8_lossy(&chars).into_owned()))
        }
    }

    /// The SID as a 4-character string slice.
    pub fn as_str(&self) -> &str {
        // INVARIANT: construction only admits ASCII characters.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl FromStr for Sid {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] =
            s.as_bytes().try_into().map_err(|_| ProtocolError::InvalidSid(s.to_string()))?;
        Self::new(bytes)
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sid({})", self.as_str())
    }
}
