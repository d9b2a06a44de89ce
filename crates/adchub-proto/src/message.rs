//! Message framing.
//!
//! A wire line is `<prefix><CMD> <payload>`: one addressing character, a
//! three-letter command, a separator space, then the command payload (which
//! may be empty). [`Message::parse`] performs the structural split; payload
//! interpretation is left to the command handlers.

use std::fmt;

use crate::errors::{ProtocolError, Result};

/// Addressing prefix of a wire line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// `B` - broadcast from a client to all clients
    Broadcast,
    /// `D` - direct message to a single SID
    Direct,
    /// `E` - direct message, echoed back to the sender
    Echo,
    /// `F` - feature-filtered broadcast
    Feature,
    /// `H` - client to hub
    Hub,
    /// `I` - hub to client
    Info,
    /// `C` - client-to-client context (not routed by the hub)
    Client,
    /// `U` - UDP context (not routed by the hub)
    Udp,
}

impl Prefix {
    /// Map an addressing character to its prefix.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidPrefix` for any other character.
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            'B' => Ok(Self::Broadcast),
            'D' => Ok(Self::Direct),
            'E' => Ok(Self::Echo),
            'F' => Ok(Self::Feature),
            'H' => Ok(Self::Hub),
            'I' => Ok(Self::Info),
            'C' => Ok(Self::Client),
            'U' => Ok(Self::Udp),
            other => Err(ProtocolError::InvalidPrefix(other)),
        }
    }

    /// The prefix as its wire character.
    pub fn as_char(self) -> char {
        match self {
            Self::Broadcast => 'B',
            Self::Direct => 'D',
            Self::Echo => 'E',
            Self::Feature => 'F',
            Self::Hub => 'H',
            Self::Info => 'I',
            Self::Client => 'C',
            Self::Udp => 'U',
        }
    }
}

/// A three-letter command code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command([u8; 3]);

impl Command {
    /// Feature negotiation
    pub const SUP: Self = Self(*b"SUP");
    /// Client information
    pub const INF: Self = Self(*b"INF");
    /// Chat message
    pub const MSG: Self = Self(*b"MSG");
    /// Status
    pub const STA: Self = Self(*b"STA");
    /// Session identifier assignment
    pub const SID: Self = Self(*b"SID");
    /// File search
    pub const SCH: Self = Self(*b"SCH");
    /// Connect-to-me request
    pub const CTM: Self = Self(*b"CTM");
    /// Reverse connect-to-me request
    pub const RCM: Self = Self(*b"RCM");
    /// Password response
    pub const PAS: Self = Self(*b"PAS");
    /// Password challenge (get password)
    pub const GPA: Self = Self(*b"GPA");
    /// Session quit
    pub const QUI: Self = Self(*b"QUI");

    /// Construct a command from three raw bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidCommand` unless all three are uppercase ASCII
    ///   letters.
    pub fn new(bytes: [u8; 3]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_uppercase) {
            Ok(Self(bytes))
        } else {
            Err(ProtocolError::InvalidCommand(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    /// The command as a 3-character string slice.
    pub fn as_str(&self) -> &str {
        // INVARIANT: construction only admits ASCII characters.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({})", self.as_str())
    }
}

/// A structurally-split wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Addressing prefix
    pub prefix: Prefix,
    /// Three-letter command
    pub command: Command,
    /// Everything after the separator space (may be empty)
    pub params: String,
}

impl Message {
    /// Split a line into prefix, command and payload.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::LineTooShort` for lines under five bytes
    /// - `ProtocolError::InvalidPrefix` / `InvalidCommand` /
    ///   `MissingSeparator` for structural violations
    pub fn parse(line: &str) -> Result<Self> {
        let bytes = line.as_bytes();
        if bytes.len() < 5 {
            return Err(ProtocolError::LineTooShort { len: bytes.len() });
        }

        let prefix = Prefix::from_char(bytes[0] as char)?;
        let command = Command::new([bytes[1], bytes[2], bytes[3]])?;
        if bytes[4] != b' ' {
            return Err(ProtocolError::MissingSeparator);
        }

        // INVARIANT: bytes 0-4 are ASCII, so byte 5 is a char boundary.
        Ok(Self { prefix, command, params: line[5..].to_string() })
    }
}
