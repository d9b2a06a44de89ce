//! ADC wire codec.
//!
//! The ADC protocol is line-oriented ASCII: each message is a single line
//! terminated by LF. The first character selects the addressing mode
//! (broadcast, direct, echo, ...), the next three are the command, and the
//! rest is a space-separated payload. Values inside the payload use a small
//! escape language (`\s`, `\n`, `\\`), and binary identifiers travel as
//! unpadded Base32.
//!
//! This crate is pure data transformation - no I/O, no protocol state. The
//! session state machine lives in `adchub-core`, the hub in `adchub-server`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod base32;
mod errors;
mod escape;
mod flags;
mod message;
mod sid;

pub use base32::{BASE32_ALPHABET, b32decode, b32encode};
pub use errors::{ProtocolError, Result};
pub use escape::{escape, unescape};
pub use flags::{FlagMap, flag_dict, join_flags};
pub use message::{Command, Message, Prefix};
pub use sid::Sid;
