//! ADC hub protocol core.
//!
//! Pure protocol logic with no I/O: the per-client [`Session`] state machine
//! (PROTOCOL → IDENTIFY → VERIFY → NORMAL), Tiger-based identity
//! verification, and the [`Environment`] abstraction over system resources.
//!
//! Everything here uses the action pattern: handlers take inputs, mutate
//! session state, and return [`SessionAction`]s for the driver to execute.
//! This keeps the state machine deterministic and directly testable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
mod error;
pub mod identity;
pub mod session;

pub use env::Environment;
pub use error::IdentityError;
pub use session::{Session, SessionAction, SessionState};
