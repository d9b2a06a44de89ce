//! Built-in services pseudo-client.
//!
//! Services lives permanently in the roster under the reserved SID `SERV`,
//! in NORMAL state, so it receives broadcasts and chat like any other peer.
//! It has no transport - sent lines are sunk by the runtime - but it answers
//! a couple of chat commands. Replies are deferred to the next dispatch turn
//! so a chat command never triggers a re-entrant broadcast.

use adchub_proto::{FlagMap, Sid, join_flags};

/// Placeholder CID advertised in the services INF; no client owns the
/// matching PID.
const SERVICES_CID: &str = "SERVSERVSERVSERVSERVSERVSERVSERVSERVSER";

/// Chat commands the services client answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    /// `!hi` - reply with a greeting
    Greeting,
    /// `!clients` - reply with the current client listing
    ClientList,
}

/// The services pseudo-client.
#[derive(Debug)]
pub struct Services {
    /// Constant INF record (`CT17`, `NIServices`, placeholder `ID`)
    inf: FlagMap,
}

impl Services {
    /// Create the services client.
    #[must_use]
    pub fn new() -> Self {
        let mut inf = FlagMap::new();
        inf.insert("CT".to_string(), "17".to_string());
        inf.insert("ID".to_string(), SERVICES_CID.to_string());
        inf.insert("NI".to_string(), "Services".to_string());
        Self { inf }
    }

    /// The services INF line payload: `SERV <flags>`.
    #[must_use]
    pub fn build_inf(&self) -> String {
        format!("{} {}", Sid::SERVICES, join_flags(&self.inf))
    }

    /// Receive a chat message.
    ///
    /// Returns the command to answer, if any. The caller defers the reply to
    /// the next dispatch turn; answering inline would re-enter the chat
    /// fan-out that delivered this message.
    pub fn chat(&self, sender: Sid, message: &str) -> Option<ServiceCommand> {
        // Loop guard: never converse with ourselves.
        if sender == Sid::SERVICES {
            return None;
        }

        tracing::debug!("SERV {message:?}");

        match message {
            "!hi" => Some(ServiceCommand::Greeting),
            "!clients" => Some(ServiceCommand::ClientList),
            _ => None,
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inf_has_services_identity() {
        let services = Services::new();
        assert_eq!(services.build_inf(), format!("SERV CT17 ID{SERVICES_CID} NIServices"));
    }

    #[test]
    fn chat_answers_known_commands() {
        let services = Services::new();
        let sender: Sid = "AAAA".parse().unwrap();

        assert_eq!(services.chat(sender, "!hi"), Some(ServiceCommand::Greeting));
        assert_eq!(services.chat(sender, "!clients"), Some(ServiceCommand::ClientList));
        assert_eq!(services.chat(sender, "hello everyone"), None);
    }

    #[test]
    fn chat_ignores_itself() {
        let services = Services::new();
        assert_eq!(services.chat(Sid::SERVICES, "!hi"), None);
    }
}
