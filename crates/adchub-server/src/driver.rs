//! Hub driver.
//!
//! Ties together the roster, the per-session state machines, and the line
//! router. The driver is sans-IO: the runtime feeds it [`HubEvent`]s and
//! executes the [`HubAction`]s it returns. All hub state lives here, so
//! serialising access to the driver serialises every roster mutation and
//! every fan-out decision.
//!
//! Inbound lines are processed in two stages, in order: the command handler
//! first (which may mutate session state and reply), then prefix routing
//! (broadcast, direct, echo). Routing samples the session's state as of the
//! start of dispatch, so a broadcast from a session that had not yet entered
//! is discarded even if the handler just admitted it.

use std::net::IpAddr;

use adchub_core::{Environment, Session, SessionAction, SessionState};
use adchub_proto::{Command, Message, Prefix, Sid, escape, unescape};

use crate::{
    password::PasswordStore,
    roster::{Peer, Roster},
    services::ServiceCommand,
};

/// Driver-level configuration.
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// Clients connecting from an address with this prefix skip the
    /// password challenge (e.g. `"10."` for a LAN hub). `None` challenges
    /// everybody.
    pub bypass_prefix: Option<String>,
}

/// Events the hub driver processes.
///
/// Produced by the runtime (or a test driving the hub directly).
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// A complete line arrived from a session
    LineReceived {
        /// Session that sent the line
        sid: Sid,
        /// The line, without its trailing LF
        line: String,
    },

    /// A session's transport was lost
    Disconnected {
        /// Session that went away
        sid: Sid,
    },

    /// A deferred services reply is due
    ServicesTurn {
        /// The chat command to answer
        command: ServiceCommand,
    },

    /// Forcibly disconnect a session
    Kick {
        /// Session to kick
        sid: Sid,
        /// Human-readable reason, broadcast to the hub
        reason: String,
    },
}

/// Actions the hub driver produces.
///
/// Executed by the runtime:
/// - `Send`: queue the line on the session's transport (lines to `SERV` are
///   sunk)
/// - `Close`: tear the session's transport down
/// - `Defer`: feed the event back in after the current dispatch finishes
#[derive(Debug, Clone)]
pub enum HubAction {
    /// Send a line to one session
    Send {
        /// Target session
        sid: Sid,
        /// Line to send, without trailing LF
        line: String,
    },

    /// Close a session's transport
    Close {
        /// Session to close
        sid: Sid,
        /// Reason for closing
        reason: String,
    },

    /// Re-enqueue an event for the next dispatch turn
    Defer {
        /// Event to process after the current dispatch
        event: HubEvent,
    },
}

/// The hub: roster plus fan-out plus line router.
pub struct HubDriver<E, P>
where
    E: Environment,
    P: PasswordStore,
{
    /// Live peers, including the permanent `SERV` entry
    roster: Roster,
    /// Environment (wall clock, RNG)
    env: E,
    /// Password lookup for the VERIFY stage
    passwords: P,
    /// Driver configuration
    config: HubConfig,
    /// Wall-clock second the hub started, for `IINF UP`
    started_secs: u64,
}

impl<E, P> HubDriver<E, P>
where
    E: Environment,
    P: PasswordStore,
{
    /// Create a new hub driver.
    pub fn new(env: E, passwords: P, config: HubConfig) -> Self {
        let started_secs = env.wall_clock_secs();
        Self { roster: Roster::new(), env, passwords, config, started_secs }
    }

    /// Accept a new connection: allocate a SID and register the session.
    ///
    /// Returns the allocated SID; the runtime uses it to address subsequent
    /// events for this connection.
    pub fn accept(&mut self, remote: IpAddr) -> Sid {
        let sid = self.roster.allocate_sid(&self.env);
        tracing::info!("accepting connection from {remote} as {sid}");

        self.roster.register(Session::new(sid, remote));
        sid
    }

    /// Process a hub event and return the actions to execute.
    ///
    /// This is the driver's main entry point.
    pub fn process_event(&mut self, event: HubEvent) -> Vec<HubAction> {
        match event {
            HubEvent::LineReceived { sid, line } => self.handle_line(sid, &line),
            HubEvent::Disconnected { sid } => self.handle_disconnected(sid),
            HubEvent::ServicesTurn { command } => self.handle_services_turn(command),
            HubEvent::Kick { sid, reason } => self.kick(sid, &reason),
        }
    }

    /// Forcibly disconnect a session, announcing the reason to the hub.
    pub fn kick(&mut self, sid: Sid, reason: &str) -> Vec<HubAction> {
        if self.roster.client(sid).is_none() {
            return Vec::new();
        }

        tracing::info!("kicking {sid}: {reason}");

        let mut actions = Vec::new();
        self.broadcast(&format!("IQUI {sid} MS{}", escape(reason)), &mut actions);
        actions.push(HubAction::Close { sid, reason: reason.to_string() });
        actions
    }

    /// Number of live client sessions (excluding `SERV`).
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.roster.len() - 1
    }

    /// Seconds since the hub started.
    fn uptime_secs(&self) -> u64 {
        self.env.wall_clock_secs().saturating_sub(self.started_secs)
    }

    /// Handle one inbound line: dispatch the command handler, then route.
    fn handle_line(&mut self, sid: Sid, line: &str) -> Vec<HubAction> {
        // Some clients occasionally send bare newlines as a form of
        // keepalive. Discard them immediately without logging.
        if line.is_empty() {
            return Vec::new();
        }

        tracing::debug!("{sid} > {line:?}");

        let msg = match Message::parse(line) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!("{sid} ! bad line {line:?}: {e}");
                return Vec::new();
            },
        };

        let uptime = self.uptime_secs();

        let Some(session) = self.roster.client_mut(sid) else {
            return Vec::new();
        };
        let state_before = session.state();

        // Peer messages are only legal once the session is NORMAL; SUP, INF
        // and PAS police their own states inside the session.
        let peer_message = matches!(
            msg.command,
            Command::MSG | Command::STA | Command::SCH | Command::CTM | Command::RCM
        );
        if peer_message && state_before != SessionState::Normal {
            let flag = format!("FC{}{}", msg.prefix.as_char(), msg.command);
            let rejection = match session.status(44, "Invalid state", &[&flag]) {
                SessionAction::Reply(reply) => reply,
                _ => return Vec::new(),
            };
            return vec![self.send(sid, rejection)];
        }

        let session_actions = match msg.command {
            Command::SUP => session.handle_sup(&msg.params, uptime),
            Command::INF => {
                let bypass = match &self.config.bypass_prefix {
                    Some(prefix) => session.remote_host().to_string().starts_with(prefix.as_str()),
                    None => false,
                };
                session.handle_inf(&msg.params, bypass, &self.env)
            },
            Command::PAS => {
                let password = self.passwords.password_for(session.inf());
                session.handle_pas(&msg.params, &password)
            },
            Command::MSG => {
                session.handle_msg(&msg.params);
                Vec::new()
            },
            Command::STA => {
                session.handle_sta(&msg.params);
                Vec::new()
            },
            Command::QUI => session.handle_qui(&msg.params),
            // No session-state effect; B/D/E routing below still applies.
            Command::SCH | Command::CTM | Command::RCM => Vec::new(),
            other => {
                tracing::debug!("{sid} ! can't handle {other}");
                Vec::new()
            },
        };

        let mut actions = Vec::new();
        for action in session_actions {
            match action {
                SessionAction::Reply(reply) => actions.push(self.send(sid, reply)),
                SessionAction::Enter => self.enter(sid, &mut actions),
                SessionAction::Disconnect => {
                    actions.push(HubAction::Close { sid, reason: "quit".to_string() });
                },
            }
        }

        self.route(sid, state_before, &msg, line, &mut actions);
        actions
    }

    /// The enter procedure: admit a session that finished authentication.
    ///
    /// The newcomer's INF goes out to every other NORMAL session first;
    /// the newcomer then receives one INF per existing NORMAL peer
    /// (including `SERV`).
    fn enter(&mut self, sid: Sid, actions: &mut Vec<HubAction>) {
        let Some(session) = self.roster.client_mut(sid) else {
            return;
        };
        session.mark_normal();
        let inf = session.build_inf();

        tracing::info!("{sid} entered the hub");

        for (peer_sid, peer) in self.roster.iter() {
            if peer_sid != sid && peer.state() == SessionState::Normal {
                actions.push(self.send(peer_sid, format!("BINF {inf}")));
            }
        }

        for (peer_sid, peer) in self.roster.iter() {
            if peer_sid != sid && peer.state() == SessionState::Normal {
                actions.push(self.send(sid, format!("BINF {}", peer.build_inf())));
            }
        }
    }

    /// Route a dispatched line according to its addressing prefix.
    fn route(
        &self,
        sid: Sid,
        state_before: SessionState,
        msg: &Message,
        line: &str,
        actions: &mut Vec<HubAction>,
    ) {
        match msg.prefix {
            Prefix::Broadcast => {
                // Broadcast from a session that has not entered is silently
                // discarded.
                if state_before != SessionState::Normal {
                    return;
                }

                if msg.command == Command::INF {
                    // INF is rebuilt from the session's record so the PID
                    // can never travel onward.
                    if let Some(session) = self.roster.client(sid) {
                        self.broadcast(&format!("BINF {}", session.build_inf()), actions);
                    }
                } else if msg.command == Command::MSG {
                    self.route_chat(sid, &msg.params, actions);
                } else {
                    self.broadcast(line, actions);
                }
            },
            Prefix::Direct => self.route_direct(sid, &msg.params, line, false, actions),
            Prefix::Echo => self.route_direct(sid, &msg.params, line, true, actions),
            // Hub-addressed and informational prefixes are consumed by the
            // handler; C and U never cross the hub.
            Prefix::Hub | Prefix::Info | Prefix::Feature | Prefix::Client | Prefix::Udp => {},
        }
    }

    /// Lift a `BMSG` into the semantic chat fan-out.
    fn route_chat(&self, sid: Sid, params: &str, actions: &mut Vec<HubAction>) {
        let Some((sender, message)) = params.split_once(' ') else {
            tracing::debug!("{sid} ! bad chat line");
            return;
        };
        let Ok(sender) = sender.parse::<Sid>() else {
            tracing::debug!("{sid} ! bad chat sender {sender:?}");
            return;
        };

        match unescape(message) {
            Ok(text) => self.chat(sender, &text, actions),
            Err(e) => tracing::debug!("{sid} ! undecodable chat: {e}"),
        }
    }

    /// Forward a direct (or echo) line to its receiver SID.
    fn route_direct(
        &self,
        sid: Sid,
        params: &str,
        line: &str,
        echo: bool,
        actions: &mut Vec<HubAction>,
    ) {
        let Some(receiver) = params.split(' ').nth(1) else {
            tracing::debug!("{sid} ! direct line without receiver");
            return;
        };

        let present = receiver.parse::<Sid>().ok().filter(|r| self.roster.contains(*r));

        match present {
            Some(target) => {
                actions.push(self.send(target, line.to_string()));
                if echo {
                    actions.push(self.send(sid, line.to_string()));
                }
            },
            None => {
                // DC++ only drops a stale peer from its list on a QUI with
                // DI set, so a missing receiver is answered with a synthetic
                // quit for that SID.
                actions.push(self.send(sid, format!("IQUI {receiver} DI1")));
            },
        }
    }

    /// Deliver a chat message to every NORMAL peer, services included.
    fn chat(&self, sender: Sid, text: &str, actions: &mut Vec<HubAction>) {
        let line = format!("BMSG {sender} {}", escape(text));

        for (peer_sid, peer) in self.roster.iter() {
            if peer.state() != SessionState::Normal {
                continue;
            }

            match peer {
                Peer::Client(_) => actions.push(self.send(peer_sid, line.clone())),
                Peer::Services(services) => {
                    if let Some(command) = services.chat(sender, text) {
                        actions.push(HubAction::Defer {
                            event: HubEvent::ServicesTurn { command },
                        });
                    }
                },
            }
        }
    }

    /// Send a line to every NORMAL peer.
    fn broadcast(&self, line: &str, actions: &mut Vec<HubAction>) {
        for (peer_sid, peer) in self.roster.iter() {
            if peer.state() == SessionState::Normal {
                actions.push(self.send(peer_sid, line.to_string()));
            }
        }
    }

    /// A session's transport was lost: unregister and announce the quit.
    fn handle_disconnected(&mut self, sid: Sid) -> Vec<HubAction> {
        if self.roster.remove(sid).is_none() {
            return Vec::new();
        }

        tracing::info!("{sid} connection lost");

        let mut actions = Vec::new();
        self.broadcast(&format!("IQUI {sid}"), &mut actions);
        actions
    }

    /// Answer a deferred services chat command.
    fn handle_services_turn(&self, command: ServiceCommand) -> Vec<HubAction> {
        let text = match command {
            ServiceCommand::Greeting => "Hey!".to_string(),
            ServiceCommand::ClientList => self.client_listing(),
        };

        let mut actions = Vec::new();
        self.chat(Sid::SERVICES, &text, &mut actions);
        actions
    }

    /// Human-readable listing of connected clients for `!clients`.
    fn client_listing(&self) -> String {
        let entries: Vec<String> = self
            .roster
            .iter()
            .filter_map(|(sid, peer)| match peer {
                Peer::Client(session) => Some(match session.nickname() {
                    Some(nick) => format!("{sid} {nick}"),
                    None => sid.to_string(),
                }),
                Peer::Services(_) => None,
            })
            .collect();

        if entries.is_empty() {
            "no clients connected".to_string()
        } else {
            format!("{} connected: {}", entries.len(), entries.join(", "))
        }
    }

    /// Log and build a send action.
    fn send(&self, sid: Sid, line: String) -> HubAction {
        tracing::debug!("{sid} < {line:?}");
        HubAction::Send { sid, line }
    }
}

impl<E, P> std::fmt::Debug for HubDriver<E, P>
where
    E: Environment,
    P: PasswordStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubDriver").field("client_count", &self.client_count()).finish()
    }
}
