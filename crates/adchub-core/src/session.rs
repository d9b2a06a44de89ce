//! Per-client session state machine.
//!
//! Every accepted connection owns one [`Session`]. The session tracks the
//! handshake progression and the client's negotiated features and INF
//! record. Handlers follow the action pattern: they take the command
//! payload, mutate session state, and return [`SessionAction`]s for the hub
//! driver to execute. Roster-wide effects (the enter fan-out, broadcasts)
//! are the driver's job; the session only ever speaks for itself.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────┐  HSUP   ┌──────────┐  BINF   ┌────────┐  HPAS   ┌────────┐
//! │ PROTOCOL │────────>│ IDENTIFY │────────>│ VERIFY │────────>│ NORMAL │
//! └──────────┘         └──────────┘         └────────┘         └────────┘
//!                            │                                      ↑
//!                            └──────── BINF (IP bypass) ────────────┘
//! ```

use std::{collections::HashSet, net::IpAddr};

use adchub_proto::{FlagMap, Sid, escape, flag_dict, join_flags, unescape};

use crate::{env::Environment, identity};

/// Features the hub itself advertises in `ISUP`.
///
/// TIGR must be first because it indicates not only that TTHs are allowed on
/// this hub, but also that Tiger is the preferred hashing algorithm. While
/// most clients default to Tiger anyway, making this explicit is a good
/// thing.
const HUB_FEATURES: [&str; 4] = ["TIGR", "BASE", "BZIP", "PING"];

/// The client type the hub reports for itself in `IINF`.
const HUB_CLIENT_TYPE: &str = "32";

/// Length of the password-challenge nonce.
const NONCE_LEN: usize = 16;

/// Handshake progression of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for `HSUP`
    Protocol,
    /// Features negotiated, waiting for `BINF`
    Identify,
    /// Identified, waiting for `HPAS`
    Verify,
    /// Fully joined; participates in broadcasts
    Normal,
}

/// Actions returned by session handlers.
///
/// The hub driver executes these:
/// - `Reply`: send the line to this session
/// - `Enter`: run the hub's enter procedure for this session
/// - `Disconnect`: close this session's transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send this line to the session itself
    Reply(String),

    /// The session has finished authentication; the hub should admit it
    Enter,

    /// The session asked to leave; close its transport
    Disconnect,
}

/// State for a single client connection.
pub struct Session {
    /// Allocated session identifier, constant for the connection lifetime
    sid: Sid,
    /// Observed remote address
    remote_host: IpAddr,
    /// Current handshake state
    state: SessionState,
    /// Negotiated feature codes (`BASE`, `TIGR`, ...)
    features: HashSet<String>,
    /// The client's INF record
    inf: FlagMap,
    /// Outstanding password-challenge nonce, set while in VERIFY
    nonce: Option<String>,
}

impl Session {
    /// Create a session in PROTOCOL state.
    pub fn new(sid: Sid, remote_host: IpAddr) -> Self {
        Self {
            sid,
            remote_host,
            state: SessionState::Protocol,
            features: HashSet::new(),
            inf: FlagMap::new(),
            nonce: None,
        }
    }

    /// The session's SID.
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.sid
    }

    /// Current handshake state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The remote address the connection came from.
    #[must_use]
    pub fn remote_host(&self) -> IpAddr {
        self.remote_host
    }

    /// The session's INF record.
    #[must_use]
    pub fn inf(&self) -> &FlagMap {
        &self.inf
    }

    /// The client's nickname, if it sent one.
    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        self.inf.get("NI").map(String::as_str)
    }

    /// Whether the session negotiated a feature code.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Mark the session as fully joined.
    ///
    /// Called by the hub's enter procedure, after which the session
    /// participates in broadcasts.
    pub fn mark_normal(&mut self) {
        self.state = SessionState::Normal;
        self.nonce = None;
    }

    /// Build this session's INF line payload: `<sid> <flags>`.
    ///
    /// Hubs must never leak PIDs, so `PD` is stripped from the copy.
    #[must_use]
    pub fn build_inf(&self) -> String {
        let mut flags = self.inf.clone();
        flags.remove("PD");
        format!("{} {}", self.sid, join_flags(&flags))
    }

    /// Handle `SUP`: edit the feature set, then reply with the hub handshake
    /// if this was the opening `HSUP`.
    ///
    /// Tokens starting `AD` add a feature, `RM` remove one. `BASE` and
    /// `TIGR` are required after the edit. Legal in PROTOCOL (opening
    /// handshake) and NORMAL (dynamic update).
    pub fn handle_sup(&mut self, params: &str, uptime_secs: u64) -> Vec<SessionAction> {
        if !matches!(self.state, SessionState::Protocol | SessionState::Normal) {
            return vec![self.status(44, "Invalid state", &["FCHSUP"])];
        }

        for flag in params.split(' ') {
            if let Some(feature) = flag.strip_prefix("RM") {
                self.features.remove(feature);
            } else if let Some(feature) = flag.strip_prefix("AD") {
                self.features.insert(feature.to_string());
            }
        }

        if !self.features.contains("BASE") {
            return vec![self.status(45, "Missing required feature", &["FCBASE"])];
        }
        if !self.features.contains("TIGR") {
            return vec![self.status(45, "Missing required feature", &["FCTIGR"])];
        }

        if self.state != SessionState::Protocol {
            return vec![];
        }

        let sup = HUB_FEATURES.map(|f| format!("AD{f}")).join(" ");

        let mut info = FlagMap::new();
        info.insert("CT".to_string(), HUB_CLIENT_TYPE.to_string());
        info.insert("UP".to_string(), uptime_secs.to_string());

        self.state = SessionState::Identify;

        vec![
            SessionAction::Reply(format!("ISUP {sup}")),
            SessionAction::Reply(format!("ISID {}", self.sid)),
            SessionAction::Reply(format!("IINF {}", join_flags(&info))),
        ]
    }

    /// Handle `INF`: merge the presented flags, verify identity, and either
    /// admit the session or issue a password challenge.
    ///
    /// Legal in IDENTIFY (initial identification) and NORMAL (dynamic
    /// update). `bypass` skips the password challenge for trusted addresses.
    pub fn handle_inf<E: Environment>(
        &mut self,
        params: &str,
        bypass: bool,
        env: &E,
    ) -> Vec<SessionAction> {
        if !matches!(self.state, SessionState::Identify | SessionState::Normal) {
            return vec![self.status(44, "Invalid state", &["FCBINF"])];
        }

        let fields = params.split_once(' ').map_or("", |(_sid, rest)| rest);
        match flag_dict(fields) {
            Ok(flags) => self.inf.extend(flags),
            Err(e) => {
                tracing::warn!("{} ! undecodable INF: {e}", self.sid);
                return vec![];
            },
        }

        if identity::verify_identity(&self.inf).is_err() {
            return vec![self.status(27, "PID does not match CID", &[])];
        }

        // If the IP address was not provided, or if it was blank, write down
        // the actual connecting address.
        let blank = self.inf.get("I4").is_none_or(|i4| i4 == "0.0.0.0");
        if blank {
            self.inf.insert("I4".to_string(), self.remote_host.to_string());
        }

        if self.state != SessionState::Identify {
            return vec![];
        }

        if bypass {
            return vec![SessionAction::Enter];
        }

        let nonce = env.random_base32(NONCE_LEN);
        let gpa = format!("IGPA {nonce}");
        self.nonce = Some(nonce);
        self.state = SessionState::Verify;

        vec![SessionAction::Reply(gpa)]
    }

    /// Handle `PAS`: check the challenge response against the expected
    /// password and admit the session on a match.
    pub fn handle_pas(&mut self, params: &str, password: &str) -> Vec<SessionAction> {
        if self.state != SessionState::Verify {
            return vec![self.status(44, "Invalid state", &["FCIPAS"])];
        }

        let expected = self
            .nonce
            .as_deref()
            .and_then(|nonce| identity::hash_password(password, nonce).ok());

        if expected.as_deref() != Some(params) {
            return vec![self.status(23, "Incorrect password", &[])];
        }

        vec![SessionAction::Enter]
    }

    /// Handle `MSG`: log the chat line. Fan-out happens in the router.
    pub fn handle_msg(&self, params: &str) {
        let (_, message) = params.split_once(' ').unwrap_or(("", params));
        let name = self.nickname().unwrap_or(self.sid.as_str());
        match unescape(message) {
            Ok(text) => tracing::debug!("% <{name}> {text:?}"),
            Err(e) => tracing::warn!("{} ! undecodable MSG: {e}", self.sid),
        }
    }

    /// Handle `STA`: log the peer's status report.
    pub fn handle_sta(&self, params: &str) {
        let (code, description) = params.split_once(' ').unwrap_or((params, ""));
        let text = unescape(description).unwrap_or_else(|_| description.to_string());
        tracing::debug!("% STA {code} {text:?}");
    }

    /// Handle `QUI`: the client announced it is leaving.
    pub fn handle_qui(&self, params: &str) -> Vec<SessionAction> {
        let text = unescape(params).unwrap_or_else(|_| params.to_string());
        tracing::debug!("% {} quit: {text:?}", self.sid);
        vec![SessionAction::Disconnect]
    }

    /// Build a status reply: `ISTA <code> [<flags> ...] <escaped reason>`.
    ///
    /// Used internally by the handlers and by the hub router for state
    /// violations it polices itself (peer messages before NORMAL).
    pub fn status(&self, code: u32, reason: &str, flags: &[&str]) -> SessionAction {
        tracing::debug!("% status for {}: {reason} ({code}) {flags:?}", self.sid);

        let line = if flags.is_empty() {
            format!("ISTA {code} {}", escape(reason))
        } else {
            format!("ISTA {code} {} {}", flags.join(" "), escape(reason))
        };

        SessionAction::Reply(line)
    }
}
