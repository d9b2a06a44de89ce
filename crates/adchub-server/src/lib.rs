//! ADC hub server.
//!
//! Production runtime wrapping the sans-IO [`HubDriver`] with Tokio TCP I/O.
//!
//! # Architecture
//!
//! The driver owns all hub state (roster, session state machines) and is
//! pure logic: events in, actions out. This crate provides the glue that
//! feeds it - an accept loop, a line-reading task per connection, and a
//! per-session outbound queue - while serialising every driver call behind
//! one mutex so line dispatch always observes a consistent roster.
//!
//! # Components
//!
//! - [`HubDriver`]: event → action orchestrator (pure logic, no I/O)
//! - [`Server`]: production runtime that executes driver actions
//! - [`TcpTransport`]: plain TCP listener
//! - [`SystemEnv`]: production environment (wall clock, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod password;
mod roster;
mod services;
mod system_env;
mod transport;

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use adchub_proto::Sid;
pub use driver::{HubAction, HubConfig, HubDriver, HubEvent};
pub use error::ServerError;
pub use password::{ConstPassword, PasswordStore};
pub use roster::{Peer, Roster};
pub use services::{ServiceCommand, Services};
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::{Mutex, RwLock, mpsc},
};
use tokio_util::sync::CancellationToken;
pub use transport::TcpTransport;

/// Lines queued per session before the hub gives up on a slow client.
const OUTBOUND_QUEUE_LINES: usize = 1024;

/// The production driver type: system environment, one shared password.
type Driver = HubDriver<SystemEnv, ConstPassword>;

/// Per-connection handles the action executor needs: the outbound queue and
/// a token that tears the connection down.
struct OutboundHandle {
    /// Queue drained by the connection's writer task
    tx: mpsc::Sender<String>,
    /// Cancelling this breaks the connection's read loop
    cancel: CancellationToken,
}

/// Shared state for all connections.
struct SharedState {
    /// Map of SID to outbound handle. `SERV` never appears here, so lines
    /// addressed to it are sunk.
    outbound: RwLock<HashMap<Sid, OutboundHandle>>,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:3231")
    pub bind_address: String,
    /// Shared hub password
    pub password: String,
    /// Driver configuration
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3231".to_string(),
            password: "madcap".to_string(),
            hub: HubConfig::default(),
        }
    }
}

/// Production ADC hub server.
///
/// Wraps [`HubDriver`] with a TCP accept loop and per-connection tasks.
pub struct Server {
    /// The hub driver, shared behind the serialising mutex
    driver: Arc<Mutex<Driver>>,
    /// TCP listener
    transport: TcpTransport,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let driver = HubDriver::new(
            SystemEnv::new(),
            ConstPassword::new(config.password),
            config.hub,
        );

        let transport = TcpTransport::bind(&config.bind_address).await?;

        Ok(Self { driver: Arc::new(Mutex::new(driver)), transport })
    }

    /// Run the server, accepting connections and dispatching lines.
    ///
    /// Runs until the listener fails fatally.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("hub listening on {}", self.transport.local_addr()?);

        let shared = Arc::new(SharedState { outbound: RwLock::new(HashMap::new()) });

        loop {
            match self.transport.accept().await {
                Ok((stream, addr)) => {
                    let driver = Arc::clone(&self.driver);
                    let shared = Arc::clone(&shared);

                    tokio::spawn(async move {
                        handle_connection(stream, addr.ip(), driver, shared).await;
                    });
                },
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Handle a single client connection from accept to teardown.
async fn handle_connection(
    stream: TcpStream,
    remote: std::net::IpAddr,
    driver: Arc<Mutex<Driver>>,
    shared: Arc<SharedState>,
) {
    let sid = driver.lock().await.accept(remote);

    let (read_half, write_half) = stream.into_split();

    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_LINES);
    let cancel = CancellationToken::new();

    {
        let mut outbound = shared.outbound.write().await;
        outbound.insert(sid, OutboundHandle { tx, cancel: cancel.clone() });
    }

    let writer = tokio::spawn(write_outbound(write_half, rx));

    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            next = lines.next_line() => match next {
                Ok(Some(line)) => {
                    dispatch_event(&driver, &shared, HubEvent::LineReceived { sid, line }).await;
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("{sid} read error: {e}");
                    break;
                },
            },
        }
    }

    // Dropping the outbound handle closes the queue; the writer task drains
    // whatever is already queued (a kick's ISTA/IQUI included) and shuts
    // the socket down.
    {
        let mut outbound = shared.outbound.write().await;
        outbound.remove(&sid);
    }

    dispatch_event(&driver, &shared, HubEvent::Disconnected { sid }).await;

    let _ = writer.await;
}

/// Drain a session's outbound queue onto its socket.
async fn write_outbound(mut write_half: OwnedWriteHalf, mut rx: mpsc::Receiver<String>) {
    while let Some(line) = rx.recv().await {
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');
        if write_half.write_all(&bytes).await.is_err() {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

/// Feed an event through the driver and execute the resulting actions.
///
/// Deferred events (services replies) are queued and processed after the
/// current dispatch finishes, never re-entrantly. The driver mutex is held
/// only while computing actions; the fan-out targets are resolved inside the
/// driver, so sends can safely happen outside the lock.
async fn dispatch_event(driver: &Arc<Mutex<Driver>>, shared: &Arc<SharedState>, event: HubEvent) {
    let mut queue = VecDeque::from([event]);

    while let Some(event) = queue.pop_front() {
        let actions = driver.lock().await.process_event(event);

        for action in actions {
            match action {
                HubAction::Send { sid, line } => {
                    let outbound = shared.outbound.read().await;
                    let Some(handle) = outbound.get(&sid) else {
                        // SERV sink, or the session is already gone.
                        continue;
                    };

                    if handle.tx.try_send(line).is_err() && !handle.cancel.is_cancelled() {
                        // The queue cap is the back-pressure policy: a
                        // client that cannot keep up is kicked.
                        tracing::warn!("{sid} outbound queue overflow");
                        queue.push_back(HubEvent::Kick {
                            sid,
                            reason: "send queue overflow".to_string(),
                        });
                    }
                },
                HubAction::Close { sid, reason } => {
                    tracing::debug!("closing {sid}: {reason}");
                    let outbound = shared.outbound.read().await;
                    if let Some(handle) = outbound.get(&sid) {
                        handle.cancel.cancel();
                    }
                },
                HubAction::Defer { event } => queue.push_back(event),
            }
        }
    }
}
