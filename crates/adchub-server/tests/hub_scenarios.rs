//! End-to-end hub scenarios.
//!
//! These tests drive the sans-IO `HubDriver` directly with events and assert
//! on the emitted actions - the full protocol exchange without sockets:
//! handshake, identity failure, password challenge, chat, direct routing,
//! and teardown.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use adchub_core::{Environment, identity::hash_password};
use adchub_proto::{Sid, b32encode};
use adchub_server::{ConstPassword, HubAction, HubConfig, HubDriver, HubEvent};
use tiger::{Digest, Tiger};

/// Deterministic environment; every draw differs so SID allocation works.
#[derive(Clone, Default)]
struct TestEnv {
    counter: Arc<AtomicU8>,
}

impl Environment for TestEnv {
    fn wall_clock_secs(&self) -> u64 {
        1_234
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let base = self.counter.fetch_add(1, Ordering::Relaxed);
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = base.wrapping_add(i as u8);
        }
    }
}

type Hub = HubDriver<TestEnv, ConstPassword>;

fn hub() -> Hub {
    HubDriver::new(TestEnv::default(), ConstPassword::new("madcap"), HubConfig::default())
}

fn feed(hub: &mut Hub, sid: Sid, line: &str) -> Vec<HubAction> {
    hub.process_event(HubEvent::LineReceived { sid, line: line.to_string() })
}

/// All `Send` actions as `(target, line)` pairs.
fn sends(actions: &[HubAction]) -> Vec<(Sid, String)> {
    actions
        .iter()
        .filter_map(|action| match action {
            HubAction::Send { sid, line } => Some((*sid, line.clone())),
            _ => None,
        })
        .collect()
}

/// Lines sent to one specific session.
fn lines_to(actions: &[HubAction], target: Sid) -> Vec<String> {
    sends(actions).into_iter().filter(|(sid, _)| *sid == target).map(|(_, line)| line).collect()
}

/// Drive a fresh client through the whole handshake into NORMAL.
fn join(hub: &mut Hub, nick: &str) -> Sid {
    let sid = hub.accept("198.51.100.23".parse().unwrap());
    feed(hub, sid, "HSUP ADBASE ADTIGR");

    let actions = feed(hub, sid, &format!("BINF {sid} NI{nick}"));
    let nonce = lines_to(&actions, sid)
        .into_iter()
        .find_map(|line| line.strip_prefix("IGPA ").map(str::to_string))
        .expect("hub must challenge for a password");

    let response = hash_password("madcap", &nonce).expect("hub nonce is valid Base32");
    feed(hub, sid, &format!("HPAS {response}"));
    sid
}

#[test]
fn minimal_handshake() {
    let mut hub = hub();
    let sid = hub.accept("198.51.100.23".parse().unwrap());

    let actions = feed(&mut hub, sid, "HSUP ADBASE ADTIGR");
    let lines = lines_to(&actions, sid);

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "ISUP ADTIGR ADBASE ADBZIP ADPING");

    let assigned = lines[1].strip_prefix("ISID ").expect("second line must assign the SID");
    assert_eq!(assigned.len(), 4);
    assert_eq!(assigned, sid.as_str());

    let info = lines[2].strip_prefix("IINF ").expect("third line must be the hub INF");
    let mut fields = info.split(' ');
    assert_eq!(fields.next(), Some("CT32"));
    let up = fields.next().and_then(|f| f.strip_prefix("UP")).expect("hub INF must carry uptime");
    assert!(up.parse::<u64>().is_ok());
}

#[test]
fn identity_verification_failure() {
    let mut hub = hub();
    let sid = hub.accept("198.51.100.23".parse().unwrap());
    feed(&mut hub, sid, "HSUP ADBASE ADTIGR");

    let cid = b32encode(Tiger::digest([1u8; 24]).as_slice());
    let pid = b32encode(&[2u8; 24]);
    let actions = feed(&mut hub, sid, &format!("BINF {sid} ID{cid} PD{pid}"));

    assert_eq!(lines_to(&actions, sid), vec!["ISTA 27 PID\\sdoes\\snot\\smatch\\sCID"]);

    // Still in IDENTIFY: a password is rejected as the wrong state.
    let actions = feed(&mut hub, sid, "HPAS ABCDEFGH");
    assert_eq!(lines_to(&actions, sid), vec!["ISTA 44 FCIPAS Invalid\\sstate"]);
}

#[test]
fn password_challenge_and_entry() {
    let mut hub = hub();
    let observer = join(&mut hub, "observer");

    let sid = hub.accept("198.51.100.23".parse().unwrap());
    feed(&mut hub, sid, "HSUP ADBASE ADTIGR");

    let actions = feed(&mut hub, sid, &format!("BINF {sid} NInewcomer"));
    let challenge = lines_to(&actions, sid);
    assert_eq!(challenge.len(), 1);
    let nonce = challenge[0].strip_prefix("IGPA ").expect("expected a challenge");
    assert_eq!(nonce.len(), 16);

    // A wrong password keeps the session out.
    let actions = feed(&mut hub, sid, "HPAS WRONG");
    assert_eq!(lines_to(&actions, sid), vec!["ISTA 23 Incorrect\\spassword"]);

    // The right hash enters: the observer hears the newcomer's INF, the
    // newcomer receives one INF per existing NORMAL peer (observer + SERV).
    let response = hash_password("madcap", nonce).unwrap();
    let actions = feed(&mut hub, sid, &format!("HPAS {response}"));

    let to_observer = lines_to(&actions, observer);
    assert!(to_observer.iter().any(|l| l.starts_with(&format!("BINF {sid} "))));

    let to_newcomer = lines_to(&actions, sid);
    assert!(to_newcomer.iter().any(|l| l.starts_with(&format!("BINF {observer} "))));
    assert!(to_newcomer.iter().any(|l| l.starts_with("BINF SERV ")));
    assert!(!to_newcomer.iter().any(|l| l.starts_with(&format!("BINF {sid} "))));
}

#[test]
fn chat_reaches_everyone_and_services_replies_deferred() {
    let mut hub = hub();
    let a = join(&mut hub, "alice");
    let b = join(&mut hub, "bob");

    let actions = feed(&mut hub, a, &format!("BMSG {a} Hello\\sworld"));

    let expected = format!("BMSG {a} Hello\\sworld");
    assert_eq!(lines_to(&actions, b), vec![expected.clone()]);
    assert_eq!(lines_to(&actions, a), vec![expected]);

    // A chat command produces no inline services reply, only a deferral.
    let actions = feed(&mut hub, a, &format!("BMSG {a} !hi"));
    assert!(!sends(&actions).iter().any(|(_, line)| line.contains("Hey!")));

    let deferred = actions
        .iter()
        .find_map(|action| match action {
            HubAction::Defer { event } => Some(event.clone()),
            _ => None,
        })
        .expect("services reply must be deferred");

    let actions = hub.process_event(deferred);
    assert_eq!(lines_to(&actions, a), vec!["BMSG SERV Hey!".to_string()]);
    assert_eq!(lines_to(&actions, b), vec!["BMSG SERV Hey!".to_string()]);
}

#[test]
fn direct_to_missing_sid_answers_synthetic_quit() {
    let mut hub = hub();
    let a = join(&mut hub, "alice");
    let b = join(&mut hub, "bob");

    let actions = feed(&mut hub, a, &format!("DCTM {a} ZZZZ TCP4 412 1"));

    assert_eq!(lines_to(&actions, a), vec!["IQUI ZZZZ DI1".to_string()]);
    assert!(lines_to(&actions, b).is_empty());
}

#[test]
fn direct_and_echo_reach_the_receiver() {
    let mut hub = hub();
    let a = join(&mut hub, "alice");
    let b = join(&mut hub, "bob");

    let line = format!("DCTM {a} {b} TCP4 412 1");
    let actions = feed(&mut hub, a, &line);
    assert_eq!(lines_to(&actions, b), vec![line]);
    assert!(lines_to(&actions, a).is_empty());

    let line = format!("ERCM {a} {b} TCP4 1");
    let actions = feed(&mut hub, a, &line);
    assert_eq!(lines_to(&actions, b), vec![line.clone()]);
    assert_eq!(lines_to(&actions, a), vec![line]);
}

#[test]
fn teardown_announces_quit() {
    let mut hub = hub();
    let a = join(&mut hub, "alice");
    let b = join(&mut hub, "bob");

    let actions = hub.process_event(HubEvent::Disconnected { sid: a });

    assert_eq!(lines_to(&actions, b), vec![format!("IQUI {a}")]);
    assert!(lines_to(&actions, a).is_empty());
    assert_eq!(hub.client_count(), 1);
}

#[test]
fn pid_never_leaves_the_hub() {
    let mut hub = hub();
    let _observer = join(&mut hub, "observer");

    // A client that presents a matching ID/PD pair completes the handshake;
    // every line the hub ever emits must elide the PD flag.
    let pid_bytes = [9u8; 24];
    let cid = b32encode(Tiger::digest(pid_bytes).as_slice());
    let pid = b32encode(&pid_bytes);

    let sid = hub.accept("198.51.100.23".parse().unwrap());
    let mut emitted = Vec::new();

    emitted.extend(feed(&mut hub, sid, "HSUP ADBASE ADTIGR"));
    let actions = feed(&mut hub, sid, &format!("BINF {sid} NIsecret ID{cid} PD{pid}"));
    let nonce = lines_to(&actions, sid)
        .into_iter()
        .find_map(|line| line.strip_prefix("IGPA ").map(str::to_string))
        .unwrap();
    emitted.extend(actions);

    let response = hash_password("madcap", &nonce).unwrap();
    emitted.extend(feed(&mut hub, sid, &format!("HPAS {response}")));

    // Dynamic INF updates from NORMAL are rebuilt by the hub as well.
    emitted.extend(feed(&mut hub, sid, &format!("BINF {sid} DEnew\\sdescription PD{pid}")));

    for (_, line) in sends(&emitted) {
        assert!(!line.contains(" PD"), "hub leaked a PID in {line:?}");
    }
}
