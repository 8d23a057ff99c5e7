//! Event-driven connection supervision.
//!
//! The supervisor is the one piece of real business logic in this crate: it
//! consumes the stack's link- and IP-layer events, drives the bounded
//! reconnect policy, and publishes the terminal outcome on an
//! [`EventFlags`] group that the startup routine blocks on.
//!
//! Events arrive on the stack's dispatch context while the startup thread is
//! parked in [`ConnectionSupervisor::wait_outcome`]; the retry counter and
//! the outcome bits are the only shared state, and the event handler is
//! their only writer.
//!
//! # Example
//!
//! ```
//! use wifi_supervisor_esp32::supervisor::{ConnectionSupervisor, LinkEvent, Outcome, StationControl};
//!
//! struct NoRadio;
//! impl StationControl for NoRadio {
//!     fn request_connect(&self) {}
//! }
//!
//! let supervisor = ConnectionSupervisor::new(3);
//! supervisor.handle_event(&LinkEvent::InterfaceStarted, &NoRadio);
//! supervisor.handle_event(&LinkEvent::IpAcquired("10.0.0.9".parse().unwrap()), &NoRadio);
//! assert_eq!(supervisor.outcome(), Some(Outcome::Connected));
//! ```

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::info;

use crate::signal::EventFlags;

/// Outcome bit: an IP address was acquired.
pub const CONNECTED_BIT: u32 = 1 << 0;

/// Outcome bit: the retry budget is exhausted.
pub const FAILED_BIT: u32 = 1 << 1;

/// Link- and IP-layer events the supervisor reacts to.
///
/// Produced by the stack bridge on device, or synthesized in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The station interface finished starting.
    InterfaceStarted,
    /// The station lost (or never achieved) association.
    Disconnected,
    /// DHCP handed the station an address.
    IpAcquired(Ipv4Addr),
    /// A peer associated with our soft-AP.
    PeerJoined { mac: [u8; 6], aid: u16 },
    /// A peer left our soft-AP.
    PeerLeft { mac: [u8; 6], aid: u16 },
}

/// Port through which the supervisor asks the stack for a (re)connect.
///
/// Implementations must not block; they run on the event dispatch context.
pub trait StationControl {
    /// Issue a connect request. Rejections are the implementation's to log;
    /// a lost request surfaces as another `Disconnected` event anyway.
    fn request_connect(&self);
}

/// Terminal result of a connection attempt session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Associated and holding an IP address.
    Connected,
    /// Retry budget exhausted without an address.
    Failed,
}

/// Shared connection-attempt state: retry counter plus outcome flags.
///
/// Owned by the startup routine and handed (via `Arc`) to the event bridge,
/// rather than living in globals, so independent attempts can coexist in one
/// process.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    flags: EventFlags,
    // Single writer: the event dispatch context.
    retries: AtomicU32,
    max_retries: u32,
}

impl ConnectionSupervisor {
    /// Create a supervisor allowing `max_retries` reconnect attempts.
    pub fn new(max_retries: u32) -> Self {
        Self {
            flags: EventFlags::new(),
            retries: AtomicU32::new(0),
            max_retries,
        }
    }

    /// Feed one stack event through the state machine.
    ///
    /// Non-blocking; called once per event from the dispatch context.
    pub fn handle_event(&self, event: &LinkEvent, station: &dyn StationControl) {
        match event {
            LinkEvent::InterfaceStarted => {
                info!("station interface started, requesting connect");
                station.request_connect();
            }
            LinkEvent::Disconnected => {
                let attempts = self.retries.load(Ordering::Relaxed);
                if attempts < self.max_retries {
                    station.request_connect();
                    self.retries.store(attempts + 1, Ordering::Relaxed);
                    info!(
                        "retrying connect to the AP ({}/{})",
                        attempts + 1,
                        self.max_retries
                    );
                } else {
                    self.flags.set(FAILED_BIT);
                }
                // Per-attempt line: this attempt failed, not the whole session.
                info!("connect attempt to the AP failed");
            }
            LinkEvent::IpAcquired(ip) => {
                info!("got IP: {}", ip);
                self.retries.store(0, Ordering::Relaxed);
                self.flags.set(CONNECTED_BIT);
            }
            LinkEvent::PeerJoined { mac, aid } => {
                info!("station {} joined, AID={}", format_mac(mac), aid);
            }
            LinkEvent::PeerLeft { mac, aid } => {
                info!("station {} left, AID={}", format_mac(mac), aid);
            }
        }
    }

    /// Block until a terminal outcome is published or `timeout` elapses.
    ///
    /// Production passes `None` and relies on the bounded retry policy for
    /// termination; tests pass a short timeout so nothing can hang.
    pub fn wait_outcome(&self, timeout: Option<Duration>) -> Option<Outcome> {
        Self::decode(self.flags.wait_any(CONNECTED_BIT | FAILED_BIT, timeout))
    }

    /// Outcome published so far, if any. Never blocks.
    pub fn outcome(&self) -> Option<Outcome> {
        Self::decode(self.flags.get())
    }

    /// Reconnect attempts issued since startup or the last address grant.
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    fn decode(bits: u32) -> Option<Outcome> {
        if bits & CONNECTED_BIT != 0 {
            Some(Outcome::Connected)
        } else if bits & FAILED_BIT != 0 {
            Some(Outcome::Failed)
        } else {
            None
        }
    }
}

/// Render a MAC address the way the log lines expect it.
pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    /// Counts connect requests instead of touching a radio.
    #[derive(Default)]
    struct RecordingStation {
        connects: AtomicU32,
    }

    impl RecordingStation {
        fn connects(&self) -> u32 {
            self.connects.load(Ordering::Relaxed)
        }
    }

    impl StationControl for RecordingStation {
        fn request_connect(&self) {
            self.connects.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn ip() -> LinkEvent {
        LinkEvent::IpAcquired(Ipv4Addr::new(192, 168, 1, 50))
    }

    #[test]
    fn test_interface_start_requests_connect() {
        let supervisor = ConnectionSupervisor::new(3);
        let station = RecordingStation::default();
        supervisor.handle_event(&LinkEvent::InterfaceStarted, &station);
        assert_eq!(station.connects(), 1);
        assert_eq!(supervisor.retries(), 0);
        assert_eq!(supervisor.outcome(), None);
    }

    #[test]
    fn test_each_disconnect_increments_retries_below_limit() {
        let supervisor = ConnectionSupervisor::new(3);
        let station = RecordingStation::default();
        for expected in 1..=3 {
            supervisor.handle_event(&LinkEvent::Disconnected, &station);
            assert_eq!(supervisor.retries(), expected);
            assert_eq!(supervisor.outcome(), None);
        }
        assert_eq!(station.connects(), 3);
    }

    #[test]
    fn test_disconnect_past_limit_fails_without_reconnect() {
        let supervisor = ConnectionSupervisor::new(3);
        let station = RecordingStation::default();
        for _ in 0..4 {
            supervisor.handle_event(&LinkEvent::Disconnected, &station);
        }
        // Exactly three reconnects were attempted; the fourth event only
        // published the failure.
        assert_eq!(station.connects(), 3);
        assert_eq!(supervisor.retries(), 3);
        assert_eq!(supervisor.outcome(), Some(Outcome::Failed));
        assert_eq!(supervisor.flags.get() & CONNECTED_BIT, 0);
    }

    #[test]
    fn test_ip_acquired_resets_counter_and_signals_success() {
        let supervisor = ConnectionSupervisor::new(3);
        let station = RecordingStation::default();
        supervisor.handle_event(&LinkEvent::Disconnected, &station);
        supervisor.handle_event(&LinkEvent::Disconnected, &station);
        supervisor.handle_event(&ip(), &station);
        assert_eq!(supervisor.retries(), 0);
        assert_eq!(supervisor.outcome(), Some(Outcome::Connected));
        assert_eq!(supervisor.flags.get() & FAILED_BIT, 0);
    }

    #[test]
    fn test_outcome_bits_stay_exclusive_until_terminal() {
        // Success path: no failure bit anywhere along the way.
        let supervisor = ConnectionSupervisor::new(2);
        let station = RecordingStation::default();
        supervisor.handle_event(&LinkEvent::InterfaceStarted, &station);
        supervisor.handle_event(&LinkEvent::Disconnected, &station);
        assert_eq!(supervisor.flags.get(), 0);
        supervisor.handle_event(&ip(), &station);
        assert_eq!(supervisor.flags.get(), CONNECTED_BIT);
    }

    #[test]
    fn test_waiter_is_woken_by_dispatch_thread() {
        let supervisor = Arc::new(ConnectionSupervisor::new(3));
        let dispatch = {
            let supervisor = supervisor.clone();
            thread::spawn(move || {
                let station = RecordingStation::default();
                thread::sleep(Duration::from_millis(30));
                supervisor.handle_event(&LinkEvent::InterfaceStarted, &station);
                supervisor.handle_event(&LinkEvent::Disconnected, &station);
                supervisor.handle_event(&ip(), &station);
            })
        };
        let outcome = supervisor.wait_outcome(Some(Duration::from_secs(5)));
        assert_eq!(outcome, Some(Outcome::Connected));
        dispatch.join().unwrap();
    }

    #[test]
    fn test_wait_times_out_when_nothing_terminal_happens() {
        let supervisor = ConnectionSupervisor::new(3);
        let station = RecordingStation::default();
        supervisor.handle_event(&LinkEvent::Disconnected, &station);
        assert_eq!(supervisor.wait_outcome(Some(Duration::from_millis(30))), None);
    }

    #[test]
    fn test_peer_events_do_not_touch_station_state() {
        let supervisor = ConnectionSupervisor::new(3);
        let station = RecordingStation::default();
        let mac = [0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22];
        supervisor.handle_event(&LinkEvent::PeerJoined { mac, aid: 1 }, &station);
        supervisor.handle_event(&LinkEvent::PeerLeft { mac, aid: 1 }, &station);
        assert_eq!(station.connects(), 0);
        assert_eq!(supervisor.retries(), 0);
        assert_eq!(supervisor.outcome(), None);
    }

    // Scenario from the field: flaky AP, budget of three.
    #[test]
    fn test_scenario_four_disconnects_with_budget_three() {
        let supervisor = ConnectionSupervisor::new(3);
        let station = RecordingStation::default();
        let script = [
            LinkEvent::Disconnected,
            LinkEvent::Disconnected,
            LinkEvent::Disconnected,
            LinkEvent::Disconnected,
        ];
        for event in &script {
            supervisor.handle_event(event, &station);
        }
        assert_eq!(supervisor.retries(), 3);
        assert_eq!(supervisor.outcome(), Some(Outcome::Failed));
        assert_eq!(station.connects(), 3);
    }

    #[test]
    fn test_scenario_recovery_on_third_event() {
        let supervisor = ConnectionSupervisor::new(3);
        let station = RecordingStation::default();
        supervisor.handle_event(&LinkEvent::Disconnected, &station);
        supervisor.handle_event(&LinkEvent::Disconnected, &station);
        supervisor.handle_event(&ip(), &station);
        assert_eq!(supervisor.retries(), 0);
        assert_eq!(supervisor.outcome(), Some(Outcome::Connected));
    }

    #[test]
    fn test_format_mac() {
        assert_eq!(
            format_mac(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x42]),
            "de:ad:be:ef:00:42"
        );
    }
}
