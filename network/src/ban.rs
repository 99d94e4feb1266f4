//! Ban manager (spec §4.10).
//!
//! Time comes from an injectable [`Clock`] so tests (scenario S6) can
//! advance it deterministically instead of sleeping in real time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A source of "now", abstracted so tests never depend on wall-clock time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wraps `std::time::Instant::now()` for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually advanced clock for tests (spec §9 "Global state → explicit":
/// "the ban manager takes a clock interface"). Cloning shares the same
/// underlying mutex, so advancing any clone advances every handle — the
/// `BanManager` and the test driving it see the same "now". Uses `Arc<Mutex<_>>`
/// rather than `Rc<Cell<_>>` so it stays `Send`, matching `PeerClient`'s bound.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, Copy)]
struct PeerState {
    failure_count: u32,
    banned_until: Option<Instant>,
}

/// Tracks `{ peer_address -> (failure_count, banned_until) }` (spec §4.10).
pub struct BanManager<C: Clock> {
    clock: C,
    max_failed_requests: u32,
    ban_duration: Duration,
    peers: HashMap<String, PeerState>,
}

impl<C: Clock> BanManager<C> {
    pub fn new(clock: C, max_failed_requests: u32, ban_duration: Duration) -> Self {
        Self {
            clock,
            max_failed_requests,
            ban_duration,
            peers: HashMap::new(),
        }
    }

    /// Records a failed request against `peer`; bans it once
    /// `max_failed_requests` is reached.
    pub fn on_failed_request(&mut self, peer: &str) {
        let now = self.clock.now();
        let entry = self.peers.entry(peer.to_string()).or_insert(PeerState {
            failure_count: 0,
            banned_until: None,
        });
        entry.failure_count += 1;
        if entry.failure_count >= self.max_failed_requests {
            entry.banned_until = Some(now + self.ban_duration);
        }
    }

    /// Clears a peer's failure count, e.g. after a successful request.
    pub fn on_successful_request(&mut self, peer: &str) {
        if let Some(entry) = self.peers.get_mut(peer) {
            entry.failure_count = 0;
        }
    }

    pub fn is_banned(&self, peer: &str) -> bool {
        match self.peers.get(peer) {
            Some(entry) => match entry.banned_until {
                Some(until) => self.clock.now() < until,
                None => false,
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bans_after_threshold_and_recovers_past_ban_duration() {
        let clock = FakeClock::new();
        let mut mgr = BanManager::new(clock.clone(), 32, Duration::from_secs(3600));

        for _ in 0..31 {
            mgr.on_failed_request("peer-1");
        }
        assert!(!mgr.is_banned("peer-1"));

        mgr.on_failed_request("peer-1");
        assert!(mgr.is_banned("peer-1"));

        clock.advance(Duration::from_secs(3601));
        assert!(!mgr.is_banned("peer-1"));
    }

    #[test]
    fn successful_request_resets_failure_count() {
        let clock = FakeClock::new();
        let mut mgr = BanManager::new(clock, 3, Duration::from_secs(60));
        mgr.on_failed_request("peer-2");
        mgr.on_failed_request("peer-2");
        mgr.on_successful_request("peer-2");
        mgr.on_failed_request("peer-2");
        mgr.on_failed_request("peer-2");
        assert!(!mgr.is_banned("peer-2"));
    }
}
