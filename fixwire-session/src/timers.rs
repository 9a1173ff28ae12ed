/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Named session timers.
//!
//! A small deadline table driven by one select-style wait: the session arms
//! and cancels named timers, the runner sleeps until the earliest deadline
//! and feeds the fired id back into the machine. Cancellation is just
//! dropping the entry.

use std::time::Duration;
use tokio::time::Instant;

/// The named timeouts of the session protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    /// Max time to complete the logon handshake.
    Logon,
    /// Outbound idle: a Heartbeat is due.
    Heartbeat,
    /// Inbound idle: a TestRequest is due.
    TestRequest,
    /// A TestRequest went unanswered for too long.
    DeadPeer,
    /// Grace period for the logout handshake.
    Logout,
}

impl TimerId {
    const COUNT: usize = 5;

    /// All timer ids, indexable order.
    pub const ALL: [TimerId; Self::COUNT] = [
        Self::Logon,
        Self::Heartbeat,
        Self::TestRequest,
        Self::DeadPeer,
        Self::Logout,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Logon => 0,
            Self::Heartbeat => 1,
            Self::TestRequest => 2,
            Self::DeadPeer => 3,
            Self::Logout => 4,
        }
    }
}

/// Deadline table for the session's named timers.
#[derive(Debug, Default)]
pub struct Timers {
    deadlines: [Option<Instant>; TimerId::COUNT],
}

impl Timers {
    /// Creates an empty timer table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a timer to fire after `delay` from now.
    pub fn arm(&mut self, id: TimerId, delay: Duration) {
        self.deadlines[id.index()] = Some(Instant::now() + delay);
    }

    /// Cancels a timer.
    pub fn cancel(&mut self, id: TimerId) {
        self.deadlines[id.index()] = None;
    }

    /// Cancels every timer.
    pub fn cancel_all(&mut self) {
        self.deadlines = [None; TimerId::COUNT];
    }

    /// Returns true if the timer is armed.
    #[must_use]
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.deadlines[id.index()].is_some()
    }

    /// Returns the earliest armed deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<(TimerId, Instant)> {
        TimerId::ALL
            .iter()
            .filter_map(|&id| self.deadlines[id.index()].map(|at| (id, at)))
            .min_by_key(|&(_, at)| at)
    }

    /// Acknowledges a fired timer, disarming it.
    ///
    /// Returns false if the timer was no longer armed (cancelled after the
    /// wait started); the firing should then be ignored.
    pub fn acknowledge(&mut self, id: TimerId) -> bool {
        self.deadlines[id.index()].take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_and_next_deadline() {
        let mut timers = Timers::new();
        assert!(timers.next_deadline().is_none());

        timers.arm(TimerId::Heartbeat, Duration::from_secs(30));
        timers.arm(TimerId::TestRequest, Duration::from_secs(36));

        let (id, _) = timers.next_deadline().unwrap();
        assert_eq!(id, TimerId::Heartbeat);
    }

    #[test]
    fn test_rearm_moves_deadline() {
        let mut timers = Timers::new();
        timers.arm(TimerId::Heartbeat, Duration::from_secs(1));
        timers.arm(TimerId::TestRequest, Duration::from_secs(2));

        // Re-arming the heartbeat past the test request changes the winner.
        timers.arm(TimerId::Heartbeat, Duration::from_secs(10));
        let (id, _) = timers.next_deadline().unwrap();
        assert_eq!(id, TimerId::TestRequest);
    }

    #[test]
    fn test_cancel() {
        let mut timers = Timers::new();
        timers.arm(TimerId::Logon, Duration::from_secs(10));
        assert!(timers.is_armed(TimerId::Logon));

        timers.cancel(TimerId::Logon);
        assert!(!timers.is_armed(TimerId::Logon));
        assert!(timers.next_deadline().is_none());
    }

    #[test]
    fn test_cancel_all() {
        let mut timers = Timers::new();
        for id in TimerId::ALL {
            timers.arm(id, Duration::from_secs(1));
        }
        timers.cancel_all();
        assert!(timers.next_deadline().is_none());
    }

    #[test]
    fn test_acknowledge() {
        let mut timers = Timers::new();
        timers.arm(TimerId::DeadPeer, Duration::from_millis(1));

        assert!(timers.acknowledge(TimerId::DeadPeer));
        assert!(!timers.is_armed(TimerId::DeadPeer));
        // Second acknowledge reports a stale firing.
        assert!(!timers.acknowledge(TimerId::DeadPeer));
    }
}
