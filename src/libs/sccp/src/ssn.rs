//! Subsystem state
//!
//! Per-subsystem state entries as seen by SCCP management (Q.714 chapter 5).
//! Each entry tracks one (point code, SSN) pair, local or remote, through
//! the prohibited/allowed state machine. Mutable state sits behind a
//! per-entry readers-writer lock; identity fields are immutable.

use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;

/// Subsystem state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SsnState {
    /// Out of service; remote entries in this state are under test
    #[default]
    Prohibited,
    /// In service
    Allowed,
}

impl fmt::Display for SsnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prohibited => f.write_str("prohibited"),
            Self::Allowed => f.write_str("allowed"),
        }
    }
}

/// Why a subsystem changed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeReason {
    /// Local N-STATE request (user in/out of service)
    UserInitiated,
    /// SSA or SSP received from the network
    NetworkInitiated,
    /// Subsystem test retries exhausted
    TestTimeout,
    /// Subsystem test answered
    TestResponse,
}

/// Broadcast kinds announced to the network on local state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastType {
    /// Subsystem Allowed
    Ssa,
    /// Subsystem Prohibited
    Ssp,
}

/// Mutable state of a subsystem entry, guarded by the entry lock
pub(crate) struct EntryState {
    pub state: SsnState,
    pub last_state_change: SystemTime,
    /// Running subsystem test task, remote prohibited entries only
    pub test_task: Option<JoinHandle<()>>,
    /// Bumped on every test start/stop so a stale task can detect it
    pub test_generation: u64,
    pub test_interval: Duration,
    pub test_retries: u32,
    pub max_test_retries: u32,
}

/// A subsystem known to the state manager
///
/// Created in state [`SsnState::Prohibited`]. Local entries are driven by
/// user in/out-of-service requests and answer subsystem tests; remote
/// entries are driven by received SCMG and are probed with SST while
/// prohibited.
pub struct SsnEntry {
    ssn: u8,
    point_code: u16,
    is_local: bool,
    pub(crate) inner: RwLock<EntryState>,
}

impl SsnEntry {
    pub(crate) fn new(
        point_code: u16,
        ssn: u8,
        is_local: bool,
        test_interval: Duration,
        max_test_retries: u32,
    ) -> Self {
        Self {
            ssn,
            point_code,
            is_local,
            inner: RwLock::new(EntryState {
                state: SsnState::Prohibited,
                last_state_change: SystemTime::now(),
                test_task: None,
                test_generation: 0,
                test_interval,
                test_retries: 0,
                max_test_retries,
            }),
        }
    }

    /// Subsystem number
    pub fn ssn(&self) -> u8 {
        self.ssn
    }

    /// Point code
    pub fn point_code(&self) -> u16 {
        self.point_code
    }

    /// Whether this subsystem is served by the local node
    pub fn is_local(&self) -> bool {
        self.is_local
    }

    /// Current state
    pub fn state(&self) -> SsnState {
        self.read().state
    }

    /// Whether the subsystem is in service
    pub fn is_allowed(&self) -> bool {
        self.state() == SsnState::Allowed
    }

    /// Whether the subsystem is out of service
    pub fn is_prohibited(&self) -> bool {
        self.state() == SsnState::Prohibited
    }

    /// Mark the subsystem in service
    pub fn mark_allowed(&self) {
        let mut state = self.write();
        state.state = SsnState::Allowed;
        state.last_state_change = SystemTime::now();
    }

    /// Mark the subsystem out of service
    pub fn mark_prohibited(&self) {
        let mut state = self.write();
        state.state = SsnState::Prohibited;
        state.last_state_change = SystemTime::now();
    }

    /// Wall-clock time of the last state transition
    pub fn last_state_change(&self) -> SystemTime {
        self.read().last_state_change
    }

    /// Subsystem test retries performed in the current test run
    pub fn test_retries(&self) -> u32 {
        self.read().test_retries
    }

    /// Whether a subsystem test is scheduled
    pub fn has_test_timer(&self) -> bool {
        self.read().test_task.is_some()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, EntryState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, EntryState> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for SsnEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsnEntry")
            .field("pc", &self.point_code)
            .field("ssn", &self.ssn)
            .field("is_local", &self.is_local)
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for SsnEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} subsystem pc={} ssn={} ({})",
            if self.is_local { "local" } else { "remote" },
            self.point_code,
            self.ssn,
            self.state()
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> SsnEntry {
        SsnEntry::new(0x1234, 8, false, Duration::from_secs(30), 5)
    }

    #[test]
    fn test_initial_state_is_prohibited() {
        let e = entry();
        assert!(e.is_prohibited());
        assert!(!e.is_allowed());
        assert_eq!(e.state(), SsnState::Prohibited);
        assert!(!e.has_test_timer());
    }

    #[test]
    fn test_mark_transitions() {
        let e = entry();
        e.mark_allowed();
        assert!(e.is_allowed());
        e.mark_prohibited();
        assert!(e.is_prohibited());
    }

    #[test]
    fn test_state_change_timestamp_advances() {
        let e = entry();
        let created = e.last_state_change();
        e.mark_allowed();
        let after_allowed = e.last_state_change();
        assert!(after_allowed >= created);
        e.mark_prohibited();
        assert!(e.last_state_change() >= after_allowed);
    }

    #[test]
    fn test_identity_accessors() {
        let e = entry();
        assert_eq!(e.point_code(), 0x1234);
        assert_eq!(e.ssn(), 8);
        assert!(!e.is_local());
    }
}
