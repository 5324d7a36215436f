//! Subsystem state management
//!
//! The SCCP management procedures of Q.714 chapter 5: a registry of local
//! and remote subsystems keyed by (point code, SSN), driven by received
//! SCMG messages and local N-STATE requests. Remote subsystems that become
//! prohibited are probed with Subsystem Test messages on an exponential
//! backoff schedule until they answer or the retry budget runs out.
//!
//! Locking discipline: the registry lock is taken before any entry lock and
//! never the other way around. Callbacks and transport sends always happen
//! outside the entry lock, and no lock is held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, Weak};
use std::time::{Duration, SystemTime};

use bytes::Bytes;

use crate::error::{SccpError, SccpResult};
use crate::scmg::{Scmg, ScmgMessageType};
use crate::ssn::{BroadcastType, SsnEntry, SsnState, StateChangeReason};
use crate::udt::Udt;

/// The SSN reserved for SCCP management itself (Q.713 3.4.2.2)
pub const SCCP_MANAGEMENT_SSN: u8 = 1;

/// Transport collaborator carrying outbound SCMG octets.
///
/// Implementations wrap the SCMG payload into a connectionless message and
/// hand it to M3UA/SCTP. Must be safe to call from timer tasks.
pub trait ScmgTransport: Send + Sync {
    /// Send an encoded SCMG message concerning the given subsystem
    fn send_scmg(&self, pc: u16, ssn: u8, payload: Bytes) -> SccpResult<()>;
}

/// Observer for subsystem state events.
///
/// Invoked synchronously on the hot path, outside any entry lock;
/// implementations must not block.
pub trait SsnEventHandler: Send + Sync {
    /// A subsystem changed state
    fn on_state_change(&self, entry: &Arc<SsnEntry>, state: SsnState, reason: StateChangeReason);

    /// A local state change should be announced to the network
    fn on_broadcast(&self, broadcast: BroadcastType, entry: &Arc<SsnEntry>);
}

/// Subsystem test configuration
#[derive(Debug, Clone)]
pub struct SsnManagerConfig {
    /// First SST interval after a subsystem becomes prohibited
    pub default_test_interval: Duration,
    /// Ceiling for the exponential backoff
    pub max_test_interval: Duration,
    /// SST attempts before the test run is abandoned
    pub max_test_retries: u32,
}

impl Default for SsnManagerConfig {
    fn default() -> Self {
        Self {
            default_test_interval: Duration::from_secs(30),
            max_test_interval: Duration::from_secs(300),
            max_test_retries: 5,
        }
    }
}

/// Double the test interval, capped at the configured maximum
pub(crate) fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// Registry and state machine for all known subsystems
pub struct SsnStateManager {
    entries: RwLock<HashMap<(u16, u8), Arc<SsnEntry>>>,
    config: SsnManagerConfig,
    transport: RwLock<Option<Arc<dyn ScmgTransport>>>,
    event_handler: RwLock<Option<Arc<dyn SsnEventHandler>>>,
    /// Handle to self for the test tasks spawned by the SST scheduler
    self_ref: Weak<SsnStateManager>,
}

impl SsnStateManager {
    /// Create a manager with default test configuration
    pub fn new() -> Arc<Self> {
        Self::with_config(SsnManagerConfig::default())
    }

    /// Create a manager with the given test configuration
    pub fn with_config(config: SsnManagerConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            entries: RwLock::new(HashMap::new()),
            config,
            transport: RwLock::new(None),
            event_handler: RwLock::new(None),
            self_ref: weak.clone(),
        })
    }

    /// Attach the transport used for outbound SCMG
    pub fn set_transport(&self, transport: Arc<dyn ScmgTransport>) {
        let mut slot = self.transport.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(transport);
    }

    /// Attach the state event observer
    pub fn set_event_handler(&self, handler: Arc<dyn SsnEventHandler>) {
        let mut slot = self.event_handler.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(handler);
    }

    /// Look up a subsystem entry
    pub fn get_entry(&self, pc: u16, ssn: u8) -> Option<Arc<SsnEntry>> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.get(&(pc, ssn)).cloned()
    }

    /// Number of registered subsystems
    pub fn entry_count(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.len()
    }

    /// Register a subsystem, starting in state prohibited.
    ///
    /// An already-registered subsystem is returned unchanged; registration
    /// never replaces an existing entry.
    pub fn add_entry(&self, pc: u16, ssn: u8, is_local: bool) -> Arc<SsnEntry> {
        let (entry, created) = self.get_or_add(pc, ssn, is_local);
        if !created {
            log::debug!("subsystem already registered, keeping existing entry: {entry}");
        }
        entry
    }

    fn get_or_add(&self, pc: u16, ssn: u8, is_local: bool) -> (Arc<SsnEntry>, bool) {
        if let Some(entry) = self.get_entry(pc, ssn) {
            return (entry, false);
        }
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let mut created = false;
        let entry = entries
            .entry((pc, ssn))
            .or_insert_with(|| {
                created = true;
                Arc::new(SsnEntry::new(
                    pc,
                    ssn,
                    is_local,
                    self.config.default_test_interval,
                    self.config.max_test_retries,
                ))
            })
            .clone();
        (entry, created)
    }

    // ========================================================================
    // Local service requests (N-STATE)
    // ========================================================================

    /// Local user reports a subsystem in service.
    ///
    /// Transitions prohibited to allowed and broadcasts SSA; a no-op when
    /// the subsystem is already allowed.
    pub fn handle_user_in_service(&self, pc: u16, ssn: u8) -> SccpResult<()> {
        let entry = self
            .get_entry(pc, ssn)
            .ok_or(SccpError::EntryNotFound { pc, ssn })?;
        if !entry.is_local() {
            return Err(SccpError::NotLocal { pc, ssn });
        }

        let changed = {
            let mut st = entry.write();
            if st.state == SsnState::Prohibited {
                st.state = SsnState::Allowed;
                st.last_state_change = SystemTime::now();
                true
            } else {
                false
            }
        };

        if changed {
            log::info!("local subsystem allowed: pc={pc} ssn={ssn}");
            self.notify_state_change(&entry, SsnState::Allowed, StateChangeReason::UserInitiated);
            self.notify_broadcast(BroadcastType::Ssa, &entry);
        }
        Ok(())
    }

    /// Local user reports a subsystem out of service.
    ///
    /// Transitions allowed to prohibited and broadcasts SSP; a no-op when
    /// the subsystem is already prohibited.
    pub fn handle_user_out_of_service(&self, pc: u16, ssn: u8) -> SccpResult<()> {
        let entry = self
            .get_entry(pc, ssn)
            .ok_or(SccpError::EntryNotFound { pc, ssn })?;
        if !entry.is_local() {
            return Err(SccpError::NotLocal { pc, ssn });
        }

        let changed = {
            let mut st = entry.write();
            if st.state == SsnState::Allowed {
                st.state = SsnState::Prohibited;
                st.last_state_change = SystemTime::now();
                true
            } else {
                false
            }
        };

        if changed {
            // locals never run a test; defensive only
            self.stop_sst(&entry);
            log::info!("local subsystem prohibited: pc={pc} ssn={ssn}");
            self.notify_state_change(&entry, SsnState::Prohibited, StateChangeReason::UserInitiated);
            self.notify_broadcast(BroadcastType::Ssp, &entry);
        }
        Ok(())
    }

    // ========================================================================
    // Received SCMG
    // ========================================================================

    /// Subsystem Allowed received from the network.
    ///
    /// Unknown subsystems are auto-registered as remote. A prohibited
    /// subsystem becomes allowed and any running test stops; an already
    /// allowed subsystem is left untouched.
    pub fn handle_ssa(&self, pc: u16, ssn: u8) {
        let (entry, _created) = self.get_or_add(pc, ssn, false);

        let changed = {
            let mut st = entry.write();
            if st.state == SsnState::Prohibited {
                st.state = SsnState::Allowed;
                st.last_state_change = SystemTime::now();
                st.test_generation += 1;
                if let Some(task) = st.test_task.take() {
                    task.abort();
                }
                st.test_retries = 0;
                true
            } else {
                false
            }
        };

        if changed {
            log::info!("remote subsystem allowed: pc={pc} ssn={ssn}");
            self.notify_state_change(&entry, SsnState::Allowed, StateChangeReason::NetworkInitiated);
        }
    }

    /// Subsystem Prohibited received from the network.
    ///
    /// Unknown subsystems are auto-registered as remote and adopt the
    /// prohibition immediately. A prohibition on a remote subsystem starts
    /// the subsystem test loop; a repeat SSP is a no-op.
    pub fn handle_ssp(&self, pc: u16, ssn: u8) {
        let (entry, created) = self.get_or_add(pc, ssn, false);

        let transitioned = if created {
            // fresh entries start prohibited; this is the first word
            // the network has said about them
            true
        } else {
            let mut st = entry.write();
            if st.state == SsnState::Allowed {
                st.state = SsnState::Prohibited;
                st.last_state_change = SystemTime::now();
                true
            } else {
                false
            }
        };

        if transitioned {
            log::info!("remote subsystem prohibited: pc={pc} ssn={ssn}");
            if !entry.is_local() {
                self.start_sst(&entry);
            }
            self.notify_state_change(&entry, SsnState::Prohibited, StateChangeReason::NetworkInitiated);
        }
    }

    /// Subsystem Test received from the network.
    ///
    /// An allowed local subsystem answers with SSA; a prohibited local
    /// subsystem stays silent so the remote tester times out. Tests for
    /// subsystems we do not serve are ignored.
    pub fn handle_sst(&self, pc: u16, ssn: u8) {
        let (entry, _created) = self.get_or_add(pc, ssn, false);

        if !entry.is_local() {
            log::debug!("ignoring SST for subsystem not served here: pc={pc} ssn={ssn}");
            return;
        }
        if entry.is_allowed() {
            log::debug!("answering SST with SSA: pc={pc} ssn={ssn}");
            let ssa = Scmg::new(ScmgMessageType::Ssa, ssn, pc, 0, 0);
            self.emit_scmg(&ssa);
        } else {
            log::debug!("local subsystem prohibited, letting SST time out: pc={pc} ssn={ssn}");
        }
    }

    /// Route a decoded SCMG message to its handler.
    ///
    /// SOR/SOG and unknown types are logged and dropped; network input
    /// never produces an error.
    pub fn process_scmg(&self, scmg: &Scmg) {
        match scmg.scmg_type() {
            Some(ScmgMessageType::Ssa) => self.handle_ssa(scmg.affected_pc, scmg.affected_ssn),
            Some(ScmgMessageType::Ssp) => self.handle_ssp(scmg.affected_pc, scmg.affected_ssn),
            Some(ScmgMessageType::Sst) => self.handle_sst(scmg.affected_pc, scmg.affected_ssn),
            Some(other) => log::debug!("unhandled SCMG message: {other}"),
            None => log::debug!("unknown SCMG message type: {}", scmg.msg_type),
        }
    }

    /// Extract and process the SCMG payload of a UDT addressed to the
    /// management subsystem. Other UDTs are ignored.
    pub fn process_udt(&self, udt: &Udt) {
        if udt.called_party_address.subsystem_number != Some(SCCP_MANAGEMENT_SSN) {
            log::debug!("UDT not addressed to SCCP management, ignoring");
            return;
        }
        let mut payload = udt.data.payload().clone();
        match Scmg::decode(&mut payload) {
            Ok(scmg) => self.process_scmg(&scmg),
            Err(e) => log::warn!("dropping malformed SCMG payload: {e}"),
        }
    }

    // ========================================================================
    // Subsystem test scheduler
    // ========================================================================

    /// Start the test loop for a prohibited remote subsystem.
    ///
    /// Any previous run is cancelled first; at most one test task exists
    /// per entry. Local subsystems are never tested.
    pub(crate) fn start_sst(&self, entry: &Arc<SsnEntry>) {
        if entry.is_local() {
            log::debug!("not scheduling subsystem test for {entry}");
            return;
        }
        let Some(manager) = self.self_ref.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("no async runtime, subsystem test not scheduled for {entry}");
            return;
        };

        {
            let mut st = entry.write();
            if let Some(task) = st.test_task.take() {
                task.abort();
            }
            st.test_generation += 1;
            st.test_retries = 0;
            st.test_interval = self.config.default_test_interval;

            let generation = st.test_generation;
            let first_interval = st.test_interval;
            let entry_task = Arc::clone(entry);
            st.test_task = Some(runtime.spawn(async move {
                let mut interval = first_interval;
                loop {
                    tokio::time::sleep(interval).await;
                    match manager.perform_sst(&entry_task, generation) {
                        Some(next) => interval = next,
                        None => break,
                    }
                }
            }));
        }
        log::debug!(
            "started subsystem test: pc={} ssn={}",
            entry.point_code(),
            entry.ssn()
        );
    }

    /// Cancel any running test loop for the entry
    pub(crate) fn stop_sst(&self, entry: &Arc<SsnEntry>) {
        let mut st = entry.write();
        st.test_generation += 1;
        st.test_retries = 0;
        if let Some(task) = st.test_task.take() {
            task.abort();
            drop(st);
            log::debug!(
                "stopped subsystem test: pc={} ssn={}",
                entry.point_code(),
                entry.ssn()
            );
        }
    }

    /// One firing of the test timer.
    ///
    /// Sends an SST toward the subsystem and returns the next interval, or
    /// `None` when the loop must end: the run was superseded, the subsystem
    /// became allowed, or the retry budget is spent. A fired timer whose
    /// run was cancelled detects the generation mismatch here, since an
    /// already-dequeued task cannot be stopped synchronously.
    pub(crate) fn perform_sst(&self, entry: &Arc<SsnEntry>, generation: u64) -> Option<Duration> {
        let (next_interval, exhausted) = {
            let mut st = entry.write();
            if st.test_generation != generation {
                return None;
            }
            if st.state == SsnState::Allowed {
                st.test_task = None;
                return None;
            }
            st.test_retries += 1;
            if st.test_retries >= st.max_test_retries {
                st.test_task = None;
                (None, true)
            } else {
                st.test_interval = next_backoff(st.test_interval, self.config.max_test_interval);
                (Some(st.test_interval), false)
            }
        };

        log::debug!(
            "sending SST: pc={} ssn={} retry={}",
            entry.point_code(),
            entry.ssn(),
            entry.test_retries()
        );
        let sst = Scmg::new(ScmgMessageType::Sst, entry.ssn(), entry.point_code(), 0, 0);
        self.emit_scmg(&sst);

        if exhausted {
            log::warn!(
                "subsystem test retries exhausted: pc={} ssn={}",
                entry.point_code(),
                entry.ssn()
            );
            self.notify_state_change(entry, SsnState::Prohibited, StateChangeReason::TestTimeout);
        }
        next_interval
    }

    /// Cancel all test loops; the registry itself is kept
    pub fn shutdown(&self) {
        let entries: Vec<Arc<SsnEntry>> = {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            entries.values().cloned().collect()
        };
        for entry in entries {
            self.stop_sst(&entry);
        }
    }

    // ========================================================================
    // Collaborator dispatch
    // ========================================================================

    fn emit_scmg(&self, scmg: &Scmg) {
        let transport = {
            let slot = self.transport.read().unwrap_or_else(|p| p.into_inner());
            slot.clone()
        };
        match transport {
            Some(transport) => {
                if let Err(e) = transport.send_scmg(scmg.affected_pc, scmg.affected_ssn, scmg.to_bytes()) {
                    log::warn!("failed to send {scmg}: {e}");
                }
            }
            None => log::debug!("no transport attached, dropping {scmg}"),
        }
    }

    fn notify_state_change(&self, entry: &Arc<SsnEntry>, state: SsnState, reason: StateChangeReason) {
        let handler = {
            let slot = self.event_handler.read().unwrap_or_else(|p| p.into_inner());
            slot.clone()
        };
        if let Some(handler) = handler {
            handler.on_state_change(entry, state, reason);
        }
    }

    fn notify_broadcast(&self, broadcast: BroadcastType, entry: &Arc<SsnEntry>) {
        let handler = {
            let slot = self.event_handler.read().unwrap_or_else(|p| p.into_inner());
            slot.clone()
        };
        if let Some(handler) = handler {
            handler.on_broadcast(broadcast, entry);
        }
    }
}

/// Process-wide default manager, for embedders that want one shared
/// instance. Nothing in the crate depends on it.
pub fn default_manager() -> Arc<SsnStateManager> {
    static DEFAULT: OnceLock<Arc<SsnStateManager>> = OnceLock::new();
    DEFAULT.get_or_init(SsnStateManager::new).clone()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_entry_keeps_existing() {
        let manager = SsnStateManager::new();
        let first = manager.add_entry(10, 7, true);
        first.mark_allowed();

        // re-registration, even with different locality, changes nothing
        let second = manager.add_entry(10, 7, false);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.is_local());
        assert!(second.is_allowed());
        assert_eq!(manager.entry_count(), 1);
    }

    #[test]
    fn test_get_entry_missing() {
        let manager = SsnStateManager::new();
        assert!(manager.get_entry(1, 2).is_none());
    }

    #[test]
    fn test_user_in_service_requires_known_local_entry() {
        let manager = SsnStateManager::new();
        assert_eq!(
            manager.handle_user_in_service(10, 7),
            Err(SccpError::EntryNotFound { pc: 10, ssn: 7 })
        );

        manager.add_entry(10, 7, false);
        assert_eq!(
            manager.handle_user_in_service(10, 7),
            Err(SccpError::NotLocal { pc: 10, ssn: 7 })
        );
    }

    #[test]
    fn test_user_out_of_service_requires_known_local_entry() {
        let manager = SsnStateManager::new();
        assert_eq!(
            manager.handle_user_out_of_service(10, 7),
            Err(SccpError::EntryNotFound { pc: 10, ssn: 7 })
        );
    }

    #[test]
    fn test_next_backoff_doubles_and_caps() {
        let max = Duration::from_secs(300);
        assert_eq!(next_backoff(Duration::from_secs(30), max), Duration::from_secs(60));
        assert_eq!(next_backoff(Duration::from_secs(200), max), max);
        assert_eq!(next_backoff(max, max), max);
    }

    #[tokio::test]
    async fn test_start_sst_is_remote_only() {
        let manager = SsnStateManager::new();
        let entry = manager.add_entry(10, 7, true);
        manager.start_sst(&entry);
        assert!(!entry.has_test_timer());
    }

    #[tokio::test]
    async fn test_start_sst_keeps_single_timer() {
        let manager = SsnStateManager::new();
        let entry = manager.add_entry(10, 7, false);
        manager.start_sst(&entry);
        manager.start_sst(&entry);
        assert!(entry.has_test_timer());

        manager.stop_sst(&entry);
        assert!(!entry.has_test_timer());
        assert_eq!(entry.test_retries(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_all_timers() {
        let manager = SsnStateManager::new();
        for ssn in 1..=4 {
            let entry = manager.add_entry(20, ssn, false);
            manager.start_sst(&entry);
        }
        manager.shutdown();
        for ssn in 1..=4 {
            let entry = manager.get_entry(20, ssn).unwrap();
            assert!(!entry.has_test_timer());
        }
    }
}
