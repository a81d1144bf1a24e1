//! In-memory history with JSON snapshot persistence.
//!
//! The probe log is a ring buffer. Switch records are the audit trail and
//! are never evicted; trim the snapshot file offline if it grows too large.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::health::state::MonitorState;
use crate::history::{HistoryStore, ProbeLogEntry, StoreError, SwitchRecord};

/// Probe log entries kept before the oldest are dropped.
pub const DEFAULT_PROBE_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct Journal {
    next_id: u64,
    switches: Vec<SwitchRecord>,
    probes: VecDeque<ProbeLogEntry>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    switches: Vec<SwitchRecord>,
    probes: Vec<ProbeLogEntry>,
    monitor_states: Vec<MonitorState>,
}

/// Thread-safe history store.
///
/// Switch records and probe logs live behind one mutex so ids stay
/// monotonic; monitor states are keyed by port in a `DashMap`.
#[derive(Debug)]
pub struct MemoryHistory {
    journal: Mutex<Journal>,
    states: DashMap<u16, MonitorState>,
    probe_capacity: usize,
    persistence_path: Option<PathBuf>,
}

impl MemoryHistory {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self::with_capacity(persistence_path, DEFAULT_PROBE_LOG_CAPACITY)
    }

    pub fn with_capacity(persistence_path: Option<PathBuf>, probe_capacity: usize) -> Self {
        Self {
            journal: Mutex::new(Journal {
                next_id: 1,
                ..Journal::default()
            }),
            states: DashMap::new(),
            probe_capacity: probe_capacity.max(1),
            persistence_path,
        }
    }

    /// Restore a store from its snapshot file, if one exists.
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let history = Self::new(Some(path.clone()));
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;

            {
                let mut journal = history.lock();
                journal.next_id = snapshot.switches.iter().map(|r| r.id).max().unwrap_or(0) + 1;
                journal.switches = snapshot.switches;
                journal.probes = snapshot.probes.into_iter().collect();
                while journal.probes.len() > history.probe_capacity {
                    journal.probes.pop_front();
                }
            }
            for state in snapshot.monitor_states {
                history.states.insert(state.local_port, state);
            }
            tracing::info!(
                path = %path.display(),
                switches = history.lock().switches.len(),
                "Loaded history snapshot"
            );
        }
        Ok(history)
    }

    /// Write the snapshot file. No-op without a persistence path.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let snapshot = {
            let journal = self.lock();
            Snapshot {
                switches: journal.switches.clone(),
                probes: journal.probes.iter().cloned().collect(),
                monitor_states: self.query_monitor_states(),
            }
        };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        let writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(writer, &snapshot)?;
        fs::rename(&tmp, path)?;

        tracing::info!(path = %path.display(), switches = snapshot.switches.len(), "Saved history snapshot");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Journal> {
        // A panicking writer cannot leave a record half-appended.
        self.journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HistoryStore for MemoryHistory {
    fn append_switch(&self, mut record: SwitchRecord) -> Result<SwitchRecord, StoreError> {
        let mut journal = self.lock();
        record.id = journal.next_id;
        journal.next_id += 1;
        journal.switches.push(record.clone());
        Ok(record)
    }

    fn append_probe_log(&self, entry: ProbeLogEntry) -> Result<(), StoreError> {
        let mut journal = self.lock();
        if journal.probes.len() >= self.probe_capacity {
            journal.probes.pop_front();
        }
        journal.probes.push_back(entry);
        Ok(())
    }

    fn upsert_monitor_state(&self, state: &MonitorState) -> Result<(), StoreError> {
        self.states.insert(state.local_port, state.clone());
        Ok(())
    }

    fn query_switch_history(&self, local_port: Option<u16>, limit: usize, offset: usize) -> Vec<SwitchRecord> {
        self.lock()
            .switches
            .iter()
            .rev()
            .filter(|r| local_port.map_or(true, |p| r.local_port == p))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    fn query_probe_logs(&self, local_port: Option<u16>, limit: usize) -> Vec<ProbeLogEntry> {
        self.lock()
            .probes
            .iter()
            .rev()
            .filter(|e| local_port.map_or(true, |p| e.local_port == p))
            .take(limit)
            .cloned()
            .collect()
    }

    fn query_monitor_states(&self) -> Vec<MonitorState> {
        let mut states: Vec<_> = self.states.iter().map(|r| r.value().clone()).collect();
        states.sort_by_key(|s| s.local_port);
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SwitchReason;
    use crate::upstream::UpstreamEndpoint;
    use chrono::Utc;

    fn record(port: u16, success: bool) -> SwitchRecord {
        SwitchRecord::new(
            port,
            Some(UpstreamEndpoint::socks5("1.1.1.1", 1000)),
            UpstreamEndpoint::socks5("2.2.2.2", 2000),
            SwitchReason::Manual,
            success,
        )
    }

    fn probe(port: u16, healthy: bool) -> ProbeLogEntry {
        ProbeLogEntry {
            local_port: port,
            upstream: UpstreamEndpoint::socks5("1.1.1.1", 1000),
            healthy,
            latency_ms: healthy.then_some(42),
            message: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_switch_ids_and_ordering() {
        let history = MemoryHistory::default();
        let first = history.append_switch(record(1080, true)).unwrap();
        let second = history.append_switch(record(1081, false)).unwrap();
        let third = history.append_switch(record(1080, false)).unwrap();
        assert_eq!((first.id, second.id, third.id), (1, 2, 3));

        let all = history.query_switch_history(None, 10, 0);
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2, 1]);

        let port_1080 = history.query_switch_history(Some(1080), 10, 0);
        assert_eq!(port_1080.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 1]);

        let paged = history.query_switch_history(None, 1, 1);
        assert_eq!(paged[0].id, 2);
    }

    #[test]
    fn test_probe_log_is_bounded() {
        let history = MemoryHistory::with_capacity(None, 2);
        history.append_probe_log(probe(1080, true)).unwrap();
        history.append_probe_log(probe(1080, false)).unwrap();
        history.append_probe_log(probe(1081, true)).unwrap();

        let logs = history.query_probe_logs(None, 10);
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].local_port, 1081);
        assert!(!logs[1].healthy);
    }

    #[test]
    fn test_switch_records_are_not_evicted() {
        let history = MemoryHistory::with_capacity(None, 2);
        for _ in 0..5 {
            history.append_switch(record(1080, true)).unwrap();
        }
        let all = history.query_switch_history(None, 10, 0);
        assert_eq!(all.len(), 5);
        assert_eq!(all.last().unwrap().id, 1);
    }

    #[test]
    fn test_monitor_state_upsert() {
        let history = MemoryHistory::default();
        let mut state = MonitorState::started(1081, None);
        history.upsert_monitor_state(&state).unwrap();
        state.failure_count = 2;
        history.upsert_monitor_state(&state).unwrap();
        history.upsert_monitor_state(&MonitorState::started(1080, None)).unwrap();

        let states = history.query_monitor_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].local_port, 1080);
        assert_eq!(states[1].failure_count, 2);
    }

    #[test]
    fn test_snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let history = MemoryHistory::new(Some(path.clone()));
        history.append_switch(record(1080, true)).unwrap();
        history.append_switch(record(1080, false)).unwrap();
        history.append_probe_log(probe(1080, true)).unwrap();
        history.save_to_file().unwrap();

        let restored = MemoryHistory::load_from_file(&path).unwrap();
        assert_eq!(restored.query_switch_history(None, 10, 0).len(), 2);
        assert_eq!(restored.query_probe_logs(Some(1080), 10).len(), 1);
        let next = restored.append_switch(record(1081, true)).unwrap();
        assert_eq!(next.id, 3);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = MemoryHistory::load_from_file(dir.path().join("absent.json")).unwrap();
        assert!(history.query_switch_history(None, 10, 0).is_empty());
    }
}
