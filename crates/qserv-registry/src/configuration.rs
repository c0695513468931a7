//! `Configuration`: the worker directory + persisted job-state accessor a
//! `Controller` holds a shared reference to (spec 3.8). This crate ships
//! only the interface and an in-memory implementation the Controller's
//! worker-tracking loop and tests run against; a production deployment
//! backs it with the same SQL store the rest of the control plane uses
//! (spec 4.10: "interface only").

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{RegistryError, Result};
use crate::worker::{CzarConfig, WorkerConfig, WorkerStatus};

/// Worker directory + czar directory, as seen by the Controller.
pub trait Configuration: Send + Sync {
    /// All known workers, in no particular order.
    fn workers(&self) -> Vec<WorkerConfig>;

    /// A single worker by name.
    fn worker(&self, name: &str) -> Option<WorkerConfig>;

    /// Workers eligible for a `Job`'s default fan-out set: `ENABLED &&
    /// !READ-ONLY` (spec 4.8).
    fn eligible_workers(&self) -> Vec<WorkerConfig> {
        self.workers()
            .into_iter()
            .filter(|w| w.status.eligible_for_jobs())
            .collect()
    }

    /// Insert a new worker record. Fails if `name` is already registered.
    fn register_worker(&self, worker: WorkerConfig) -> Result<()>;

    /// Update an existing worker record in place (e.g. on registry
    /// heartbeat). Fails if `name` is not known.
    fn update_worker(&self, worker: WorkerConfig) -> Result<()>;

    /// All known czars.
    fn czars(&self) -> Vec<CzarConfig>;

    /// Insert or update a czar record.
    fn upsert_czar(&self, czar: CzarConfig);
}

/// In-memory `Configuration`, used by tests and as the default backing for
/// the Controller's worker-tracking loop.
#[derive(Default)]
pub struct InMemoryConfiguration {
    workers: RwLock<HashMap<String, WorkerConfig>>,
    czars: RwLock<HashMap<String, CzarConfig>>,
}

impl InMemoryConfiguration {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Configuration for InMemoryConfiguration {
    fn workers(&self) -> Vec<WorkerConfig> {
        self.workers.read().unwrap().values().cloned().collect()
    }

    fn worker(&self, name: &str) -> Option<WorkerConfig> {
        self.workers.read().unwrap().get(name).cloned()
    }

    fn register_worker(&self, worker: WorkerConfig) -> Result<()> {
        let mut workers = self.workers.write().unwrap();
        if workers.contains_key(&worker.name) {
            return Err(RegistryError::DuplicateWorker(worker.name));
        }
        workers.insert(worker.name.clone(), worker);
        Ok(())
    }

    fn update_worker(&self, worker: WorkerConfig) -> Result<()> {
        let mut workers = self.workers.write().unwrap();
        if !workers.contains_key(&worker.name) {
            return Err(RegistryError::WorkerNotFound(worker.name));
        }
        workers.insert(worker.name.clone(), worker);
        Ok(())
    }

    fn czars(&self) -> Vec<CzarConfig> {
        self.czars.read().unwrap().values().cloned().collect()
    }

    fn upsert_czar(&self, czar: CzarConfig) {
        self.czars.write().unwrap().insert(czar.name.clone(), czar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(name: &str, status: WorkerStatus) -> WorkerConfig {
        WorkerConfig {
            name: name.to_string(),
            svc_host: "localhost".to_string(),
            svc_port: 25000,
            status,
        }
    }

    #[test]
    fn register_then_lookup() {
        let cfg = InMemoryConfiguration::new();
        cfg.register_worker(worker("worker1", WorkerStatus::Enabled)).unwrap();
        assert_eq!(cfg.worker("worker1").unwrap().svc_port, 25000);
        assert!(cfg.worker("nope").is_none());
    }

    #[test]
    fn duplicate_register_fails() {
        let cfg = InMemoryConfiguration::new();
        cfg.register_worker(worker("worker1", WorkerStatus::Enabled)).unwrap();
        assert!(matches!(
            cfg.register_worker(worker("worker1", WorkerStatus::Enabled)),
            Err(RegistryError::DuplicateWorker(_))
        ));
    }

    #[test]
    fn update_unknown_worker_fails() {
        let cfg = InMemoryConfiguration::new();
        assert!(matches!(
            cfg.update_worker(worker("ghost", WorkerStatus::Enabled)),
            Err(RegistryError::WorkerNotFound(_))
        ));
    }

    #[test]
    fn eligible_workers_excludes_disabled_and_read_only() {
        let cfg = InMemoryConfiguration::new();
        cfg.register_worker(worker("w1", WorkerStatus::Enabled)).unwrap();
        cfg.register_worker(worker("w2", WorkerStatus::Disabled)).unwrap();
        cfg.register_worker(worker("w3", WorkerStatus::ReadOnly)).unwrap();
        let eligible: Vec<_> = cfg.eligible_workers().into_iter().map(|w| w.name).collect();
        assert_eq!(eligible, vec!["w1".to_string()]);
    }
}
