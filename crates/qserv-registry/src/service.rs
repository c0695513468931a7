//! The external service registry the Controller's worker-tracking
//! background task polls (spec 4.7: "periodically ... queries the service
//! registry for live workers"). This is distinct from [`crate::Configuration`]:
//! the service registry reports who is *currently alive*, while
//! `Configuration` is the persisted directory the Controller reconciles
//! against it.

use serde::{Deserialize, Serialize};

/// One entry reported by the live service registry for a worker or czar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEntry {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// Read-only view over "who is alive right now", backed in production by
/// whatever discovery mechanism the deployment uses (DNS, etcd, a
/// heartbeat table); this crate ships only an in-memory stand-in.
pub trait ServiceRegistry: Send + Sync {
    fn live_workers(&self) -> Vec<LiveEntry>;
    fn live_czars(&self) -> Vec<LiveEntry>;
}

/// Static/in-memory `ServiceRegistry`, set up by a test or by an operator
/// tool that knows the fleet topology ahead of time.
#[derive(Default)]
pub struct StaticServiceRegistry {
    workers: std::sync::RwLock<Vec<LiveEntry>>,
    czars: std::sync::RwLock<Vec<LiveEntry>>,
}

impl StaticServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_live_workers(&self, entries: Vec<LiveEntry>) {
        *self.workers.write().unwrap() = entries;
    }

    pub fn set_live_czars(&self, entries: Vec<LiveEntry>) {
        *self.czars.write().unwrap() = entries;
    }
}

impl ServiceRegistry for StaticServiceRegistry {
    fn live_workers(&self) -> Vec<LiveEntry> {
        self.workers.read().unwrap().clone()
    }

    fn live_czars(&self) -> Vec<LiveEntry> {
        self.czars.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_registry_round_trips_entries() {
        let reg = StaticServiceRegistry::new();
        reg.set_live_workers(vec![LiveEntry {
            name: "w1".into(),
            host: "10.0.0.1".into(),
            port: 25000,
        }]);
        assert_eq!(reg.live_workers().len(), 1);
        assert!(reg.live_czars().is_empty());
    }
}
