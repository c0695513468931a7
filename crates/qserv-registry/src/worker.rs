//! Per-worker directory record (spec 3.8).

use serde::{Deserialize, Serialize};

/// Operational status of a worker as tracked by `Configuration`.
///
/// `Enabled` workers participate in job fan-out; `ReadOnly` workers are
/// excluded from the eligible set a `Job` computes for itself (spec 4.8:
/// "all workers, or only ENABLED && !READ-ONLY").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Enabled,
    Disabled,
    ReadOnly,
}

impl WorkerStatus {
    /// Whether a worker in this status is eligible for a `Job`'s default
    /// fan-out set (spec 4.8).
    pub fn eligible_for_jobs(self) -> bool {
        matches!(self, WorkerStatus::Enabled)
    }
}

/// `{ name, svcHost, svcPort, status }` — owned by `Configuration`, updated
/// on registry heartbeat (spec 3.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub name: String,
    pub svc_host: String,
    pub svc_port: u16,
    pub status: WorkerStatus,
}

impl WorkerConfig {
    pub fn new(name: impl Into<String>, svc_host: impl Into<String>, svc_port: u16) -> Self {
        Self {
            name: name.into(),
            svc_host: svc_host.into(),
            svc_port,
            status: WorkerStatus::Enabled,
        }
    }
}

/// A czar (query-distributor) directory entry, tracked the same way as a
/// worker but never a fan-out target (spec 4.7's
/// `controller.auto-register-czars`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CzarConfig {
    pub name: String,
    pub svc_host: String,
    pub svc_port: u16,
}
