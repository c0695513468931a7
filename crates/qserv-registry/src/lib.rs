//! Worker directory and persisted control-plane configuration (spec 3.8,
//! 4.10): [`WorkerConfig`]/[`CzarConfig`], the [`Configuration`] trait the
//! Controller holds a shared reference to, and the [`service::ServiceRegistry`]
//! trait its worker-tracking loop polls. Both are "interface only" per the
//! spec's scope — this crate ships the contract plus an in-memory
//! implementation for tests and single-process deployments.

pub mod configuration;
pub mod error;
pub mod service;
pub mod worker;

pub use configuration::{Configuration, InMemoryConfiguration};
pub use error::{RegistryError, Result};
pub use service::{LiveEntry, ServiceRegistry, StaticServiceRegistry};
pub use worker::{CzarConfig, WorkerConfig, WorkerStatus};
