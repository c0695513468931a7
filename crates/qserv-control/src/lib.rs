//! The Controller and per-worker Request lifecycle (spec 3.8, 4.7): request
//! tracking, heartbeats, expiration, and cooperative cancellation, built
//! per design note 9 as a discriminated `Request` (one concrete type
//! driven by an opaque `RequestBody`) instead of per-opcode virtual
//! subclasses.

pub mod controller;
pub mod error;
pub mod request;
pub mod transport;

pub use controller::{Controller, ControllerConfig, OnFinish};
pub use error::{ControlError, Result};
pub use request::{ExtendedStatus, Request, RequestSnapshot, RequestState};
pub use transport::{StubTransport, WorkerTransport};
