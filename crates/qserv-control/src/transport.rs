//! The opaque worker exchange a `Request` drives. Spec §1 pins the MySQL
//! wire protocol and the worker-side executor as external collaborators —
//! "we assume a client library offering `execute(query)` + row iteration" —
//! so this trait is that assumed client library's shape, generalised to
//! carry any of `qserv-proto`'s opaque request bodies rather than a bare
//! SQL string.

use async_trait::async_trait;

use qserv_proto::{Opcode, RequestBody, ResponseBody};

use crate::error::Result;

/// Executes one opaque request body against one worker and returns its
/// response. Implementations own whatever network/protocol plumbing is
/// needed (XRootD, HTTP, a raw socket); this core never looks inside.
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    async fn execute(&self, worker: &str, opcode: Opcode, body: RequestBody) -> Result<ResponseBody>;
}

/// In-memory transport used by tests and by tools that want to exercise
/// the Controller/Job machinery without a real fleet. Always replies
/// `Echo`/`Ack` after an optional artificial delay, so callers can exercise
/// the expiration and cancellation paths deterministically.
pub struct StubTransport {
    delay: std::time::Duration,
}

impl StubTransport {
    pub fn new() -> Self {
        Self { delay: std::time::Duration::ZERO }
    }

    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self { delay }
    }
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerTransport for StubTransport {
    async fn execute(&self, _worker: &str, _opcode: Opcode, body: RequestBody) -> Result<ResponseBody> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(match body {
            RequestBody::Echo { data, .. } => ResponseBody::Echo { data },
            RequestBody::GetIndexes { .. } => ResponseBody::Indexes { definitions: Vec::new() },
            RequestBody::Find { chunk, .. } => ResponseBody::Find { chunk, exists: true, rows: Some(0) },
            RequestBody::FindAll { .. } => ResponseBody::FindAll { chunks: Vec::new() },
            RequestBody::DirectorIndex { .. } => ResponseBody::DirectorIndex { bytes: Vec::new() },
            _ => ResponseBody::Ack,
        })
    }
}
