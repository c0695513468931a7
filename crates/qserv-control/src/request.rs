//! Per-(worker, opcode) in-flight request (spec 3.8, 4.7). A `Request` is
//! a small state machine: `CREATED -> IN_PROGRESS -> FINISHED`, with
//! exactly one extended status latched at the terminal transition, built
//! as an explicit state machine per design note 9 (discriminated state
//! instead of virtual request subclasses).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{watch, Notify};
use uuid::Uuid;

use qserv_proto::{Opcode, ResponseBody};

/// Request lifecycle state (spec 3.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    InProgress,
    Finished,
}

/// Extended status latched exactly once, at the `FINISHED` transition
/// (spec 3.8/4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedStatus {
    None,
    Success,
    TimeoutExpired,
    Cancelled,
    BadResult,
    Failed,
}

/// A consistent point-in-time view of a `Request`, handed out by
/// [`Request::snapshot`] and streamed by [`Request::wait`].
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub state: RequestState,
    pub extended_status: ExtendedStatus,
    pub begin_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub response: Option<ResponseBody>,
    pub error: Option<String>,
}

impl RequestSnapshot {
    fn created() -> Self {
        Self {
            state: RequestState::Created,
            extended_status: ExtendedStatus::None,
            begin_time: None,
            end_time: None,
            response: None,
            error: None,
        }
    }
}

/// Per-(worker, opcode) in-flight request.
pub struct Request {
    pub id: Uuid,
    pub worker: String,
    pub opcode: Opcode,
    pub priority: i32,
    pub parent_job_id: Option<Uuid>,
    pub keep_tracking: bool,
    snapshot_tx: watch::Sender<RequestSnapshot>,
    finished: AtomicBool,
    cancel_notify: Notify,
}

impl Request {
    pub fn new(
        worker: impl Into<String>,
        opcode: Opcode,
        priority: i32,
        parent_job_id: Option<Uuid>,
        keep_tracking: bool,
    ) -> Arc<Self> {
        let (snapshot_tx, _rx) = watch::channel(RequestSnapshot::created());
        Arc::new(Self {
            id: Uuid::new_v4(),
            worker: worker.into(),
            opcode,
            priority,
            parent_job_id,
            keep_tracking,
            snapshot_tx,
            finished: AtomicBool::new(false),
            cancel_notify: Notify::new(),
        })
    }

    pub fn snapshot(&self) -> RequestSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn state(&self) -> RequestState {
        self.snapshot_tx.borrow().state
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// `CREATED -> IN_PROGRESS`, latching `begin_time`. A no-op if the
    /// request is already past `CREATED` (defensive; the Controller only
    /// calls this once per request).
    pub fn start(&self) {
        self.snapshot_tx.send_if_modified(|snap| {
            if snap.state != RequestState::Created {
                return false;
            }
            snap.state = RequestState::InProgress;
            snap.begin_time = Some(SystemTime::now());
            true
        });
    }

    /// Request cancellation from outside. Idempotent: a no-op once the
    /// request has already reached `FINISHED` (testable property 9).
    pub fn cancel(&self) {
        if !self.is_finished() {
            self.cancel_notify.notify_one();
        }
    }

    /// Resolves when [`cancel`] is called. Exactly one execution task
    /// should ever await this per request, so the single stored
    /// `notify_one` permit can't be misdelivered.
    pub async fn cancelled(&self) {
        self.cancel_notify.notified().await;
    }

    /// `IN_PROGRESS -> FINISHED`, latching exactly one extended status.
    /// Returns `true` the first time it is called for this request, and
    /// `false` on every subsequent call (testable property 9: "exactly
    /// one extended status").
    pub fn try_finish(
        &self,
        extended_status: ExtendedStatus,
        response: Option<ResponseBody>,
        error: Option<String>,
    ) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.snapshot_tx.send_modify(|snap| {
            snap.state = RequestState::Finished;
            snap.extended_status = extended_status;
            snap.end_time = Some(SystemTime::now());
            snap.response = response;
            snap.error = error;
        });
        true
    }

    /// Blocks until the request reaches `FINISHED`. Returns immediately if
    /// it already has.
    pub async fn wait(&self) -> RequestSnapshot {
        let mut rx = self.snapshot_tx.subscribe();
        loop {
            {
                let snap = rx.borrow();
                if snap.state == RequestState::Finished {
                    return snap.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}
