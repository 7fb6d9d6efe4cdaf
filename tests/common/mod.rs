use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use tempfile::TempDir;

use sqlstorm::logging;
use sqlstorm::sql::{
    ErrorInfo, Flavor, LoggedSql, QueryResult, Rows, ServerInfo, SqlClient, SqlError, SqlStatus,
};

/// Shared record of every statement a mock connection executed.
pub type StatementLog = Arc<Mutex<Vec<String>>>;

/// In-memory stand-in for a server connection. Succeeds by default; can be
/// told to fail statements containing a marker, and can serve canned rows.
pub struct MockSql {
    executed: Option<StatementLog>,
    counter: Option<Arc<AtomicUsize>>,
    fail_contains: Option<(String, SqlStatus)>,
    canned_rows: Option<Vec<Vec<Option<String>>>>,
    reconnects: Arc<Mutex<usize>>,
}

#[allow(dead_code)]
impl MockSql {
    pub fn recording(log: StatementLog) -> Self {
        MockSql {
            executed: Some(log),
            counter: None,
            fail_contains: None,
            canned_rows: None,
            reconnects: Arc::new(Mutex::new(0)),
        }
    }

    /// Counting-only mock for high-volume runs.
    pub fn silent() -> Self {
        MockSql {
            executed: None,
            counter: None,
            fail_contains: None,
            canned_rows: None,
            reconnects: Arc::new(Mutex::new(0)),
        }
    }

    /// Count executed statements into a shared counter.
    pub fn counting(counter: Arc<AtomicUsize>) -> Self {
        MockSql {
            counter: Some(counter),
            ..Self::silent()
        }
    }

    /// Share one reconnect counter between several mock connections.
    pub fn with_shared_reconnects(mut self, reconnects: Arc<Mutex<usize>>) -> Self {
        self.reconnects = reconnects;
        self
    }

    pub fn fail_when(mut self, marker: &str, status: SqlStatus) -> Self {
        self.fail_contains = Some((marker.to_string(), status));
        self
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Option<String>>>) -> Self {
        self.canned_rows = Some(rows);
        self
    }

    pub fn reconnect_counter(&self) -> Arc<Mutex<usize>> {
        self.reconnects.clone()
    }
}

impl SqlClient for MockSql {
    fn execute_query(&mut self, query: &str) -> QueryResult {
        if let Some(log) = &self.executed {
            log.lock().push(query.to_string());
        }
        if let Some(counter) = &self.counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let error_info = match &self.fail_contains {
            Some((marker, status)) if query.contains(marker.as_str()) => ErrorInfo {
                code: "XX000".to_string(),
                message: format!("mock failure for {}", marker),
                status: *status,
            },
            _ => ErrorInfo::success(),
        };

        let rows = if error_info.is_success() {
            self.canned_rows
                .as_ref()
                .map(|rows| Rows::new(rows.first().map_or(0, Vec::len), rows.clone()))
        } else {
            None
        };

        QueryResult {
            query: query.to_string(),
            executed_at: Local::now(),
            execution_time: Duration::from_micros(10),
            error_info,
            affected_rows: 0,
            rows,
        }
    }

    fn reconnect(&mut self) -> Result<(), SqlError> {
        *self.reconnects.lock() += 1;
        Ok(())
    }

    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            flavor: Flavor::Postgres,
            version: 170000,
        }
    }

    fn host_info(&self) -> String {
        "mock:0".to_string()
    }
}

/// A logged connection over a mock client, with its sink in a temp dir.
#[allow(dead_code)]
pub fn mock_connection(dir: &TempDir, name: &str, mock: MockSql) -> LoggedSql {
    let logger = logging::connection_log(dir.path(), name).unwrap();
    LoggedSql::new(Box::new(mock), logger)
}

/// Recording connection plus the statement log behind it.
#[allow(dead_code)]
pub fn recording_connection(dir: &TempDir, name: &str) -> (LoggedSql, StatementLog) {
    let log: StatementLog = Arc::new(Mutex::new(Vec::new()));
    let conn = mock_connection(dir, name, MockSql::recording(log.clone()));
    (conn, log)
}
