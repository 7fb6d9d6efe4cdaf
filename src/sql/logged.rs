// Logged Connection Module
//
// Wraps any `SqlClient` with a per-connection plain-text sink: every
// statement and every failure is appended to `sql-conn-<name>.log`.

use crate::logging::LineLog;

use super::{QueryResult, ServerInfo, SqlClient, SqlError};

/// A driver connection plus its statement log.
pub struct LoggedSql {
    client: Box<dyn SqlClient>,
    logger: LineLog,
}

impl LoggedSql {
    pub fn new(client: Box<dyn SqlClient>, logger: LineLog) -> Self {
        LoggedSql { client, logger }
    }

    pub fn server_info(&self) -> ServerInfo {
        self.client.server_info()
    }

    pub fn host_info(&self) -> String {
        self.client.host_info()
    }

    /// Execute one statement, logging it and any failure.
    pub fn execute_query(&mut self, query: &str) -> QueryResult {
        self.logger.line(&format!("Statement: {}", query));

        let result = self.client.execute_query(query);

        if !result.is_success() {
            self.logger.line(&format!(
                "Error while executing SQL statement: {} {}",
                result.error_info.code, result.error_info.message
            ));
        }

        result
    }

    /// First field of the first row, or `None` on any failure or empty
    /// result.
    pub fn query_single_value(&mut self, query: &str) -> Option<String> {
        let mut result = self.execute_query(query);

        if !result.is_success() {
            return None;
        }

        let rows = result.rows.as_mut()?;
        if rows.num_fields() < 1 || rows.num_rows() < 1 {
            self.logger.line("Received no data from the server");
            return None;
        }

        rows.next_row()?.first().cloned().flatten()
    }

    pub fn reconnect(&mut self) -> Result<(), SqlError> {
        self.client.reconnect()
    }
}
