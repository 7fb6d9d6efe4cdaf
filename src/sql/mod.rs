// SQL Execution Envelope Module
//
// Flavor-agnostic contract between actions and whatever client library talks
// to the server: a query string goes in, a timed result with a classified
// error comes out. Concrete drivers implement `SqlClient`; everything above
// it only sees `QueryResult`.

pub mod logged;
pub mod postgres;

pub use logged::LoggedSql;
pub use postgres::PostgresClient;

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Deserialize;
use thiserror::Error;

/// Server families the harness can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    AnyMysql,
    AnyPg,
    Mysql,
    Postgres,
    Ppg,
}

/// Flavor and version of the connected server, for scenario-level gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    pub flavor: Flavor,
    pub version: u64,
}

impl ServerInfo {
    pub fn is_mysql_like(&self) -> bool {
        matches!(self.flavor, Flavor::Mysql | Flavor::AnyMysql)
    }

    pub fn is_pg_like(&self) -> bool {
        matches!(self.flavor, Flavor::Postgres | Flavor::Ppg | Flavor::AnyPg)
    }

    pub fn matching_any(&self, flavor: Flavor) -> bool {
        if flavor == Flavor::AnyMysql && self.is_mysql_like() {
            return true;
        }
        if flavor == Flavor::AnyPg && self.is_pg_like() {
            return true;
        }
        flavor == self.flavor
    }

    pub fn after_or_is(&self, flavor: Flavor, version: u64) -> bool {
        self.matching_any(flavor) && self.version >= version
    }

    pub fn before(&self, flavor: Flavor, version: u64) -> bool {
        self.matching_any(flavor) && self.version < version
    }

    pub fn between(&self, flavor: Flavor, min: u64, max: u64) -> bool {
        self.matching_any(flavor) && self.version >= min && self.version <= max
    }
}

/// Connection coordinates for one server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerParams {
    pub database: String,
    pub address: String,
    pub socket: String,
    pub username: String,
    pub password: String,
    pub maxpacket: u64,
    pub port: u16,
}

impl Default for ServerParams {
    fn default() -> Self {
        ServerParams {
            database: "sqlstorm".to_string(),
            address: "localhost".to_string(),
            socket: String::new(),
            username: "postgres".to_string(),
            password: String::new(),
            maxpacket: 0,
            port: 5432,
        }
    }
}

/// Outcome classification of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatus {
    Success,
    Error,
    /// The connection died or the server went away; the statement outcome is
    /// unknown.
    ServerGone,
}

/// Classified error attached to every `QueryResult`.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub status: SqlStatus,
}

impl ErrorInfo {
    pub fn success() -> Self {
        ErrorInfo {
            code: String::new(),
            message: String::new(),
            status: SqlStatus::Success,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SqlStatus::Success
    }

    pub fn is_server_gone(&self) -> bool {
        self.status == SqlStatus::ServerGone
    }
}

/// String-view rows returned by a query, when the driver produced any.
#[derive(Debug, Clone, Default)]
pub struct Rows {
    fields: usize,
    rows: Vec<Vec<Option<String>>>,
    cursor: usize,
}

impl Rows {
    pub fn new(fields: usize, rows: Vec<Vec<Option<String>>>) -> Self {
        Rows {
            fields,
            rows,
            cursor: 0,
        }
    }

    pub fn num_fields(&self) -> usize {
        self.fields
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn next_row(&mut self) -> Option<&[Option<String>]> {
        let row = self.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(row)
    }
}

/// Result of one executed statement: the text, when and how long it ran, the
/// classified error, and whatever rows came back.
#[derive(Debug)]
pub struct QueryResult {
    pub query: String,
    pub executed_at: DateTime<Local>,
    pub execution_time: Duration,
    pub error_info: ErrorInfo,
    pub affected_rows: u64,
    pub rows: Option<Rows>,
}

impl QueryResult {
    pub fn is_success(&self) -> bool {
        self.error_info.is_success()
    }

    /// Turn a non-success outcome into an `SqlError`, for callers that want
    /// the failure to unwind instead of inspecting the status.
    pub fn check(&self) -> Result<&QueryResult, SqlError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SqlError::Query {
                code: self.error_info.code.clone(),
                message: self.error_info.message.clone(),
                status: self.error_info.status,
            })
        }
    }
}

/// Failures surfaced by the envelope.
#[derive(Error, Debug, Clone)]
pub enum SqlError {
    #[error("Error while executing query: {code} {message}")]
    Query {
        code: String,
        message: String,
        status: SqlStatus,
    },
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Connection setup failed: {0}")]
    Setup(String),
}

/// Capability every concrete driver provides. One instance is one
/// connection; instances are never shared between workers.
pub trait SqlClient: Send {
    fn execute_query(&mut self, query: &str) -> QueryResult;

    fn reconnect(&mut self) -> Result<(), SqlError>;

    fn server_info(&self) -> ServerInfo;

    fn host_info(&self) -> String;
}
