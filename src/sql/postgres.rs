// PostgreSQL Driver Module
//
// Blocking driver over the `postgres` crate. Statements run through
// `simple_query` so arbitrary generated SQL works and all row values come
// back as strings.

use std::time::Instant;

use chrono::Local;
use postgres::{Client, NoTls, SimpleQueryMessage};

use super::{
    ErrorInfo, Flavor, QueryResult, Rows, ServerInfo, ServerParams, SqlClient, SqlError, SqlStatus,
};

/// SQLSTATEs reported when the backend is shutting down or the connection is
/// administratively closed.
const SERVER_GONE_STATES: [&str; 3] = ["57P01", "57P02", "57P03"];

pub struct PostgresClient {
    params: ServerParams,
    client: Client,
    info: ServerInfo,
}

fn build_connection_string(params: &ServerParams) -> String {
    let mut conn = format!("dbname={}", params.database);

    if !params.username.is_empty() {
        conn.push_str(&format!(" user={}", params.username));
    }
    if !params.password.is_empty() {
        conn.push_str(&format!(" password={}", params.password));
    }
    if !params.address.is_empty() {
        conn.push_str(&format!(" host={}", params.address));
    } else if !params.socket.is_empty() {
        conn.push_str(&format!(" host={}", params.socket));
    }
    if params.port != 0 && params.port != 5432 {
        conn.push_str(&format!(" port={}", params.port));
    }

    conn
}

fn classify(client: &Client, error: &postgres::Error) -> ErrorInfo {
    let code = error
        .code()
        .map(|state| state.code().to_string())
        .unwrap_or_default();

    let server_gone = client.is_closed()
        || code.starts_with("08")
        || SERVER_GONE_STATES.contains(&code.as_str());

    ErrorInfo {
        code,
        message: error.to_string(),
        status: if server_gone {
            SqlStatus::ServerGone
        } else {
            SqlStatus::Error
        },
    }
}

impl PostgresClient {
    pub fn connect(params: ServerParams) -> Result<Self, SqlError> {
        let mut client = Client::connect(&build_connection_string(&params), NoTls)
            .map_err(|err| SqlError::Connect(err.to_string()))?;
        let info = Self::calculate_server_info(&mut client);
        Ok(PostgresClient {
            params,
            client,
            info,
        })
    }

    fn calculate_server_info(client: &mut Client) -> ServerInfo {
        let version = client
            .simple_query("SHOW server_version_num;")
            .ok()
            .and_then(|messages| {
                messages.into_iter().find_map(|message| match message {
                    SimpleQueryMessage::Row(row) => {
                        row.get(0).and_then(|value| value.parse::<u64>().ok())
                    }
                    _ => None,
                })
            })
            .unwrap_or(0);

        ServerInfo {
            flavor: Flavor::Postgres,
            version,
        }
    }
}

impl SqlClient for PostgresClient {
    fn execute_query(&mut self, query: &str) -> QueryResult {
        let executed_at = Local::now();
        let started = Instant::now();

        match self.client.simple_query(query) {
            Ok(messages) => {
                let mut affected_rows = 0;
                let mut fields = 0;
                let mut rows = Vec::new();

                for message in messages {
                    match message {
                        SimpleQueryMessage::Row(row) => {
                            fields = fields.max(row.len());
                            rows.push(
                                (0..row.len())
                                    .map(|idx| row.get(idx).map(str::to_string))
                                    .collect(),
                            );
                        }
                        SimpleQueryMessage::CommandComplete(count) => {
                            affected_rows += count;
                        }
                        _ => {}
                    }
                }

                QueryResult {
                    query: query.to_string(),
                    executed_at,
                    execution_time: started.elapsed(),
                    error_info: ErrorInfo::success(),
                    affected_rows,
                    rows: Some(Rows::new(fields, rows)),
                }
            }
            Err(error) => QueryResult {
                query: query.to_string(),
                executed_at,
                execution_time: started.elapsed(),
                error_info: classify(&self.client, &error),
                affected_rows: 0,
                rows: None,
            },
        }
    }

    fn reconnect(&mut self) -> Result<(), SqlError> {
        self.client = Client::connect(&build_connection_string(&self.params), NoTls)
            .map_err(|err| SqlError::Connect(err.to_string()))?;
        self.info = Self::calculate_server_info(&mut self.client);
        Ok(())
    }

    fn server_info(&self) -> ServerInfo {
        self.info
    }

    fn host_info(&self) -> String {
        format!("{}:{}", self.params.address, self.params.port)
    }
}
