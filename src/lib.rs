// Export public modules
pub mod action;
pub mod config;
pub mod logging;
pub mod metadata;
pub mod random;
pub mod sql;
pub mod workload;

// Re-export key items for convenient access
pub use action::{Action, ActionError, ActionRegistry};
pub use config::{AllConfig, ConfigError, ScenarioConfig, WorkloadParams};
pub use metadata::{Metadata, MetadataError, Table};
pub use random::StressRng;
pub use sql::{LoggedSql, QueryResult, SqlClient, SqlError, SqlStatus};
pub use workload::{Node, SqlFactory, Worker, Workload};
