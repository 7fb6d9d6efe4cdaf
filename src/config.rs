// Configuration Module
//
// Typed knobs for the action generators plus the TOML scenario file the
// runner consumes. Every struct deserializes with full defaults so a scenario
// only has to spell out what it changes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::metadata::limits;
use crate::sql::ServerParams;

/// Malformed or conflicting configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse scenario file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Knobs for the DDL-generating actions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DdlConfig {
    /// Drops become no-ops at or below this many tables.
    pub min_table_count: usize,
    /// Creates become no-ops at or above this many tables.
    pub max_table_count: usize,
    pub max_column_count: usize,
    pub max_alter_clauses: usize,
    pub access_methods: Vec<String>,
}

impl Default for DdlConfig {
    fn default() -> Self {
        DdlConfig {
            min_table_count: 3,
            max_table_count: 10,
            max_column_count: 20,
            max_alter_clauses: 5,
            access_methods: vec!["heap".to_string(), "tde_heap".to_string()],
        }
    }
}

/// Knobs for the DML-generating actions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DmlConfig {
    pub delete_min: usize,
    pub delete_max: usize,
}

impl Default for DmlConfig {
    fn default() -> Self {
        DmlConfig {
            delete_min: 1,
            delete_max: 10,
        }
    }
}

/// Knobs for custom SQL actions. Empty today; scenarios already address
/// custom actions by name, so per-action settings land here when they exist.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomConfig {}

/// Everything an action builder may consult.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AllConfig {
    pub ddl: DdlConfig,
    pub dml: DmlConfig,
    pub custom: CustomConfig,
}

/// Shape of one workload run.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkloadParams {
    pub duration_in_seconds: u64,
    pub repeat_times: usize,
    pub number_of_workers: usize,
}

impl Default for WorkloadParams {
    fn default() -> Self {
        WorkloadParams {
            duration_in_seconds: 10,
            repeat_times: 1,
            number_of_workers: 5,
        }
    }
}

/// A custom SQL statement registered from the scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomActionConfig {
    pub name: String,
    pub sql: String,
    #[serde(default = "default_custom_weight")]
    pub weight: usize,
    /// When set, `{table}` markers in the statement are substituted with a
    /// random table name.
    #[serde(default)]
    pub inject_table: bool,
}

fn default_custom_weight() -> usize {
    100
}

/// Root of the scenario file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub server: ServerParams,
    pub workload: WorkloadParams,
    pub ddl: DdlConfig,
    pub dml: DmlConfig,
    /// Tables created by the init worker before the workload starts; the DDL
    /// minimum is used when absent.
    pub init_tables: Option<usize>,
    /// Whether the init worker seeds every table with data.
    pub initial_data: bool,
    #[serde(rename = "custom_action")]
    pub custom_actions: Vec<CustomActionConfig>,
    /// Weight overrides applied to the default registry, by action name.
    pub weights: BTreeMap<String, usize>,
}

impl ScenarioConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let scenario: ScenarioConfig = toml::from_str(&raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ddl.min_table_count >= self.ddl.max_table_count {
            return Err(ConfigError::Invalid(format!(
                "min_table_count ({}) must be below max_table_count ({})",
                self.ddl.min_table_count, self.ddl.max_table_count
            )));
        }
        if self.ddl.max_table_count > limits::MAXIMUM_TABLE_COUNT {
            return Err(ConfigError::Invalid(format!(
                "max_table_count ({}) exceeds the registry capacity ({})",
                self.ddl.max_table_count,
                limits::MAXIMUM_TABLE_COUNT
            )));
        }
        if self.ddl.max_column_count < 2 {
            return Err(ConfigError::Invalid(
                "max_column_count must be at least 2".to_string(),
            ));
        }
        if self.ddl.max_alter_clauses == 0 {
            return Err(ConfigError::Invalid(
                "max_alter_clauses must be at least 1".to_string(),
            ));
        }
        if self.ddl.access_methods.is_empty() {
            return Err(ConfigError::Invalid(
                "access_methods must not be empty".to_string(),
            ));
        }
        if self.dml.delete_min > self.dml.delete_max {
            return Err(ConfigError::Invalid(format!(
                "delete_min ({}) must not exceed delete_max ({})",
                self.dml.delete_min, self.dml.delete_max
            )));
        }
        if self.workload.number_of_workers == 0 {
            return Err(ConfigError::Invalid(
                "number_of_workers must be at least 1".to_string(),
            ));
        }
        if self.workload.duration_in_seconds == 0 {
            return Err(ConfigError::Invalid(
                "duration_in_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn all_config(&self) -> AllConfig {
        AllConfig {
            ddl: self.ddl.clone(),
            dml: self.dml.clone(),
            custom: CustomConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scenario_gets_defaults() {
        let scenario: ScenarioConfig = toml::from_str("").unwrap();
        assert_eq!(scenario.ddl.min_table_count, 3);
        assert_eq!(scenario.ddl.max_table_count, 10);
        assert_eq!(scenario.workload.number_of_workers, 5);
        assert_eq!(scenario.server.port, 5432);
        assert!(scenario.custom_actions.is_empty());
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn scenario_sections_override_defaults() {
        let scenario: ScenarioConfig = toml::from_str(
            r#"
            [server]
            database = "smoke"
            address = "10.0.0.2"
            port = 5433

            [workload]
            duration_in_seconds = 30
            number_of_workers = 8

            [ddl]
            max_table_count = 50

            [[custom_action]]
            name = "analyze_random"
            sql = "ANALYZE {table};"
            inject_table = true

            [weights]
            insert_some_data = 500
            "#,
        )
        .unwrap();
        assert_eq!(scenario.server.database, "smoke");
        assert_eq!(scenario.server.port, 5433);
        assert_eq!(scenario.workload.number_of_workers, 8);
        assert_eq!(scenario.ddl.max_table_count, 50);
        assert_eq!(scenario.custom_actions.len(), 1);
        assert!(scenario.custom_actions[0].inject_table);
        assert_eq!(scenario.weights["insert_some_data"], 500);
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn conflicting_table_bounds_are_rejected() {
        let scenario: ScenarioConfig = toml::from_str(
            r#"
            [ddl]
            min_table_count = 10
            max_table_count = 10
            "#,
        )
        .unwrap();
        assert!(matches!(
            scenario.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn zero_workers_are_rejected() {
        let scenario: ScenarioConfig = toml::from_str(
            r#"
            [workload]
            number_of_workers = 0
            "#,
        )
        .unwrap();
        assert!(scenario.validate().is_err());
    }
}
