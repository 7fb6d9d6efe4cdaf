// Action Registry Module
//
// Named, weighted set of action factories. Workers sample it by weight on
// every loop iteration, so lookups return owned clones; no reference into the
// factory list ever outlives the registry mutex.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::AllConfig;
use crate::metadata::TableType;

use super::ddl::{AlterSubcommand, AlterTable, CreateTable, DropTable};
use super::dml::{DeleteData, InsertData, UpdateOneRow};
use super::{Action, ActionError, CustomSql};

pub type ActionBuilder = Arc<dyn Fn(&AllConfig) -> Box<dyn Action> + Send + Sync>;

/// One named, weighted way to build an action.
#[derive(Clone)]
pub struct ActionFactory {
    pub name: String,
    pub builder: ActionBuilder,
    pub weight: usize,
}

impl ActionFactory {
    pub fn new<F>(name: impl Into<String>, weight: usize, builder: F) -> Self
    where
        F: Fn(&AllConfig) -> Box<dyn Action> + Send + Sync + 'static,
    {
        ActionFactory {
            name: name.into(),
            builder: Arc::new(builder),
            weight,
        }
    }

    pub fn build(&self, config: &AllConfig) -> Box<dyn Action> {
        (self.builder)(config)
    }
}

/// Mutable set of factories, shared between workers.
pub struct ActionRegistry {
    factories: Mutex<Vec<ActionFactory>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ActionRegistry {
    fn clone(&self) -> Self {
        ActionRegistry {
            factories: Mutex::new(self.factories.lock().clone()),
        }
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        ActionRegistry {
            factories: Mutex::new(Vec::new()),
        }
    }

    /// Register a factory. Names are unique within a registry.
    pub fn insert(&self, factory: ActionFactory) -> Result<usize, ActionError> {
        let mut factories = self.factories.lock();
        if factories.iter().any(|f| f.name == factory.name) {
            return Err(ActionError::DuplicateAction(factory.name));
        }
        factories.push(factory);
        Ok(factories.len() - 1)
    }

    pub fn remove(&self, name: &str) -> Result<(), ActionError> {
        let mut factories = self.factories.lock();
        let position = factories
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;
        factories.remove(position);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<ActionFactory, ActionError> {
        let factories = self.factories.lock();
        factories
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.factories.lock().iter().any(|f| f.name == name)
    }

    /// Adjust the weight of a registered factory in place.
    pub fn set_weight(&self, name: &str, weight: usize) -> Result<(), ActionError> {
        let mut factories = self.factories.lock();
        let factory = factories
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;
        factory.weight = weight;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.factories.lock().len()
    }

    pub fn total_weight(&self) -> usize {
        self.factories.lock().iter().map(|f| f.weight).sum()
    }

    /// First factory whose cumulative weight meets or exceeds `offset`.
    pub fn lookup_by_weight_offset(&self, offset: usize) -> Result<ActionFactory, ActionError> {
        let factories = self.factories.lock();
        let mut accumulated = 0;
        for factory in factories.iter() {
            accumulated += factory.weight;
            if accumulated >= offset {
                return Ok(factory.clone());
            }
        }
        Err(ActionError::WeightOffsetOutOfRange(offset))
    }

    /// Replace this registry's contents with a copy of another's.
    pub fn use_from(&self, other: &ActionRegistry) {
        let copied = other.factories.lock().clone();
        *self.factories.lock() = copied;
    }

    /// Register a fixed custom statement.
    pub fn make_custom_sql_action(
        &self,
        name: impl Into<String>,
        sql: impl Into<String>,
        weight: usize,
    ) -> Result<usize, ActionError> {
        let sql = sql.into();
        // Validate eagerly so a bad statement fails at registration, not in
        // the middle of a run.
        CustomSql::new(sql.clone(), Vec::new())?;
        self.insert(ActionFactory::new(name, weight, move |_config| {
            Box::new(
                CustomSql::new(sql.clone(), Vec::new())
                    .expect("statement was validated at registration"),
            )
        }))
    }

    /// Register a custom statement with the `{table}` injection enabled.
    pub fn make_custom_table_sql_action(
        &self,
        name: impl Into<String>,
        sql: impl Into<String>,
        weight: usize,
    ) -> Result<usize, ActionError> {
        let sql = sql.into();
        CustomSql::new(sql.clone(), vec!["table".to_string()])?;
        self.insert(ActionFactory::new(name, weight, move |_config| {
            Box::new(
                CustomSql::new(sql.clone(), vec!["table".to_string()])
                    .expect("statement was validated at registration"),
            )
        }))
    }
}

/// The registry a fresh node starts from: the standard DDL/DML mix with
/// inserts dominating.
pub fn default_registry() -> ActionRegistry {
    let registry = ActionRegistry::new();

    let defaults = [
        ActionFactory::new("create_normal_table", 100, |config: &AllConfig| {
            Box::new(CreateTable::new(config.ddl.clone(), TableType::Normal)) as Box<dyn Action>
        }),
        ActionFactory::new("drop_table", 100, |config: &AllConfig| {
            Box::new(DropTable::new(config.ddl.clone())) as Box<dyn Action>
        }),
        ActionFactory::new("alter_table", 100, |config: &AllConfig| {
            Box::new(AlterTable::new(config.ddl.clone(), &AlterSubcommand::ALL)) as Box<dyn Action>
        }),
        ActionFactory::new("insert_some_data", 1000, |config: &AllConfig| {
            Box::new(InsertData::new(config.dml.clone(), 10)) as Box<dyn Action>
        }),
        ActionFactory::new("delete_some_data", 100, |config: &AllConfig| {
            Box::new(DeleteData::new(config.dml.clone())) as Box<dyn Action>
        }),
        ActionFactory::new("update_one_row", 100, |config: &AllConfig| {
            Box::new(UpdateOneRow::new(config.dml.clone())) as Box<dyn Action>
        }),
    ];

    for factory in defaults {
        registry
            .insert(factory)
            .expect("default action names are unique");
    }

    registry
}
