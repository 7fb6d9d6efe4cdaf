// DML Action Module
//
// INSERT / DELETE / UPDATE generators. These never touch a Reservation; they
// read a snapshot and render values matching its column types.

use std::sync::Arc;

use crate::config::DmlConfig;
use crate::metadata::{Column, ColumnType, Metadata, Table};
use crate::random::StressRng;
use crate::sql::LoggedSql;

use super::{Action, ActionError};

/// Render a random literal matching the column type. Values are drawn from a
/// controlled alphabet, so quoting is the only escaping needed.
pub fn generate_value(column: &Column, rng: &mut StressRng) -> String {
    match column.ctype {
        ColumnType::Int => rng.number(1u64, 1_000_000).to_string(),
        ColumnType::Real => rng.number(1.0f64, 1_000_000.0).to_string(),
        ColumnType::Varchar | ColumnType::Char => {
            format!("'{}'", rng.string(0, column.length))
        }
        ColumnType::Bytea | ColumnType::Text => format!("'{}'", rng.string(50, 1000)),
        ColumnType::Bool => {
            let value = if rng.number(0u32, 1) == 1 { "true" } else { "false" };
            value.to_string()
        }
    }
}

fn random_table(metadata: &Metadata, rng: &mut StressRng) -> Arc<Table> {
    // The draw tolerates the racy window between size() and the slot read;
    // an emptied slot just means another draw.
    loop {
        let idx = rng.number(0, metadata.size().saturating_sub(1));
        if let Some(table) = metadata.get(idx) {
            return table;
        }
    }
}

/// Insert a batch of rows into one table, either fixed at construction or
/// picked at random per execution.
pub struct InsertData {
    #[allow(dead_code)]
    config: DmlConfig,
    table: Option<Arc<Table>>,
    rows: usize,
}

impl InsertData {
    pub fn new(config: DmlConfig, rows: usize) -> Self {
        InsertData {
            config,
            table: None,
            rows,
        }
    }

    pub fn for_table(config: DmlConfig, table: Arc<Table>, rows: usize) -> Self {
        InsertData {
            config,
            table: Some(table),
            rows,
        }
    }
}

impl Action for InsertData {
    fn execute(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        connection: &mut LoggedSql,
    ) -> Result<(), ActionError> {
        let table = match &self.table {
            Some(table) => table.clone(),
            None => {
                if metadata.size() == 0 {
                    log::debug!("no tables to insert into");
                    return Ok(());
                }
                random_table(metadata, rng)
            }
        };

        let mut sql = String::from("INSERT INTO ");
        sql.push_str(&table.name);
        sql.push_str(" (");

        let mut first = true;
        for column in &table.columns {
            if !column.auto_increment {
                if !first {
                    sql.push_str(", ");
                }
                sql.push_str(&column.name);
                first = false;
            }
        }

        sql.push_str(" ) VALUES ");
        for row in 0..self.rows {
            if row != 0 {
                sql.push_str(", ");
            }
            sql.push('(');

            first = true;
            for column in &table.columns {
                if !column.auto_increment {
                    if !first {
                        sql.push_str(", ");
                    }
                    sql.push_str(&generate_value(column, rng));
                    first = false;
                }
            }

            sql.push(')');
        }
        sql.push(';');

        connection.execute_query(&sql).check()?;
        Ok(())
    }
}

/// Delete a random batch of rows from a random table, keyed on the leading
/// primary-key column.
pub struct DeleteData {
    config: DmlConfig,
}

impl DeleteData {
    pub fn new(config: DmlConfig) -> Self {
        DeleteData { config }
    }
}

impl Action for DeleteData {
    fn execute(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        connection: &mut LoggedSql,
    ) -> Result<(), ActionError> {
        if metadata.size() == 0 {
            log::debug!("no tables to delete from");
            return Ok(());
        }

        let table = random_table(metadata, rng);
        let Some(pk) = table.columns.first() else {
            return Ok(());
        };

        let rows = rng.number(self.config.delete_min, self.config.delete_max);
        let sql = format!(
            "DELETE FROM {} WHERE {} IN (SELECT {} FROM {} ORDER BY random() LIMIT {});",
            table.name, pk.name, pk.name, table.name, rows
        );

        connection.execute_query(&sql).check()?;
        Ok(())
    }
}

/// Rewrite every non-serial column of one random row.
pub struct UpdateOneRow {
    #[allow(dead_code)]
    config: DmlConfig,
}

impl UpdateOneRow {
    pub fn new(config: DmlConfig) -> Self {
        UpdateOneRow { config }
    }
}

impl Action for UpdateOneRow {
    fn execute(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        connection: &mut LoggedSql,
    ) -> Result<(), ActionError> {
        if metadata.size() == 0 {
            log::debug!("no tables to update");
            return Ok(());
        }

        let table = random_table(metadata, rng);
        let Some(pk) = table.columns.first() else {
            return Ok(());
        };

        let mut sql = String::from("UPDATE ");
        sql.push_str(&table.name);
        sql.push_str(" SET ");

        let mut first = true;
        for column in &table.columns {
            if !column.auto_increment {
                if !first {
                    sql.push_str(", ");
                }
                sql.push_str(&column.name);
                sql.push_str(" = ");
                sql.push_str(&generate_value(column, rng));
                first = false;
            }
        }

        sql.push_str(&format!(
            " WHERE {} IN (SELECT {} FROM {} ORDER BY random() LIMIT 1);",
            pk.name, pk.name, table.name
        ));

        connection.execute_query(&sql).check()?;
        Ok(())
    }
}
