// DDL Action Module
//
// CREATE / DROP / ALTER TABLE generators. Every DDL action follows the same
// ordering: build the statement, mutate the reserved snapshot identically,
// execute the SQL, and publish the snapshot only when the server accepted it.

use crate::config::DdlConfig;
use crate::metadata::{Column, ColumnType, Metadata, Table, TableType};
use crate::random::StressRng;
use crate::sql::LoggedSql;

use super::{Action, ActionError};

pub(crate) fn random_column_type(rng: &mut StressRng) -> ColumnType {
    ColumnType::ALL[rng.number(0, ColumnType::ALL.len() - 1)]
}

pub(crate) fn random_column_length(rng: &mut StressRng, ctype: ColumnType) -> usize {
    match ctype {
        ColumnType::Char | ColumnType::Varchar => rng.number(1, 100),
        _ => 0,
    }
}

/// A column with a random name and type. `force_serial` makes it the
/// auto-incrementing primary key.
pub(crate) fn random_column(rng: &mut StressRng, force_serial: bool) -> Column {
    let name = format!("col{}", rng.number(0u64, u64::MAX));
    if force_serial {
        let mut column = Column::new(name, ColumnType::Int);
        column.primary_key = true;
        column.auto_increment = true;
        column
    } else {
        let mut column = Column::new(name, random_column_type(rng));
        column.length = random_column_length(rng, column.ctype);
        column
    }
}

/// Render one column for CREATE TABLE / ADD COLUMN.
pub fn column_definition(column: &Column) -> String {
    if column.auto_increment {
        format!("{} SERIAL", column.name)
    } else if column.length > 0 {
        format!("{} {}({})", column.name, column.ctype, column.length)
    } else {
        format!("{} {}", column.name, column.ctype)
    }
}

/// Create a table named `foo<rand>` with a serial primary key and a random
/// set of columns. A no-op while the catalog holds `max_table_count` tables.
pub struct CreateTable {
    config: DdlConfig,
    ttype: TableType,
}

impl CreateTable {
    pub fn new(config: DdlConfig, ttype: TableType) -> Self {
        CreateTable { config, ttype }
    }
}

impl Action for CreateTable {
    fn execute(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        connection: &mut LoggedSql,
    ) -> Result<(), ActionError> {
        if metadata.size() >= self.config.max_table_count {
            log::debug!("table limit reached, skipping create");
            return Ok(());
        }

        let mut reservation = metadata.create_table();
        if !reservation.open() {
            log::debug!("catalog is full, skipping create");
            return Ok(());
        }

        let statement = {
            let Some(table) = reservation.table_mut() else {
                return Ok(());
            };
            table.name = format!("foo{}", rng.number(1u64, 1_000_000));
            table.ttype = self.ttype;

            let column_count = rng.number(2, self.config.max_column_count);
            for idx in 0..column_count {
                table.columns.push(random_column(rng, idx == 0));
            }

            build_create_statement(table)
        };

        match connection.execute_query(&statement).check() {
            Ok(_) => {
                reservation.complete()?;
                Ok(())
            }
            Err(err) => {
                reservation.cancel();
                Err(err.into())
            }
        }
    }
}

fn build_create_statement(table: &Table) -> String {
    let mut defs = Vec::new();
    let mut pk_columns = Vec::new();

    for column in &table.columns {
        if column.primary_key {
            pk_columns.push(column.name.clone());
        }
        defs.push(column_definition(column));
    }

    if !pk_columns.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", pk_columns.join(", ")));
    }

    format!("CREATE TABLE {} ({});", table.name, defs.join(",\n"))
}

/// Drop a random table. A no-op while the catalog holds `min_table_count`
/// tables or fewer.
pub struct DropTable {
    config: DdlConfig,
}

impl DropTable {
    pub fn new(config: DdlConfig) -> Self {
        DropTable { config }
    }
}

impl Action for DropTable {
    fn execute(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        connection: &mut LoggedSql,
    ) -> Result<(), ActionError> {
        if metadata.size() <= self.config.min_table_count {
            log::debug!("table minimum reached, skipping drop");
            return Ok(());
        }

        let idx = rng.number(0, metadata.size() - 1);
        let mut reservation = metadata.drop_table(idx);
        if !reservation.open() {
            return Ok(());
        }
        let Some(name) = reservation.table().map(|table| table.name.clone()) else {
            return Ok(());
        };

        match connection
            .execute_query(&format!("DROP TABLE {};", name))
            .check()
        {
            Ok(_) => {
                reservation.complete()?;
                Ok(())
            }
            Err(err) => {
                reservation.cancel();
                Err(err.into())
            }
        }
    }
}

/// Subcommands an `AlterTable` action may combine into one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterSubcommand {
    AddColumn,
    DropColumn,
    ChangeColumn,
    ChangeAccessMethod,
}

impl AlterSubcommand {
    pub const ALL: [AlterSubcommand; 4] = [
        AlterSubcommand::AddColumn,
        AlterSubcommand::DropColumn,
        AlterSubcommand::ChangeColumn,
        AlterSubcommand::ChangeAccessMethod,
    ];
}

/// Alter a random table with a random combination of subcommands, applied to
/// the local snapshot exactly as sent to the server.
pub struct AlterTable {
    config: DdlConfig,
    commands: Vec<AlterSubcommand>,
}

impl AlterTable {
    pub fn new(config: DdlConfig, commands: &[AlterSubcommand]) -> Self {
        AlterTable {
            config,
            commands: commands.to_vec(),
        }
    }
}

impl Action for AlterTable {
    fn execute(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        connection: &mut LoggedSql,
    ) -> Result<(), ActionError> {
        if metadata.size() == 0 || self.commands.is_empty() {
            return Ok(());
        }

        let idx = rng.number(0, metadata.size() - 1);
        let mut reservation = metadata.alter_table(idx);
        if !reservation.open() {
            return Ok(());
        }

        let (name, clauses) = {
            let Some(table) = reservation.table_mut() else {
                return Ok(());
            };

            let clause_count = rng.number(1, self.config.max_alter_clauses);
            let mut clauses = Vec::new();
            // New columns are appended to the snapshot only after the loop so
            // they cannot be targeted by same-statement drops or changes.
            let mut new_columns = Vec::new();

            for _ in 0..clause_count {
                match self.commands[rng.number(0, self.commands.len() - 1)] {
                    AlterSubcommand::AddColumn => {
                        let column = random_column(rng, false);
                        clauses.push(format!("ADD COLUMN {}", column_definition(&column)));
                        new_columns.push(column);
                    }
                    AlterSubcommand::DropColumn => {
                        if table.columns.len() < 3 {
                            continue;
                        }
                        let column_index = rng.number(1, table.columns.len() - 1);
                        clauses.push(format!("DROP COLUMN {}", table.columns[column_index].name));
                        table.columns.remove(column_index);
                    }
                    AlterSubcommand::ChangeColumn => {
                        if table.columns.len() < 2 {
                            continue;
                        }
                        let column_index = rng.number(1, table.columns.len() - 1);
                        let ctype = random_column_type(rng);
                        let length = random_column_length(rng, ctype);
                        let column = &mut table.columns[column_index];
                        column.ctype = ctype;
                        column.length = length;
                        let rendered = if length > 0 {
                            format!("{}({})", ctype, length)
                        } else {
                            ctype.to_string()
                        };
                        clauses.push(format!("ALTER COLUMN {} TYPE {}", column.name, rendered));
                    }
                    AlterSubcommand::ChangeAccessMethod => {
                        if self.config.access_methods.is_empty() {
                            continue;
                        }
                        let method = self.config.access_methods
                            [rng.number(0, self.config.access_methods.len() - 1)]
                        .clone();
                        clauses.push(format!("SET ACCESS METHOD {}", method));
                        table.engine = method;
                    }
                }
            }

            table.columns.extend(new_columns);
            (table.name.clone(), clauses)
        };

        if clauses.is_empty() {
            // Every draw was skipped (e.g. too few columns to drop or
            // change); nothing to send.
            reservation.cancel();
            return Ok(());
        }

        let statement = format!("ALTER TABLE {}\n {};", name, clauses.join(",\n"));
        match connection.execute_query(&statement).check() {
            Ok(_) => {
                reservation.complete()?;
                Ok(())
            }
            Err(err) => {
                reservation.cancel();
                Err(err.into())
            }
        }
    }
}
