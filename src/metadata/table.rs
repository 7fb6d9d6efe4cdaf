// Table Snapshot Module
//
// Value types describing one table as the harness believes it exists on the
// server. A snapshot is immutable once published into the registry; every
// schema change builds a new snapshot and swaps it in.

use std::fmt;

use smallvec::SmallVec;

use super::limits;

/// SQL column types the generated DDL and DML know how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Char,
    Varchar,
    Real,
    Bool,
    Bytea,
    Text,
}

impl ColumnType {
    pub const ALL: [ColumnType; 7] = [
        ColumnType::Int,
        ColumnType::Char,
        ColumnType::Varchar,
        ColumnType::Real,
        ColumnType::Bool,
        ColumnType::Bytea,
        ColumnType::Text,
    ];
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int => "INT",
            ColumnType::Char => "CHAR",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Real => "REAL",
            ColumnType::Bool => "BOOL",
            ColumnType::Bytea => "BYTEA",
            ColumnType::Text => "TEXT",
        };
        f.write_str(name)
    }
}

/// Whether a column is generated, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Generated {
    #[default]
    NotGenerated,
    Stored,
    Virtual,
}

/// One column of a table snapshot. Plain data, owned by its Table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ctype: ColumnType,
    /// Meaningful for CHAR/VARCHAR, zero for everything else.
    pub length: usize,
    pub default_value: String,
    pub generated: Generated,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub compressed: bool,
}

impl Column {
    pub fn new(name: String, ctype: ColumnType) -> Self {
        Column {
            name,
            ctype,
            length: 0,
            default_value: String::new(),
            generated: Generated::NotGenerated,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            compressed: false,
        }
    }
}

/// A secondary index: a name plus ordered field descriptors. Each field is a
/// column reference with an optional ordering suffix, or a functional
/// expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Index {
    pub name: String,
    pub fields: SmallVec<[String; limits::OPTIMIZED_INDEX_COLUMN_COUNT]>,
}

/// Table kinds the DDL generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableType {
    #[default]
    Normal,
    Partitioned,
    Temporary,
}

/// In-memory description of one table.
///
/// Tables are built inside a create Reservation, deep-copied by alter
/// Reservations, and shared behind `Arc` once published. Readers holding a
/// clone of the `Arc` keep a consistent snapshot for as long as they need it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    /// Engine or access-method label, e.g. "heap".
    pub engine: String,
    pub row_format: String,
    pub tablespace: String,
    pub key_block_size: u32,
    pub compression: bool,
    pub encryption: bool,
    pub columns: SmallVec<[Column; limits::OPTIMIZED_COLUMN_COUNT]>,
    pub indexes: SmallVec<[Index; limits::OPTIMIZED_INDEX_COUNT]>,
    pub ttype: TableType,
}

impl Table {
    pub fn with_name(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            ..Table::default()
        }
    }
}
