// Action Module
//
// Actions are SQL statements. An action can result in zero (on error), one
// (typical success) or more (cascading DDL) changes to the metadata registry.
// Actions are stateless so a retry never observes leftovers from a failed
// attempt.

pub mod custom;
pub mod ddl;
pub mod dml;
pub mod error;
pub mod registry;

pub use custom::CustomSql;
pub use ddl::{AlterSubcommand, AlterTable, CreateTable, DropTable};
pub use dml::{DeleteData, InsertData, UpdateOneRow};
pub use error::ActionError;
pub use registry::{default_registry, ActionFactory, ActionRegistry};

use crate::metadata::Metadata;
use crate::random::StressRng;
use crate::sql::LoggedSql;

/// One unit of work against the server and the registry.
pub trait Action {
    fn execute(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        connection: &mut LoggedSql,
    ) -> Result<(), ActionError>;
}
