// Custom SQL Action Module
//
// User-supplied statements with injection markers. The only marker understood
// today is `{table}`, replaced with a random table name at execution time;
// the set is stored as strings so dynamic dictionaries can follow.

use crate::metadata::Metadata;
use crate::random::StressRng;
use crate::sql::LoggedSql;

use super::{Action, ActionError};

#[derive(Debug)]
pub struct CustomSql {
    statement: String,
    inject_parameters: Vec<String>,
}

impl CustomSql {
    pub fn new(
        statement: impl Into<String>,
        inject_parameters: Vec<String>,
    ) -> Result<Self, ActionError> {
        for inject in &inject_parameters {
            if inject != "table" {
                return Err(ActionError::UnsupportedInjection(inject.clone()));
            }
        }
        Ok(CustomSql {
            statement: statement.into(),
            inject_parameters,
        })
    }

    fn resolve(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        injection_point: &str,
    ) -> Result<String, ActionError> {
        if injection_point == "table" {
            loop {
                let size = metadata.size();
                if size == 0 {
                    return Err(ActionError::NoTables("custom SQL injection"));
                }
                // The inclusive bound can land one past the end; the empty
                // read just means another draw.
                let idx = rng.number(0, size);
                if let Some(table) = metadata.get(idx) {
                    return Ok(table.name.clone());
                }
            }
        }

        Err(ActionError::UnsupportedInjection(injection_point.to_string()))
    }
}

impl Action for CustomSql {
    fn execute(
        &self,
        metadata: &Metadata,
        rng: &mut StressRng,
        connection: &mut LoggedSql,
    ) -> Result<(), ActionError> {
        let mut statement = self.statement.clone();

        for inject in &self.inject_parameters {
            let marker = format!("{{{}}}", inject);
            let value = self.resolve(metadata, rng, inject)?;
            statement = statement.replace(&marker, &value);
        }

        connection.execute_query(&statement).check()?;
        Ok(())
    }
}
