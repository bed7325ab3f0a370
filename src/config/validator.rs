//! Config validation: datasource naming and association declarations.

use crate::config::DbTableConfig;
use crate::error::ConfigError;
use std::collections::BTreeMap;

/// Datasource names end up in `db.table alias` targets, so they cannot contain separators.
pub fn validate_datasource_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains('.') || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "datasource name '{}' must be non-empty and contain no '.' or whitespace",
            name
        )));
    }
    Ok(())
}

/// Association declarations: an empty target is an error, an undeclared one only warns.
pub fn validate(tables: &BTreeMap<String, DbTableConfig>) -> Result<(), ConfigError> {
    for (db, db_tables) in tables {
        for (table, table_config) in db_tables {
            for (column, column_config) in &table_config.columns {
                let Some(assoc) = &column_config.association else { continue };
                if assoc.target.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "{}.{}.{}: association target must not be empty",
                        db, table, column
                    )));
                }
                if !db_tables.contains_key(&assoc.target) {
                    tracing::warn!(
                        db = %db,
                        table = %table,
                        column = %column,
                        target = %assoc.target,
                        "association targets an undeclared table"
                    );
                }
            }
        }
    }
    Ok(())
}
