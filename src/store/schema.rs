//! Additive schema migration.

use crate::error::{Error, Result};
use super::entity::{self, Entity};
use super::session::Session;
use std::collections::HashSet;
use tracing::{debug, info};

/// Outcome of one create-or-alter pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub table: String,
    /// Columns added by `ALTER TABLE`, in field order
    pub added_columns: Vec<String>,
}

/// Creates `T`'s table if absent, then adds any declared field missing from it.
///
/// Existing columns are never dropped or retyped. The pass runs in a single
/// transaction and is safe to repeat on every startup.
pub fn create_or_alter_table<T: Entity>(session: &mut Session) -> Result<MigrationReport> {
    let table = entity::table_name::<T>();
    if let Some(decoder) = session.row_decoder() {
        return Err(Error::SchemaPrecondition { table, decoder });
    }

    let tx = session.connection_mut().transaction()?;
    tx.execute_batch(&entity::create_table_statement::<T>())?;

    let existing: HashSet<String> = {
        let mut stmt = tx.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<_, _>>()?;
        names
    };

    let missing: Vec<_> = T::FIELDS
        .iter()
        .filter(|f| !existing.contains(f.name))
        .collect();

    if missing.is_empty() {
        debug!("Table \"{}\" is up to date", table);
    } else {
        info!(
            "Adding new fields to table \"{}\": {}",
            table,
            missing.iter().map(|f| f.name).collect::<Vec<_>>().join(", ")
        );
    }

    for field in &missing {
        tx.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table,
                field.name,
                field.storage.as_sql()
            ),
            [],
        )?;
    }
    tx.commit()?;

    Ok(MigrationReport {
        table,
        added_columns: missing.iter().map(|f| f.name.to_string()).collect(),
    })
}
