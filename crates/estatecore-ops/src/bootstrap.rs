use crate::database::{quote_ident, quote_literal};
use std::fmt;
use tokio_postgres::Client;
use tracing::{debug, info};

/// A column addition applied in five guarded steps so it can be re-run safely
/// against tables that already hold rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMigration {
    pub table: String,
    pub column: String,
    pub sql_type: String,
    /// Default value as a plain string; rendered as a quoted literal.
    pub default: String,
    pub nullable: bool,
}

/// One ordered step of a [`ColumnMigration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    AddColumn,
    SetDefault,
    Backfill,
    Nullability,
    DropDefault,
}

impl StepKind {
    pub fn label(self) -> &'static str {
        match self {
            StepKind::AddColumn => "add column if absent",
            StepKind::SetDefault => "set default",
            StepKind::Backfill => "backfill null rows",
            StepKind::Nullability => "enforce nullability",
            StepKind::DropDefault => "drop default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    pub position: usize,
    pub kind: StepKind,
    pub sql: String,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.position, self.kind.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("could not open migration transaction: {0}")]
    Transaction(#[source] tokio_postgres::Error),
    #[error("{step} failed: {source}")]
    Step {
        step: MigrationStep,
        #[source]
        source: tokio_postgres::Error,
    },
    #[error("could not commit migration: {0}")]
    Commit(#[source] tokio_postgres::Error),
}

impl ColumnMigration {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        sql_type: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            sql_type: sql_type.into(),
            default: default.into(),
            nullable: false,
        }
    }

    /// The `role` column patch for the user table.
    pub fn user_role() -> Self {
        Self::new("user", "role", "VARCHAR(50)", "user")
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn steps(&self) -> [MigrationStep; 5] {
        let table = quote_ident(&self.table);
        let column = quote_ident(&self.column);
        let default = quote_literal(&self.default);
        let nullability = if self.nullable {
            "DROP NOT NULL"
        } else {
            "SET NOT NULL"
        };

        let step = |position, kind, sql: String| MigrationStep {
            position,
            kind,
            sql,
        };

        [
            step(
                1,
                StepKind::AddColumn,
                format!(
                    "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {column} {};",
                    self.sql_type
                ),
            ),
            step(
                2,
                StepKind::SetDefault,
                format!("ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default};"),
            ),
            step(
                3,
                StepKind::Backfill,
                format!("UPDATE {table} SET {column} = {default} WHERE {column} IS NULL;"),
            ),
            step(
                4,
                StepKind::Nullability,
                format!("ALTER TABLE {table} ALTER COLUMN {column} {nullability};"),
            ),
            step(
                5,
                StepKind::DropDefault,
                format!("ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT;"),
            ),
        ]
    }

    /// The steps as a reviewable script for `psql -v ON_ERROR_STOP=1 -f`.
    pub fn render_script(&self) -> String {
        let mut script = format!(
            "-- Add {}.{} ({}, default '{}')\nBEGIN;\n",
            self.table, self.column, self.sql_type, self.default
        );
        for step in self.steps() {
            script.push_str(&step.sql);
            script.push('\n');
        }
        script.push_str("COMMIT;\n");
        script
    }

    /// Runs every step inside one transaction; the first failure rolls all back.
    pub async fn apply(&self, client: &mut Client) -> Result<(), BootstrapError> {
        let transaction = client
            .transaction()
            .await
            .map_err(BootstrapError::Transaction)?;

        for step in self.steps() {
            debug!(sql = %step.sql, "{step}");
            if let Err(source) = transaction.batch_execute(&step.sql).await {
                return Err(BootstrapError::Step { step, source });
            }
        }

        transaction.commit().await.map_err(BootstrapError::Commit)?;
        info!(table = %self.table, column = %self.column, "column migration applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_role_steps_are_ordered_and_guarded() {
        let steps = ColumnMigration::user_role().steps();
        let sql: Vec<&str> = steps.iter().map(|step| step.sql.as_str()).collect();
        assert_eq!(
            sql,
            [
                "ALTER TABLE \"user\" ADD COLUMN IF NOT EXISTS \"role\" VARCHAR(50);",
                "ALTER TABLE \"user\" ALTER COLUMN \"role\" SET DEFAULT 'user';",
                "UPDATE \"user\" SET \"role\" = 'user' WHERE \"role\" IS NULL;",
                "ALTER TABLE \"user\" ALTER COLUMN \"role\" SET NOT NULL;",
                "ALTER TABLE \"user\" ALTER COLUMN \"role\" DROP DEFAULT;",
            ]
        );
        let positions: Vec<usize> = steps.iter().map(|step| step.position).collect();
        assert_eq!(positions, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn nullable_target_relaxes_instead_of_enforcing() {
        let steps = ColumnMigration::new("tenant", "nickname", "TEXT", "")
            .nullable(true)
            .steps();
        assert_eq!(steps[3].kind, StepKind::Nullability);
        assert!(steps[3].sql.ends_with("DROP NOT NULL;"));
    }

    #[test]
    fn default_literal_is_escaped() {
        let steps = ColumnMigration::new("tenant", "note", "TEXT", "o'brien").steps();
        assert!(steps[1].sql.contains("SET DEFAULT 'o''brien'"));
    }

    #[test]
    fn script_wraps_steps_in_a_transaction() {
        let script = ColumnMigration::user_role().render_script();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[1], "BEGIN;");
        assert_eq!(lines.last(), Some(&"COMMIT;"));
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn step_display_names_position_and_kind() {
        let steps = ColumnMigration::user_role().steps();
        assert_eq!(steps[2].to_string(), "step 3 (backfill null rows)");
    }
}
