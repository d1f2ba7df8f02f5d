use super::plan::LoadPlan;
use super::LoadError;
use crate::catalog::Entity;
use crate::database::quote_literal;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Options shared by every generated COPY. Blank cells take the column
/// default (so `id`/`created_at` are assigned by the store) and `\N` is the
/// explicit NULL marker. `DEFAULT` needs PostgreSQL 16 or newer.
pub const COPY_OPTIONS: &str = r"FORMAT csv, HEADER true, NULL '\N', DEFAULT ''";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    /// Server-side file read by the database process.
    File(PathBuf),
    /// Rows streamed by the client over the connection.
    Stdin,
}

/// One `COPY` naming the exact column contract of its entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyStatement {
    pub entity: Entity,
    pub source: CopySource,
}

impl CopyStatement {
    pub fn from_file(entity: Entity, path: impl Into<PathBuf>) -> Self {
        Self {
            entity,
            source: CopySource::File(path.into()),
        }
    }

    pub fn from_stdin(entity: Entity) -> Self {
        Self {
            entity,
            source: CopySource::Stdin,
        }
    }
}

impl fmt::Display for CopyStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec = self.entity.spec();
        let source = match &self.source {
            CopySource::File(path) => quote_literal(&portable_path(path)),
            CopySource::Stdin => "STDIN".to_string(),
        };
        write!(
            f,
            "COPY {} ({}) FROM {} WITH ({});",
            spec.table,
            spec.column_list(),
            source,
            COPY_OPTIONS
        )
    }
}

/// psql script holding one COPY per planned file, run as a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyScript {
    statements: Vec<CopyStatement>,
    generated_at: DateTime<Utc>,
}

impl CopyScript {
    pub fn from_plan(plan: &LoadPlan) -> Self {
        let statements = plan
            .entries()
            .iter()
            .map(|entry| CopyStatement::from_file(entry.entity, &entry.path))
            .collect();
        Self {
            statements,
            generated_at: Utc::now(),
        }
    }

    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    pub fn statements(&self) -> &[CopyStatement] {
        &self.statements
    }

    pub fn render(&self) -> String {
        let mut script = format!(
            "-- Generated COPY script ({})\n\
             -- Review before running: psql \"$DATABASE_URL\" -f <this file>\n\
             \\set ON_ERROR_STOP on\n\
             \\timing on\n\
             BEGIN;\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for statement in &self.statements {
            script.push('\n');
            script.push_str(&statement.to_string());
            script.push('\n');
        }
        script.push_str("\nCOMMIT;\n");
        script
    }

    /// Renders in full before touching the filesystem.
    pub fn write_to(&self, path: &Path) -> Result<(), LoadError> {
        let rendered = self.render();
        fs::write(path, rendered).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn portable_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
