//! Bulk CSV loading: discover and validate input files, render a reviewable
//! COPY script, or execute the same plan in a single transaction.

mod execute;
mod header;
mod plan;
mod script;

pub use execute::{
    check_server_version, copy_all, execute_plan, file_chunks, ChunkStream, CopyTarget,
    LoadReport, StreamError, TableLoad, COPY_CHUNK_SIZE, MIN_SERVER_VERSION,
};
pub use header::{read_header, validate_header, HeaderError, HeaderMismatch};
pub use plan::{LoadPlan, PlannedCopy, RejectedFile, Rejection};
pub use script::{CopyScript, CopySource, CopyStatement, COPY_OPTIONS};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("CSV directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("no catalog CSV files found in {}", .0.display())]
    NoInputFiles(PathBuf),
    #[error("{} file(s) do not match their column contract:\n{}", .0.len(), render_rejections(.0))]
    InvalidHeaders(Vec<RejectedFile>),
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("COPY into {table} failed: {source}")]
    Copy {
        table: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error(
        "server_version_num {version} is too old: COPY with DEFAULT needs PostgreSQL 16 or newer"
    )]
    UnsupportedServer { version: i32 },
    #[error("load transaction failed: {0}")]
    Transaction(#[source] tokio_postgres::Error),
}

fn render_rejections(rejected: &[RejectedFile]) -> String {
    rejected
        .iter()
        .map(|file| format!("  - {file}"))
        .collect::<Vec<_>>()
        .join("\n")
}
