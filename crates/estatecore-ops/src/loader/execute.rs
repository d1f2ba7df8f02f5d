use super::plan::LoadPlan;
use super::script::CopyStatement;
use super::LoadError;
use crate::catalog::Entity;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream};
use futures::{SinkExt, StreamExt, TryStreamExt};
use serde::Serialize;
use std::io;
use tokio::io::AsyncReadExt;
use tokio_postgres::{Client, Transaction};
use tracing::{debug, info, warn};

/// Size of each buffer handed to the COPY sink.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// First server release whose COPY understands the `DEFAULT` option.
pub const MIN_SERVER_VERSION: i32 = 160_000;

/// File contents as a stream of bounded chunks.
pub type ChunkStream<'a> = BoxStream<'a, io::Result<Bytes>>;

/// Destination able to ingest a `COPY ... FROM STDIN` payload.
#[async_trait::async_trait]
pub trait CopyTarget: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the number of rows the statement ingested.
    async fn copy_in(&self, statement: &str, chunks: ChunkStream<'_>) -> Result<u64, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("reading input failed: {0}")]
    Read(#[from] io::Error),
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
}

#[async_trait::async_trait]
impl CopyTarget for Transaction<'_> {
    type Error = StreamError;

    async fn copy_in(
        &self,
        statement: &str,
        mut chunks: ChunkStream<'_>,
    ) -> Result<u64, Self::Error> {
        let sink = Transaction::copy_in::<_, Bytes>(self, statement).await?;
        futures::pin_mut!(sink);
        // Dropping the sink on a read error sends CopyFail and aborts the COPY.
        while let Some(chunk) = chunks.try_next().await? {
            sink.send(chunk).await?;
        }
        Ok(sink.finish().await?)
    }
}

/// Reads `file` front to back in chunks of at most [`COPY_CHUNK_SIZE`].
pub fn file_chunks(file: tokio::fs::File) -> ChunkStream<'static> {
    stream::try_unfold(file, |mut file| async move {
        let mut buffer = BytesMut::with_capacity(COPY_CHUNK_SIZE);
        let read = file.read_buf(&mut buffer).await?;
        Ok::<_, io::Error>((read > 0).then(|| (buffer.freeze(), file)))
    })
    .boxed()
}

/// Rejects servers whose COPY lacks the `DEFAULT` option.
pub fn check_server_version(version: i32) -> Result<(), LoadError> {
    if version < MIN_SERVER_VERSION {
        return Err(LoadError::UnsupportedServer { version });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub entity: Entity,
    pub table: &'static str,
    pub rows: u64,
}

/// Outcome of a committed load run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub tables: Vec<TableLoad>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadReport {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|table| table.rows).sum()
    }
}

/// Streams every planned file in order, stopping at the first failure.
pub async fn copy_all<T: CopyTarget>(
    target: &T,
    plan: &LoadPlan,
) -> Result<LoadReport, LoadError> {
    let started_at = Utc::now();
    let mut tables = Vec::with_capacity(plan.entries().len());

    for entry in plan.entries() {
        let table = entry.spec().table;
        let file = tokio::fs::File::open(&entry.path)
            .await
            .map_err(|source| LoadError::Io {
                path: entry.path.clone(),
                source,
            })?;
        let statement = CopyStatement::from_stdin(entry.entity).to_string();

        let rows = target
            .copy_in(&statement, file_chunks(file))
            .await
            .map_err(|source| LoadError::Copy {
                table,
                source: Box::new(source),
            })?;

        info!(table, rows, "copied");
        tables.push(TableLoad {
            entity: entry.entity,
            table,
            rows,
        });
    }

    Ok(LoadReport {
        tables,
        started_at,
        finished_at: Utc::now(),
    })
}

/// Loads the whole plan in one transaction: every row commits or none does.
pub async fn execute_plan(client: &mut Client, plan: &LoadPlan) -> Result<LoadReport, LoadError> {
    let version: i32 = client
        .query_one("SELECT current_setting('server_version_num')::int4", &[])
        .await
        .map_err(LoadError::Transaction)?
        .get(0);
    debug!(server_version = version, "checking COPY support");
    check_server_version(version)?;

    let transaction = client.transaction().await.map_err(LoadError::Transaction)?;

    let report = match copy_all(&transaction, plan).await {
        Ok(report) => report,
        Err(err) => {
            warn!(error = %err, "load aborted, rolling back");
            if let Err(rollback) = transaction.rollback().await {
                warn!(error = %rollback, "rollback failed, transaction discarded with the session");
            }
            return Err(err);
        }
    };

    transaction.commit().await.map_err(LoadError::Transaction)?;
    info!(total = report.total_rows(), "load committed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, thiserror::Error)]
    #[error("insert or update on table violates foreign key constraint")]
    struct ForeignKeyViolation;

    /// Records statements and fails on the configured table.
    #[derive(Default)]
    struct RecordingTarget {
        fail_on: Option<&'static str>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait::async_trait]
    impl CopyTarget for RecordingTarget {
        type Error = ForeignKeyViolation;

        async fn copy_in(
            &self,
            statement: &str,
            chunks: ChunkStream<'_>,
        ) -> Result<u64, Self::Error> {
            let chunks: Vec<Bytes> = chunks.try_collect().await.expect("chunks read");
            let payload: Vec<u8> = chunks.concat();
            self.seen
                .lock()
                .expect("recording mutex poisoned")
                .push((statement.to_string(), payload.len()));
            if let Some(table) = self.fail_on {
                if statement.starts_with(&format!("COPY {table} ")) {
                    return Err(ForeignKeyViolation);
                }
            }
            let lines = payload.iter().filter(|byte| **byte == b'\n').count();
            Ok(lines.saturating_sub(1) as u64)
        }
    }

    fn sample_plan() -> (TempDir, LoadPlan) {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("tenants_psql.csv"),
            "id,name,email,client_id,created_at\n,Ada,ada@example.com,1,\n,Bo,bo@example.com,1,\n",
        )
        .expect("write tenants");
        fs::write(
            dir.path().join("payments_psql.csv"),
            "id,tenant_id,month,amount_due,amount_paid,days_late,paid,created_at\n\
             ,999,2025-08,1200,0,3,false,\n",
        )
        .expect("write payments");
        fs::write(
            dir.path().join("expenses_psql.csv"),
            "id,client_id,category,amount,date,created_at\n,1,Repairs,80.5,2025-08-01,\n",
        )
        .expect("write expenses");
        let plan = LoadPlan::discover(dir.path()).expect("plan builds");
        (dir, plan)
    }

    #[tokio::test]
    async fn copies_every_file_through_stdin_in_plan_order() {
        let (_dir, plan) = sample_plan();
        let target = RecordingTarget::default();

        let report = copy_all(&target, &plan).await.expect("load succeeds");

        let tables: Vec<&str> = report.tables.iter().map(|table| table.table).collect();
        assert_eq!(tables, ["tenant", "payment", "expense"]);
        assert_eq!(report.total_rows(), 4);

        let seen = target.seen.lock().expect("recording mutex poisoned");
        assert!(seen.iter().all(|(sql, _)| sql.contains(" FROM STDIN WITH (")));
    }

    #[tokio::test]
    async fn stops_at_first_failing_table() {
        let (_dir, plan) = sample_plan();
        let target = RecordingTarget {
            fail_on: Some("payment"),
            ..RecordingTarget::default()
        };

        match copy_all(&target, &plan).await {
            Err(LoadError::Copy { table, .. }) => assert_eq!(table, "payment"),
            other => panic!("expected copy failure, got {other:?}"),
        }

        let seen = target.seen.lock().expect("recording mutex poisoned");
        assert_eq!(seen.len(), 2, "expense must not be attempted after the failure");
    }

    #[tokio::test]
    async fn large_files_stream_in_bounded_chunks() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("big.csv");
        let contents: Vec<u8> = (0..COPY_CHUNK_SIZE * 2 + 123)
            .map(|index| b'a' + (index % 26) as u8)
            .collect();
        fs::write(&path, &contents).expect("write big file");

        let file = tokio::fs::File::open(&path).await.expect("open big file");
        let chunks: Vec<Bytes> = file_chunks(file).try_collect().await.expect("read chunks");

        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| chunk.len() <= COPY_CHUNK_SIZE));
        assert_eq!(chunks.concat(), contents);
    }

    #[tokio::test]
    async fn empty_file_yields_no_chunks() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").expect("write empty file");

        let file = tokio::fs::File::open(&path).await.expect("open empty file");
        let chunks: Vec<Bytes> = file_chunks(file).try_collect().await.expect("read chunks");
        assert!(chunks.is_empty());
    }

    #[test]
    fn servers_before_16_are_refused() {
        match check_server_version(150_018) {
            Err(LoadError::UnsupportedServer { version }) => assert_eq!(version, 150_018),
            other => panic!("expected unsupported server, got {other:?}"),
        }
        assert!(check_server_version(160_000).is_ok());
        assert!(check_server_version(170_002).is_ok());
    }
}
