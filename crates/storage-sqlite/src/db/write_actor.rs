use diesel::SqliteConnection;
use log::{debug, error};
use std::any::Any;
use tokio::sync::{mpsc, oneshot};

use super::DbPool;
use crate::errors::StorageError;
use quotesync_core::errors::{DatabaseError, Error, Result};

type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;
type Erased = Box<dyn Any + Send + 'static>;
type Request = (Job<Erased>, oneshot::Sender<Result<Erased>>);

/// Handle for sending jobs to the writer actor. Cheap to clone.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<Request>,
}

fn writer_gone() -> Error {
    Error::Database(DatabaseError::Internal(
        "database writer is no longer running".to_string(),
    ))
}

impl WriteHandle {
    /// Run `job` on the writer's connection inside an IMMEDIATE transaction.
    ///
    /// An `Err` from the job rolls the transaction back and is returned to
    /// the caller unchanged. Dropping the returned future after the job was
    /// queued does not stop the job.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Erased)),
                ret_tx,
            ))
            .await
            .map_err(|_| writer_gone())?;

        let boxed = ret_rx.await.map_err(|_| writer_gone())??;
        boxed.downcast::<T>().map(|v| *v).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "writer returned an unexpected result type".to_string(),
            ))
        })
    }
}

/// Spawns the single writer. It owns one pooled connection for its lifetime
/// and runs jobs one at a time.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<Request>(1024);

    tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Database writer could not acquire a connection: {}", e);
                while let Some((_, reply_tx)) = rx.recv().await {
                    let _ = reply_tx.send(Err(Error::Database(DatabaseError::ConnectionFailed(
                        e.to_string(),
                    ))));
                }
                return;
            }
        };

        while let Some((job, reply_tx)) = rx.recv().await {
            let result = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(Error::from);

            // The requester may have gone away; the write stands regardless.
            let _ = reply_tx.send(result);
        }
        debug!("Database writer stopped");
    });

    WriteHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, get_connection, run_migrations};
    use crate::schema::market_data_providers::dsl as providers_dsl;
    use diesel::prelude::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_failed_job_rolls_back_and_keeps_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("writer.db");
        let pool = create_pool(db_path.to_str().unwrap()).unwrap();
        run_migrations(&pool).unwrap();
        let writer = spawn_writer((*pool).clone());

        let result: Result<()> = writer
            .exec(|conn| {
                diesel::update(providers_dsl::market_data_providers.find("YAHOO"))
                    .set(providers_dsl::priority.eq(50))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Err(Error::MigrationConflict("abort".to_string()))
            })
            .await;
        assert!(matches!(result, Err(Error::MigrationConflict(_))));

        let mut conn = get_connection(&pool).unwrap();
        let priority: i32 = providers_dsl::market_data_providers
            .find("YAHOO")
            .select(providers_dsl::priority)
            .first(&mut conn)
            .unwrap();
        assert_eq!(priority, 2);
    }

    #[tokio::test]
    async fn test_job_result_is_returned() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("writer.db");
        let pool = create_pool(db_path.to_str().unwrap()).unwrap();
        run_migrations(&pool).unwrap();
        let writer = spawn_writer((*pool).clone());

        let count: i64 = writer
            .exec(|conn| {
                providers_dsl::market_data_providers
                    .count()
                    .get_result(conn)
                    .map_err(|e| StorageError::from(e).into())
            })
            .await
            .unwrap();
        assert_eq!(count, 3);
    }
}
