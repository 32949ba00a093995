//! Single-writer actor.
//!
//! All mutation funnels through one dedicated thread; each job runs inside an
//! immediate transaction, so a domain row and its event append commit or roll
//! back together. Readers keep using the pool directly.

use super::SqlitePool;
use diesel::prelude::*;
use taskdeck_core::errors::{DatabaseError, Error, Result};
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Cloneable handle to the writer thread.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

/// Spawn the writer thread for a pool. Call once at startup; every
/// repository shares the returned handle.
pub fn spawn_writer(pool: SqlitePool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    std::thread::Builder::new()
        .name("taskdeck-db-writer".to_string())
        .spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                match pool.get() {
                    Ok(mut conn) => job(&mut conn),
                    Err(err) => {
                        // The job's reply channel is dropped; the caller sees
                        // a writer failure.
                        log::error!("[storage] writer connection checkout failed: {}", err);
                    }
                }
            }
        })
        .expect("failed to spawn database writer thread");
    WriteHandle { tx }
}

enum TxFailure {
    App(Error),
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for TxFailure {
    fn from(error: diesel::result::Error) -> Self {
        TxFailure::Db(error)
    }
}

impl WriteHandle {
    /// Run `job` on the writer thread inside an immediate transaction. An
    /// `Err` from the job rolls the whole transaction back.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<Result<T>>();
        let wrapped: Job = Box::new(move |conn| {
            let outcome = conn
                .immediate_transaction::<T, TxFailure, _>(|tx| job(tx).map_err(TxFailure::App))
                .map_err(|failure| match failure {
                    TxFailure::App(error) => error,
                    TxFailure::Db(error) => {
                        Error::Database(DatabaseError::QueryFailed(error.to_string()))
                    }
                });
            let _ = done_tx.send(outcome);
        });

        self.tx.send(wrapped).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Database writer thread has shut down".to_string(),
            ))
        })?;
        done_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Database writer dropped the job".to_string(),
            ))
        })?
    }
}
