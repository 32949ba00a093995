//! Checkpoint and conflict log repositories.

use super::model::{SyncCheckpointDB, SyncConflictDB};
use crate::db::{format_ts, get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{sync_checkpoint, sync_conflicts};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use taskdeck_core::conflicts::{SyncConflict, SyncConflictRepositoryTrait};
use taskdeck_core::errors::Result;
use taskdeck_core::sync::CheckpointStore;

/// Durable pull cursor, a singleton row. The engine only advances it after a
/// page has fully projected.
pub struct CheckpointRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl CheckpointRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl CheckpointStore for CheckpointRepository {
    fn get(&self) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_checkpoint::table
            .find(1)
            .first::<SyncCheckpointDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(|row| row.checkpoint))
    }

    async fn set(&self, checkpoint: String) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let row = SyncCheckpointDB {
                    id: 1,
                    checkpoint: checkpoint.clone(),
                    updated_at: format_ts(Utc::now()),
                };
                diesel::insert_into(sync_checkpoint::table)
                    .values(&row)
                    .on_conflict(sync_checkpoint::id)
                    .do_update()
                    .set((
                        sync_checkpoint::checkpoint.eq(row.checkpoint.clone()),
                        sync_checkpoint::updated_at.eq(row.updated_at.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

/// Observational conflict log; LWW losers land here and nothing reads them
/// back on the hot path.
pub struct SyncConflictRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl SyncConflictRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SyncConflictRepositoryTrait for SyncConflictRepository {
    async fn insert(&self, conflict: SyncConflict) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let row = SyncConflictDB::from_domain(&conflict)?;
                diesel::insert_into(sync_conflicts::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn list(&self) -> Result<Vec<SyncConflict>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_conflicts::table
            .order(sync_conflicts::detected_at.desc())
            .load::<SyncConflictDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    fn list_for_entity(&self, entity_id: &str) -> Result<Vec<SyncConflict>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_conflicts::table
            .filter(sync_conflicts::entity_id.eq(entity_id))
            .order(sync_conflicts::detected_at.desc())
            .load::<SyncConflictDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init, run_migrations, spawn_writer};
    use chrono::TimeZone;
    use taskdeck_core::conflicts::{ConflictResolution, ConflictType};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn setup() -> (Arc<SqlitePool>, WriteHandle) {
        let dir = tempdir().expect("tempdir").keep();
        let db_path = init(dir.to_str().unwrap()).expect("init db");
        run_migrations(&db_path).expect("migrate");
        let pool = create_pool(&db_path).expect("pool");
        let writer = spawn_writer(pool.as_ref().clone());
        (pool, writer)
    }

    #[tokio::test]
    async fn checkpoint_defaults_to_absent_and_persists() {
        let (pool, writer) = setup();
        let repo = CheckpointRepository::new(pool, writer);

        assert_eq!(repo.get().unwrap(), None);

        repo.set("cursor-1".to_string()).await.unwrap();
        assert_eq!(repo.get().unwrap().as_deref(), Some("cursor-1"));

        repo.set("cursor-2".to_string()).await.unwrap();
        assert_eq!(repo.get().unwrap().as_deref(), Some("cursor-2"));
    }

    #[tokio::test]
    async fn conflicts_round_trip_with_enum_columns() {
        let (pool, writer) = setup();
        let repo = SyncConflictRepository::new(pool, writer);

        let conflict = SyncConflict {
            id: Uuid::new_v4().to_string(),
            entity_type: "stack".into(),
            entity_id: "s1".into(),
            local_timestamp: chrono::Utc.timestamp_opt(500, 0).unwrap(),
            remote_timestamp: chrono::Utc.timestamp_opt(400, 0).unwrap(),
            conflict_type: ConflictType::StatusChange,
            resolution: ConflictResolution::KeptLocal,
            detected_at: chrono::Utc::now(),
            is_resolved: true,
        };
        repo.insert(conflict.clone()).await.unwrap();

        let listed = repo.list_for_entity("s1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].conflict_type, ConflictType::StatusChange);
        assert_eq!(listed[0].resolution, ConflictResolution::KeptLocal);
        assert_eq!(listed[0].local_timestamp, conflict.local_timestamp);
    }
}
