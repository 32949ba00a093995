//! Event log repository and device identity store.

use super::model::{DeviceIdentityDB, EventDB};
use crate::db::{format_ts, get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{device_identity, events};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use taskdeck_core::devices::{IdentityStore, SyncIdentity};
use taskdeck_core::errors::{Error, Result};
use taskdeck_core::events::{
    Event, EventDraft, EventLog, EventSyncStatus, RemoteEvent, CURRENT_PAYLOAD_VERSION,
};
use uuid::Uuid;

pub(crate) fn load_identity_tx(conn: &mut SqliteConnection) -> Result<Option<SyncIdentity>> {
    let row = device_identity::table
        .find(1)
        .first::<DeviceIdentityDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    Ok(row.map(|row| SyncIdentity {
        user_id: row.user_id,
        device_id: row.device_id,
        app_id: row.app_id,
    }))
}

/// Append a local event inside the caller's transaction. Entity repositories
/// call this next to their own row writes so the mutation and the event
/// commit or roll back together; a persisted event is guaranteed once the
/// enclosing transaction returns.
pub fn record_event_tx(
    conn: &mut SqliteConnection,
    draft: &EventDraft,
    now: DateTime<Utc>,
) -> Result<Event> {
    let identity = load_identity_tx(conn)?.ok_or_else(|| {
        Error::IdentityMissing("events cannot be recorded before device registration".to_string())
    })?;

    let row = EventDB {
        id: Uuid::new_v4().to_string(),
        event_type: draft.event_type.clone(),
        payload: serde_json::to_string(&draft.payload)?,
        ts: format_ts(now),
        entity_id: draft.entity_id.clone(),
        user_id: identity.user_id,
        device_id: identity.device_id,
        app_id: identity.app_id,
        payload_version: CURRENT_PAYLOAD_VERSION,
        is_synced: 0,
        synced_at: None,
        status: EventSyncStatus::Pending.as_str().to_string(),
        retry_count: 0,
        last_error: None,
        created_at: format_ts(now),
    };
    diesel::insert_into(events::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(row.to_domain()?)
}

pub struct EventRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl EventRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl EventLog for EventRepository {
    async fn record(&self, draft: EventDraft) -> Result<Event> {
        self.writer
            .exec(move |conn| record_event_tx(conn, &draft, Utc::now()))
            .await
    }

    fn fetch_pending(&self) -> Result<Vec<Event>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = events::table
            .filter(events::status.eq(EventSyncStatus::Pending.as_str()))
            .order(events::ts.asc())
            .load::<EventDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| Ok(row.to_domain()?))
            .collect()
    }

    fn pending_count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = events::table
            .filter(events::status.eq(EventSyncStatus::Pending.as_str()))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn mark_synced(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.writer
            .exec(move |conn| {
                diesel::update(events::table.filter(events::id.eq_any(ids)))
                    .set((
                        events::is_synced.eq(1),
                        events::synced_at.eq(Some(format_ts(Utc::now()))),
                        events::status.eq(EventSyncStatus::Synced.as_str()),
                        events::last_error.eq::<Option<String>>(None),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn mark_rejected(&self, ids: Vec<String>, error: Option<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.writer
            .exec(move |conn| {
                diesel::update(events::table.filter(events::id.eq_any(ids)))
                    .set((
                        events::status.eq(EventSyncStatus::Dead.as_str()),
                        events::last_error.eq(error),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn history_for(&self, entity_id: &str) -> Result<Vec<Event>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = events::table
            .filter(events::entity_id.eq(entity_id))
            .order(events::ts.desc())
            .load::<EventDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| Ok(row.to_domain()?))
            .collect()
    }

    fn exists(&self, event_id: &str) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let found = events::table
            .find(event_id)
            .select(events::id)
            .first::<String>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(found.is_some())
    }

    async fn record_remote(&self, event: RemoteEvent, entity_id: Option<String>) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let now = Utc::now();
                let row = EventDB {
                    id: event.id.clone(),
                    event_type: event.event_type.clone(),
                    payload: serde_json::to_string(&event.payload)?,
                    ts: format_ts(event.timestamp),
                    entity_id,
                    user_id: event.user_id.clone(),
                    device_id: event.device_id.clone(),
                    app_id: event.app_id.clone(),
                    payload_version: event.payload_version,
                    is_synced: 1,
                    synced_at: Some(format_ts(now)),
                    status: EventSyncStatus::Synced.as_str().to_string(),
                    retry_count: 0,
                    last_error: None,
                    created_at: format_ts(now),
                };
                diesel::insert_into(events::table)
                    .values(&row)
                    .on_conflict(events::id)
                    .do_nothing()
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

/// Durable sync identity, a singleton row.
pub struct IdentityRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl IdentityRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl IdentityStore for IdentityRepository {
    fn get(&self) -> Result<Option<SyncIdentity>> {
        let mut conn = get_connection(&self.pool)?;
        load_identity_tx(&mut conn)
    }

    async fn set(&self, identity: SyncIdentity) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let row = DeviceIdentityDB {
                    id: 1,
                    user_id: identity.user_id.clone(),
                    device_id: identity.device_id.clone(),
                    app_id: identity.app_id.clone(),
                    updated_at: format_ts(Utc::now()),
                };
                diesel::insert_into(device_identity::table)
                    .values(&row)
                    .on_conflict(device_identity::id)
                    .do_update()
                    .set((
                        device_identity::user_id.eq(row.user_id.clone()),
                        device_identity::device_id.eq(row.device_id.clone()),
                        device_identity::app_id.eq(row.app_id.clone()),
                        device_identity::updated_at.eq(row.updated_at.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
