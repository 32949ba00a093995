//! Device registry repository.

use super::model::DeviceDB;
use crate::db::{format_ts, get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::events::record_event_tx;
use crate::schema::devices;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use taskdeck_core::devices::{Device, DeviceRepositoryTrait};
use taskdeck_core::errors::Result;
use taskdeck_core::events::EventDraft;

pub struct DeviceRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl DeviceRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl DeviceRepositoryTrait for DeviceRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Device>> {
        let mut conn = get_connection(&self.pool)?;
        let row = devices::table
            .find(id)
            .first::<DeviceDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(DeviceDB::to_domain).transpose()?)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Device>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let rows = devices::table
            .filter(devices::id.eq_any(ids))
            .load::<DeviceDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    fn get_by_device_key(&self, device_key: &str) -> Result<Option<Device>> {
        let mut conn = get_connection(&self.pool)?;
        let row = devices::table
            .filter(devices::device_key.eq(device_key))
            .first::<DeviceDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(DeviceDB::to_domain).transpose()?)
    }

    fn list(&self) -> Result<Vec<Device>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = devices::table
            .filter(devices::is_deleted.eq(0))
            .order(devices::last_seen_at.desc())
            .load::<DeviceDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    async fn save(&self, device: Device, event: Option<EventDraft>) -> Result<Device> {
        self.writer
            .exec(move |conn| {
                let row = DeviceDB::from_domain(&device);
                diesel::insert_into(devices::table)
                    .values(&row)
                    .on_conflict(devices::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, Utc::now())?;
                }
                Ok(device)
            })
            .await
    }

    async fn touch_last_seen(&self, device_key: String, seen_at: DateTime<Utc>) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let stamp = format_ts(seen_at);
                diesel::update(
                    devices::table
                        .filter(devices::device_key.eq(device_key))
                        .filter(devices::last_seen_at.lt(stamp.clone())),
                )
                .set(devices::last_seen_at.eq(stamp))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
