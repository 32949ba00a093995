//! Stack repository.

use super::model::StackDB;
use crate::db::{format_ts, get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::events::record_event_tx;
use crate::schema::{stack_tags, stacks};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use taskdeck_core::errors::Result;
use taskdeck_core::events::EventDraft;
use taskdeck_core::stacks::{Stack, StackRepositoryTrait};
use taskdeck_core::sync::SyncState;

pub struct StackRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl StackRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn attach_tags(
        conn: &mut SqliteConnection,
        rows: Vec<StackDB>,
    ) -> Result<Vec<Stack>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let links = stack_tags::table
            .filter(stack_tags::stack_id.eq_any(&ids))
            .select((stack_tags::stack_id, stack_tags::tag_id))
            .load::<(String, String)>(conn)
            .map_err(StorageError::from)?;

        let mut by_stack: HashMap<String, Vec<String>> = HashMap::new();
        for (stack_id, tag_id) in links {
            by_stack.entry(stack_id).or_default().push(tag_id);
        }
        rows.into_iter()
            .map(|row| {
                let tag_ids = by_stack.remove(&row.id).unwrap_or_default();
                Ok(row.to_domain(tag_ids)?)
            })
            .collect()
    }

    fn upsert_tx(conn: &mut SqliteConnection, stack: &Stack) -> Result<()> {
        let row = StackDB::from_domain(stack)?;
        diesel::insert_into(stacks::table)
            .values(&row)
            .on_conflict(stacks::id)
            .do_update()
            .set(&row)
            .execute(conn)
            .map_err(StorageError::from)?;

        // The join set is replaced wholesale; the domain model owns the full
        // list.
        diesel::delete(stack_tags::table.filter(stack_tags::stack_id.eq(&stack.id)))
            .execute(conn)
            .map_err(StorageError::from)?;
        for tag_id in &stack.tag_ids {
            diesel::insert_into(stack_tags::table)
                .values((
                    stack_tags::stack_id.eq(&stack.id),
                    stack_tags::tag_id.eq(tag_id),
                ))
                .on_conflict_do_nothing()
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        Ok(())
    }
}

#[async_trait]
impl StackRepositoryTrait for StackRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Stack>> {
        let mut conn = get_connection(&self.pool)?;
        let row = stacks::table
            .find(id)
            .first::<StackDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        match row {
            Some(row) => Ok(Self::attach_tags(&mut conn, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Stack>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let rows = stacks::table
            .filter(stacks::id.eq_any(ids))
            .load::<StackDB>(&mut conn)
            .map_err(StorageError::from)?;
        Self::attach_tags(&mut conn, rows)
    }

    fn list(&self) -> Result<Vec<Stack>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = stacks::table
            .order(stacks::sort_order.asc())
            .load::<StackDB>(&mut conn)
            .map_err(StorageError::from)?;
        Self::attach_tags(&mut conn, rows)
    }

    fn list_active(&self) -> Result<Vec<Stack>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = stacks::table
            .filter(stacks::is_active.eq(1))
            .filter(stacks::is_deleted.eq(0))
            .load::<StackDB>(&mut conn)
            .map_err(StorageError::from)?;
        Self::attach_tags(&mut conn, rows)
    }

    async fn save(&self, stack: Stack, event: Option<EventDraft>) -> Result<Stack> {
        self.writer
            .exec(move |conn| {
                Self::upsert_tx(conn, &stack)?;
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, Utc::now())?;
                }
                Ok(stack)
            })
            .await
    }

    async fn save_batch(&self, batch: Vec<Stack>) -> Result<()> {
        self.writer
            .exec(move |conn| {
                for stack in &batch {
                    Self::upsert_tx(conn, stack)?;
                }
                Ok(())
            })
            .await
    }

    async fn set_sort_orders(
        &self,
        orders: Vec<(String, i32)>,
        stamp: DateTime<Utc>,
        event: Option<EventDraft>,
    ) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let stamp_text = format_ts(stamp);
                for (id, sort_order) in orders {
                    diesel::update(stacks::table.find(id))
                        .set((
                            stacks::sort_order.eq(sort_order),
                            stacks::updated_at.eq(stamp_text.clone()),
                            stacks::sync_state.eq(SyncState::Pending.as_str()),
                        ))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, stamp)?;
                }
                Ok(())
            })
            .await
    }

    async fn replace_tag_references(
        &self,
        from_tag_id: &str,
        to_tag_id: &str,
    ) -> Result<Vec<String>> {
        let from = from_tag_id.to_string();
        let to = to_tag_id.to_string();
        self.writer
            .exec(move |conn| {
                let migrated: Vec<String> = stack_tags::table
                    .filter(stack_tags::tag_id.eq(&from))
                    .select(stack_tags::stack_id)
                    .load::<String>(conn)
                    .map_err(StorageError::from)?;
                if migrated.is_empty() {
                    return Ok(Vec::new());
                }

                // Stacks already holding the canonical tag just drop the
                // duplicate link; the rest are rewritten in place.
                let already_linked: Vec<String> = stack_tags::table
                    .filter(stack_tags::tag_id.eq(&to))
                    .filter(stack_tags::stack_id.eq_any(&migrated))
                    .select(stack_tags::stack_id)
                    .load::<String>(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(
                    stack_tags::table
                        .filter(stack_tags::tag_id.eq(&from))
                        .filter(stack_tags::stack_id.eq_any(&already_linked)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                diesel::update(stack_tags::table.filter(stack_tags::tag_id.eq(&from)))
                    .set(stack_tags::tag_id.eq(&to))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                diesel::update(stacks::table.filter(stacks::id.eq_any(&migrated)))
                    .set(stacks::sync_state.eq(SyncState::Pending.as_str()))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(migrated)
            })
            .await
    }
}
