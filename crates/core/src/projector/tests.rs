//! Projector behavior tests over in-memory repositories.

use super::*;
use crate::arcs::{ArcRepositoryTrait, StoryArc};
use crate::attachments::{Attachment, AttachmentRepositoryTrait};
use crate::clock::SystemClock;
use crate::conflicts::SyncConflict;
use crate::devices::{Device, DeviceRepositoryTrait, IdentityStore, SyncIdentity};
use crate::events::{Event, EventDraft, EventSyncStatus};
use crate::reminders::{Reminder, ReminderRepositoryTrait};
use crate::stacks::{Stack, StackStatus};
use crate::sync::SyncState;
use crate::tags::{normalize_tag_name, Tag};
use crate::tasks::{QueueTask, TaskStatus};
use crate::telemetry::LogTelemetry;
use chrono::TimeZone;
use std::collections::HashMap;
use std::sync::{Arc as StdArc, Mutex};

#[derive(Default)]
struct State {
    stacks: HashMap<String, Stack>,
    tasks: HashMap<String, QueueTask>,
    reminders: HashMap<String, Reminder>,
    tags: HashMap<String, Tag>,
    arcs: HashMap<String, StoryArc>,
    attachments: HashMap<String, Attachment>,
    devices: HashMap<String, Device>,
    conflicts: Vec<SyncConflict>,
    events: HashMap<String, Event>,
    recorded_local: Vec<EventDraft>,
    identity: Option<SyncIdentity>,
}

/// One in-memory store implementing every repository contract the projector
/// consumes.
#[derive(Default, Clone)]
struct MemoryStore {
    state: StdArc<Mutex<State>>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn seed_stack(&self, stack: Stack) {
        self.lock().stacks.insert(stack.id.clone(), stack);
    }

    fn seed_tag(&self, tag: Tag) {
        self.lock().tags.insert(tag.id.clone(), tag);
    }

    fn seed_task(&self, task: QueueTask) {
        self.lock().tasks.insert(task.id.clone(), task);
    }

    fn stack(&self, id: &str) -> Stack {
        self.lock().stacks.get(id).expect("stack").clone()
    }

    fn tag(&self, id: &str) -> Option<Tag> {
        self.lock().tags.get(id).cloned()
    }

    fn conflicts(&self) -> Vec<SyncConflict> {
        self.lock().conflicts.clone()
    }

    fn recorded_local(&self) -> Vec<EventDraft> {
        self.lock().recorded_local.clone()
    }
}

#[async_trait]
impl crate::stacks::StackRepositoryTrait for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Stack>> {
        Ok(self.lock().stacks.get(id).cloned())
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Stack>> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.stacks.get(id).cloned()).collect())
    }

    fn list(&self) -> Result<Vec<Stack>> {
        Ok(self.lock().stacks.values().cloned().collect())
    }

    fn list_active(&self) -> Result<Vec<Stack>> {
        Ok(self
            .lock()
            .stacks
            .values()
            .filter(|s| s.is_active && !s.is_deleted)
            .cloned()
            .collect())
    }

    async fn save(&self, stack: Stack, event: Option<EventDraft>) -> Result<Stack> {
        let mut state = self.lock();
        if let Some(draft) = event {
            state.recorded_local.push(draft);
        }
        state.stacks.insert(stack.id.clone(), stack.clone());
        Ok(stack)
    }

    async fn save_batch(&self, stacks: Vec<Stack>) -> Result<()> {
        let mut state = self.lock();
        for stack in stacks {
            state.stacks.insert(stack.id.clone(), stack);
        }
        Ok(())
    }

    async fn set_sort_orders(
        &self,
        orders: Vec<(String, i32)>,
        stamp: chrono::DateTime<chrono::Utc>,
        event: Option<EventDraft>,
    ) -> Result<()> {
        let mut state = self.lock();
        if let Some(draft) = event {
            state.recorded_local.push(draft);
        }
        for (id, sort_order) in orders {
            if let Some(stack) = state.stacks.get_mut(&id) {
                stack.sort_order = sort_order;
                stack.updated_at = stamp;
            }
        }
        Ok(())
    }

    async fn replace_tag_references(
        &self,
        from_tag_id: &str,
        to_tag_id: &str,
    ) -> Result<Vec<String>> {
        let mut state = self.lock();
        let mut migrated = Vec::new();
        for stack in state.stacks.values_mut() {
            if stack.tag_ids.iter().any(|id| id == from_tag_id) {
                stack.tag_ids.retain(|id| id != from_tag_id);
                if !stack.tag_ids.iter().any(|id| id == to_tag_id) {
                    stack.tag_ids.push(to_tag_id.to_string());
                }
                stack.sync_state = SyncState::Pending;
                migrated.push(stack.id.clone());
            }
        }
        Ok(migrated)
    }
}

#[async_trait]
impl crate::tasks::TaskRepositoryTrait for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<QueueTask>> {
        Ok(self.lock().tasks.get(id).cloned())
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<QueueTask>> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.tasks.get(id).cloned()).collect())
    }

    fn list_for_stack(&self, stack_id: &str) -> Result<Vec<QueueTask>> {
        Ok(self
            .lock()
            .tasks
            .values()
            .filter(|t| t.stack_id.as_deref() == Some(stack_id))
            .cloned()
            .collect())
    }

    async fn save(&self, task: QueueTask, event: Option<EventDraft>) -> Result<QueueTask> {
        let mut state = self.lock();
        if let Some(draft) = event {
            state.recorded_local.push(draft);
        }
        state.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn set_sort_orders(
        &self,
        orders: Vec<(String, i32)>,
        stamp: chrono::DateTime<chrono::Utc>,
        _event: Option<EventDraft>,
    ) -> Result<()> {
        let mut state = self.lock();
        for (id, sort_order) in orders {
            if let Some(task) = state.tasks.get_mut(&id) {
                task.sort_order = sort_order;
                task.updated_at = stamp;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReminderRepositoryTrait for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Reminder>> {
        Ok(self.lock().reminders.get(id).cloned())
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Reminder>> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.reminders.get(id).cloned())
            .collect())
    }

    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Reminder>> {
        Ok(self
            .lock()
            .reminders
            .values()
            .filter(|r| r.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn save(&self, reminder: Reminder, _event: Option<EventDraft>) -> Result<Reminder> {
        self.lock().reminders.insert(reminder.id.clone(), reminder.clone());
        Ok(reminder)
    }
}

#[async_trait]
impl crate::tags::TagRepositoryTrait for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Tag>> {
        Ok(self.lock().tags.get(id).cloned())
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Tag>> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.tags.get(id).cloned()).collect())
    }

    fn list(&self) -> Result<Vec<Tag>> {
        Ok(self.lock().tags.values().cloned().collect())
    }

    fn find_by_normalized_name(&self, normalized: &str) -> Result<Option<Tag>> {
        Ok(self
            .lock()
            .tags
            .values()
            .find(|t| !t.is_deleted && normalize_tag_name(&t.name) == normalized)
            .cloned())
    }

    async fn save(&self, tag: Tag, _event: Option<EventDraft>) -> Result<Tag> {
        self.lock().tags.insert(tag.id.clone(), tag.clone());
        Ok(tag)
    }
}

#[async_trait]
impl ArcRepositoryTrait for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<StoryArc>> {
        Ok(self.lock().arcs.get(id).cloned())
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoryArc>> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.arcs.get(id).cloned()).collect())
    }

    fn list(&self) -> Result<Vec<StoryArc>> {
        Ok(self.lock().arcs.values().cloned().collect())
    }

    async fn save(&self, arc: StoryArc, _event: Option<EventDraft>) -> Result<StoryArc> {
        self.lock().arcs.insert(arc.id.clone(), arc.clone());
        Ok(arc)
    }

    async fn set_sort_orders(
        &self,
        orders: Vec<(String, i32)>,
        stamp: chrono::DateTime<chrono::Utc>,
        _event: Option<EventDraft>,
    ) -> Result<()> {
        let mut state = self.lock();
        for (id, sort_order) in orders {
            if let Some(arc) = state.arcs.get_mut(&id) {
                arc.sort_order = sort_order;
                arc.updated_at = stamp;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AttachmentRepositoryTrait for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Attachment>> {
        Ok(self.lock().attachments.get(id).cloned())
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Attachment>> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.attachments.get(id).cloned())
            .collect())
    }

    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Attachment>> {
        Ok(self
            .lock()
            .attachments
            .values()
            .filter(|a| a.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn save(&self, attachment: Attachment, _event: Option<EventDraft>) -> Result<Attachment> {
        self.lock()
            .attachments
            .insert(attachment.id.clone(), attachment.clone());
        Ok(attachment)
    }
}

#[async_trait]
impl DeviceRepositoryTrait for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Device>> {
        Ok(self.lock().devices.values().find(|d| d.id == id).cloned())
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Device>> {
        let state = self.lock();
        Ok(state
            .devices
            .values()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }

    fn get_by_device_key(&self, device_key: &str) -> Result<Option<Device>> {
        Ok(self.lock().devices.get(device_key).cloned())
    }

    fn list(&self) -> Result<Vec<Device>> {
        Ok(self.lock().devices.values().cloned().collect())
    }

    async fn save(&self, device: Device, _event: Option<EventDraft>) -> Result<Device> {
        self.lock()
            .devices
            .insert(device.device_key.clone(), device.clone());
        Ok(device)
    }

    async fn touch_last_seen(
        &self,
        device_key: String,
        seen_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let mut state = self.lock();
        if let Some(device) = state.devices.get_mut(&device_key) {
            if seen_at > device.last_seen_at {
                device.last_seen_at = seen_at;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl crate::conflicts::SyncConflictRepositoryTrait for MemoryStore {
    async fn insert(&self, conflict: SyncConflict) -> Result<()> {
        self.lock().conflicts.push(conflict);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SyncConflict>> {
        Ok(self.lock().conflicts.clone())
    }

    fn list_for_entity(&self, entity_id: &str) -> Result<Vec<SyncConflict>> {
        Ok(self
            .lock()
            .conflicts
            .iter()
            .filter(|c| c.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EventLog for MemoryStore {
    async fn record(&self, draft: EventDraft) -> Result<Event> {
        let now = chrono::Utc::now();
        let event = Event {
            id: Uuid::new_v4().to_string(),
            event_type: draft.event_type.clone(),
            payload: draft.payload.clone(),
            timestamp: now,
            entity_id: draft.entity_id.clone(),
            user_id: "u1".into(),
            device_id: "local-device".into(),
            app_id: "taskdeck".into(),
            payload_version: CURRENT_PAYLOAD_VERSION,
            is_synced: false,
            synced_at: None,
            status: EventSyncStatus::Pending,
            retry_count: 0,
            last_error: None,
            created_at: now,
        };
        let mut state = self.lock();
        state.recorded_local.push(draft);
        state.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    fn fetch_pending(&self) -> Result<Vec<Event>> {
        let mut pending: Vec<Event> = self
            .lock()
            .events
            .values()
            .filter(|e| e.status == EventSyncStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(pending)
    }

    fn pending_count(&self) -> Result<i64> {
        Ok(self.fetch_pending()?.len() as i64)
    }

    async fn mark_synced(&self, ids: Vec<String>) -> Result<()> {
        let mut state = self.lock();
        for id in ids {
            if let Some(event) = state.events.get_mut(&id) {
                event.is_synced = true;
                event.status = EventSyncStatus::Synced;
            }
        }
        Ok(())
    }

    async fn mark_rejected(&self, ids: Vec<String>, error: Option<String>) -> Result<()> {
        let mut state = self.lock();
        for id in ids {
            if let Some(event) = state.events.get_mut(&id) {
                event.status = EventSyncStatus::Dead;
                event.last_error = error.clone();
            }
        }
        Ok(())
    }

    fn history_for(&self, entity_id: &str) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .lock()
            .events
            .values()
            .filter(|e| e.entity_id.as_deref() == Some(entity_id))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    fn exists(&self, event_id: &str) -> Result<bool> {
        Ok(self.lock().events.contains_key(event_id))
    }

    async fn record_remote(&self, event: RemoteEvent, entity_id: Option<String>) -> Result<()> {
        let now = chrono::Utc::now();
        let stored = Event {
            id: event.id.clone(),
            event_type: event.event_type,
            payload: event.payload,
            timestamp: event.timestamp,
            entity_id,
            user_id: event.user_id,
            device_id: event.device_id,
            app_id: event.app_id,
            payload_version: event.payload_version,
            is_synced: true,
            synced_at: Some(now),
            status: EventSyncStatus::Synced,
            retry_count: 0,
            last_error: None,
            created_at: now,
        };
        self.lock().events.insert(event.id, stored);
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    fn get(&self) -> Result<Option<SyncIdentity>> {
        Ok(self.lock().identity.clone())
    }

    async fn set(&self, identity: SyncIdentity) -> Result<()> {
        self.lock().identity = Some(identity);
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

fn ts(secs: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.timestamp_opt(secs, 0).unwrap()
}

fn remote(event_type: &str, at: i64, payload: serde_json::Value) -> RemoteEvent {
    RemoteEvent {
        id: Uuid::new_v4().to_string(),
        event_type: event_type.to_string(),
        user_id: "u1".into(),
        device_id: "other-device".into(),
        app_id: "taskdeck".into(),
        timestamp: ts(at),
        payload,
        payload_version: CURRENT_PAYLOAD_VERSION,
    }
}

fn stack_payload(id: &str, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "status": "active",
        "sortOrder": 0,
        "isDraft": false,
        "isActive": false,
        "tagIds": [],
    })
}

fn seeded_stack(id: &str, title: &str, updated_at: i64) -> Stack {
    Stack {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        status: StackStatus::Active,
        priority: None,
        sort_order: 0,
        is_draft: false,
        is_active: false,
        active_task_id: None,
        arc_id: None,
        tag_ids: Vec::new(),
        created_at: ts(1),
        updated_at: ts(updated_at),
        is_deleted: false,
        sync_state: SyncState::Synced,
        last_synced_at: None,
    }
}

fn seeded_tag(id: &str, name: &str, created_at: i64) -> Tag {
    Tag {
        id: id.to_string(),
        name: name.to_string(),
        color_hex: None,
        created_at: ts(created_at),
        updated_at: ts(created_at),
        is_deleted: false,
        sync_state: SyncState::Synced,
        last_synced_at: None,
    }
}

fn projector_with(store: &MemoryStore) -> Projector {
    let repo = StdArc::new(store.clone());
    Projector::new(ProjectorDeps {
        stacks: repo.clone(),
        tasks: repo.clone(),
        reminders: repo.clone(),
        tags: repo.clone(),
        arcs: repo.clone(),
        attachments: repo.clone(),
        devices: repo.clone(),
        conflicts: repo.clone(),
        event_log: repo.clone(),
        identity: repo,
        clock: StdArc::new(SystemClock),
        telemetry: StdArc::new(LogTelemetry),
        sink: StdArc::new(crate::events::NoopDomainEventSink),
    })
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_active_stack_is_enforced() {
    let store = MemoryStore::default();
    store.seed_stack(seeded_stack("A", "Stack A", 10));
    store.seed_stack(seeded_stack("B", "Stack B", 10));
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::STACK_ACTIVATED,
            100,
            serde_json::json!({"id": "A"}),
        )])
        .await
        .unwrap();
    projector
        .apply_batch(vec![remote(
            event_types::STACK_ACTIVATED,
            200,
            serde_json::json!({"id": "B"}),
        )])
        .await
        .unwrap();

    let a = store.stack("A");
    let b = store.stack("B");
    assert!(!a.is_active);
    assert_eq!(a.updated_at, ts(200));
    assert!(b.is_active);
    assert_eq!(b.updated_at, ts(200));

    let active: Vec<_> = store
        .lock()
        .stacks
        .values()
        .filter(|s| s.is_active)
        .map(|s| s.id.clone())
        .collect();
    assert_eq!(active, vec!["B".to_string()]);
}

#[tokio::test]
async fn lww_rejection_records_a_conflict_and_keeps_local() {
    let store = MemoryStore::default();
    store.seed_stack(seeded_stack("S", "X", 500));
    let projector = projector_with(&store);

    let applied = projector
        .apply_batch(vec![remote(
            event_types::STACK_UPDATED,
            400,
            stack_payload("S", "Y"),
        )])
        .await
        .unwrap();

    assert_eq!(applied, 0);
    let stack = store.stack("S");
    assert_eq!(stack.title, "X");
    assert_eq!(stack.updated_at, ts(500));

    let conflicts = store.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].local_timestamp, ts(500));
    assert_eq!(conflicts[0].remote_timestamp, ts(400));
    assert_eq!(conflicts[0].resolution, ConflictResolution::KeptLocal);
    assert!(conflicts[0].is_resolved);
}

#[tokio::test]
async fn tag_dedup_prefers_older_incoming_tag_and_migrates_references() {
    let store = MemoryStore::default();
    store.seed_tag(seeded_tag("T1", "Work", 200));
    let mut stack = seeded_stack("P", "Project", 10);
    stack.tag_ids = vec!["T1".to_string()];
    store.seed_stack(stack);
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::TAG_CREATED,
            300,
            serde_json::json!({
                "id": "T2",
                "name": "work",
                "createdAt": ts(100),
            }),
        )])
        .await
        .unwrap();

    let t1 = store.tag("T1").unwrap();
    let t2 = store.tag("T2").unwrap();
    assert!(t1.is_deleted, "losing duplicate is tombstoned");
    assert!(!t2.is_deleted);

    let p = store.stack("P");
    assert_eq!(p.tag_ids, vec!["T2".to_string()]);
    assert_eq!(p.sync_state, SyncState::Pending);

    assert_eq!(projector.reconciler.resolve_id("T1").await, "T2");

    // The corrected tag set is re-emitted so other devices converge.
    let recorded = store.recorded_local();
    assert!(recorded
        .iter()
        .any(|d| d.event_type == event_types::STACK_UPDATED
            && d.entity_id.as_deref() == Some("P")));
}

#[tokio::test]
async fn tag_dedup_keeps_local_canonical_without_inserting_duplicate() {
    let store = MemoryStore::default();
    store.seed_tag(seeded_tag("T1", "Work", 100));
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::TAG_CREATED,
            300,
            serde_json::json!({
                "id": "T2",
                "name": "  WORK ",
                "createdAt": ts(200),
            }),
        )])
        .await
        .unwrap();

    assert!(store.tag("T2").is_none(), "duplicate is never inserted");
    assert!(!store.tag("T1").unwrap().is_deleted);
    assert_eq!(projector.reconciler.resolve_id("T2").await, "T1");

    // Only one visible tag for the normalized name.
    let visible: Vec<_> = store
        .lock()
        .tags
        .values()
        .filter(|t| !t.is_deleted && normalize_tag_name(&t.name) == "work")
        .map(|t| t.id.clone())
        .collect();
    assert_eq!(visible.len(), 1);
}

#[tokio::test]
async fn stack_referencing_unknown_tag_parks_a_pending_association() {
    let store = MemoryStore::default();
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::STACK_UPDATED,
            50,
            serde_json::json!({
                "id": "S",
                "title": "Project",
                "status": "active",
                "sortOrder": 0,
                "tagIds": ["T1"],
            }),
        )])
        .await
        .unwrap();

    let stack = store.stack("S");
    assert!(stack.tag_ids.is_empty(), "missing tag is not attached yet");
    assert!(projector.reconciler.pending_for("T1").await.contains("S"));

    projector
        .apply_batch(vec![remote(
            event_types::TAG_CREATED,
            60,
            serde_json::json!({"id": "T1", "name": "Work"}),
        )])
        .await
        .unwrap();

    let stack = store.stack("S");
    assert_eq!(stack.tag_ids, vec!["T1".to_string()]);
    assert!(projector.reconciler.pending_for("T1").await.is_empty());
}

#[tokio::test]
async fn duplicate_event_delivery_is_idempotent() {
    let store = MemoryStore::default();
    let projector = projector_with(&store);

    let event = remote(event_types::STACK_CREATED, 100, stack_payload("S", "Once"));
    let first = projector.apply_batch(vec![event.clone()]).await.unwrap();
    let second = projector.apply_batch(vec![event]).await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 0, "exists() short-circuits redelivery");
    assert_eq!(store.stack("S").title, "Once");
    assert!(store.conflicts().is_empty());
}

#[tokio::test]
async fn final_state_is_invariant_under_arrival_order() {
    let make_events = || {
        vec![
            {
                let mut e = remote(event_types::STACK_CREATED, 100, stack_payload("S", "first"));
                e.id = "e1".into();
                e
            },
            {
                let mut e = remote(event_types::STACK_UPDATED, 300, stack_payload("S", "third"));
                e.id = "e3".into();
                e
            },
            {
                let mut e = remote(event_types::STACK_UPDATED, 200, stack_payload("S", "second"));
                e.id = "e2".into();
                e
            },
        ]
    };

    let forward = MemoryStore::default();
    let projector = projector_with(&forward);
    projector.apply_batch(make_events()).await.unwrap();

    let reversed = MemoryStore::default();
    let projector = projector_with(&reversed);
    let mut events = make_events();
    events.reverse();
    // Deliver one at a time so ordering is genuinely adversarial rather than
    // normalized by the batch sort.
    for event in events {
        projector.apply_batch(vec![event]).await.unwrap();
    }

    let a = forward.stack("S");
    let b = reversed.stack("S");
    assert_eq!(a.title, "third");
    assert_eq!(b.title, a.title);
    assert_eq!(b.updated_at, a.updated_at);
}

#[tokio::test]
async fn stale_payload_versions_are_dropped() {
    let store = MemoryStore::default();
    let projector = projector_with(&store);

    let mut event = remote(event_types::STACK_CREATED, 100, stack_payload("S", "Old"));
    event.payload_version = 0;
    let applied = projector.apply_batch(vec![event]).await.unwrap();

    assert_eq!(applied, 0);
    assert!(store.lock().stacks.is_empty());
}

#[tokio::test]
async fn tombstones_survive_newer_updates() {
    let store = MemoryStore::default();
    store.seed_stack(seeded_stack("S", "Doomed", 50));
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::STACK_DELETED,
            100,
            serde_json::json!({"id": "S"}),
        )])
        .await
        .unwrap();
    assert!(store.stack("S").is_deleted);

    // An older update loses LWW outright.
    projector
        .apply_batch(vec![remote(
            event_types::STACK_UPDATED,
            90,
            stack_payload("S", "resurrected?"),
        )])
        .await
        .unwrap();
    assert!(store.stack("S").is_deleted);
    assert_eq!(store.stack("S").title, "Doomed");

    // A newer update may rewrite fields but never clears the tombstone.
    projector
        .apply_batch(vec![remote(
            event_types::STACK_UPDATED,
            150,
            stack_payload("S", "still gone"),
        )])
        .await
        .unwrap();
    let stack = store.stack("S");
    assert!(stack.is_deleted);
    assert_eq!(stack.title, "still gone");
    assert!(!stack.is_active);
}

#[tokio::test]
async fn task_activation_co_mutates_the_parent_stack() {
    let store = MemoryStore::default();
    store.seed_stack(seeded_stack("S", "Parent", 10));
    store.seed_task(QueueTask {
        id: "T".into(),
        title: "Do it".into(),
        description: None,
        status: TaskStatus::Completed,
        priority: None,
        sort_order: 7,
        last_active_time: None,
        stack_id: Some("S".into()),
        created_at: ts(1),
        updated_at: ts(10),
        is_deleted: false,
        sync_state: SyncState::Synced,
        last_synced_at: None,
    });
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::TASK_ACTIVATED,
            100,
            serde_json::json!({"id": "T"}),
        )])
        .await
        .unwrap();

    let task = store.lock().tasks.get("T").cloned().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.sort_order, 0);
    assert_eq!(task.last_active_time, Some(ts(100)));

    let stack = store.stack("S");
    assert_eq!(stack.active_task_id.as_deref(), Some("T"));
    assert_eq!(stack.updated_at, ts(100));
}

#[tokio::test]
async fn status_events_preserve_unrelated_fields() {
    let store = MemoryStore::default();
    let mut stack = seeded_stack("S", "Keep my title", 10);
    stack.description = Some("and my description".into());
    stack.is_active = true;
    store.seed_stack(stack);
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::STACK_COMPLETED,
            100,
            serde_json::json!({"id": "S"}),
        )])
        .await
        .unwrap();

    let stack = store.stack("S");
    assert_eq!(stack.status, StackStatus::Completed);
    assert!(!stack.is_active, "completed stacks are never active");
    assert_eq!(stack.title, "Keep my title");
    assert_eq!(stack.description.as_deref(), Some("and my description"));
    assert_eq!(stack.updated_at, ts(100));
}

#[tokio::test]
async fn unknown_event_types_are_ignored() {
    let store = MemoryStore::default();
    let projector = projector_with(&store);

    let applied = projector
        .apply_batch(vec![remote(
            "hologram.materialized",
            100,
            serde_json::json!({"id": "X"}),
        )])
        .await
        .unwrap();

    assert_eq!(applied, 0);
}

#[tokio::test]
async fn undecodable_payload_skips_without_aborting_the_batch() {
    let store = MemoryStore::default();
    let projector = projector_with(&store);

    let bad = remote(event_types::STACK_CREATED, 100, serde_json::json!("garbage"));
    let good = remote(event_types::STACK_CREATED, 110, stack_payload("S", "Fine"));
    let applied = projector.apply_batch(vec![bad, good]).await.unwrap();

    assert_eq!(applied, 1);
    assert_eq!(store.stack("S").title, "Fine");
}

#[tokio::test]
async fn reorder_applies_per_entity_and_skips_missing() {
    let store = MemoryStore::default();
    store.seed_stack(seeded_stack("A", "A", 10));
    store.seed_stack(seeded_stack("B", "B", 500));
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::STACK_REORDERED,
            100,
            serde_json::json!({
                "ids": ["A", "B", "ghost"],
                "sortOrders": [2, 1, 9],
            }),
        )])
        .await
        .unwrap();

    // A is older than the event and moves; B is newer and keeps its order.
    assert_eq!(store.stack("A").sort_order, 2);
    assert_eq!(store.stack("A").updated_at, ts(100));
    assert_eq!(store.stack("B").sort_order, 0);
    let conflicts = store.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::Reorder);
}

#[tokio::test]
async fn events_advance_device_last_seen() {
    let store = MemoryStore::default();
    store
        .lock()
        .devices
        .insert("other-device".into(), Device {
            id: "dev-row".into(),
            device_key: "other-device".into(),
            name: "Other".into(),
            platform: "ios".into(),
            os_version: None,
            app_version: None,
            first_seen_at: ts(1),
            last_seen_at: ts(1),
            is_current_device: false,
            created_at: ts(1),
            updated_at: ts(1),
            is_deleted: false,
            sync_state: SyncState::Synced,
            last_synced_at: None,
        });
    let projector = projector_with(&store);

    projector
        .apply_batch(vec![remote(
            event_types::STACK_CREATED,
            100,
            stack_payload("S", "From afar"),
        )])
        .await
        .unwrap();

    let device = store.lock().devices.get("other-device").cloned().unwrap();
    assert_eq!(device.last_seen_at, ts(100));
}
