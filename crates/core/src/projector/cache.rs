//! Batch prefetch cache for projection.
//!
//! A pre-pass over the batch collects every referenced id per entity kind
//! from the decoded payloads, then one `get_by_ids` per kind fills the maps.
//! Handlers consult the cache first and fall back to a point query only on a
//! miss; inserts register themselves back so later events in the same batch
//! see consistent state. This collapses a batch of N events to O(kinds)
//! queries instead of O(N).

use crate::arcs::StoryArc;
use crate::attachments::Attachment;
use crate::devices::Device;
use crate::events::{event_types, RemoteEvent};
use crate::reminders::Reminder;
use crate::stacks::Stack;
use crate::tags::Tag;
use crate::tasks::QueueTask;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub(crate) struct EntityLookupCache {
    pub stacks: HashMap<String, Stack>,
    pub tasks: HashMap<String, QueueTask>,
    pub reminders: HashMap<String, Reminder>,
    pub tags: HashMap<String, Tag>,
    pub arcs: HashMap<String, StoryArc>,
    pub attachments: HashMap<String, Attachment>,
    pub devices_by_key: HashMap<String, Device>,
}

/// Id sets referenced by a batch, grouped by entity kind.
#[derive(Debug, Default)]
pub(crate) struct ReferencedIds {
    pub stacks: HashSet<String>,
    pub tasks: HashSet<String>,
    pub reminders: HashSet<String>,
    pub tags: HashSet<String>,
    pub arcs: HashSet<String>,
    pub attachments: HashSet<String>,
    pub device_keys: HashSet<String>,
}

impl ReferencedIds {
    /// Walk a batch and collect the ids each handler will look up. Works on
    /// the raw JSON so one undecodable payload cannot fail the pre-pass.
    pub fn collect(events: &[RemoteEvent]) -> Self {
        let mut ids = Self::default();
        for event in events {
            ids.device_keys.insert(event.device_id.clone());
            let payload = &event.payload;
            let payload_id = string_field(payload, "id");

            match event.event_type.split('.').next().unwrap_or("") {
                "stack" => {
                    if event.event_type == event_types::STACK_REORDERED {
                        ids.stacks.extend(string_array(payload, "ids"));
                        continue;
                    }
                    if event.event_type == event_types::STACK_ARC_ASSIGNED {
                        if let Some(stack_id) = string_field(payload, "stackId") {
                            ids.stacks.insert(stack_id);
                        }
                        if let Some(arc_id) = string_field(payload, "arcId") {
                            ids.arcs.insert(arc_id);
                        }
                        continue;
                    }
                    if let Some(id) = payload_id {
                        ids.stacks.insert(id);
                    }
                    ids.tags.extend(string_array(payload, "tagIds"));
                }
                "task" => {
                    if event.event_type == event_types::TASK_REORDERED {
                        ids.tasks.extend(string_array(payload, "ids"));
                        continue;
                    }
                    if let Some(id) = payload_id {
                        ids.tasks.insert(id);
                    }
                    if let Some(stack_id) = string_field(payload, "stackId") {
                        ids.stacks.insert(stack_id);
                    }
                }
                "reminder" => {
                    if let Some(id) = payload_id {
                        ids.reminders.insert(id);
                    }
                }
                "tag" => {
                    if let Some(id) = payload_id {
                        ids.tags.insert(id);
                    }
                }
                "arc" => {
                    if event.event_type == event_types::ARC_REORDERED {
                        ids.arcs.extend(string_array(payload, "ids"));
                        continue;
                    }
                    if let Some(id) = payload_id {
                        ids.arcs.insert(id);
                    }
                }
                "attachment" => {
                    if let Some(id) = payload_id {
                        ids.attachments.insert(id);
                    }
                }
                "device" => {
                    if let Some(key) = string_field(payload, "deviceKey") {
                        ids.device_keys.insert(key);
                    }
                }
                _ => {}
            }
        }
        ids
    }
}

fn string_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload.get(key)?.as_str().map(|s| s.to_string())
}

fn string_array(payload: &serde_json::Value, key: &str) -> Vec<String> {
    payload
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
