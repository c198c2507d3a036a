//! In-process event bus.
//!
//! Publishes pipeline lifecycle events to per-tenant subscribers. Ordering
//! is guaranteed per subscriber per video; there is no cross-video ordering
//! guarantee and no cross-tenant visibility. Each subscriber has a bounded
//! buffer; when full, the oldest queued event is dropped — publish must
//! never block on a slow subscriber.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Sensitivity, VideoStatus};

/// Condensed projection carried by `video-uploaded`, matching the wire
/// shape the Push Hub forwards to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub title: String,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
    pub owner_ref: Uuid,
    pub size: u64,
}

pub const PROCESSING_START_STEP: &str = "Starting video processing";

/// Pipeline lifecycle events. `tenant_id` is never serialized — it exists
/// only to route delivery through the bus; the wire payload forwarded by
/// the Push Hub carries just what §4.4 specifies.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Event {
    VideoUploaded {
        #[serde(skip_serializing)]
        tenant_id: Uuid,
        video_id: Uuid,
        summary: UploadSummary,
    },
    VideoProcessingStart {
        #[serde(skip_serializing)]
        tenant_id: Uuid,
        video_id: Uuid,
        progress: u8,
        step: String,
    },
    VideoProgressUpdate {
        #[serde(skip_serializing)]
        tenant_id: Uuid,
        video_id: Uuid,
        progress: u8,
        step: String,
    },
    VideoProcessingComplete {
        #[serde(skip_serializing)]
        tenant_id: Uuid,
        video_id: Uuid,
        progress: u8,
        status: String,
        analysis: Sensitivity,
    },
    VideoProcessingFailed {
        #[serde(skip_serializing)]
        tenant_id: Uuid,
        video_id: Uuid,
        error: String,
    },
}

impl Event {
    pub fn tenant_id(&self) -> Uuid {
        match self {
            Event::VideoUploaded { tenant_id, .. }
            | Event::VideoProcessingStart { tenant_id, .. }
            | Event::VideoProgressUpdate { tenant_id, .. }
            | Event::VideoProcessingComplete { tenant_id, .. }
            | Event::VideoProcessingFailed { tenant_id, .. } => *tenant_id,
        }
    }
}

/// A bounded, drop-oldest single-producer/single-consumer queue. Standard
/// library bounded channels block or reject on a full queue; this one
/// evicts the oldest entry instead, since the bus must never apply
/// back-pressure to the publisher.
struct DropOldestQueue<T> {
    items: Mutex<std::collections::VecDeque<T>>,
    capacity: usize,
    notify: tokio::sync::Notify,
}

impl<T> DropOldestQueue<T> {
    fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(std::collections::VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            notify: tokio::sync::Notify::new(),
        }
    }

    fn push(&self, item: T) {
        let mut guard = self.items.lock().expect("subscriber queue poisoned");
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
    }

    async fn recv(&self) -> Option<T> {
        loop {
            {
                let mut guard = self.items.lock().expect("subscriber queue poisoned");
                if let Some(item) = guard.pop_front() {
                    return Some(item);
                }
            }
            self.notify.notified().await;
        }
    }
}

pub struct Subscription {
    id: u64,
    tenant_id: Uuid,
    queue: Arc<DropOldestQueue<Event>>,
    bus: Arc<EventBusInner>,
}

impl Subscription {
    pub async fn recv(&self) -> Option<Event> {
        self.queue.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.tenant_id, self.id);
    }
}

struct EventBusInner {
    subscribers: Mutex<HashMap<Uuid, Vec<(u64, Arc<DropOldestQueue<Event>>)>>>,
    next_id: std::sync::atomic::AtomicU64,
    buffer_capacity: usize,
}

impl EventBusInner {
    fn unsubscribe(&self, tenant_id: Uuid, id: u64) {
        let mut guard = self.subscribers.lock().expect("event bus poisoned");
        if let Some(subs) = guard.get_mut(&tenant_id) {
            subs.retain(|(sub_id, _)| *sub_id != id);
            if subs.is_empty() {
                guard.remove(&tenant_id);
            }
        }
    }
}

/// Handle to the event bus. Cloning shares the same underlying registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl EventBus {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: std::sync::atomic::AtomicU64::new(0),
                buffer_capacity,
            }),
        }
    }

    pub fn subscribe(&self, tenant_id: Uuid) -> Subscription {
        let id = self
            .inner
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let queue = Arc::new(DropOldestQueue::new(self.inner.buffer_capacity));
        self.inner
            .subscribers
            .lock()
            .expect("event bus poisoned")
            .entry(tenant_id)
            .or_default()
            .push((id, queue.clone()));
        Subscription {
            id,
            tenant_id,
            queue,
            bus: self.inner.clone(),
        }
    }

    /// Deliver `event` to every subscriber of its tenant. Takes a snapshot
    /// of the subscriber list and releases the registry lock before
    /// delivering, so a slow subscriber never holds up the registry.
    pub fn publish(&self, event: Event) {
        let tenant_id = event.tenant_id();
        let snapshot: Vec<Arc<DropOldestQueue<Event>>> = {
            let guard = self.inner.subscribers.lock().expect("event bus poisoned");
            match guard.get(&tenant_id) {
                Some(subs) => subs.iter().map(|(_, q)| q.clone()).collect(),
                None => return,
            }
        };
        for queue in snapshot {
            queue.push(event.clone());
        }
    }

    pub fn subscriber_count(&self, tenant_id: Uuid) -> usize {
        self.inner
            .subscribers
            .lock()
            .expect("event bus poisoned")
            .get(&tenant_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_only_its_tenants_events() {
        let bus = EventBus::new(64);
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let sub_a = bus.subscribe(tenant_a);
        let _sub_b = bus.subscribe(tenant_b);

        bus.publish(Event::VideoUploaded {
            video_id: Uuid::new_v4(),
            tenant_id: tenant_b,
            summary: UploadSummary {
                title: "clip".to_string(),
                status: VideoStatus::Uploaded,
                created_at: Utc::now(),
                owner_ref: Uuid::new_v4(),
                size: 1024,
            },
        });

        let got = tokio::time::timeout(std::time::Duration::from_millis(50), sub_a.recv()).await;
        assert!(got.is_err(), "tenant A must not see tenant B's events");
    }

    #[tokio::test]
    async fn per_video_ordering_is_preserved_for_a_subscriber() {
        let bus = EventBus::new(64);
        let tenant = Uuid::new_v4();
        let video_id = Uuid::new_v4();
        let sub = bus.subscribe(tenant);

        for step in 0..5u8 {
            bus.publish(Event::VideoProgressUpdate {
                video_id,
                tenant_id: tenant,
                progress: step * 10,
                step: format!("step-{step}"),
            });
        }

        for expected in 0..5u8 {
            match sub.recv().await.unwrap() {
                Event::VideoProgressUpdate { progress, .. } => {
                    assert_eq!(progress, expected * 10);
                }
                _ => panic!("unexpected event"),
            }
        }
    }

    #[tokio::test]
    async fn full_buffer_drops_oldest_not_newest() {
        let bus = EventBus::new(2);
        let tenant = Uuid::new_v4();
        let video_id = Uuid::new_v4();
        let sub = bus.subscribe(tenant);

        for step in 0..5u8 {
            bus.publish(Event::VideoProgressUpdate {
                video_id,
                tenant_id: tenant,
                progress: step,
                step: "s".to_string(),
            });
        }

        // capacity 2: only the last two publishes should remain
        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        match (first, second) {
            (
                Event::VideoProgressUpdate { progress: p1, .. },
                Event::VideoProgressUpdate { progress: p2, .. },
            ) => {
                assert_eq!(p1, 3);
                assert_eq!(p2, 4);
            }
            _ => panic!("unexpected events"),
        }
    }

    #[tokio::test]
    async fn dropping_subscription_removes_it_from_registry() {
        let bus = EventBus::new(4);
        let tenant = Uuid::new_v4();
        let sub = bus.subscribe(tenant);
        assert_eq!(bus.subscriber_count(tenant), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(tenant), 0);
    }

    #[test]
    fn wire_payload_is_camel_case_and_omits_tenant_id() {
        let event = Event::VideoProgressUpdate {
            video_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            progress: 35,
            step: "decoding".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "video-progress-update");
        assert!(json.get("videoId").is_some());
        assert!(json.get("tenantId").is_none());
        assert!(json.get("video_id").is_none());
    }
}
