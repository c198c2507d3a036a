//! Push Hub: bridges the Event Bus to connected WebSocket clients.
//!
//! Generalizes the actix actor shape used by the transcoding-progress
//! streamer (`Actor` + `ws::WebsocketContext` + `StreamHandler` + a
//! `Handler<Message>` broadcast path) but subscribes directly through
//! `EventBus::subscribe` instead of a second bespoke registry — the bus
//! already owns tenant-scoped fan-out and drop-oldest back-pressure, so
//! there is nothing left for a registry to add.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web_actors::ws;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{Event, EventBus};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// External predicate the Hub consults before honoring a join. Role/tenant
/// authorization proper is out of scope; this is the narrow seam the core
/// depends on.
#[async_trait]
pub trait TenantAuthorizer: Send + Sync {
    async fn authorize(&self, caller_id: Uuid, tenant_id: Uuid) -> bool;
}

/// Reference implementation: every join succeeds. Real deployments swap
/// this for a predicate backed by the tenant-membership store.
pub struct AllowAllAuthorizer;

#[async_trait]
impl TenantAuthorizer for AllowAllAuthorizer {
    async fn authorize(&self, _caller_id: Uuid, _tenant_id: Uuid) -> bool {
        true
    }
}

/// Client → Hub wire messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Join {
        #[serde(rename = "tenantId")]
        tenant_id: Uuid,
    },
    Leave {
        #[serde(rename = "tenantId")]
        tenant_id: Uuid,
    },
}

/// Hub → Client message for a denied join. Event payloads themselves are
/// forwarded verbatim (they already carry `type` via `Event`'s own tag).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum HubMessage {
    JoinDenied {
        #[serde(rename = "tenantId")]
        tenant_id: Uuid,
    },
}

#[derive(Message)]
#[rtype(result = "()")]
struct ForwardEvent(Event);

#[derive(Message)]
#[rtype(result = "()")]
struct JoinDenied {
    tenant_id: Uuid,
}

/// One WebSocket connection. A client may hold subscriptions to several
/// tenants at once; each is a spawned task forwarding bus events back to
/// this actor's address until `leave` or disconnect cancels it.
pub struct PushHubActor {
    caller_id: Uuid,
    bus: EventBus,
    authorizer: Arc<dyn TenantAuthorizer>,
    subscriptions: HashMap<Uuid, JoinHandle<()>>,
    last_heartbeat: Instant,
}

impl PushHubActor {
    pub fn new(caller_id: Uuid, bus: EventBus, authorizer: Arc<dyn TenantAuthorizer>) -> Self {
        Self {
            caller_id,
            bus,
            authorizer,
            subscriptions: HashMap::new(),
            last_heartbeat: Instant::now(),
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(caller_id = %act.caller_id, "push client heartbeat timed out, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn join(&mut self, tenant_id: Uuid, ctx: &mut ws::WebsocketContext<Self>) {
        if self.subscriptions.contains_key(&tenant_id) {
            return;
        }
        let authorizer = self.authorizer.clone();
        let bus = self.bus.clone();
        let caller_id = self.caller_id;
        let addr = ctx.address();
        let handle = actix::spawn(async move {
            if !authorizer.authorize(caller_id, tenant_id).await {
                addr.do_send(JoinDenied { tenant_id });
                return;
            }
            let subscription = bus.subscribe(tenant_id);
            info!(caller_id = %caller_id, %tenant_id, "push client joined tenant");
            while let Some(event) = subscription.recv().await {
                addr.do_send(ForwardEvent(event));
            }
        });
        self.subscriptions.insert(tenant_id, handle);
    }

    fn leave(&mut self, tenant_id: Uuid) {
        if let Some(handle) = self.subscriptions.remove(&tenant_id) {
            handle.abort();
            debug!(caller_id = %self.caller_id, %tenant_id, "push client left tenant");
        }
    }
}

impl Actor for PushHubActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        for (_, handle) in self.subscriptions.drain() {
            handle.abort();
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PushHubActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(bytes)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Join { tenant_id }) => self.join(tenant_id, ctx),
                Ok(ClientMessage::Leave { tenant_id }) => self.leave(tenant_id),
                Err(err) => warn!(caller_id = %self.caller_id, %err, "malformed push client message"),
            },
            Ok(ws::Message::Binary(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<ForwardEvent> for PushHubActor {
    type Result = ();

    fn handle(&mut self, msg: ForwardEvent, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg.0) {
            Ok(json) => ctx.text(json),
            Err(err) => warn!(%err, "failed to serialize event for push client"),
        }
    }
}

impl Handler<JoinDenied> for PushHubActor {
    type Result = ();

    fn handle(&mut self, msg: JoinDenied, ctx: &mut Self::Context) {
        let payload = HubMessage::JoinDenied {
            tenant_id: msg.tenant_id,
        };
        if let Ok(json) = serde_json::to_string(&payload) {
            ctx.text(json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_message_round_trips_with_camel_case_tenant_id() {
        let tenant_id = Uuid::new_v4();
        let json = format!(r#"{{"type":"join","tenantId":"{}"}}"#, tenant_id);
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            ClientMessage::Join { tenant_id: parsed_id } => assert_eq!(parsed_id, tenant_id),
            other => panic!("expected Join, got {:?}", other),
        }
    }

    #[test]
    fn leave_message_round_trips() {
        let tenant_id = Uuid::new_v4();
        let json = format!(r#"{{"type":"leave","tenantId":"{}"}}"#, tenant_id);
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ClientMessage::Leave { tenant_id: id } if id == tenant_id));
    }

    #[tokio::test]
    async fn allow_all_authorizer_always_authorizes() {
        let authorizer = AllowAllAuthorizer;
        assert!(authorizer.authorize(Uuid::new_v4(), Uuid::new_v4()).await);
    }
}
