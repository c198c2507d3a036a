//! WebSocket upgrade endpoint for the Push Hub.
//!
//! Extracts the caller, constructs the connection actor, and hands the
//! connection to `ws::start`. A client can join/leave any number of tenant
//! rooms over the same socket; the actor manages that membership rather
//! than the route.
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;

use crate::middleware::AuthContext;
use crate::push::PushHubActor;
use crate::state::AppState;

/// `GET /push` — upgrades to a WebSocket carrying `join`/`leave` messages
/// from the client and pipeline event payloads from the server.
pub async fn push_connect(
    req: HttpRequest,
    auth: AuthContext,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let actor = PushHubActor::new(auth.caller_id, state.bus.clone(), state.authorizer.clone());
    ws::start(actor, &req, payload)
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/push", web::get().to(push_connect));
}
