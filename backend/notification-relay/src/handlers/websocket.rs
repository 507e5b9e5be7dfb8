/// WebSocket upgrade for listeners
use crate::state::AppState;
use crate::websocket::ListenerSession;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;

/// GET /ws
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    if !state.lifecycle.is_serving() {
        return Ok(HttpResponse::ServiceUnavailable().finish());
    }

    // The registry refuses new listeners once draining has closed it
    let Some((listener_id, rx)) = state.registry.add_listener().await else {
        return Ok(HttpResponse::ServiceUnavailable().finish());
    };
    let session = ListenerSession::new(
        listener_id,
        state.registry.clone(),
        rx,
        state.websocket.clone(),
    );

    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            // Handshake failed; the session never started, so clean up here
            tracing::warn!(listener_id = %listener_id, error = %e, "WebSocket handshake failed");
            state.registry.remove_listener(listener_id).await;
            Err(e)
        }
    }
}
