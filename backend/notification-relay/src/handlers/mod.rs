/// HTTP handlers for the relay
pub mod health;
pub mod notify;
pub mod websocket;

use crate::metrics;
use actix_web::web;

pub use health::health;
pub use notify::{notify, NotifyRequest, NotifyResponse};
pub use websocket::ws_handler;

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/notify", web::post().to(notify))
        .route("/ws", web::get().to(ws_handler))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics::serve_metrics));
}
