use crate::lifecycle::RelayState;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub state: String,
    pub listeners: usize,
}

/// GET /health
///
/// 200 only while the relay is serving.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let current = state.lifecycle.current();
    let body = HealthResponse {
        status: if current == RelayState::Serving {
            "ok"
        } else {
            "unavailable"
        }
        .to_string(),
        state: current.as_str().to_string(),
        listeners: state.registry.listener_count().await,
    };

    if current == RelayState::Serving {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
