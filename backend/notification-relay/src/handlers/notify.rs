/// Notification ingestion
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::state::AppState;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use notification_channel::NotificationEvent;
use serde::{Deserialize, Serialize};

/// Body of `POST /notify`.
///
/// Fields are optional here so that absent and empty fields produce the same
/// rejection. Non-string values fail deserialization instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub user: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl NotifyRequest {
    /// Read a submission body.
    ///
    /// JSON bodies, and bodies sent without a content type, are parsed. A blank body
    /// or one of another content type (a form post, say) reads as an empty request,
    /// so it fails field validation rather than parsing.
    pub fn from_body(content_type: &str, body: &[u8]) -> AppResult<Self> {
        let is_json = content_type.is_empty() || content_type.to_ascii_lowercase().contains("json");
        if !is_json || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| AppError::InvalidBody(e.to_string()))
    }

    pub fn into_event(self) -> AppResult<NotificationEvent> {
        match (self.user, self.text, self.kind) {
            (Some(user), Some(text), Some(kind))
                if !user.is_empty() && !text.is_empty() && !kind.is_empty() =>
            {
                Ok(NotificationEvent::new(user, text, kind))
            }
            _ => Err(AppError::Validation),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct NotifyResponse {
    pub success: bool,
    pub message: String,
}

/// POST /notify
pub async fn notify(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    if !state.lifecycle.is_serving() {
        metrics::record_submission("rejected");
        return Err(AppError::NotAccepting);
    }

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let event = NotifyRequest::from_body(content_type, &body)
        .and_then(NotifyRequest::into_event)
        .map_err(|e| {
            metrics::record_submission("rejected");
            e
        })?;

    match state.publisher.publish(&event).await {
        Ok(subscribers) => {
            tracing::debug!(user = %event.user, subscribers, "Notification accepted");
            metrics::record_submission("accepted");
            Ok(HttpResponse::Ok().json(NotifyResponse {
                success: true,
                message: "Notification sent".to_string(),
            }))
        }
        Err(e) => {
            tracing::error!(error = %e, user = %event.user, "Failed to publish notification");
            metrics::record_submission("failed");
            Err(e.into())
        }
    }
}
