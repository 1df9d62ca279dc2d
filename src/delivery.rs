// src/delivery.rs
//
// Outbound render notifications for plugin webhooks.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

use crate::db;
use crate::models::{Render, RenderStatus};
use crate::signature::sign_hmac_sha256_hex;

pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub const SIGNATURE_HEADER: &str = "X-Renderiq-Signature";
pub const EVENT_HEADER: &str = "X-Renderiq-Event";
pub const TIMESTAMP_HEADER: &str = "X-Renderiq-Timestamp";

/// Event name for a render in `status`. Pending renders have no event.
pub fn render_event(status: RenderStatus) -> Option<&'static str> {
    match status {
        RenderStatus::Completed => Some("render.completed"),
        RenderStatus::Failed => Some("render.failed"),
        RenderStatus::Processing => Some("render.processing"),
        RenderStatus::Pending => None,
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookEnvelope<'a, T: Serialize> {
    pub event: &'a str,
    pub timestamp: String,
    pub data: T,
}

/// Serialized body and its signature for one delivery.
pub fn signed_body<T: Serialize>(event: &str, data: T, secret: &str) -> Result<(String, String, String), serde_json::Error> {
    let envelope = WebhookEnvelope {
        event,
        timestamp: Utc::now().to_rfc3339(),
        data,
    };
    let body = serde_json::to_string(&envelope)?;
    let signature = sign_hmac_sha256_hex(secret, body.as_bytes());
    Ok((body, signature, envelope.timestamp))
}

/// Posts the render event to every active webhook of the render's owner that
/// subscribed to it. Delivery failures are counted, never returned.
pub async fn notify_render(pool: &PgPool, http: &reqwest::Client, render: &Render) {
    let Some(event) = render_event(render.status) else {
        return;
    };

    let hooks = match db::webhooks::active_for_event(pool, render.user_id, event).await {
        Ok(hooks) => hooks,
        Err(e) => {
            log::error!("loading webhooks for user {} failed: {e}", render.user_id);
            return;
        }
    };

    let data = json!({
        "renderId": render.id,
        "projectId": render.project_id,
        "status": render.status,
        "type": render.render_type,
        "outputUrl": render.output_url,
        "error": render.error_message,
    });

    for hook in hooks {
        let success = match signed_body(event, &data, &hook.secret) {
            Ok((body, signature, timestamp)) => {
                let sent = http
                    .post(&hook.url)
                    .timeout(DELIVERY_TIMEOUT)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .header(SIGNATURE_HEADER, signature)
                    .header(EVENT_HEADER, event)
                    .header(TIMESTAMP_HEADER, timestamp)
                    .body(body)
                    .send()
                    .await;
                match sent {
                    Ok(resp) if resp.status().is_success() => true,
                    Ok(resp) => {
                        log::warn!("webhook {} answered {} for {event}", hook.id, resp.status());
                        false
                    }
                    Err(e) => {
                        log::warn!("webhook {} delivery failed: {e}", hook.id);
                        false
                    }
                }
            }
            Err(e) => {
                log::error!("webhook payload serialization failed: {e}");
                false
            }
        };

        if let Err(e) = db::webhooks::record_delivery(pool, hook.id, success).await {
            log::error!("recording delivery for webhook {} failed: {e}", hook.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::verify_hmac_sha256_hex;

    #[test]
    fn pending_renders_have_no_event() {
        assert_eq!(render_event(RenderStatus::Pending), None);
        assert_eq!(render_event(RenderStatus::Failed), Some("render.failed"));
    }

    #[test]
    fn body_is_signed_with_the_webhook_secret() {
        let (body, signature, timestamp) =
            signed_body("render.completed", json!({"renderId": "r1"}), "whsec").unwrap();
        assert!(verify_hmac_sha256_hex("whsec", body.as_bytes(), &signature));

        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["event"], "render.completed");
        assert_eq!(parsed["data"]["renderId"], "r1");
        assert_eq!(parsed["timestamp"], timestamp.as_str());
    }
}
