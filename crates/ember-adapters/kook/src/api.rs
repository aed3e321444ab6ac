//! Typed wrappers over the KOOK HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use ember_core::{BoxedControlPlane, ControlPlaneError, ControlPlaneResult};
use ember_gateway::GatewayLocator;

// =============================================================================
// Message types
// =============================================================================

/// KOOK message `type` values used when sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KookMessageType {
    Text = 1,
    Image = 2,
    Video = 3,
    File = 4,
    Audio = 8,
    KMarkdown = 9,
    Card = 10,
}

/// Account returned by `/user/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KookUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

// =============================================================================
// KookApi
// =============================================================================

/// KOOK API calls over a [`ControlPlane`](ember_core::ControlPlane).
#[derive(Clone)]
pub struct KookApi {
    plane: BoxedControlPlane,
}

impl KookApi {
    pub fn new(plane: BoxedControlPlane) -> Self {
        Self { plane }
    }

    /// `GET /user/me`
    pub async fn me(&self) -> ControlPlaneResult<KookUser> {
        let body = self.plane.get("/user/me", &[]).await?;
        Ok(serde_json::from_value(data(body)?)?)
    }

    /// `POST /message/create`; returns the new message id.
    pub async fn create_message(
        &self,
        target_id: &str,
        msg_type: KookMessageType,
        content: &str,
        quote: Option<&str>,
    ) -> ControlPlaneResult<Option<String>> {
        self.create("/message/create", target_id, msg_type, content, quote)
            .await
    }

    /// `POST /direct-message/create`; returns the new message id.
    pub async fn create_direct_message(
        &self,
        target_id: &str,
        msg_type: KookMessageType,
        content: &str,
        quote: Option<&str>,
    ) -> ControlPlaneResult<Option<String>> {
        self.create("/direct-message/create", target_id, msg_type, content, quote)
            .await
    }

    async fn create(
        &self,
        path: &str,
        target_id: &str,
        msg_type: KookMessageType,
        content: &str,
        quote: Option<&str>,
    ) -> ControlPlaneResult<Option<String>> {
        let mut payload = json!({
            "target_id": target_id,
            "type": msg_type as u8,
            "content": content,
        });
        if let Some(quote) = quote {
            payload["quote"] = Value::String(quote.to_string());
        }

        let body = self.plane.post(path, payload).await?;
        let msg_id = body
            .pointer("/data/msg_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        debug!(path = %path, target_id = %target_id, msg_id = ?msg_id, "Message created");
        Ok(msg_id)
    }

    /// `POST /message/delete`
    pub async fn delete_message(&self, msg_id: &str) -> ControlPlaneResult<()> {
        self.plane
            .post("/message/delete", json!({ "msg_id": msg_id }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GatewayLocator for KookApi {
    /// `GET /gateway/index?compress=0`
    async fn gateway_url(&self) -> ControlPlaneResult<String> {
        let body = self
            .plane
            .get("/gateway/index", &[("compress", "0".to_string())])
            .await?;
        body.pointer("/data/url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ControlPlaneError::Decode("missing data.url in gateway response".into()))
    }
}

fn data(mut body: Value) -> ControlPlaneResult<Value> {
    match body.get_mut("data") {
        Some(data) => Ok(data.take()),
        None => Err(ControlPlaneError::Decode("missing data in response".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockControlPlane;

    #[tokio::test]
    async fn gateway_url_is_read_from_data() {
        let plane = MockControlPlane::new();
        plane.respond("/gateway/index", json!({"code": 0, "data": {"url": "wss://gw/x"}}));
        let api = KookApi::new(plane.clone());

        assert_eq!(api.gateway_url().await.unwrap(), "wss://gw/x");
        assert_eq!(plane.requests()[0].1, json!({"compress": "0"}));
    }

    #[tokio::test]
    async fn missing_gateway_url_is_decode_error() {
        let plane = MockControlPlane::new();
        plane.respond("/gateway/index", json!({"code": 0, "data": {}}));
        let err = KookApi::new(plane).gateway_url().await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Decode(_)));
    }

    #[tokio::test]
    async fn me_parses_user() {
        let plane = MockControlPlane::new();
        plane.respond(
            "/user/me",
            json!({"code": 0, "data": {"id": "777", "username": "amiya", "bot": true}}),
        );
        let me = KookApi::new(plane).me().await.unwrap();
        assert_eq!(me.id, "777");
        assert!(me.bot);
    }

    #[tokio::test]
    async fn create_message_sets_quote_and_returns_id() {
        let plane = MockControlPlane::new();
        plane.respond("/message/create", json!({"code": 0, "data": {"msg_id": "abc"}}));
        let api = KookApi::new(plane.clone());

        let id = api
            .create_message("c1", KookMessageType::KMarkdown, "hi", Some("m0"))
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("abc"));
        assert_eq!(
            plane.requests()[0],
            (
                "/message/create".to_string(),
                json!({"target_id": "c1", "type": 9, "content": "hi", "quote": "m0"})
            )
        );
    }
}
