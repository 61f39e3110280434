use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Client as HttpClient;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use url::Url;

use crate::api::ChatApi;
use crate::api::models::{ContactSummary, CurrentUser, Message, UserRole};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};

/// Shared bearer credential with a single refresh lifecycle. Cloned into the
/// HTTP client and the push channel so every request reads the same token.
#[derive(Debug, Clone)]
pub struct Credential(Arc<RwLock<String>>);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(token.into())))
    }

    pub fn token(&self) -> String {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn refresh(&self, token: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = token.into();
    }
}

pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    credential: Credential,
}

impl ApiClient {
    pub fn new(config: &ChatConfig, credential: Credential) -> Result<Self> {
        let base_url = config.api_base().to_string();
        Url::parse(&base_url)?;
        Ok(Self {
            http: HttpClient::new(),
            base_url,
            credential,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(self.credential.token())
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let resp = self.with_auth(self.http.get(self.endpoint(path))).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status().as_u16()));
        }
        Ok(resp.json::<Value>().await?)
    }
}

/// The backend wraps list payloads inconsistently; accept a bare array or any
/// of the usual envelope keys.
fn list_items(json: &Value, keys: &[&str]) -> Vec<Value> {
    if let Some(arr) = json.as_array() {
        return arr.clone();
    }
    for key in keys {
        if let Some(arr) = json.get(key).and_then(|v| v.as_array()) {
            return arr.clone();
        }
    }
    Vec::new()
}

fn message_from_value(item: Value) -> Option<Message> {
    match serde_json::from_value::<Message>(item) {
        Ok(msg) => Some(msg),
        Err(err) => {
            log::warn!("skipping malformed message in response: {err}");
            None
        }
    }
}

impl ChatApi for ApiClient {
    async fn history(&self, counterpart_id: &str) -> Result<Vec<Message>> {
        let json = self
            .get_json(&format!("/chat/history/{counterpart_id}"))
            .await?;
        let items = list_items(&json, &["messages", "data"]);
        Ok(items.into_iter().filter_map(message_from_value).collect())
    }

    async fn send_text(&self, recipient_id: &str, content: &str) -> Result<Message> {
        let body = serde_json::json!({
            "recipient_id": recipient_id,
            "content": content,
        });
        let resp = self
            .with_auth(self.http.post(self.endpoint("/chat/messages")).json(&body))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status().as_u16()));
        }
        let json: Value = resp.json().await?;
        let payload = json.get("message").cloned().unwrap_or(json);
        Ok(serde_json::from_value::<Message>(payload)?)
    }

    async fn upload(&self, recipient_id: &str, filename: &str, bytes: Vec<u8>) -> Result<String> {
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new()
            .part("file", part)
            .text("receiver_id", recipient_id.to_string());
        let resp = self
            .with_auth(self.http.post(self.endpoint("/chat/upload")).multipart(form))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status().as_u16()));
        }
        let json: Value = resp.json().await?;
        json.get("filename")
            .or_else(|| json.get("data").and_then(|d| d.get("filename")))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ChatError::Upload("upload response missing filename".to_string()))
    }

    async fn mark_read(&self, counterpart_id: &str) -> Result<()> {
        let resp = self
            .with_auth(
                self.http
                    .put(self.endpoint(&format!("/chat/conversations/{counterpart_id}/read"))),
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn contacts(&self, user: &CurrentUser) -> Result<Vec<ContactSummary>> {
        match user.role {
            UserRole::Admin => {
                let json = self.get_json("/admin/users").await?;
                let items = list_items(&json, &["users", "data"]);
                Ok(items.iter().filter_map(ContactSummary::from_user).collect())
            }
            UserRole::Client | UserRole::Lawyer => {
                let json = self.get_json("/marketplace/orders").await?;
                let items = list_items(&json, &["orders", "bookings", "data"]);
                Ok(items
                    .iter()
                    .filter_map(|item| ContactSummary::from_order(item, user.role))
                    .collect())
            }
        }
    }
}
