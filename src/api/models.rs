use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Prefix given to optimistic entries before the server assigns a real id.
pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(deserialize_with = "id_as_string")]
    pub sender_id: String,
    #[serde(default, deserialize_with = "optional_id_as_string")]
    pub recipient_id: String,
    #[serde(rename = "content")]
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// True for optimistic entries that have not been confirmed yet.
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Lawyer,
    Admin,
}

impl UserRole {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "lawyer" | "advocate" => UserRole::Lawyer,
            "admin" => UserRole::Admin,
            _ => UserRole::Client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub role: UserRole,
}

/// One selectable counterpart in the conversation sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSummary {
    pub id: String,
    pub display_name: String,
    pub role: UserRole,
    pub avatar: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread: u32,
}

impl ContactSummary {
    /// Build a summary from a marketplace order/booking row. The counterpart
    /// sits under a role-dependent key: a client's orders name the lawyer,
    /// a lawyer's orders name the client.
    pub fn from_order(value: &Value, viewer_role: UserRole) -> Option<Self> {
        let (counterpart_key, counterpart_role) = match viewer_role {
            UserRole::Client => ("lawyer", UserRole::Lawyer),
            UserRole::Lawyer => ("client", UserRole::Client),
            UserRole::Admin => ("participant", UserRole::Client),
        };
        let participant = value
            .get(counterpart_key)
            .or_else(|| value.get("participant"))
            .or_else(|| value.get("partner"))?;

        let mut summary = Self::from_user(participant)?;
        if participant.get("role").is_none() {
            summary.role = counterpart_role;
        }

        // Order-level fields win over whatever the embedded user row carried.
        if let Some(preview) = string_field(value, &["last_message", "lastMessage"]) {
            summary.last_message = Some(preview);
        }
        if let Some(ts) = datetime_field(value, &["last_message_at", "updated_at", "updatedAt"]) {
            summary.last_message_at = Some(ts);
        }
        if let Some(unread) = u64_field(value, &["unread", "unread_count", "unreadCount"]) {
            summary.unread = unread as u32;
        }
        Some(summary)
    }

    /// Build a summary from a bare user row (admin user list).
    pub fn from_user(value: &Value) -> Option<Self> {
        let id = id_string(value.get("id")?)?;
        let display_name = string_field(value, &["name", "display_name", "displayName"])
            .or_else(|| joined_name(value))
            .unwrap_or_else(|| format!("User {id}"));
        let role = value
            .get("role")
            .and_then(|v| v.as_str())
            .map(UserRole::parse)
            .unwrap_or(UserRole::Client);

        Some(Self {
            id,
            display_name,
            role,
            avatar: string_field(value, &["avatar", "avatar_url", "avatarUrl"]),
            last_message: string_field(value, &["last_message", "lastMessage"]),
            last_message_at: datetime_field(value, &["last_message_at", "lastMessageAt"]),
            unread: u64_field(value, &["unread", "unread_count", "unreadCount"]).unwrap_or(0)
                as u32,
        })
    }
}

fn joined_name(value: &Value) -> Option<String> {
    let first = value.get("first_name").and_then(|v| v.as_str()).unwrap_or("");
    let last = value.get("last_name").and_then(|v| v.as_str()).unwrap_or("");
    let joined = format!("{first} {last}");
    let joined = joined.trim();
    if joined.is_empty() { None } else { Some(joined.to_string()) }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn u64_field(value: &Value, keys: &[&str]) -> Option<u64> {
    for key in keys {
        if let Some(n) = value.get(key).and_then(|v| v.as_u64()) {
            return Some(n);
        }
    }
    None
}

fn datetime_field(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    for key in keys {
        if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Some(parsed.with_timezone(&Utc));
            }
        }
    }
    None
}

/// The backend is loose about id types; normalize both strings and integers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

fn optional_id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
        Missing(Option<()>),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Missing(_) => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_accepts_numeric_ids() {
        let msg: Message = serde_json::from_value(json!({
            "id": 41,
            "sender_id": 7,
            "recipient_id": "12",
            "content": "hello",
            "created_at": "2025-03-01T10:00:00Z",
        }))
        .expect("message should parse");
        assert_eq!(msg.id, "41");
        assert_eq!(msg.sender_id, "7");
        assert_eq!(msg.recipient_id, "12");
        assert_eq!(msg.body, "hello");
        assert!(!msg.read);
        assert!(!msg.is_local());
    }

    #[test]
    fn message_tolerates_missing_recipient() {
        let msg: Message = serde_json::from_value(json!({
            "id": "a1",
            "sender_id": "7",
            "content": "hi",
            "created_at": "2025-03-01T10:00:00Z",
        }))
        .expect("message should parse");
        assert_eq!(msg.recipient_id, "");
    }

    #[test]
    fn contact_from_order_picks_role_specific_counterpart() {
        let order = json!({
            "id": 900,
            "lawyer": {"id": 12, "first_name": "Amina", "last_name": "Odhiambo"},
            "last_message": "See you Tuesday",
            "last_message_at": "2025-03-02T09:30:00Z",
            "unread_count": 3,
        });
        let summary =
            ContactSummary::from_order(&order, UserRole::Client).expect("summary expected");
        assert_eq!(summary.id, "12");
        assert_eq!(summary.display_name, "Amina Odhiambo");
        assert_eq!(summary.role, UserRole::Lawyer);
        assert_eq!(summary.last_message.as_deref(), Some("See you Tuesday"));
        assert_eq!(summary.unread, 3);
    }

    #[test]
    fn contact_from_user_falls_back_to_placeholder_name() {
        let user = json!({"id": 5, "role": "admin"});
        let summary = ContactSummary::from_user(&user).expect("summary expected");
        assert_eq!(summary.display_name, "User 5");
        assert_eq!(summary.role, UserRole::Admin);
    }
}
