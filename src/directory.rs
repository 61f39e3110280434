use crate::api::ChatApi;
use crate::api::models::{ContactSummary, CurrentUser, UserRole};
use crate::error::Result;

/// Fetch and assemble the addressable counterparts for the current user.
/// A fetch failure propagates as-is: the caller shows an empty, errored list
/// rather than stale or fabricated contacts.
pub async fn list<A: ChatApi>(api: &A, user: &CurrentUser) -> Result<Vec<ContactSummary>> {
    let entries = api.contacts(user).await?;
    Ok(build(entries, &user.id))
}

/// Deduplicate by counterpart id, drop self-entries, and order by most
/// recent activity. Two bookings with the same lawyer collapse into one row.
pub fn build(entries: Vec<ContactSummary>, current_user_id: &str) -> Vec<ContactSummary> {
    let mut out: Vec<ContactSummary> = Vec::new();
    for entry in entries {
        // Self-chat is invalid.
        if entry.id == current_user_id {
            continue;
        }
        match out.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => {
                if entry.last_message_at > existing.last_message_at {
                    existing.last_message = entry.last_message;
                    existing.last_message_at = entry.last_message_at;
                }
                existing.unread = existing.unread.max(entry.unread);
            }
            None => out.push(entry),
        }
    }
    out.sort_by(|a, b| {
        b.last_message_at
            .cmp(&a.last_message_at)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    out
}

/// Minimal counterpart entry for opening a conversation with a user that is
/// not in the collaborator lists (e.g. an admin reaching out directly).
pub fn direct_entry(user_id: &str) -> ContactSummary {
    ContactSummary {
        id: user_id.to_string(),
        display_name: format!("User {user_id}"),
        role: UserRole::Client,
        avatar: None,
        last_message: None,
        last_message_at: None,
        unread: 0,
    }
}
