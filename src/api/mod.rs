use std::future::Future;

pub mod client;
pub mod events;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::Result;
use models::{ContactSummary, CurrentUser, Message};

/// Durable request/response surface of the backend, independent of the push
/// channel. The live implementation is [`client::ApiClient`]; the trait seam
/// keeps the deliverer and poller testable without a server.
pub trait ChatApi {
    /// Full ordered message history with one counterpart.
    fn history(&self, counterpart_id: &str) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// Durable fallback send; returns the persisted message.
    fn send_text(
        &self,
        recipient_id: &str,
        content: &str,
    ) -> impl Future<Output = Result<Message>> + Send;

    /// Upload an attachment for a counterpart. The backend stores the file,
    /// appends a `FILE:`-encoded message to the conversation and returns the
    /// stored filename.
    fn upload(
        &self,
        recipient_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Mark every message from this counterpart as read.
    fn mark_read(&self, counterpart_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Role-specific collaborator list the conversation directory is built
    /// from: bookings for clients, orders for lawyers, all users for admins.
    fn contacts(
        &self,
        user: &CurrentUser,
    ) -> impl Future<Output = Result<Vec<ContactSummary>>> + Send;
}
