//! Boundary contracts for the vendor backend. The client runtime is
//! generic over these traits; adapters live in their own crates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    error::ClientError,
    types::{Conversation, Identity, Message, ParticipantSummary, UserProfile},
};

/// A message about to be sent, before the backend assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub sender_id: String,
    pub text: String,
    pub sender_display_name: Option<String>,
    pub sender_avatar_url: Option<String>,
}

/// Authentication provider boundary.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange a Google ID token for an authenticated identity.
    async fn sign_in_with_google(&self, id_token: &str) -> Result<Identity, ClientError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), ClientError>;

    /// Auth observer. The receiver holds the current state immediately and
    /// is updated on every sign-in/sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// Document-store boundary (profiles, conversations, messages, pending
/// contact mirror).
#[async_trait]
pub trait CloudStore: Send + Sync {
    /// Point read of a user profile. `Ok(None)` when the document does
    /// not exist.
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, ClientError>;

    /// Profile-completeness flag. Callers treat errors as "incomplete".
    async fn is_profile_complete(&self, user_id: &str) -> Result<bool, ClientError>;

    /// Create or update a user profile document.
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), ClientError>;

    /// Whether any other user already claimed this username.
    async fn is_username_taken(&self, username: &str) -> Result<bool, ClientError>;

    /// Search users by display name or username prefix.
    async fn search_users(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ParticipantSummary>, ClientError>;

    /// All conversations the user participates in. Snapshot, not a delta.
    async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>, ClientError>;

    /// Idempotent find-or-create of the direct conversation between two
    /// users. Returns the canonical conversation id either way.
    async fn find_or_create_direct(&self, a: &str, b: &str) -> Result<String, ClientError>;

    /// Create a group conversation. The creator is always a member.
    async fn create_group(
        &self,
        creator_id: &str,
        name: &str,
        participant_ids: &[String],
        avatar_url: Option<&str>,
    ) -> Result<String, ClientError>;

    /// Full message set for one conversation, ascending by creation time.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError>;

    /// Append a message and update the parent conversation's last-message
    /// fields. Both-or-neither from the caller's point of view.
    async fn send_message(
        &self,
        conversation_id: &str,
        outgoing: &OutgoingMessage,
    ) -> Result<String, ClientError>;

    /// Remote mirror of the per-identity pending-contact list.
    async fn pending_contacts(&self, user_id: &str)
        -> Result<Vec<ParticipantSummary>, ClientError>;

    /// Full-overwrite write of the pending-contact mirror.
    async fn put_pending_contacts(
        &self,
        user_id: &str,
        contacts: &[ParticipantSummary],
    ) -> Result<(), ClientError>;
}

/// Media hosting boundary.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload raw bytes, returning the hosted URL.
    async fn upload(&self, data: Vec<u8>, content_type: &str) -> Result<String, ClientError>;
}
