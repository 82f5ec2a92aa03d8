//! In-memory backend for the smoke binary and scenario tests.
//!
//! Implements the same boundary traits as the Firestore adapter with plain
//! maps behind an `RwLock`, plus a monotonic millisecond clock so message
//! ordering is deterministic. Failure injection flags let tests drive the
//! error paths without a network.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use client_core::{
    AuthGateway, ClientError, ClientErrorCategory, CloudStore, Conversation, DirectConversation,
    GroupConversation, Identity, MediaStore, Message, OutgoingMessage, ParticipantSummary,
    UserProfile, direct_conversation_id,
};

#[derive(Default)]
struct BackendState {
    profiles: HashMap<String, UserProfile>,
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
    pending: HashMap<String, Vec<ParticipantSummary>>,
}

/// In-memory [`CloudStore`] and [`MediaStore`].
pub struct InMemoryBackend {
    state: RwLock<BackendState>,
    clock_ms: AtomicU64,
    fail_next_find_or_create: AtomicBool,
    fail_sends: AtomicBool,
    fail_uploads: AtomicBool,
    fail_directory_lookups: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn injected_failure(op: &'static str) -> ClientError {
    ClientError::new(
        ClientErrorCategory::Network,
        op,
        "injected backend failure",
    )
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BackendState::default()),
            // Arbitrary recent epoch offset; only ordering matters.
            clock_ms: AtomicU64::new(1_756_000_000_000),
            fail_next_find_or_create: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            fail_uploads: AtomicBool::new(false),
            fail_directory_lookups: AtomicBool::new(false),
        }
    }

    fn next_ms(&self) -> u64 {
        self.clock_ms.fetch_add(1, Ordering::Relaxed)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BackendState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BackendState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a profile directly, bypassing onboarding.
    pub fn seed_profile(&self, profile: UserProfile) {
        self.write().profiles.insert(profile.id.clone(), profile);
    }

    /// Make the next `find_or_create_direct` call fail with a network error.
    pub fn fail_next_find_or_create(&self) {
        self.fail_next_find_or_create.store(true, Ordering::Relaxed);
    }

    /// Make every `send_message` call fail until cleared.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// Make every `upload` call fail until cleared.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::Relaxed);
    }

    /// Make `search_users` and `is_username_taken` fail until cleared.
    pub fn set_fail_directory_lookups(&self, fail: bool) {
        self.fail_directory_lookups.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl CloudStore for InMemoryBackend {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, ClientError> {
        Ok(self.read().profiles.get(user_id).cloned())
    }

    async fn is_profile_complete(&self, user_id: &str) -> Result<bool, ClientError> {
        Ok(self
            .read()
            .profiles
            .get(user_id)
            .map(|profile| profile.is_complete)
            .unwrap_or(false))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
        self.write()
            .profiles
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn is_username_taken(&self, username: &str) -> Result<bool, ClientError> {
        if self.fail_directory_lookups.load(Ordering::Relaxed) {
            return Err(injected_failure("username_lookup"));
        }
        Ok(self
            .read()
            .profiles
            .values()
            .any(|profile| profile.username.as_deref() == Some(username)))
    }

    async fn search_users(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ParticipantSummary>, ClientError> {
        if self.fail_directory_lookups.load(Ordering::Relaxed) {
            return Err(injected_failure("user_search"));
        }
        let needle = query.to_lowercase();
        let state = self.read();
        let mut matches: Vec<&UserProfile> = state
            .profiles
            .values()
            .filter(|profile| {
                profile.display_name.to_lowercase().starts_with(&needle)
                    || profile
                        .username
                        .as_deref()
                        .is_some_and(|username| username.to_lowercase().starts_with(&needle))
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches
            .into_iter()
            .take(limit)
            .map(ParticipantSummary::from_profile)
            .collect())
    }

    async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>, ClientError> {
        let state = self.read();
        let mut conversations: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|conversation| conversation.involves(user_id))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(conversations)
    }

    async fn find_or_create_direct(&self, a: &str, b: &str) -> Result<String, ClientError> {
        if self.fail_next_find_or_create.swap(false, Ordering::Relaxed) {
            return Err(injected_failure("create_direct"));
        }
        let id = direct_conversation_id(a, b);
        let mut state = self.write();
        if !state.conversations.contains_key(&id) {
            let (first, second) = if a <= b { (a, b) } else { (b, a) };
            state.conversations.insert(
                id.clone(),
                Conversation::Direct(DirectConversation {
                    id: id.clone(),
                    participant_ids: [first.to_owned(), second.to_owned()],
                    last_message_text: None,
                    last_message_at: None,
                }),
            );
        }
        Ok(id)
    }

    async fn create_group(
        &self,
        creator_id: &str,
        name: &str,
        participant_ids: &[String],
        avatar_url: Option<&str>,
    ) -> Result<String, ClientError> {
        let id = format!("group-{}", Uuid::new_v4());
        let mut members: Vec<String> = participant_ids.to_vec();
        if !members.iter().any(|member| member == creator_id) {
            members.push(creator_id.to_owned());
        }
        self.write().conversations.insert(
            id.clone(),
            Conversation::Group(GroupConversation {
                id: id.clone(),
                name: name.to_owned(),
                participant_ids: members,
                avatar_url: avatar_url.map(str::to_owned),
                created_by: creator_id.to_owned(),
                last_message_text: None,
                last_message_at: None,
            }),
        );
        Ok(id)
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError> {
        Ok(self
            .read()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        outgoing: &OutgoingMessage,
    ) -> Result<String, ClientError> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(injected_failure("send_message"));
        }
        let message = Message {
            id: Uuid::new_v4().to_string(),
            text: outgoing.text.clone(),
            sender_id: outgoing.sender_id.clone(),
            created_at_ms: self.next_ms(),
            sender_display_name: outgoing.sender_display_name.clone(),
            sender_avatar_url: outgoing.sender_avatar_url.clone(),
        };

        // One write lock covers the append and the last-message update,
        // matching the remote adapter's single commit.
        let mut state = self.write();
        let Some(conversation) = state.conversations.get_mut(conversation_id) else {
            return Err(ClientError::new(
                ClientErrorCategory::Storage,
                "send_message",
                format!("unknown conversation {conversation_id}"),
            ));
        };
        match conversation {
            Conversation::Direct(direct) => {
                direct.last_message_text = Some(message.text.clone());
                direct.last_message_at = Some(message.created_at_ms);
            }
            Conversation::Group(group) => {
                group.last_message_text = Some(message.text.clone());
                group.last_message_at = Some(message.created_at_ms);
            }
        }
        let id = message.id.clone();
        state
            .messages
            .entry(conversation_id.to_owned())
            .or_default()
            .push(message);
        Ok(id)
    }

    async fn pending_contacts(
        &self,
        user_id: &str,
    ) -> Result<Vec<ParticipantSummary>, ClientError> {
        Ok(self.read().pending.get(user_id).cloned().unwrap_or_default())
    }

    async fn put_pending_contacts(
        &self,
        user_id: &str,
        contacts: &[ParticipantSummary],
    ) -> Result<(), ClientError> {
        self.write()
            .pending
            .insert(user_id.to_owned(), contacts.to_vec());
        Ok(())
    }
}

#[async_trait]
impl MediaStore for InMemoryBackend {
    async fn upload(&self, data: Vec<u8>, content_type: &str) -> Result<String, ClientError> {
        if self.fail_uploads.load(Ordering::Relaxed) {
            return Err(injected_failure("media_upload"));
        }
        let suffix = content_type.split('/').next_back().unwrap_or("bin");
        Ok(format!(
            "https://media.invalid/{}-{}.{suffix}",
            data.len(),
            Uuid::new_v4()
        ))
    }
}

/// In-memory [`AuthGateway`] that accepts any token as the configured user.
pub struct InMemoryAuth {
    identity: Identity,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl InMemoryAuth {
    pub fn new(identity: Identity) -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            identity,
            identity_tx,
        }
    }

    /// Push an arbitrary identity to observers, bypassing sign-in. Models
    /// host-driven account switches and restored sessions.
    pub fn publish(&self, identity: Option<Identity>) {
        let _ = self.identity_tx.send(identity);
    }
}

#[async_trait]
impl AuthGateway for InMemoryAuth {
    async fn sign_in_with_google(&self, _id_token: &str) -> Result<Identity, ClientError> {
        let _ = self.identity_tx.send(Some(self.identity.clone()));
        Ok(self.identity.clone())
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let _ = self.identity_tx.send(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }
}
