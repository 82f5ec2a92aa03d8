//! Frontend-facing state reducer for `powwow-client`.

use std::collections::{HashMap, HashSet};

use client_core::{
    ClientEvent, Conversation, DisplayRow, FormScope, Identity, Message, ParticipantSummary,
    SendAck, SessionPhase, reconcile,
};
use tracing::{debug, trace, warn};

const DEFAULT_STATUS: &str = "Signed out";

/// Full UI snapshot emitted after state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    pub phase: SessionPhase,
    pub rows: Vec<DisplayRow>,
    pub messages: Vec<Message>,
    pub open_conversation_id: Option<String>,
    pub open_participant: Option<ParticipantSummary>,
    pub search_results: Vec<ParticipantSummary>,
    pub status_text: String,
    pub error_text: Option<String>,
    pub form_error: Option<(FormScope, String)>,
    pub can_send: bool,
}

/// Tracks contact resolves that are in flight so a double-tap on a pending
/// row issues a single find-or-create.
#[derive(Debug, Default, Clone)]
struct ResolveTracker {
    in_flight: HashSet<String>,
}

impl ResolveTracker {
    fn should_request(&self, contact_id: &str) -> bool {
        !self.in_flight.contains(contact_id)
    }

    fn mark_requested(&mut self, contact_id: String) {
        self.in_flight.insert(contact_id);
    }

    fn mark_complete(&mut self, contact_id: &str) {
        self.in_flight.remove(contact_id);
    }

    fn clear(&mut self) {
        self.in_flight.clear();
    }
}

/// Mutable app state that receives client events and user actions.
#[derive(Debug, Clone)]
pub struct ClientState {
    identity: Option<Identity>,
    phase: SessionPhase,
    conversations: Vec<Conversation>,
    pending_contacts: Vec<ParticipantSummary>,
    profiles: HashMap<String, ParticipantSummary>,
    rows: Vec<DisplayRow>,
    open_conversation: Option<(String, ParticipantSummary)>,
    messages: Vec<Message>,
    search_results: Vec<ParticipantSummary>,
    status_text: String,
    error_text: Option<String>,
    form_error: Option<(FormScope, String)>,
    pending_sends: HashSet<String>,
    resolves: ResolveTracker,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientState {
    /// Create a new reducer state.
    pub fn new() -> Self {
        Self {
            identity: None,
            phase: SessionPhase::Unauthenticated,
            conversations: Vec::new(),
            pending_contacts: Vec::new(),
            profiles: HashMap::new(),
            rows: Vec::new(),
            open_conversation: None,
            messages: Vec::new(),
            search_results: Vec::new(),
            status_text: DEFAULT_STATUS.to_owned(),
            error_text: None,
            form_error: None,
            pending_sends: HashSet::new(),
            resolves: ResolveTracker::default(),
        }
    }

    /// Current immutable snapshot for UI rendering.
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            phase: self.phase,
            rows: self.rows.clone(),
            messages: self.messages.clone(),
            open_conversation_id: self
                .open_conversation
                .as_ref()
                .map(|(id, _)| id.clone()),
            open_participant: self
                .open_conversation
                .as_ref()
                .map(|(_, participant)| participant.clone()),
            search_results: self.search_results.clone(),
            status_text: self.status_text.clone(),
            error_text: self.error_text.clone(),
            form_error: self.form_error.clone(),
            can_send: self.phase == SessionPhase::Ready && self.open_conversation.is_some(),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn open_conversation_id(&self) -> Option<&str> {
        self.open_conversation.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn rows(&self) -> &[DisplayRow] {
        &self.rows
    }

    /// Set top-level fatal/auth/runtime error.
    pub fn set_error_text(&mut self, text: impl Into<String>) {
        self.error_text = Some(text.into());
    }

    /// Clears the top-level error message.
    pub fn clear_error(&mut self) {
        self.error_text = None;
    }

    /// Cache a resolved participant profile and refresh the visible rows.
    pub fn cache_participant(&mut self, participant: ParticipantSummary) {
        self.profiles.insert(participant.id.clone(), participant);
        self.rebuild_rows();
    }

    /// Mark a send as pending using its client transaction ID.
    pub fn mark_send_requested(&mut self, client_txn_id: String) {
        self.pending_sends.insert(client_txn_id);
    }

    /// Consult and mark the single-flight guard for one pending contact.
    /// Returns false when a resolve for this contact is already running.
    ///
    /// Shells must call this before sending `OpenPendingContact` and skip
    /// the command on `false`; a rapid double-tap then issues a single
    /// find-or-create instead of two.
    pub fn request_contact_resolve(&mut self, contact_id: &str) -> bool {
        if !self.resolves.should_request(contact_id) {
            trace!(%contact_id, "contact resolve already in flight");
            return false;
        }
        self.resolves.mark_requested(contact_id.to_owned());
        true
    }

    /// Handle send acknowledgement from the runtime.
    pub fn handle_send_ack(&mut self, ack: SendAck) {
        self.pending_sends.remove(&ack.client_txn_id);
        if let Some(error_code) = ack.error_code {
            warn!(
                client_txn_id = %ack.client_txn_id,
                error_code = %error_code,
                "send acknowledgement reported failure"
            );
            self.error_text = Some(format!("send failed ({error_code})"));
        } else {
            debug!(client_txn_id = %ack.client_txn_id, "send acknowledgement succeeded");
            self.clear_error();
        }
    }

    /// Feed one runtime event into the reducer.
    pub fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::AuthChanged { identity } => {
                let signed_in = identity.is_some();
                self.identity = identity;
                if !signed_in {
                    self.reset_session_state();
                }
            }
            ClientEvent::PhaseChanged { phase } => {
                self.phase = phase;
                self.status_text = phase_label(phase).to_owned();
                if phase == SessionPhase::Unauthenticated {
                    self.reset_session_state();
                }
            }
            ClientEvent::ConversationsSnapshot { conversations } => {
                trace!(count = conversations.len(), "received conversation snapshot");
                self.conversations = conversations;
                self.rebuild_rows();
            }
            ClientEvent::ParticipantsResolved { participants } => {
                for participant in participants {
                    self.profiles
                        .insert(participant.id.clone(), participant);
                }
                self.rebuild_rows();
            }
            ClientEvent::PendingContactsChanged { contacts } => {
                self.pending_contacts = contacts;
                self.rebuild_rows();
            }
            ClientEvent::MessagesSnapshot {
                conversation_id,
                messages,
            } => {
                // Snapshots for a stale scope can arrive after a switch;
                // only the open conversation's snapshot is rendered.
                match self.open_conversation_id() {
                    Some(open) if open == conversation_id => {
                        self.messages = messages;
                    }
                    _ => {
                        trace!(
                            %conversation_id,
                            "dropping message snapshot for non-open conversation"
                        );
                    }
                }
            }
            ClientEvent::ConversationOpened {
                conversation_id,
                participant,
            } => {
                debug!(%conversation_id, "conversation opened");
                self.resolves.mark_complete(&participant.id);
                if !participant.is_group {
                    self.profiles
                        .insert(participant.id.clone(), participant.clone());
                    self.rebuild_rows();
                }
                self.open_conversation = Some((conversation_id, participant));
                self.messages.clear();
            }
            ClientEvent::ConversationClosed => {
                self.open_conversation = None;
                self.messages.clear();
            }
            ClientEvent::SearchResults { users, .. } => {
                self.search_results = users;
            }
            ClientEvent::UsernameCheck { username, taken } => {
                if taken {
                    self.form_error = Some((
                        FormScope::ProfileUpdate,
                        format!("username '{username}' is taken"),
                    ));
                } else {
                    self.form_error = None;
                }
            }
            ClientEvent::SendAck(ack) => {
                self.handle_send_ack(ack);
            }
            ClientEvent::MediaUploadAck(_) => {}
            ClientEvent::ContactResolveFailed {
                contact_id,
                error_code,
            } => {
                // Row-scoped failure: the pending row stays and the rest of
                // the list keeps rendering.
                warn!(%contact_id, %error_code, "contact resolve failed");
                self.resolves.mark_complete(&contact_id);
                self.error_text = Some(format!("could not open chat ({error_code})"));
            }
            ClientEvent::FormRejected {
                scope,
                code,
                message,
            } => {
                debug!(?scope, %code, "form rejected");
                self.form_error = Some((scope, message));
            }
            ClientEvent::FatalError { code, message, .. } => {
                warn!(%code, %message, "fatal error surfaced to state");
                self.status_text = "Backend error".to_owned();
                self.error_text = Some(format!("{code}: {message}"));
            }
        }
    }

    fn rebuild_rows(&mut self) {
        let Some(identity) = &self.identity else {
            self.rows.clear();
            return;
        };
        self.rows = reconcile(
            &self.conversations,
            &self.pending_contacts,
            &identity.id,
            &self.profiles,
        );
    }

    fn reset_session_state(&mut self) {
        self.conversations.clear();
        self.pending_contacts.clear();
        self.profiles.clear();
        self.rows.clear();
        self.open_conversation = None;
        self.messages.clear();
        self.search_results.clear();
        self.error_text = None;
        self.form_error = None;
        self.pending_sends.clear();
        self.resolves.clear();
        self.status_text = DEFAULT_STATUS.to_owned();
    }
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Unauthenticated => DEFAULT_STATUS,
        SessionPhase::Loading => "Loading profile",
        SessionPhase::NeedsOnboarding => "Finish your profile",
        SessionPhase::Ready => "Connected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::{
        DirectConversation, PENDING_ROW_PLACEHOLDER, RowProvenance, direct_conversation_id,
    };

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_owned(),
            display_name: Some("Me".to_owned()),
            avatar_url: None,
        }
    }

    fn contact(id: &str, name: &str) -> ParticipantSummary {
        ParticipantSummary {
            id: id.to_owned(),
            display_name: name.to_owned(),
            avatar_url: None,
            is_group: false,
            group_name: None,
        }
    }

    fn direct(a: &str, b: &str, at: u64) -> Conversation {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Conversation::Direct(DirectConversation {
            id: direct_conversation_id(a, b),
            participant_ids: [first.to_owned(), second.to_owned()],
            last_message_text: Some("hi".to_owned()),
            last_message_at: Some(at),
        })
    }

    fn signed_in_state(user_id: &str) -> ClientState {
        let mut state = ClientState::new();
        state.handle_event(ClientEvent::AuthChanged {
            identity: Some(identity(user_id)),
        });
        state.handle_event(ClientEvent::PhaseChanged {
            phase: SessionPhase::Ready,
        });
        state
    }

    #[test]
    fn pending_row_is_suppressed_once_conversation_exists() {
        let mut state = signed_in_state("uid-a");
        state.handle_event(ClientEvent::PendingContactsChanged {
            contacts: vec![contact("uid-b", "Bea")],
        });
        assert_eq!(state.rows().len(), 1);
        assert_eq!(
            state.rows()[0].last_message_text,
            PENDING_ROW_PLACEHOLDER
        );

        state.handle_event(ClientEvent::ConversationsSnapshot {
            conversations: vec![direct("uid-a", "uid-b", 10)],
        });
        assert_eq!(state.rows().len(), 1);
        assert_eq!(state.rows()[0].provenance, RowProvenance::Persisted);
    }

    #[test]
    fn resolved_partner_names_replace_the_row_placeholder() {
        let mut state = signed_in_state("uid-a");
        state.handle_event(ClientEvent::ConversationsSnapshot {
            conversations: vec![direct("uid-a", "uid-b", 10)],
        });
        assert_eq!(
            state.rows()[0].participant.display_name,
            client_core::PLACEHOLDER_DISPLAY_NAME
        );

        state.handle_event(ClientEvent::ParticipantsResolved {
            participants: vec![contact("uid-b", "Bea")],
        });
        assert_eq!(state.rows()[0].participant.display_name, "Bea");
    }

    #[test]
    fn opened_participant_feeds_the_profile_cache() {
        let mut state = signed_in_state("uid-a");
        state.handle_event(ClientEvent::ConversationsSnapshot {
            conversations: vec![direct("uid-a", "uid-b", 10)],
        });
        state.handle_event(ClientEvent::ConversationOpened {
            conversation_id: direct_conversation_id("uid-a", "uid-b"),
            participant: contact("uid-b", "Bea"),
        });
        assert_eq!(state.rows()[0].participant.display_name, "Bea");
    }

    #[test]
    fn taken_username_is_a_profile_update_form_error() {
        let mut state = signed_in_state("uid-a");
        state.handle_event(ClientEvent::UsernameCheck {
            username: "bea".to_owned(),
            taken: true,
        });
        let (scope, _) = state.snapshot().form_error.expect("form error set");
        assert_eq!(scope, FormScope::ProfileUpdate);
    }

    #[test]
    fn message_snapshot_for_non_open_conversation_is_dropped() {
        let mut state = signed_in_state("uid-a");
        state.handle_event(ClientEvent::ConversationOpened {
            conversation_id: "open-id".to_owned(),
            participant: contact("uid-b", "Bea"),
        });
        state.handle_event(ClientEvent::MessagesSnapshot {
            conversation_id: "other-id".to_owned(),
            messages: vec![Message {
                id: "m1".to_owned(),
                text: "stale".to_owned(),
                sender_id: "uid-c".to_owned(),
                created_at_ms: 1,
                sender_display_name: None,
                sender_avatar_url: None,
            }],
        });
        assert!(state.snapshot().messages.is_empty());

        state.handle_event(ClientEvent::MessagesSnapshot {
            conversation_id: "open-id".to_owned(),
            messages: vec![Message {
                id: "m2".to_owned(),
                text: "fresh".to_owned(),
                sender_id: "uid-b".to_owned(),
                created_at_ms: 2,
                sender_display_name: None,
                sender_avatar_url: None,
            }],
        });
        assert_eq!(state.snapshot().messages.len(), 1);
    }

    #[test]
    fn contact_resolve_is_single_flight_until_completion() {
        let mut state = signed_in_state("uid-a");
        assert!(state.request_contact_resolve("uid-b"));
        assert!(!state.request_contact_resolve("uid-b"));

        state.handle_event(ClientEvent::ContactResolveFailed {
            contact_id: "uid-b".to_owned(),
            error_code: "create_direct".to_owned(),
        });
        assert!(state.request_contact_resolve("uid-b"));
    }

    #[test]
    fn resolve_failure_keeps_the_pending_row() {
        let mut state = signed_in_state("uid-a");
        state.handle_event(ClientEvent::PendingContactsChanged {
            contacts: vec![contact("uid-b", "Bea")],
        });
        assert!(state.request_contact_resolve("uid-b"));
        state.handle_event(ClientEvent::ContactResolveFailed {
            contact_id: "uid-b".to_owned(),
            error_code: "create_direct".to_owned(),
        });

        assert_eq!(state.rows().len(), 1);
        assert_eq!(state.rows()[0].provenance, RowProvenance::Pending);
        assert!(state.snapshot().error_text.is_some());
    }

    #[test]
    fn failed_send_ack_surfaces_error_text() {
        let mut state = signed_in_state("uid-a");
        state.mark_send_requested("txn-1".to_owned());
        state.handle_send_ack(SendAck {
            client_txn_id: "txn-1".to_owned(),
            message_id: None,
            error_code: Some("send_message".to_owned()),
        });
        assert!(
            state
                .snapshot()
                .error_text
                .is_some_and(|text| text.contains("send_message"))
        );
    }

    #[test]
    fn sign_out_resets_everything() {
        let mut state = signed_in_state("uid-a");
        state.handle_event(ClientEvent::ConversationsSnapshot {
            conversations: vec![direct("uid-a", "uid-b", 10)],
        });
        state.handle_event(ClientEvent::ConversationOpened {
            conversation_id: "open-id".to_owned(),
            participant: contact("uid-b", "Bea"),
        });
        assert!(!state.rows().is_empty());

        state.handle_event(ClientEvent::AuthChanged { identity: None });
        assert!(state.rows().is_empty());
        assert!(state.open_conversation_id().is_none());
        assert!(state.snapshot().messages.is_empty());
        assert_eq!(state.snapshot().status_text, DEFAULT_STATUS);
    }

    #[test]
    fn can_send_requires_ready_phase_and_open_conversation() {
        let mut state = signed_in_state("uid-a");
        assert!(!state.snapshot().can_send);
        state.handle_event(ClientEvent::ConversationOpened {
            conversation_id: "open-id".to_owned(),
            participant: contact("uid-b", "Bea"),
        });
        assert!(state.snapshot().can_send);

        state.handle_event(ClientEvent::PhaseChanged {
            phase: SessionPhase::Unauthenticated,
        });
        assert!(!state.snapshot().can_send);
    }
}
