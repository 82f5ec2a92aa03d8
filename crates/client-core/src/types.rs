use serde::{Deserialize, Serialize};

/// Display name used when a participant profile lookup fails or is absent.
pub const PLACEHOLDER_DISPLAY_NAME: &str = "User";

/// Last-message placeholder shown on pending (not-yet-created) rows.
pub const PENDING_ROW_PLACEHOLDER: &str = "tap to start chat";

/// Sentinel prefix marking a text message body as an inline image URL.
pub const IMAGE_MESSAGE_PREFIX: &str = "img::";

/// An authenticated user as reported by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Opaque unique user id.
    pub id: String,
    /// Display name from the auth provider, when present.
    pub display_name: Option<String>,
    /// Avatar URL from the auth provider, when present.
    pub avatar_url: Option<String>,
}

/// Persisted user profile document (`users/{uid}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub username: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
    /// Set once onboarding completed; gates the main app surface.
    pub is_complete: bool,
}

/// Read-mostly projection of a conversation partner (user or group).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantSummary {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_group: bool,
    pub group_name: Option<String>,
}

impl ParticipantSummary {
    /// Summary for a user profile.
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            is_group: false,
            group_name: None,
        }
    }

    /// Fallback summary used when a profile lookup fails or is missing.
    ///
    /// Must never block or fail list rendering.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: PLACEHOLDER_DISPLAY_NAME.to_owned(),
            avatar_url: None,
            is_group: false,
            group_name: None,
        }
    }

    /// Summary for a group conversation.
    pub fn from_group(group: &GroupConversation) -> Self {
        Self {
            id: group.id.clone(),
            display_name: group.name.clone(),
            avatar_url: group.avatar_url.clone(),
            is_group: true,
            group_name: Some(group.name.clone()),
        }
    }
}

/// Direct (two-party) conversation document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectConversation {
    /// Canonical id, see [`direct_conversation_id`].
    pub id: String,
    /// Exactly two distinct participant ids.
    pub participant_ids: [String; 2],
    pub last_message_text: Option<String>,
    pub last_message_at: Option<u64>,
}

impl DirectConversation {
    /// The participant that is not `user_id`, when `user_id` is a member.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        let [a, b] = &self.participant_ids;
        if a == user_id {
            Some(b.as_str())
        } else if b == user_id {
            Some(a.as_str())
        } else {
            None
        }
    }
}

/// Group conversation document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupConversation {
    /// System-generated id.
    pub id: String,
    pub name: String,
    /// At least two members, always including the creator.
    pub participant_ids: Vec<String>,
    pub avatar_url: Option<String>,
    pub created_by: String,
    pub last_message_text: Option<String>,
    pub last_message_at: Option<u64>,
}

/// A persisted conversation thread.
///
/// Direct and group conversations carry different invariants, so the
/// variants are separate types rather than one record with optional fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Conversation {
    Direct(DirectConversation),
    Group(GroupConversation),
}

impl Conversation {
    pub fn id(&self) -> &str {
        match self {
            Self::Direct(direct) => &direct.id,
            Self::Group(group) => &group.id,
        }
    }

    pub fn last_message_text(&self) -> Option<&str> {
        match self {
            Self::Direct(direct) => direct.last_message_text.as_deref(),
            Self::Group(group) => group.last_message_text.as_deref(),
        }
    }

    pub fn last_message_at(&self) -> Option<u64> {
        match self {
            Self::Direct(direct) => direct.last_message_at,
            Self::Group(group) => group.last_message_at,
        }
    }

    /// Whether `user_id` participates in this conversation.
    pub fn involves(&self, user_id: &str) -> bool {
        match self {
            Self::Direct(direct) => direct.participant_ids.iter().any(|id| id == user_id),
            Self::Group(group) => group.participant_ids.iter().any(|id| id == user_id),
        }
    }
}

/// Canonical id for the direct conversation between two users.
///
/// The two ids are concatenated in lexicographic order, guaranteeing at
/// most one conversation document per unordered pair.
pub fn direct_conversation_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}{b}")
    } else {
        format!("{b}{a}")
    }
}

/// One message inside a conversation. Append-only, ascending by creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub created_at_ms: u64,
    pub sender_display_name: Option<String>,
    pub sender_avatar_url: Option<String>,
}

impl Message {
    /// Inline image URL, when the body carries the image sentinel prefix.
    pub fn image_url(&self) -> Option<&str> {
        self.text.strip_prefix(IMAGE_MESSAGE_PREFIX)
    }
}

/// Encode an uploaded image URL as a sentinel-prefixed message body.
pub fn image_message_body(url: &str) -> String {
    format!("{IMAGE_MESSAGE_PREFIX}{url}")
}

/// Whether a display row is backed by a persisted conversation or a
/// locally-pending contact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RowProvenance {
    Persisted,
    Pending,
}

/// Derived chat-list entry. Recomputed on every reconciliation pass,
/// never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayRow {
    /// Present for persisted rows; `None` for pending rows.
    pub conversation_id: Option<String>,
    pub participant: ParticipantSummary,
    pub last_message_text: String,
    pub last_message_at: Option<u64>,
    pub provenance: RowProvenance,
}

/// Bottom-bar tab selection within the main app surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Chats,
    Search,
    Profile,
}

/// Raw media bytes attached to a form or message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaAttachment {
    pub data: Vec<u8>,
    /// MIME content type, for example `image/png`.
    pub content_type: String,
}

/// Onboarding (KYC) form input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnboardingForm {
    pub display_name: String,
    /// ISO `YYYY-MM-DD` date of birth.
    pub date_of_birth: String,
    pub gender: String,
    pub avatar: Option<MediaAttachment>,
}

/// Profile edit form input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdateForm {
    pub display_name: String,
    pub username: String,
    pub avatar: Option<MediaAttachment>,
}

/// Group creation form input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupForm {
    pub name: String,
    /// Selected member ids; the creator is added when absent.
    pub member_ids: Vec<String>,
    pub avatar: Option<MediaAttachment>,
}

/// Which form a `FormRejected` event refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FormScope {
    Onboarding,
    ProfileUpdate,
    GroupCreate,
    Search,
}

/// Command channel input accepted by the client runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientCommand {
    /// Sign in with a Google ID token obtained by the host shell.
    SignIn { google_id_token: String },
    /// Sign out and hard-reset all session-scoped state.
    SignOut,
    /// Submit the onboarding (KYC) form.
    SubmitOnboarding { form: OnboardingForm },
    /// Submit the profile edit form.
    UpdateProfile { form: ProfileUpdateForm },
    /// Check username availability.
    CheckUsername { username: String },
    /// Search users by display name or username prefix.
    SearchUsers { query: String },
    /// Add a contact to the pending list (deduplicated by id).
    AddPendingContact { contact: ParticipantSummary },
    /// Remove a contact from the pending list without creating anything.
    DismissPendingContact { contact_id: String },
    /// Activate a pending row: find-or-create the direct conversation.
    OpenPendingContact { contact_id: String },
    /// Open an existing conversation.
    OpenConversation { conversation_id: String },
    /// Back-navigation from an open conversation to the chat list.
    CloseConversation,
    /// Switch the active tab, closing any open conversation first.
    SwitchTab { tab: Tab },
    /// Create a group conversation.
    CreateGroup { form: GroupForm },
    /// Send a text message.
    SendText {
        conversation_id: String,
        /// Frontend-provided transaction id echoed in `SendAck`.
        client_txn_id: String,
        body: String,
    },
    /// Upload an image and send it as a sentinel-prefixed message.
    SendImage {
        conversation_id: String,
        client_txn_id: String,
        attachment: MediaAttachment,
    },
}

/// Acknowledgement for message send commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendAck {
    /// Original frontend transaction id.
    pub client_txn_id: String,
    /// Message id on success.
    pub message_id: Option<String>,
    /// Stable error code on failure.
    pub error_code: Option<String>,
}

/// Acknowledgement for media upload requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaUploadAck {
    /// Original frontend transaction id.
    pub client_txn_id: String,
    /// Hosted media URL on success.
    pub url: Option<String>,
    /// Stable error code on failure.
    pub error_code: Option<String>,
}

/// Event channel output emitted by the client runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientEvent {
    /// Auth observer fired: current identity (or none after sign-out).
    AuthChanged { identity: Option<Identity> },
    /// Session phase transition.
    PhaseChanged { phase: crate::session::SessionPhase },
    /// Full snapshot of conversations involving the current identity.
    ConversationsSnapshot { conversations: Vec<Conversation> },
    /// Partner profiles resolved for direct conversations in the list.
    ParticipantsResolved {
        participants: Vec<ParticipantSummary>,
    },
    /// Pending-contact list changed (local mutation or store load).
    PendingContactsChanged { contacts: Vec<ParticipantSummary> },
    /// Full ascending message snapshot for one conversation.
    MessagesSnapshot {
        conversation_id: String,
        messages: Vec<Message>,
    },
    /// A conversation was opened (row selection resolved).
    ConversationOpened {
        conversation_id: String,
        participant: ParticipantSummary,
    },
    /// The open conversation was closed.
    ConversationClosed,
    /// User search results for a query.
    SearchResults {
        query: String,
        users: Vec<ParticipantSummary>,
    },
    /// Username availability result.
    UsernameCheck { username: String, taken: bool },
    /// Send acknowledgement (`SendText`, `SendImage`).
    SendAck(SendAck),
    /// Media upload acknowledgement.
    MediaUploadAck(MediaUploadAck),
    /// Row-scoped find-or-create failure; the pending contact stays put.
    ContactResolveFailed {
        contact_id: String,
        error_code: String,
    },
    /// Form-scoped rejection; entered data is left intact.
    FormRejected {
        scope: FormScope,
        code: String,
        message: String,
    },
    /// Fatal runtime error.
    FatalError {
        code: String,
        message: String,
        recoverable: bool,
    },
}
