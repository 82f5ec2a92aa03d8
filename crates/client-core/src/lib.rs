//! Core client contract shared between the runtime and frontend consumers.
//!
//! This crate defines the command/event protocol, the session state
//! machine, the chat-list reconciler, form validation, and the common
//! error/channel/retry abstractions. It performs no I/O; vendor adapters
//! implement the boundary traits in [`remote`].

/// Async command/event channel primitives.
pub mod channel;
/// Stable client error types and HTTP classification helpers.
pub mod error;
/// Outcome normalization helpers (send/upload acknowledgements).
pub mod normalize;
/// Chat-list reconciliation (live conversations + pending contacts).
pub mod reconcile;
/// Boundary traits for auth, document store, and media hosting.
pub mod remote;
/// Backoff policy used by listener retry loops.
pub mod retry;
/// Navigation/session state machine.
pub mod session;
/// Frontend-facing protocol types (commands, events, payloads).
pub mod types;
/// Form validation run before remote calls.
pub mod validate;

pub use channel::{ClientChannelError, ClientChannels, EventStream};
pub use error::{ClientError, ClientErrorCategory, classify_http_status};
pub use normalize::{
    SendOutcome, normalize_fatal_error, normalize_send_outcome, normalize_upload_outcome,
};
pub use reconcile::{RowSelection, reconcile, resolve_selection};
pub use remote::{AuthGateway, CloudStore, MediaStore, OutgoingMessage};
pub use retry::RetryPolicy;
pub use session::{ActiveView, Presentation, SessionController, SessionPhase};
pub use types::{
    ClientCommand, ClientEvent, Conversation, DirectConversation, DisplayRow, FormScope,
    GroupConversation, GroupForm, IMAGE_MESSAGE_PREFIX, Identity, MediaAttachment, MediaUploadAck,
    Message, OnboardingForm, PENDING_ROW_PLACEHOLDER, PLACEHOLDER_DISPLAY_NAME,
    ParticipantSummary, ProfileUpdateForm, RowProvenance, SendAck, Tab, UserProfile,
    direct_conversation_id, image_message_body,
};
