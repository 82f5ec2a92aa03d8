use serde::{Deserialize, Serialize};

use crate::{
    error::ClientError,
    types::{ParticipantSummary, Tab},
};

/// High-level session lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionPhase {
    /// No authenticated identity.
    Unauthenticated,
    /// Signed in; profile completeness and pending contacts are loading.
    Loading,
    /// Signed in but the profile is incomplete; onboarding preempts
    /// every other surface.
    NeedsOnboarding,
    /// Fully onboarded; tab content or an open conversation is shown.
    Ready,
}

/// What is shown within the `Ready` phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActiveView {
    List(Tab),
    Conversation {
        conversation_id: String,
        participant: ParticipantSummary,
    },
}

/// Exactly one of these is presented at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    SignedOut,
    Loading,
    Onboarding,
    Conversation {
        conversation_id: String,
        participant: ParticipantSummary,
    },
    Tab(Tab),
}

/// Navigation/session state machine.
///
/// Owns the transient "which screen / which open conversation" state for
/// one authenticated session. Holds no persisted data.
#[derive(Debug, Clone)]
pub struct SessionController {
    phase: SessionPhase,
    view: ActiveView,
}

impl Default for SessionController {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            view: ActiveView::List(Tab::Chats),
        }
    }
}

impl SessionController {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn view(&self) -> &ActiveView {
        &self.view
    }

    /// The single surface currently presented to the user.
    pub fn presentation(&self) -> Presentation {
        match self.phase {
            SessionPhase::Unauthenticated => Presentation::SignedOut,
            SessionPhase::Loading => Presentation::Loading,
            SessionPhase::NeedsOnboarding => Presentation::Onboarding,
            SessionPhase::Ready => match &self.view {
                ActiveView::List(tab) => Presentation::Tab(*tab),
                ActiveView::Conversation {
                    conversation_id,
                    participant,
                } => Presentation::Conversation {
                    conversation_id: conversation_id.clone(),
                    participant: participant.clone(),
                },
            },
        }
    }

    /// Identity observer reported a signed-in user.
    pub fn on_signed_in(&mut self) -> Result<SessionPhase, ClientError> {
        if self.phase != SessionPhase::Unauthenticated {
            return Err(ClientError::invalid_state(self.phase, "sign_in"));
        }
        self.phase = SessionPhase::Loading;
        Ok(self.phase)
    }

    /// Profile completeness resolved while loading.
    ///
    /// Callers must map lookup failures to `complete = false` (fail safe
    /// toward requiring onboarding).
    pub fn on_profile_status(&mut self, complete: bool) -> Result<SessionPhase, ClientError> {
        if self.phase != SessionPhase::Loading {
            return Err(ClientError::invalid_state(self.phase, "profile_status"));
        }
        self.phase = if complete {
            SessionPhase::Ready
        } else {
            SessionPhase::NeedsOnboarding
        };
        self.view = ActiveView::List(Tab::Chats);
        Ok(self.phase)
    }

    /// Onboarding form was accepted.
    pub fn on_onboarding_complete(&mut self) -> Result<SessionPhase, ClientError> {
        if self.phase != SessionPhase::NeedsOnboarding {
            return Err(ClientError::invalid_state(self.phase, "onboarding_complete"));
        }
        self.phase = SessionPhase::Ready;
        self.view = ActiveView::List(Tab::Chats);
        Ok(self.phase)
    }

    /// Identity observer reported sign-out. Unconditional hard reset;
    /// no partial carry-over across identities.
    pub fn on_signed_out(&mut self) -> SessionPhase {
        self.phase = SessionPhase::Unauthenticated;
        self.view = ActiveView::List(Tab::Chats);
        self.phase
    }

    /// Row selection resolved to a conversation id.
    pub fn open_conversation(
        &mut self,
        conversation_id: impl Into<String>,
        participant: ParticipantSummary,
    ) -> Result<(), ClientError> {
        if self.phase != SessionPhase::Ready {
            return Err(ClientError::invalid_state(self.phase, "open_conversation"));
        }
        self.view = ActiveView::Conversation {
            conversation_id: conversation_id.into(),
            participant,
        };
        Ok(())
    }

    /// Back-navigation from an open conversation.
    ///
    /// Always returns to the chats list, never to a different prior tab.
    /// Returns whether a conversation was actually open.
    pub fn close_conversation(&mut self) -> Result<bool, ClientError> {
        if self.phase != SessionPhase::Ready {
            return Err(ClientError::invalid_state(self.phase, "close_conversation"));
        }
        let was_open = matches!(self.view, ActiveView::Conversation { .. });
        self.view = ActiveView::List(Tab::Chats);
        Ok(was_open)
    }

    /// Switch the active tab, closing any open conversation first.
    ///
    /// Returns whether a conversation was closed as part of the switch.
    pub fn switch_tab(&mut self, tab: Tab) -> Result<bool, ClientError> {
        if self.phase != SessionPhase::Ready {
            return Err(ClientError::invalid_state(self.phase, "switch_tab"));
        }
        let closed = matches!(self.view, ActiveView::Conversation { .. });
        self.view = ActiveView::List(tab);
        Ok(closed)
    }

    /// Conversation id currently open, when any.
    pub fn open_conversation_id(&self) -> Option<&str> {
        match &self.view {
            ActiveView::Conversation {
                conversation_id, ..
            } => Some(conversation_id.as_str()),
            ActiveView::List(_) => None,
        }
    }
}
