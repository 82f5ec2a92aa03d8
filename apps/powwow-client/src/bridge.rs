//! Runtime bridge between the frontend channels and the backend boundary.
//!
//! One worker task owns the session controller, the listener handles, and
//! the authoritative pending-contact list. Commands arrive over the
//! [`ClientChannels`] command side; every outcome is published as a
//! [`ClientEvent`] on the broadcast side. The auth observer drives session
//! phase transitions, including the hard reset on sign-out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use backend_firestore::{ListenerHandle, spawn_conversation_listener, spawn_message_listener};
use client_core::{
    AuthGateway, ClientChannels, ClientCommand, ClientError, ClientErrorCategory, ClientEvent,
    CloudStore, Conversation, FormScope, GroupForm, Identity, MediaAttachment, MediaStore,
    OnboardingForm, OutgoingMessage, PLACEHOLDER_DISPLAY_NAME, ParticipantSummary,
    ProfileUpdateForm, RetryPolicy, SendOutcome, SessionController, SessionPhase, Tab, UserProfile,
    image_message_body, normalize_fatal_error, normalize_send_outcome, normalize_upload_outcome,
    validate,
};
use client_platform::PendingContactStore;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

/// Runtime tuning for the bridge worker.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub poll_interval: Duration,
    pub search_limit: usize,
    pub retry: RetryPolicy,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            search_limit: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// Handle to the spawned bridge worker.
pub struct ClientBridge {
    channels: ClientChannels,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl ClientBridge {
    /// Spawn the worker task on the current Tokio runtime.
    pub fn spawn(
        auth: Arc<dyn AuthGateway>,
        store: Arc<dyn CloudStore>,
        media: Option<Arc<dyn MediaStore>>,
        pending_store: Arc<dyn PendingContactStore>,
        settings: BridgeSettings,
    ) -> Self {
        let (channels, command_rx) = ClientChannels::new(COMMAND_BUFFER, EVENT_BUFFER);
        let cancel = CancellationToken::new();

        info!(
            poll_interval_ms = settings.poll_interval.as_millis() as u64,
            search_limit = settings.search_limit,
            "spawning client bridge"
        );
        let worker = Worker {
            auth,
            store,
            media,
            pending_store,
            channels: channels.clone(),
            settings,
            session: SessionController::default(),
            identity: None,
            own_profile: None,
            pending_contacts: Vec::new(),
            conversation_listener: None,
            message_listener: None,
        };
        let worker_cancel = cancel.clone();
        let worker = tokio::spawn(worker.run(command_rx, worker_cancel));

        Self {
            channels,
            cancel,
            worker,
        }
    }

    /// Channel pair for the frontend (commands in, events out).
    pub fn channels(&self) -> &ClientChannels {
        &self.channels
    }

    /// Cancel the worker and wait for teardown.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.worker.await;
    }
}

struct Worker {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn CloudStore>,
    media: Option<Arc<dyn MediaStore>>,
    pending_store: Arc<dyn PendingContactStore>,
    channels: ClientChannels,
    settings: BridgeSettings,
    session: SessionController,
    identity: Option<Identity>,
    own_profile: Option<UserProfile>,
    pending_contacts: Vec<ParticipantSummary>,
    conversation_listener: Option<ListenerHandle>,
    message_listener: Option<ListenerHandle>,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ClientCommand>,
        cancel: CancellationToken,
    ) {
        let mut auth_rx = self.auth.subscribe();
        // The observer contract is "fires once with current state", but a
        // fresh watch receiver treats the current value as already seen.
        // Process it here so a sign-in published before the worker started
        // (a restored session, or a racing host) is not lost.
        let initial = auth_rx.borrow_and_update().clone();
        if initial.is_some() {
            self.handle_auth_change(initial).await;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("bridge worker cancelled");
                    break;
                }
                changed = auth_rx.changed() => {
                    if changed.is_err() {
                        warn!("auth observer closed, stopping bridge worker");
                        break;
                    }
                    let identity = auth_rx.borrow_and_update().clone();
                    self.handle_auth_change(identity).await;
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("command channel closed, stopping bridge worker");
                        break;
                    };
                    self.handle_command(command).await;
                }
            }
        }
        self.stop_listeners().await;
    }

    async fn handle_auth_change(&mut self, identity: Option<Identity>) {
        match identity {
            Some(identity) => {
                if self.identity.as_ref() == Some(&identity) {
                    return;
                }
                // An identity switch without an intervening sign-out still
                // gets the full reset; nothing from the previous user may
                // carry over into the new session.
                if self.identity.is_some() {
                    info!(user_id = %identity.id, "identity switched, resetting previous session");
                    self.reset_session().await;
                    self.channels.emit(ClientEvent::AuthChanged { identity: None });
                    self.channels.emit(ClientEvent::PhaseChanged {
                        phase: SessionPhase::Unauthenticated,
                    });
                }
                self.identity = Some(identity.clone());
                self.channels.emit(ClientEvent::AuthChanged {
                    identity: Some(identity.clone()),
                });
                match self.session.on_signed_in() {
                    Ok(phase) => self.channels.emit(ClientEvent::PhaseChanged { phase }),
                    Err(err) => {
                        warn!(error = %err, "unexpected signed-in observer state");
                        return;
                    }
                }
                self.resolve_profile_status(&identity).await;
            }
            None => {
                if self.identity.is_none() {
                    return;
                }
                info!("identity observer reported sign-out, resetting session");
                self.reset_session().await;
                self.channels.emit(ClientEvent::AuthChanged { identity: None });
                self.channels.emit(ClientEvent::PhaseChanged {
                    phase: SessionPhase::Unauthenticated,
                });
            }
        }
    }

    /// Hard reset of everything scoped to the signed-in user.
    async fn reset_session(&mut self) {
        self.stop_listeners().await;
        self.identity = None;
        self.own_profile = None;
        self.pending_contacts.clear();
        let _ = self.session.on_signed_out();
    }

    /// Decide Ready vs NeedsOnboarding. Lookup failures fail safe toward
    /// onboarding rather than unlocking the app on an unreadable profile.
    async fn resolve_profile_status(&mut self, identity: &Identity) {
        let complete = match self.store.is_profile_complete(&identity.id).await {
            Ok(complete) => complete,
            Err(err) => {
                warn!(error = %err, "profile completeness lookup failed, requiring onboarding");
                false
            }
        };
        match self.session.on_profile_status(complete) {
            Ok(phase) => {
                self.channels.emit(ClientEvent::PhaseChanged { phase });
                if phase == SessionPhase::Ready {
                    self.enter_ready(&identity.id).await;
                }
            }
            Err(err) => warn!(error = %err, "unexpected profile status transition"),
        }
    }

    /// Session reached the main surface: load the profile and pending list
    /// and start watching conversations.
    async fn enter_ready(&mut self, user_id: &str) {
        match self.store.profile(user_id).await {
            Ok(profile) => self.own_profile = profile,
            Err(err) => warn!(error = %err, "own profile load failed"),
        }
        self.load_pending_contacts(user_id).await;
        self.start_conversation_listener(user_id);
    }

    /// Remote mirror wins when reachable; the local file covers offline
    /// startup. A reachable mirror also refreshes the local copy.
    async fn load_pending_contacts(&mut self, user_id: &str) {
        match self.store.pending_contacts(user_id).await {
            Ok(contacts) => {
                if let Err(err) = self.pending_store.put(user_id, &contacts) {
                    warn!(error = %err, "local pending-contact refresh failed");
                }
                self.pending_contacts = contacts;
            }
            Err(err) => {
                warn!(error = %err, "remote pending-contact load failed, using local copy");
                self.pending_contacts = self.pending_store.get(user_id).unwrap_or_default();
            }
        }
        self.channels.emit(ClientEvent::PendingContactsChanged {
            contacts: self.pending_contacts.clone(),
        });
    }

    fn start_conversation_listener(&mut self, user_id: &str) {
        self.conversation_listener = Some(spawn_conversation_listener(
            self.store.clone(),
            user_id.to_owned(),
            self.settings.poll_interval,
            self.settings.retry.clone(),
            self.channels.event_sender(),
        ));
    }

    async fn start_message_listener(&mut self, conversation_id: &str) {
        // Teardown before switch; two listeners on different conversations
        // would interleave stale snapshots.
        if let Some(listener) = self.message_listener.take() {
            listener.stop().await;
        }
        self.message_listener = Some(spawn_message_listener(
            self.store.clone(),
            conversation_id.to_owned(),
            self.settings.poll_interval,
            self.settings.retry.clone(),
            self.channels.event_sender(),
        ));
    }

    async fn stop_listeners(&mut self) {
        if let Some(listener) = self.message_listener.take() {
            listener.stop().await;
        }
        if let Some(listener) = self.conversation_listener.take() {
            listener.stop().await;
        }
    }

    fn current_user_id(&self) -> Result<String, ClientError> {
        self.identity
            .as_ref()
            .map(|identity| identity.id.clone())
            .ok_or_else(|| {
                ClientError::new(
                    ClientErrorCategory::Auth,
                    "not_signed_in",
                    "no authenticated identity",
                )
            })
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::SignIn { google_id_token } => {
                if let Err(err) = self.auth.sign_in_with_google(&google_id_token).await {
                    warn!(error = %err, "sign-in failed");
                    self.channels.emit(normalize_fatal_error(err, true));
                }
            }
            ClientCommand::SignOut => {
                self.stop_listeners().await;
                if let Err(err) = self.auth.sign_out().await {
                    warn!(error = %err, "sign-out failed");
                    self.channels.emit(normalize_fatal_error(err, true));
                }
            }
            ClientCommand::SubmitOnboarding { form } => {
                if let Err(err) = self.submit_onboarding(form).await {
                    self.emit_form_rejection(FormScope::Onboarding, err);
                }
            }
            ClientCommand::UpdateProfile { form } => {
                if let Err(err) = self.update_profile(form).await {
                    self.emit_form_rejection(FormScope::ProfileUpdate, err);
                }
            }
            ClientCommand::CheckUsername { username } => {
                self.check_username(username).await;
            }
            ClientCommand::SearchUsers { query } => {
                self.search_users(query).await;
            }
            ClientCommand::AddPendingContact { contact } => {
                self.add_pending_contact(contact).await;
            }
            ClientCommand::DismissPendingContact { contact_id } => {
                self.remove_pending_contact(&contact_id).await;
                self.channels.emit(ClientEvent::PendingContactsChanged {
                    contacts: self.pending_contacts.clone(),
                });
            }
            ClientCommand::OpenPendingContact { contact_id } => {
                self.open_pending_contact(&contact_id).await;
            }
            ClientCommand::OpenConversation { conversation_id } => {
                if let Err(err) = self.open_conversation(&conversation_id).await {
                    warn!(%conversation_id, error = %err, "open conversation failed");
                    self.channels.emit(normalize_fatal_error(err, true));
                }
            }
            ClientCommand::CloseConversation => {
                match self.session.close_conversation() {
                    Ok(was_open) => {
                        if was_open {
                            if let Some(listener) = self.message_listener.take() {
                                listener.stop().await;
                            }
                            self.channels.emit(ClientEvent::ConversationClosed);
                        }
                    }
                    Err(err) => warn!(error = %err, "close conversation in wrong phase"),
                }
            }
            ClientCommand::SwitchTab { tab } => {
                self.switch_tab(tab).await;
            }
            ClientCommand::CreateGroup { form } => {
                if let Err(err) = self.create_group(form).await {
                    self.emit_form_rejection(FormScope::GroupCreate, err);
                }
            }
            ClientCommand::SendText {
                conversation_id,
                client_txn_id,
                body,
            } => {
                let outcome = self.send_text(&conversation_id, body).await;
                self.channels
                    .emit(normalize_send_outcome(client_txn_id, outcome));
            }
            ClientCommand::SendImage {
                conversation_id,
                client_txn_id,
                attachment,
            } => {
                self.send_image(&conversation_id, client_txn_id, attachment)
                    .await;
            }
        }
    }

    fn emit_form_rejection(&self, scope: FormScope, error: ClientError) {
        debug!(?scope, code = %error.code, "form rejected");
        self.channels.emit(ClientEvent::FormRejected {
            scope,
            code: error.code,
            message: error.message,
        });
    }

    async fn upload_attachment(
        &self,
        attachment: &MediaAttachment,
    ) -> Result<String, ClientError> {
        validate::validate_avatar(attachment)?;
        let media = self.media.as_ref().ok_or_else(|| {
            ClientError::new(
                ClientErrorCategory::Config,
                "media_unconfigured",
                "no media store is configured",
            )
        })?;
        media
            .upload(attachment.data.clone(), &attachment.content_type)
            .await
    }

    async fn submit_onboarding(&mut self, form: OnboardingForm) -> Result<(), ClientError> {
        if self.session.phase() != SessionPhase::NeedsOnboarding {
            return Err(ClientError::invalid_state(
                self.session.phase(),
                "submit_onboarding",
            ));
        }
        let user_id = self.current_user_id()?;
        validate::validate_onboarding(&form, chrono::Utc::now().date_naive())?;

        let avatar_url = match &form.avatar {
            Some(attachment) => Some(self.upload_attachment(attachment).await?),
            None => None,
        };

        // Merge over any partial profile so a previously claimed username
        // survives onboarding.
        let existing = self.store.profile(&user_id).await?;
        let profile = UserProfile {
            id: user_id.clone(),
            display_name: form.display_name,
            username: existing.as_ref().and_then(|p| p.username.clone()),
            date_of_birth: Some(form.date_of_birth),
            gender: Some(form.gender),
            avatar_url: avatar_url.or(existing.and_then(|p| p.avatar_url)),
            is_complete: true,
        };
        self.store.upsert_profile(&profile).await?;
        self.own_profile = Some(profile);

        let phase = self.session.on_onboarding_complete()?;
        self.channels.emit(ClientEvent::PhaseChanged { phase });
        self.enter_ready(&user_id).await;
        Ok(())
    }

    async fn update_profile(&mut self, form: ProfileUpdateForm) -> Result<(), ClientError> {
        if self.session.phase() != SessionPhase::Ready {
            return Err(ClientError::invalid_state(
                self.session.phase(),
                "update_profile",
            ));
        }
        let user_id = self.current_user_id()?;
        validate::validate_profile_update(&form)?;

        // The taken-check is skipped when the username is unchanged, so
        // saving an untouched form never rejects the user's own name.
        let current_username = self
            .own_profile
            .as_ref()
            .and_then(|profile| profile.username.as_deref());
        if current_username != Some(form.username.as_str())
            && self.store.is_username_taken(&form.username).await?
        {
            return Err(ClientError::conflict(
                "username_taken",
                format!("username '{}' is already taken", form.username),
            ));
        }

        let avatar_url = match &form.avatar {
            Some(attachment) => Some(self.upload_attachment(attachment).await?),
            None => None,
        };

        let existing = self.store.profile(&user_id).await?;
        let profile = UserProfile {
            id: user_id,
            display_name: form.display_name,
            username: Some(form.username),
            date_of_birth: existing.as_ref().and_then(|p| p.date_of_birth.clone()),
            gender: existing.as_ref().and_then(|p| p.gender.clone()),
            avatar_url: avatar_url.or(existing.and_then(|p| p.avatar_url)),
            is_complete: true,
        };
        self.store.upsert_profile(&profile).await?;
        self.own_profile = Some(profile);
        Ok(())
    }

    async fn check_username(&mut self, username: String) {
        if let Err(err) = validate::validate_username(&username) {
            self.emit_form_rejection(FormScope::ProfileUpdate, err);
            return;
        }
        match self.store.is_username_taken(&username).await {
            Ok(taken) => {
                self.channels
                    .emit(ClientEvent::UsernameCheck { username, taken });
            }
            Err(err) => {
                // Scoped to the form field; a flaky availability check must
                // not raise a global error banner.
                warn!(error = %err, "username check failed");
                self.emit_form_rejection(FormScope::ProfileUpdate, err);
            }
        }
    }

    async fn search_users(&mut self, query: String) {
        let query = query.trim().to_owned();
        if query.is_empty() {
            self.channels.emit(ClientEvent::SearchResults {
                query,
                users: Vec::new(),
            });
            return;
        }
        match self.store.search_users(&query, self.settings.search_limit).await {
            Ok(users) => {
                // The searcher never appears in their own results.
                let own_id = self.identity.as_ref().map(|identity| identity.id.clone());
                let users = users
                    .into_iter()
                    .filter(|user| Some(&user.id) != own_id.as_ref())
                    .collect();
                self.channels.emit(ClientEvent::SearchResults { query, users });
            }
            Err(err) => {
                // Scoped to the search surface: clear the result list and
                // report the failure against it, nothing global.
                warn!(error = %err, "user search failed");
                self.channels.emit(ClientEvent::SearchResults {
                    query,
                    users: Vec::new(),
                });
                self.emit_form_rejection(FormScope::Search, err);
            }
        }
    }

    /// Persist the current pending list locally and to the remote mirror.
    /// The in-memory list is already updated; persistence failures are
    /// logged, not surfaced, so the UI stays responsive.
    async fn persist_pending_contacts(&self) {
        let Some(identity) = &self.identity else {
            return;
        };
        if let Err(err) = self.pending_store.put(&identity.id, &self.pending_contacts) {
            warn!(error = %err, "local pending-contact write failed");
        }
        if let Err(err) = self
            .store
            .put_pending_contacts(&identity.id, &self.pending_contacts)
            .await
        {
            warn!(error = %err, "remote pending-contact write failed");
        }
    }

    async fn add_pending_contact(&mut self, contact: ParticipantSummary) {
        if self
            .pending_contacts
            .iter()
            .any(|existing| existing.id == contact.id)
        {
            debug!(contact_id = %contact.id, "pending contact already present");
            return;
        }
        self.pending_contacts.push(contact);
        self.channels.emit(ClientEvent::PendingContactsChanged {
            contacts: self.pending_contacts.clone(),
        });
        self.persist_pending_contacts().await;
    }

    async fn remove_pending_contact(&mut self, contact_id: &str) {
        self.pending_contacts
            .retain(|contact| contact.id != contact_id);
        self.persist_pending_contacts().await;
    }

    async fn direct_conversation_exists(&self, contact_id: &str) -> bool {
        let Ok(user_id) = self.current_user_id() else {
            return false;
        };
        match self.store.conversations_for(&user_id).await {
            Ok(conversations) => conversations.iter().any(|conversation| {
                matches!(conversation, Conversation::Direct(_)) && conversation.involves(contact_id)
            }),
            Err(err) => {
                warn!(%contact_id, error = %err, "conversation lookup failed");
                false
            }
        }
    }

    /// Activate a pending row: find-or-create the direct conversation,
    /// then drop the pending entry and open the result. On failure the
    /// pending entry stays and only this row reports the error.
    async fn open_pending_contact(&mut self, contact_id: &str) {
        let Some(contact) = self
            .pending_contacts
            .iter()
            .find(|contact| contact.id == contact_id)
            .cloned()
        else {
            // A tap that raced an earlier resolve lands here after the
            // pending entry was consumed. When the conversation already
            // exists the command is a no-op, not an error.
            if self.direct_conversation_exists(contact_id).await {
                debug!(%contact_id, "pending contact already resolved, ignoring");
                return;
            }
            self.channels.emit(ClientEvent::ContactResolveFailed {
                contact_id: contact_id.to_owned(),
                error_code: "unknown_contact".to_owned(),
            });
            return;
        };
        let user_id = match self.current_user_id() {
            Ok(user_id) => user_id,
            Err(err) => {
                self.channels.emit(ClientEvent::ContactResolveFailed {
                    contact_id: contact_id.to_owned(),
                    error_code: err.code,
                });
                return;
            }
        };

        match self.store.find_or_create_direct(&user_id, contact_id).await {
            Ok(conversation_id) => {
                self.remove_pending_contact(contact_id).await;
                self.channels.emit(ClientEvent::PendingContactsChanged {
                    contacts: self.pending_contacts.clone(),
                });
                if let Err(err) = self
                    .present_conversation(&conversation_id, contact.clone())
                    .await
                {
                    warn!(%conversation_id, error = %err, "open after resolve failed");
                    self.channels.emit(normalize_fatal_error(err, true));
                }
            }
            Err(err) => {
                warn!(%contact_id, error = %err, "find-or-create failed for pending contact");
                self.channels.emit(ClientEvent::ContactResolveFailed {
                    contact_id: contact_id.to_owned(),
                    error_code: err.code,
                });
            }
        }
    }

    async fn open_conversation(&mut self, conversation_id: &str) -> Result<(), ClientError> {
        let user_id = self.current_user_id()?;
        let conversations = self.store.conversations_for(&user_id).await?;
        let conversation = conversations
            .iter()
            .find(|conversation| conversation.id() == conversation_id)
            .ok_or_else(|| {
                ClientError::new(
                    ClientErrorCategory::Storage,
                    "unknown_conversation",
                    format!("conversation {conversation_id} not found for current user"),
                )
            })?;
        let participant = self.participant_for(conversation, &user_id).await;
        self.present_conversation(conversation_id, participant).await
    }

    async fn participant_for(
        &self,
        conversation: &Conversation,
        user_id: &str,
    ) -> ParticipantSummary {
        match conversation {
            Conversation::Group(group) => ParticipantSummary::from_group(group),
            Conversation::Direct(direct) => {
                let Some(partner_id) = direct.other_participant(user_id) else {
                    return ParticipantSummary::placeholder(direct.id.clone());
                };
                match self.store.profile(partner_id).await {
                    Ok(Some(profile)) => ParticipantSummary::from_profile(&profile),
                    Ok(None) => ParticipantSummary::placeholder(partner_id.to_owned()),
                    Err(err) => {
                        warn!(%partner_id, error = %err, "partner profile load failed");
                        ParticipantSummary::placeholder(partner_id.to_owned())
                    }
                }
            }
        }
    }

    async fn present_conversation(
        &mut self,
        conversation_id: &str,
        participant: ParticipantSummary,
    ) -> Result<(), ClientError> {
        self.session
            .open_conversation(conversation_id, participant.clone())?;
        self.start_message_listener(conversation_id).await;
        self.channels.emit(ClientEvent::ConversationOpened {
            conversation_id: conversation_id.to_owned(),
            participant,
        });
        Ok(())
    }

    async fn switch_tab(&mut self, tab: Tab) {
        match self.session.switch_tab(tab) {
            Ok(closed) => {
                if closed {
                    if let Some(listener) = self.message_listener.take() {
                        listener.stop().await;
                    }
                    self.channels.emit(ClientEvent::ConversationClosed);
                }
            }
            Err(err) => warn!(error = %err, "tab switch in wrong phase"),
        }
    }

    async fn create_group(&mut self, form: GroupForm) -> Result<(), ClientError> {
        if self.session.phase() != SessionPhase::Ready {
            return Err(ClientError::invalid_state(
                self.session.phase(),
                "create_group",
            ));
        }
        let user_id = self.current_user_id()?;
        validate::validate_group(&form, &user_id)?;

        let avatar_url = match &form.avatar {
            Some(attachment) => Some(self.upload_attachment(attachment).await?),
            None => None,
        };
        let conversation_id = self
            .store
            .create_group(&user_id, form.name.trim(), &form.member_ids, avatar_url.as_deref())
            .await?;
        debug!(%conversation_id, "group created");
        Ok(())
    }

    fn outgoing_message(&self, text: String, user_id: &str) -> OutgoingMessage {
        OutgoingMessage {
            sender_id: user_id.to_owned(),
            text,
            sender_display_name: self
                .own_profile
                .as_ref()
                .map(|profile| profile.display_name.clone())
                .or_else(|| {
                    self.identity
                        .as_ref()
                        .and_then(|identity| identity.display_name.clone())
                })
                .or_else(|| Some(PLACEHOLDER_DISPLAY_NAME.to_owned())),
            sender_avatar_url: self
                .own_profile
                .as_ref()
                .and_then(|profile| profile.avatar_url.clone()),
        }
    }

    async fn send_text(&mut self, conversation_id: &str, body: String) -> SendOutcome {
        let user_id = match self.current_user_id() {
            Ok(user_id) => user_id,
            Err(error) => return SendOutcome::Failure { error },
        };
        let body = body.trim().to_owned();
        if body.is_empty() {
            return SendOutcome::Failure {
                error: ClientError::validation("empty_message", "message body is empty"),
            };
        }
        let outgoing = self.outgoing_message(body, &user_id);
        match self.store.send_message(conversation_id, &outgoing).await {
            Ok(message_id) => SendOutcome::Success { message_id },
            Err(error) => SendOutcome::Failure { error },
        }
    }

    async fn send_image(
        &mut self,
        conversation_id: &str,
        client_txn_id: String,
        attachment: MediaAttachment,
    ) {
        let upload = self.upload_attachment(&attachment).await;
        self.channels
            .emit(normalize_upload_outcome(client_txn_id.clone(), upload.clone()));
        let outcome = match upload {
            Ok(url) => {
                let user_id = match self.current_user_id() {
                    Ok(user_id) => user_id,
                    Err(error) => {
                        self.channels
                            .emit(normalize_send_outcome(client_txn_id, SendOutcome::Failure {
                                error,
                            }));
                        return;
                    }
                };
                let outgoing = self.outgoing_message(image_message_body(&url), &user_id);
                match self.store.send_message(conversation_id, &outgoing).await {
                    Ok(message_id) => SendOutcome::Success { message_id },
                    Err(error) => SendOutcome::Failure { error },
                }
            }
            Err(error) => SendOutcome::Failure { error },
        };
        self.channels
            .emit(normalize_send_outcome(client_txn_id, outcome));
    }
}
