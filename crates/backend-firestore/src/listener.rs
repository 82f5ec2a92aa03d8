//! Polling listeners over the store boundary.
//!
//! Each listener owns a background task plus a [`CancellationToken`]; the
//! handle is the subscription, and dropping into [`ListenerHandle::stop`]
//! tears the task down before a new scope starts. Poll failures back off
//! with [`RetryPolicy`] and never kill the task.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use client_core::{
    ClientEvent, CloudStore, Conversation, Message, ParticipantSummary, RetryPolicy,
};

/// Owned handle to one polling listener.
pub struct ListenerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Cancel the listener and wait for its task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        // Last-resort teardown when the handle is dropped without `stop`.
        self.cancel.cancel();
    }
}

async fn backoff_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Look up the partner profile for each direct conversation not yet
/// resolved. Per-partner failures are skipped and retried on the next
/// changed snapshot; missing profiles render as placeholders downstream.
async fn resolve_partners(
    store: &dyn CloudStore,
    conversations: &[Conversation],
    user_id: &str,
    resolved: &mut HashSet<String>,
) -> Vec<ParticipantSummary> {
    let mut participants = Vec::new();
    for conversation in conversations {
        let Conversation::Direct(direct) = conversation else {
            continue;
        };
        let Some(partner_id) = direct.other_participant(user_id) else {
            continue;
        };
        if resolved.contains(partner_id) {
            continue;
        }
        match store.profile(partner_id).await {
            Ok(Some(profile)) => {
                resolved.insert(partner_id.to_owned());
                participants.push(ParticipantSummary::from_profile(&profile));
            }
            Ok(None) => {
                debug!(%partner_id, "partner has no profile document");
            }
            Err(err) => {
                warn!(%partner_id, error = %err, "partner profile load failed");
            }
        }
    }
    participants
}

/// Poll the conversation set for `user_id`, emitting a
/// [`ClientEvent::ConversationsSnapshot`] whenever it changes. Newly seen
/// direct partners are resolved to profiles and published ahead of the
/// snapshot as [`ClientEvent::ParticipantsResolved`].
pub fn spawn_conversation_listener(
    store: Arc<dyn CloudStore>,
    user_id: String,
    poll_interval: Duration,
    retry: RetryPolicy,
    events: broadcast::Sender<ClientEvent>,
) -> ListenerHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let mut last: Option<Vec<Conversation>> = None;
        let mut resolved: HashSet<String> = HashSet::new();
        let mut attempt: u32 = 0;
        loop {
            match store.conversations_for(&user_id).await {
                Ok(conversations) => {
                    attempt = 0;
                    if last.as_ref() != Some(&conversations) {
                        debug!(
                            user_id = %user_id,
                            count = conversations.len(),
                            "conversation snapshot changed"
                        );
                        let participants = resolve_partners(
                            store.as_ref(),
                            &conversations,
                            &user_id,
                            &mut resolved,
                        )
                        .await;
                        if !participants.is_empty() {
                            let _ =
                                events.send(ClientEvent::ParticipantsResolved { participants });
                        }
                        last = Some(conversations.clone());
                        let _ = events.send(ClientEvent::ConversationsSnapshot { conversations });
                    }
                    if !backoff_or_cancel(&task_cancel, poll_interval).await {
                        return;
                    }
                }
                Err(err) => {
                    attempt = attempt.saturating_add(1);
                    let delay = retry.delay_for_attempt(attempt, err.retry_after_ms);
                    warn!(
                        user_id = %user_id,
                        error = %err,
                        ?delay,
                        "conversation poll failed, backing off"
                    );
                    if !backoff_or_cancel(&task_cancel, delay).await {
                        return;
                    }
                }
            }
        }
    });
    ListenerHandle {
        cancel,
        task: Some(task),
    }
}

/// Poll the message set for one conversation, emitting a
/// [`ClientEvent::MessagesSnapshot`] whenever it changes.
pub fn spawn_message_listener(
    store: Arc<dyn CloudStore>,
    conversation_id: String,
    poll_interval: Duration,
    retry: RetryPolicy,
    events: broadcast::Sender<ClientEvent>,
) -> ListenerHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let mut last: Option<Vec<Message>> = None;
        let mut attempt: u32 = 0;
        loop {
            match store.messages(&conversation_id).await {
                Ok(messages) => {
                    attempt = 0;
                    if last.as_ref() != Some(&messages) {
                        last = Some(messages.clone());
                        let _ = events.send(ClientEvent::MessagesSnapshot {
                            conversation_id: conversation_id.clone(),
                            messages,
                        });
                    }
                    if !backoff_or_cancel(&task_cancel, poll_interval).await {
                        return;
                    }
                }
                Err(err) => {
                    attempt = attempt.saturating_add(1);
                    let delay = retry.delay_for_attempt(attempt, err.retry_after_ms);
                    warn!(
                        conversation_id = %conversation_id,
                        error = %err,
                        ?delay,
                        "message poll failed, backing off"
                    );
                    if !backoff_or_cancel(&task_cancel, delay).await {
                        return;
                    }
                }
            }
        }
    });
    ListenerHandle {
        cancel,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use client_core::{OutgoingMessage, UserProfile};

    fn outgoing(sender: &str, text: &str) -> OutgoingMessage {
        OutgoingMessage {
            sender_id: sender.to_owned(),
            text: text.to_owned(),
            sender_display_name: None,
            sender_avatar_url: None,
        }
    }

    #[tokio::test]
    async fn conversation_listener_emits_initial_snapshot_and_changes() {
        let backend = Arc::new(InMemoryBackend::new());
        let (events, mut rx) = broadcast::channel(16);
        let handle = spawn_conversation_listener(
            backend.clone(),
            "uid-a".to_owned(),
            Duration::from_millis(5),
            RetryPolicy::default(),
            events,
        );

        let first = rx.recv().await.expect("initial snapshot");
        assert!(matches!(
            first,
            ClientEvent::ConversationsSnapshot { ref conversations } if conversations.is_empty()
        ));

        let id = backend
            .find_or_create_direct("uid-a", "uid-b")
            .await
            .expect("create direct");
        let second = rx.recv().await.expect("changed snapshot");
        let ClientEvent::ConversationsSnapshot { conversations } = second else {
            panic!("expected conversation snapshot");
        };
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id(), id);

        handle.stop().await;
    }

    #[tokio::test]
    async fn resolves_direct_partners_ahead_of_the_snapshot() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.seed_profile(UserProfile {
            id: "uid-b".to_owned(),
            display_name: "Bea".to_owned(),
            username: Some("bea".to_owned()),
            is_complete: true,
            ..UserProfile::default()
        });
        backend
            .find_or_create_direct("uid-a", "uid-b")
            .await
            .expect("create direct");
        let (events, mut rx) = broadcast::channel(16);
        let handle = spawn_conversation_listener(
            backend,
            "uid-a".to_owned(),
            Duration::from_millis(5),
            RetryPolicy::default(),
            events,
        );

        let first = rx.recv().await.expect("participants event");
        let ClientEvent::ParticipantsResolved { participants } = first else {
            panic!("expected partner resolution before the snapshot, got {first:?}");
        };
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].id, "uid-b");
        assert_eq!(participants[0].display_name, "Bea");

        let second = rx.recv().await.expect("snapshot event");
        assert!(matches!(
            second,
            ClientEvent::ConversationsSnapshot { ref conversations } if conversations.len() == 1
        ));

        handle.stop().await;
    }

    #[tokio::test]
    async fn unchanged_polls_do_not_re_emit() {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .find_or_create_direct("uid-a", "uid-b")
            .await
            .expect("create direct");
        let (events, mut rx) = broadcast::channel(16);
        let handle = spawn_conversation_listener(
            backend,
            "uid-a".to_owned(),
            Duration::from_millis(2),
            RetryPolicy::default(),
            events,
        );

        let _ = rx.recv().await.expect("initial snapshot");
        // Several quiet poll cycles must produce no further events.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        handle.stop().await;
    }

    #[tokio::test]
    async fn message_listener_tracks_sends() {
        let backend = Arc::new(InMemoryBackend::new());
        let id = backend
            .find_or_create_direct("uid-a", "uid-b")
            .await
            .expect("create direct");
        let (events, mut rx) = broadcast::channel(16);
        let handle = spawn_message_listener(
            backend.clone(),
            id.clone(),
            Duration::from_millis(5),
            RetryPolicy::default(),
            events,
        );

        let _ = rx.recv().await.expect("initial empty snapshot");
        backend
            .send_message(&id, &outgoing("uid-a", "hello"))
            .await
            .expect("send message");

        let event = rx.recv().await.expect("snapshot after send");
        let ClientEvent::MessagesSnapshot {
            conversation_id,
            messages,
        } = event
        else {
            panic!("expected message snapshot");
        };
        assert_eq!(conversation_id, id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hello");

        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_cancels_the_task() {
        let backend = Arc::new(InMemoryBackend::new());
        let (events, _rx) = broadcast::channel(16);
        let handle = spawn_conversation_listener(
            backend,
            "uid-a".to_owned(),
            Duration::from_secs(3600),
            RetryPolicy::default(),
            events,
        );
        // Must not hang on the long poll interval.
        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop completes promptly");
    }
}
