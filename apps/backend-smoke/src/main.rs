//! Scripted end-to-end exercise of the client runtime against the
//! in-memory backend: sign in, onboard, queue a pending contact, resolve
//! it into a conversation, and exchange a message.

use std::sync::Arc;
use std::time::Duration;

use client_core::{
    ClientCommand, ClientEvent, EventStream, Identity, OnboardingForm, ParticipantSummary,
    RetryPolicy, SessionPhase, UserProfile,
};
use client_platform::InMemoryPendingContactStore;

use backend_firestore::{InMemoryAuth, InMemoryBackend};
use powwow_client::bridge::{BridgeSettings, ClientBridge};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

async fn wait_for<F>(events: &mut EventStream, label: &str, mut predicate: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    match tokio::time::timeout(STEP_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if predicate(&event) {
                        return event;
                    }
                }
                Err(err) => {
                    eprintln!("event stream failed while waiting for {label}: {err}");
                    std::process::exit(1);
                }
            }
        }
    })
    .await
    {
        Ok(event) => event,
        Err(_) => {
            eprintln!("timed out waiting for {label}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_profile(UserProfile {
        id: "smoke-peer".to_owned(),
        display_name: "Smoke Peer".to_owned(),
        username: Some("smokepeer".to_owned()),
        date_of_birth: Some("1990-01-01".to_owned()),
        gender: Some("other".to_owned()),
        avatar_url: None,
        is_complete: true,
    });

    let auth = Arc::new(InMemoryAuth::new(Identity {
        id: "smoke-user".to_owned(),
        display_name: Some("Smoke User".to_owned()),
        avatar_url: None,
    }));
    let bridge = ClientBridge::spawn(
        auth,
        backend.clone(),
        Some(backend),
        Arc::new(InMemoryPendingContactStore::default()),
        BridgeSettings {
            poll_interval: Duration::from_millis(50),
            search_limit: 10,
            retry: RetryPolicy::default(),
        },
    );
    let mut events = bridge.channels().subscribe();
    let channels = bridge.channels().clone();

    channels
        .send_command(ClientCommand::SignIn {
            google_id_token: "smoke-token".to_owned(),
        })
        .await
        .expect("runtime accepts commands");
    wait_for(&mut events, "onboarding gate", |event| {
        matches!(
            event,
            ClientEvent::PhaseChanged {
                phase: SessionPhase::NeedsOnboarding
            }
        )
    })
    .await;
    println!("signed in; onboarding required");

    channels
        .send_command(ClientCommand::SubmitOnboarding {
            form: OnboardingForm {
                display_name: "Smoke User".to_owned(),
                date_of_birth: "1990-06-15".to_owned(),
                gender: "other".to_owned(),
                avatar: None,
            },
        })
        .await
        .expect("runtime accepts commands");
    wait_for(&mut events, "ready phase", |event| {
        matches!(
            event,
            ClientEvent::PhaseChanged {
                phase: SessionPhase::Ready
            }
        )
    })
    .await;
    println!("onboarding accepted; session ready");

    channels
        .send_command(ClientCommand::AddPendingContact {
            contact: ParticipantSummary {
                id: "smoke-peer".to_owned(),
                display_name: "Smoke Peer".to_owned(),
                avatar_url: None,
                is_group: false,
                group_name: None,
            },
        })
        .await
        .expect("runtime accepts commands");
    wait_for(&mut events, "pending contact", |event| {
        matches!(
            event,
            ClientEvent::PendingContactsChanged { contacts } if contacts.len() == 1
        )
    })
    .await;
    println!("pending contact queued");

    channels
        .send_command(ClientCommand::OpenPendingContact {
            contact_id: "smoke-peer".to_owned(),
        })
        .await
        .expect("runtime accepts commands");
    let opened = wait_for(&mut events, "conversation open", |event| {
        matches!(event, ClientEvent::ConversationOpened { .. })
    })
    .await;
    let ClientEvent::ConversationOpened {
        conversation_id, ..
    } = opened
    else {
        unreachable!();
    };
    println!("conversation opened: {conversation_id}");

    channels
        .send_command(ClientCommand::SendText {
            conversation_id: conversation_id.clone(),
            client_txn_id: "smoke-txn-1".to_owned(),
            body: "hello from the smoke run".to_owned(),
        })
        .await
        .expect("runtime accepts commands");
    wait_for(&mut events, "send ack", |event| {
        matches!(
            event,
            ClientEvent::SendAck(ack) if ack.client_txn_id == "smoke-txn-1"
                && ack.error_code.is_none()
        )
    })
    .await;
    wait_for(&mut events, "message snapshot", |event| {
        matches!(
            event,
            ClientEvent::MessagesSnapshot { conversation_id: id, messages }
                if id == &conversation_id && !messages.is_empty()
        )
    })
    .await;
    println!("message delivered and observed by the listener");

    channels
        .send_command(ClientCommand::SignOut)
        .await
        .expect("runtime accepts commands");
    wait_for(&mut events, "sign-out reset", |event| {
        matches!(
            event,
            ClientEvent::PhaseChanged {
                phase: SessionPhase::Unauthenticated
            }
        )
    })
    .await;
    println!("signed out; smoke run complete");

    bridge.shutdown().await;
}
